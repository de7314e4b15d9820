use crate::llm::chat::BackendError;
use crate::models::chat::Turn;
use crate::responder::Responder;
use async_trait::async_trait;
use log::{ error, info };
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Failed to send frame: {0}")]
    Send(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

/// Whatever displays a session and feeds it input.
#[async_trait]
pub trait ChatSurface: Send {
    async fn render_turn(&mut self, turn: &Turn) -> Result<(), SurfaceError>;

    async fn render_error(&mut self, message: &str) -> Result<(), SurfaceError>;

    async fn render_processing(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }

    /// `None` once the user has gone away.
    async fn read_input(&mut self) -> Option<String>;
}

/// History of one connection plus the responder that answers it.
pub struct ChatSession {
    id: String,
    responder: Arc<Responder>,
    history: Vec<Turn>,
}

impl ChatSession {
    pub fn new(responder: Arc<Responder>) -> Self {
        let id = Uuid::new_v4().to_string();
        info!("Started chat session {}", id);
        Self { id, responder, history: Vec::new() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub async fn render_history<S>(&self, surface: &mut S) -> Result<(), SurfaceError>
        where S: ChatSurface + ?Sized
    {
        for turn in &self.history {
            surface.render_turn(turn).await?;
        }
        Ok(())
    }

    /// Records the question, asks the responder and records the reply.
    ///
    /// A backend failure is shown on the surface and returned; the user turn
    /// stays in history without an assistant reply.
    pub async fn submit<S>(&mut self, surface: &mut S, question: &str) -> Result<String, SessionError>
        where S: ChatSurface + ?Sized
    {
        let user_turn = Turn::user(question);
        self.history.push(user_turn.clone());
        surface.render_turn(&user_turn).await?;
        surface.render_processing().await?;

        match self.responder.answer(question).await {
            Ok(answer) => {
                let assistant_turn = Turn::assistant(answer.clone());
                self.history.push(assistant_turn.clone());
                surface.render_turn(&assistant_turn).await?;
                Ok(answer)
            }
            Err(e) => {
                error!("Session {}: backend call failed: {}", self.id, e);
                surface.render_error(&e.to_string()).await?;
                Err(e.into())
            }
        }
    }

    /// Serves the surface until it runs out of input.
    pub async fn run<S>(&mut self, surface: &mut S) -> Result<(), SurfaceError>
        where S: ChatSurface + ?Sized
    {
        self.render_history(surface).await?;

        while let Some(input) = surface.read_input().await {
            if input.trim().is_empty() {
                continue;
            }
            match self.submit(surface, &input).await {
                Ok(_) | Err(SessionError::Backend(_)) => {}
                Err(SessionError::Surface(e)) => {
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        info!("Closed chat session {} ({} turns)", self.id, self.history.len());
    }
}
