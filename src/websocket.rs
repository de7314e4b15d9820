use crate::models::chat::Turn;
use crate::models::websocket::{ ClientMessage, ServerMessage };
use crate::responder::Responder;
use crate::session::{ ChatSession, ChatSurface, SurfaceError };
use async_trait::async_trait;
use futures::stream::{ SplitSink, SplitStream };
use futures::{ SinkExt, StreamExt };
use log::{ info, warn, error };
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio_tungstenite::{ tungstenite::protocol::Message, WebSocketStream };

pub const MAX_MESSAGE_SIZE: usize = 1 * 1024 * 1024;

/// A browser connection seen as a chat surface.
pub struct WebSocketSurface<S> {
    peer: SocketAddr,
    tx: SplitSink<WebSocketStream<S>, Message>,
    rx: SplitStream<WebSocketStream<S>>,
}

impl<S> WebSocketSurface<S> where S: AsyncRead + AsyncWrite + Unpin + Send {
    pub fn new(peer: SocketAddr, websocket: WebSocketStream<S>) -> Self {
        let (tx, rx) = websocket.split();
        Self { peer, tx, rx }
    }

    pub async fn send(&mut self, msg: &ServerMessage) -> Result<(), SurfaceError> {
        let json = serde_json::to_string(msg)?;
        self.tx.send(Message::Text(json)).await.map_err(|e| {
            error!("Error sending message to {}: {}", self.peer, e);
            SurfaceError::Send(e.to_string())
        })
    }
}

#[async_trait]
impl<S> ChatSurface for WebSocketSurface<S> where S: AsyncRead + AsyncWrite + Unpin + Send {
    async fn render_turn(&mut self, turn: &Turn) -> Result<(), SurfaceError> {
        self.send(&ServerMessage::from(turn)).await
    }

    async fn render_error(&mut self, message: &str) -> Result<(), SurfaceError> {
        self.send(&(ServerMessage::Error { message: message.to_string() })).await
    }

    async fn render_processing(&mut self) -> Result<(), SurfaceError> {
        self.send(&ServerMessage::Processing).await
    }

    async fn read_input(&mut self) -> Option<String> {
        let peer = self.peer;
        while let Some(msg) = self.rx.next().await {
            match msg {
                Ok(message) => {
                    if message.len() > MAX_MESSAGE_SIZE {
                        warn!(
                            "Message from {} exceeds size limit ({} > {})",
                            peer,
                            message.len(),
                            MAX_MESSAGE_SIZE
                        );
                        if self.render_error("Message too large").await.is_err() {
                            error!("Failed to send size limit error to {}", peer);
                        }
                        return None;
                    }

                    match message {
                        Message::Text(text) => {
                            match serde_json::from_str::<ClientMessage>(&text) {
                                Ok(ClientMessage::Chat { content }) => {
                                    return Some(content);
                                }
                                Err(e) => {
                                    error!("Failed to parse message from {}: {}", peer, e);
                                    let message = format!("Failed to parse message: {}", e);
                                    if self.render_error(&message).await.is_err() {
                                        return None;
                                    }
                                }
                            }
                        }
                        Message::Close(_) => {
                            info!("Received close frame from {}", peer);
                            return None;
                        }
                        Message::Ping(ping_data) => {
                            if self.tx.send(Message::Pong(ping_data)).await.is_err() {
                                error!("Failed to send pong to {}", peer);
                                return None;
                            }
                        }
                        Message::Pong(_) => {}
                        Message::Binary(_) => {
                            warn!("Ignoring binary message from {}", peer);
                        }
                        Message::Frame(_) => {}
                    }
                }
                Err(e) => {
                    match e {
                        | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                        | tokio_tungstenite::tungstenite::Error::Protocol(_)
                        | tokio_tungstenite::tungstenite::Error::Utf8 => {
                            info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                        }
                        tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                            io_err.kind() == std::io::ErrorKind::ConnectionReset
                        => {
                            info!("WebSocket connection reset by peer {}", peer);
                        }
                        tokio_tungstenite::tungstenite::Error::Capacity(ref cap_err) => {
                            error!("WebSocket capacity error for {}: {}", peer, cap_err);
                            let _ = self.render_error("Server capacity error").await;
                        }
                        _ => {
                            error!("Error receiving message from {}: {}", peer, e);
                        }
                    }
                    return None;
                }
            }
        }
        None
    }
}

/// Runs one chat session for the lifetime of the connection.
pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    responder: Arc<Responder>
)
    where S: AsyncRead + AsyncWrite + Unpin + Send
{
    info!("New WebSocket connection: {}", peer);

    let mut surface = WebSocketSurface::new(peer, websocket);
    let mut session = ChatSession::new(responder);
    info!("Assigned session ID {} to {}", session.id(), peer);

    if let Err(e) = session.run(&mut surface).await {
        error!("Session {} for {} ended with error: {}", session.id(), peer, e);
    }
    info!("WebSocket connection closed for {} (Session ID: {})", peer, session.id());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::prompt::PromptTemplate;
    use crate::llm::chat::BackendError;
    use crate::responder::tests::ScriptedClient;
    use serde_json::Value;
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio_tungstenite::tungstenite::protocol::Role;

    async fn connect(client: ScriptedClient) -> WebSocketStream<DuplexStream> {
        let (client_io, server_io) = tokio::io::duplex(64 * 1024);
        let responder = Arc::new(
            Responder::new(
                Arc::new(client),
                Arc::new(PromptTemplate::from_template("{question}").unwrap())
            )
        );
        tokio::spawn(async move {
            let ws = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
            handle_connection("127.0.0.1:9".parse().unwrap(), ws, responder).await;
        });
        WebSocketStream::from_raw_socket(client_io, Role::Client, None).await
    }

    async fn next_json(ws: &mut WebSocketStream<DuplexStream>) -> Value {
        loop {
            match ws.next().await.unwrap().unwrap() {
                Message::Text(text) => {
                    return serde_json::from_str(&text).unwrap();
                }
                _ => {}
            }
        }
    }

    async fn send_chat(ws: &mut WebSocketStream<DuplexStream>, content: &str) {
        let frame = serde_json::json!({ "type": "chat", "content": content }).to_string();
        ws.send(Message::Text(frame)).await.unwrap();
    }

    #[tokio::test]
    async fn answers_chat_frame_with_turns() {
        let mut ws = connect(ScriptedClient::echo()).await;

        send_chat(&mut ws, "안녕").await;

        let user = next_json(&mut ws).await;
        assert_eq!(user["type"], "turn");
        assert_eq!(user["role"], "user");
        assert_eq!(user["content"], "안녕");
        assert_eq!(next_json(&mut ws).await["type"], "processing");
        let reply = next_json(&mut ws).await;
        assert_eq!(reply["role"], "assistant");
        assert_eq!(reply["content"], "reply to 안녕");

        ws.close(None).await.unwrap();
    }

    #[tokio::test]
    async fn backend_failure_becomes_error_frame() {
        let mut ws = connect(
            ScriptedClient::with(|_| Err(BackendError::Malformed("empty".into())))
        ).await;

        send_chat(&mut ws, "q").await;

        assert_eq!(next_json(&mut ws).await["role"], "user");
        assert_eq!(next_json(&mut ws).await["type"], "processing");
        let err = next_json(&mut ws).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["message"], "Backend error: empty");

        send_chat(&mut ws, "again").await;
        assert_eq!(next_json(&mut ws).await["content"], "again");
    }

    #[tokio::test]
    async fn unparsable_frame_is_reported_and_skipped() {
        let mut ws = connect(ScriptedClient::echo()).await;

        ws.send(Message::Text("{\"type\":\"bogus\"}".into())).await.unwrap();
        let err = next_json(&mut ws).await;
        assert_eq!(err["type"], "error");
        assert!(err["message"].as_str().unwrap().starts_with("Failed to parse message"));

        send_chat(&mut ws, "still here").await;
        assert_eq!(next_json(&mut ws).await["content"], "still here");
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let mut ws = connect(ScriptedClient::echo()).await;

        ws.send(Message::Ping(vec![1, 2, 3])).await.unwrap();

        match ws.next().await.unwrap().unwrap() {
            Message::Pong(payload) => assert_eq!(payload, vec![1, 2, 3]),
            other => panic!("expected pong, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected_and_closes_session() {
        let mut ws = connect(ScriptedClient::echo()).await;

        let big = "x".repeat(MAX_MESSAGE_SIZE + 10);
        ws.send(Message::Text(big)).await.unwrap();

        let err = next_json(&mut ws).await;
        assert_eq!(err["type"], "error");
        assert_eq!(err["message"], "Message too large");

        // The server side drops the socket once the session ends.
        let ended = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match ws.next().await {
                    None | Some(Err(_)) => break,
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => {}
                }
            }
        }).await;
        assert!(ended.is_ok(), "connection stayed open after oversized frame");
    }
}
