use crate::config::prompt::PromptTemplate;
use crate::llm::chat::{ BackendError, ChatClient };
use log::{ debug, info };
use std::sync::Arc;

/// Turns a question into a prompt and hands it to the backend.
///
/// Holds no per-call state, so one instance is shared by every session.
#[derive(Clone)]
pub struct Responder {
    chat_client: Arc<dyn ChatClient>,
    template: Arc<PromptTemplate>,
}

impl Responder {
    pub fn new(chat_client: Arc<dyn ChatClient>, template: Arc<PromptTemplate>) -> Self {
        info!(
            "Responder configured: Model={}, BaseURL={}",
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );
        Self { chat_client, template }
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn model(&self) -> String {
        self.chat_client.get_model()
    }

    /// The raw completion is returned untouched.
    pub async fn answer(&self, question: &str) -> Result<String, BackendError> {
        let prompt = self.template.render(question);
        debug!("Rendered prompt: {}", prompt);
        let completion = self.chat_client.complete(&prompt).await?;
        Ok(completion.response)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::chat::CompletionResponse;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every prompt and answers from a script.
    pub(crate) struct ScriptedClient {
        pub prompts: Mutex<Vec<String>>,
        reply: Box<dyn Fn(&str) -> Result<String, BackendError> + Send + Sync>,
    }

    impl ScriptedClient {
        pub fn echo() -> Self {
            Self::with(|prompt| Ok(format!("reply to {}", prompt)))
        }

        pub fn with(
            reply: impl Fn(&str) -> Result<String, BackendError> + Send + Sync + 'static
        ) -> Self {
            Self { prompts: Mutex::new(Vec::new()), reply: Box::new(reply) }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn complete(&self, prompt: &str) -> Result<CompletionResponse, BackendError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            (self.reply)(prompt).map(|response| CompletionResponse { response })
        }

        fn get_model(&self) -> String {
            "scripted".to_string()
        }

        fn get_base_url(&self) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn passes_rendered_template_to_backend() {
        let client = Arc::new(ScriptedClient::echo());
        let template = Arc::new(PromptTemplate::default());
        let responder = Responder::new(client.clone(), template.clone());

        responder.answer("테스트").await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.as_slice(), [template.text().replace("{question}", "테스트")]);
    }

    #[tokio::test]
    async fn returns_backend_output_unmodified() {
        let client = Arc::new(ScriptedClient::with(|_| Ok("  raw **output**\n\n".to_string())));
        let responder = Responder::new(client, Arc::new(PromptTemplate::default()));

        assert_eq!(responder.answer("q").await.unwrap(), "  raw **output**\n\n");
    }

    #[tokio::test]
    async fn propagates_backend_failure() {
        let client = Arc::new(
            ScriptedClient::with(|_| Err(BackendError::Unavailable("connection refused".into())))
        );
        let responder = Responder::new(client, Arc::new(PromptTemplate::default()));

        let err = responder.answer("q").await.unwrap_err();
        assert!(matches!(err, BackendError::Unavailable(_)));
    }

    #[tokio::test]
    async fn each_call_renders_fresh_prompt() {
        let client = Arc::new(ScriptedClient::echo());
        let template = Arc::new(PromptTemplate::from_template("Q: {question}").unwrap());
        let responder = Responder::new(client.clone(), template);

        responder.answer("first").await.unwrap();
        responder.answer("second").await.unwrap();

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.as_slice(), ["Q: first", "Q: second"]);
    }
}
