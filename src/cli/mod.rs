use clap::Parser;
use crate::llm::DEFAULT_TEMPERATURE;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Chat LLM Provider Args ---
    /// Type of LLM provider for chat completion (ollama)
    #[arg(long, env = "CHAT_LLM_TYPE", default_value = "ollama")]
    pub chat_llm_type: String,

    /// Base URL for the Chat LLM provider API (e.g., http://localhost:11434 for Ollama)
    #[arg(long, env = "CHAT_BASE_URL")] // No default, let adapters handle defaults if None
    pub chat_base_url: Option<String>,

    /// Model name for chat completion (e.g., gemma2:2b, llama3)
    #[arg(long, env = "CHAT_MODEL")] // No default, rely on adapter defaults if None
    pub chat_model: Option<String>,

    /// Sampling temperature passed to the model.
    #[arg(long, env = "CHAT_TEMPERATURE", default_value_t = DEFAULT_TEMPERATURE)]
    pub temperature: f32,

    /// Path to a JSON file holding the prompt template ({"template": "... {question} ..."}).
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    // --- Page Args ---
    /// Title shown on the chat page.
    #[arg(long, env = "PAGE_TITLE", default_value = "Gazzi Chatbot")]
    pub page_title: String,

    /// Page icon, either an emoji or a shortcode such as :books:.
    #[arg(long, env = "PAGE_ICON", default_value = ":books:")]
    pub page_icon: String,

    /// Placeholder text of the chat input box.
    #[arg(long, env = "INPUT_PLACEHOLDER", default_value = "질문을 입력해주세요.")]
    pub input_placeholder: String,

    // --- Server Args ---
    /// Host address and port for the WebSocket server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Host address and port for the HTTP server that serves the chat page.
    #[arg(long, env = "HTTP_ADDR", default_value = "127.0.0.1:8501")]
    pub http_addr: String,

    /// WebSocket URL the page should connect to, when it differs from the page host (e.g., behind a proxy).
    #[arg(long, env = "PUBLIC_WS_URL")]
    pub public_ws_url: Option<String>,

    /// Optional API Key required for clients to connect to the WebSocket server. If set, clients must provide this key.
    #[arg(long, env = "SERVER_API_KEY")]
    pub server_api_key: Option<String>,

    /// Optional path to the TLS certificate file (PEM format) for enabling WSS/HTTPS. Requires --tls-key-path.
    #[arg(long, env = "TLS_CERT_PATH")]
    pub tls_cert_path: Option<String>,

    /// Optional path to the TLS private key file (PEM format) for enabling WSS/HTTPS. Requires --tls-cert-path.
    #[arg(long, env = "TLS_KEY_PATH")]
    pub tls_key_path: Option<String>,

    #[arg(long, env = "ENABLE_TLS", default_value = "false")]
    pub enable_tls: bool,
}

impl Args {
    /// Certificate and key paths when TLS is on; an error when it is on
    /// without both files.
    pub fn tls_paths(&self) -> Result<Option<(&str, &str)>, String> {
        select_tls_paths(
            self.enable_tls,
            self.tls_cert_path.as_deref(),
            self.tls_key_path.as_deref()
        )
    }
}

fn select_tls_paths<'a>(
    enabled: bool,
    cert: Option<&'a str>,
    key: Option<&'a str>
) -> Result<Option<(&'a str, &'a str)>, String> {
    if !enabled {
        return Ok(None);
    }
    match (cert, key) {
        (Some(cert), Some(key)) => Ok(Some((cert, key))),
        _ => Err("--enable-tls requires both --tls-cert-path and --tls-key-path".to_string()),
    }
}
