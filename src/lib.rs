pub mod cli;
pub mod config;
pub mod llm;
pub mod models;
pub mod responder;
pub mod server;
pub mod session;
pub mod websocket;

use cli::Args;
use config::prompt::resolve_template;
use llm::chat::new_client as new_chat_client;
use llm::{ LlmConfig, LlmType };
use log::info;
use responder::Responder;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub fn build_responder(args: &Args) -> Result<Responder, Box<dyn Error + Send + Sync>> {
    let llm_type: LlmType = args.chat_llm_type
        .parse()
        .map_err(|e| format!("Invalid chat LLM type: {}", e))?;
    let chat_config = LlmConfig {
        llm_type,
        completion_model: args.chat_model.clone(),
        base_url: args.chat_base_url.clone(),
        temperature: args.temperature,
    };
    let chat_client = new_chat_client(&chat_config)?;
    let template = resolve_template(args.prompts_path.as_deref())?;
    Ok(Responder::new(chat_client, template))
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("WebSocket Address: {}", args.server_addr);
    info!("HTTP Address: {}", args.http_addr);
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Chat Model: {}", args.chat_model.as_deref().unwrap_or("adapter default"));
    info!("Chat Base URL: {}", args.chat_base_url.as_deref().unwrap_or("adapter default"));
    info!("Temperature: {}", args.temperature);
    info!("Prompts Path: {}", args.prompts_path.as_deref().unwrap_or("built-in"));
    info!("Page Title: {}", args.page_title);
    info!("TLS Enabled: {}", args.enable_tls);
    info!("-------------------------");

    let responder = Arc::new(build_responder(&args)?);
    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, responder, args);
    server.run().await?;

    Ok(())
}
