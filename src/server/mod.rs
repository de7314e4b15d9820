pub mod api;
pub mod page;
pub mod websocket;

use crate::cli::Args;
use crate::responder::Responder;
use self::api::AppState;
use self::page::PageConfig;
use log::{ info, warn };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

pub struct Server {
    addr: String,
    responder: Arc<Responder>,
    api_key: Option<String>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, responder: Arc<Responder>, args: Args) -> Self {
        let api_key = args.server_api_key.clone().filter(|k| !k.trim().is_empty());

        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self { addr, responder, api_key, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.start_http_server().await?;
        self.start_ws_server().await
    }

    fn page_config(&self) -> Result<PageConfig, Box<dyn Error + Send + Sync>> {
        let ws_port = self.addr
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid server address '{}': {}", self.addr, e))?
            .port();

        Ok(PageConfig {
            title: self.args.page_title.clone(),
            icon: self.args.page_icon.clone(),
            placeholder: self.args.input_placeholder.clone(),
            ws_url: self.args.public_ws_url.clone().filter(|u| !u.trim().is_empty()),
            ws_port,
        })
    }

    async fn start_http_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        let state = AppState::new(&self.page_config()?, self.responder.model());
        api::start_http_server(&self.args.http_addr, state, &self.args).await
    }

    async fn start_ws_server(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        websocket::start_ws_server(
            &self.addr,
            self.responder.clone(),
            self.api_key.clone(),
            self.args.clone(),
        ).await
    }
}
