use crate::cli::Args;
use crate::server::page::{ render_page, PageConfig };
use crate::server::websocket::install_crypto_provider;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{ routing::get, Router, extract::State, response::{ Html, IntoResponse }, Json };
use serde::Serialize;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    model: String,
}

#[derive(Clone)]
pub struct AppState {
    page_html: Arc<String>,
    model: String,
}

impl AppState {
    pub fn new(page: &PageConfig, model: String) -> Self {
        Self { page_html: Arc::new(render_page(page)), model }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/", get(page_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state)
}

pub async fn start_http_server(
    addr: &str,
    state: AppState,
    args: &Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = addr.parse::<SocketAddr>()?;
    let app = router(state);

    if let Some((cert_path, key_path)) = args.tls_paths()? {
        install_crypto_provider();
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;
        info!("Starting HTTPS page server on: https://{}", addr);

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e)
        )?;
        info!("Starting HTTP page server on: http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    Ok(())
}

async fn page_handler(State(state): State<AppState>) -> impl IntoResponse {
    Html(state.page_html.as_str().to_owned())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse { status: "ok", model: state.model.clone() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn spawn_app() -> SocketAddr {
        let page = PageConfig {
            title: "Gazzi Chatbot".into(),
            icon: ":books:".into(),
            placeholder: "질문을 입력해주세요.".into(),
            ws_url: None,
            ws_port: 4000,
        };
        let app = router(AppState::new(&page, "gemma2:2b".into()));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn serves_chat_page() {
        let addr = spawn_app().await;
        let resp = reqwest::get(format!("http://{}/", addr)).await.unwrap();
        assert!(resp.status().is_success());
        let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
        assert!(content_type.starts_with("text/html"));
        let body = resp.text().await.unwrap();
        assert!(body.contains("<title>Gazzi Chatbot</title>"));
    }

    #[tokio::test]
    async fn health_reports_model() {
        let addr = spawn_app().await;
        let body: Value = reqwest
            ::get(format!("http://{}/health", addr)).await
            .unwrap()
            .json().await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["model"], "gemma2:2b");
    }
}
