use crate::cli::Args;
use crate::responder::Responder;
use crate::websocket::handle_connection;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };

use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ Request, Response, ErrorResponse };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::CertificateDer;

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use url::form_urlencoded;

use log::{ info, warn, error, debug };

type BoxError = Box<dyn Error + Send + Sync>;

const CONNECTIONS_PER_SECOND: NonZeroU32 = match NonZeroU32::new(10) {
    Some(n) => n,
    None => panic!("connection rate must be non-zero"),
};

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(CONNECTIONS_PER_SECOND));
}

/// Both ring and aws-lc-rs are compiled into rustls, so one must be picked
/// before any `ServerConfig` is built.
pub fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}

fn open_pem(kind: &str, path: &str) -> Result<BufReader<File>, BoxError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| format!("Failed to open TLS {} file '{}': {}", kind, path, e).into())
}

/// Reads a PEM certificate chain and its private key (PKCS#8, PKCS#1 or SEC1).
pub fn load_tls_config(cert_path: &str, key_path: &str) -> Result<Arc<ServerConfig>, BoxError> {
    let mut cert_reader = open_pem("certificate", cert_path)?;
    let mut key_reader = open_pem("key", key_path)?;

    let cert_chain = rustls_pemfile
        ::certs(&mut cert_reader)
        .collect::<Result<Vec<CertificateDer<'static>>, _>>()
        .map_err(|e| format!("Failed to read certificate(s) from '{}': {}", cert_path, e))?;
    if cert_chain.is_empty() {
        return Err(format!("No certificate found in '{}'", cert_path).into());
    }

    let key = rustls_pemfile
        ::private_key(&mut key_reader)
        .map_err(|e| format!("Failed to read private key from '{}': {}", key_path, e))?
        .ok_or_else(|| format!("No private key found in '{}'", key_path))?;

    install_crypto_provider();
    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

/// `None` when the socket should speak plain WS.
pub fn tls_acceptor(args: &Args) -> Result<Option<TlsAcceptor>, BoxError> {
    match args.tls_paths()? {
        Some((cert_path, key_path)) => {
            info!("TLS enabled with certificate '{}' and key '{}'", cert_path, key_path);
            Ok(Some(TlsAcceptor::from(load_tls_config(cert_path, key_path)?)))
        }
        None => Ok(None),
    }
}

/// Key sent by the client, from the `X-API-Key` header or the `api_key` query parameter.
pub fn provided_api_key(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    if from_header.is_some() {
        return from_header;
    }

    let qs = req.uri().query().unwrap_or("");
    form_urlencoded
        ::parse(qs.as_bytes())
        .find(|(k, _)| k == "api_key")
        .map(|(_, v)| v.into_owned())
}

pub fn is_authorized(req: &Request, required_api_key: Option<&str>) -> bool {
    match required_api_key {
        Some(required) => provided_api_key(req).as_deref() == Some(required),
        None => true,
    }
}

fn unauthorized() -> ErrorResponse {
    let mut resp = ErrorResponse::new(Some("Unauthorized".into()));
    *resp.status_mut() = StatusCode::UNAUTHORIZED;
    resp
}

pub async fn start_ws_server(
    addr: &str,
    responder: Arc<Responder>,
    api_key: Option<String>,
    args: Args,
) -> Result<(), BoxError> {
    let acceptor = tls_acceptor(&args)?;
    let listener = TcpListener::bind(addr).await?;
    let scheme = if acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", scheme, addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Connection rate limit exceeded, dropping {}", peer);
            continue;
        }
        debug!("Accepted TCP connection from {}", peer);

        let responder = Arc::clone(&responder);
        let api_key = api_key.clone();
        let acceptor = acceptor.clone();

        tokio::spawn(async move {
            let result = match acceptor {
                Some(acceptor) =>
                    match acceptor.accept(stream).await {
                        Ok(tls_stream) => serve_socket(peer, tls_stream, responder, api_key).await,
                        Err(e) => Err(format!("TLS handshake failed: {}", e).into()),
                    }
                None => serve_socket(peer, stream, responder, api_key).await,
            };

            if let Err(e) = result {
                error!("Connection from {} failed: {}", peer, e);
            }
        });
    }
}

/// Upgrades one stream to a WebSocket and runs its chat session to the end.
async fn serve_socket<S>(
    peer: SocketAddr,
    stream: S,
    responder: Arc<Responder>,
    api_key: Option<String>
) -> Result<(), BoxError>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let check_key = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        if is_authorized(req, api_key.as_deref()) {
            Ok(response)
        } else {
            warn!("Rejected {}: bad or missing API key", peer);
            Err(unauthorized())
        }
    };

    let ws = accept_hdr_async(stream, check_key).await?;
    handle_connection(peer, ws, responder).await;
    Ok(())
}
