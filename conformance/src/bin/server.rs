//! Endpoints expected by the SockJS protocol test-suite
//! (<https://github.com/sockjs/sockjs-protocol>).
//!
//! ```text
//! PORT=8081 cargo run -p sockjs-conformance --bin conformance-server
//! ```

use std::net::SocketAddr;

use sockjs::{BoxError, Session, SockJsServer, SockJsServerConfig, TransportKind};
use tokio_util::sync::CancellationToken;

const DEFAULT_PORT: u16 = 8081;
// the test-suite checks that streaming responses are cut after 4KiB
const RESPONSE_LIMIT: usize = 4096;

async fn echo(session: Session) -> Result<(), BoxError> {
    while let Some(message) = session.receive().await {
        session.send(message).await?;
    }
    Ok(())
}

async fn close(session: Session) -> Result<(), BoxError> {
    session.close(3000, "Go away!").await;
    Ok(())
}

fn port() -> anyhow::Result<u16> {
    let port = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PORT").ok());
    match port {
        Some(port) => Ok(port.parse()?),
        None => Ok(DEFAULT_PORT),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sockjs=debug".to_string().into()),
        )
        .init();

    let ct = CancellationToken::new();
    let base = SockJsServerConfig {
        cookie_needed: false,
        max_streaming_bytes: RESPONSE_LIMIT,
        ct: ct.clone(),
        ..Default::default()
    };
    let endpoints = [
        SockJsServer::new(base.clone().with_prefix("/echo"), echo),
        SockJsServer::new(base.clone().with_prefix("/close"), close),
        SockJsServer::new(
            base.clone()
                .with_prefix("/disabled_websocket_echo")
                .disable(TransportKind::WebSocket),
            echo,
        ),
        SockJsServer::new(
            SockJsServerConfig {
                cookie_needed: true,
                ..base.with_prefix("/cookie_needed_echo")
            },
            echo,
        ),
    ];
    let app = endpoints
        .iter()
        .fold(axum::Router::new(), |app, endpoint| app.merge(endpoint.router()));

    let bind = SocketAddr::from(([0, 0, 0, 0], port()?));
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(%bind, "conformance server listening");

    let shutdown = ct.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
        shutdown.cancel();
    });
    axum::serve(listener, app)
        .with_graceful_shutdown(ct.cancelled_owned())
        .await?;
    for endpoint in &endpoints {
        endpoint.shutdown().await;
    }
    Ok(())
}
