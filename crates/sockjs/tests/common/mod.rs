#![allow(dead_code)]

use std::time::Duration;

use axum::{Router, body::Body, response::Response};
use http::Request;
use http_body_util::BodyExt;
use sockjs::{BoxError, Session, SessionConfig, SockJsServer, SockJsServerConfig};
use tower::ServiceExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub async fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

pub async fn echo(session: Session) -> Result<(), BoxError> {
    while let Some(message) = session.receive().await {
        session.send(message).await?;
    }
    Ok(())
}

/// Endpoint at `/echo` with short timings so that tests finish quickly.
pub fn test_config() -> SockJsServerConfig {
    SockJsServerConfig {
        session: SessionConfig {
            heartbeat_interval: Duration::from_millis(200),
            session_timeout: Duration::from_secs(2),
            poll_timeout: Duration::from_millis(200),
            sweep_interval: Duration::from_millis(100),
        },
        ..SockJsServerConfig::default().with_prefix("/echo")
    }
}

pub fn echo_server(config: SockJsServerConfig) -> SockJsServer {
    SockJsServer::new(config, echo)
}

pub async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub async fn get(router: &Router, uri: &str) -> Response {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post(router: &Router, uri: &str, body: &str) -> Response {
    send(
        router,
        Request::post(uri).body(Body::from(body.to_owned())).unwrap(),
    )
    .await
}

pub async fn body_text(response: Response) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}
