use std::{collections::HashMap, sync::Arc};

use axum::{
    Router,
    extract::{
        Path, Query, State,
        ws::{WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    response::{IntoResponse, Response},
    routing::{any, get},
};
use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Method, StatusCode,
    header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH},
};
use serde::Serialize;

use super::Endpoint;
use crate::{
    error::SockJsError,
    protocol::GREETING,
    transport::{
        self, TransportKind, TransportRequest,
        common::{
            error_response,
            http_header::{self, CONTENT_TYPE_HTML, CONTENT_TYPE_JSON, CONTENT_TYPE_PLAIN},
            preflight, response_headers, upgrade_rejected,
        },
        websocket::{self, Flavor},
    },
};

type App = Arc<Endpoint>;

pub(crate) fn router(endpoint: App) -> Router {
    let prefix = endpoint.config.normalized_prefix();
    let mut router = Router::new();
    if prefix.is_empty() {
        router = router.route("/", get(greeting));
    } else {
        router = router
            .route(&prefix, get(greeting))
            .route(&format!("{prefix}/"), get(greeting));
    }
    router
        .route(&format!("{prefix}/info"), get(info).options(info_options))
        .route(&format!("{prefix}/websocket"), get(raw_websocket))
        .route(&format!("{prefix}/{{server}}"), get(iframe))
        .route(
            &format!("{prefix}/{{server}}/{{session}}/websocket"),
            get(sockjs_websocket),
        )
        .route(
            &format!("{prefix}/{{server}}/{{session}}/{{transport}}"),
            any(transport_handler),
        )
        .with_state(endpoint)
}

async fn greeting() -> impl IntoResponse {
    ([(CONTENT_TYPE, CONTENT_TYPE_PLAIN)], GREETING)
}

#[derive(Debug, Serialize)]
struct Info {
    websocket: bool,
    cookie_needed: bool,
    origins: [&'static str; 1],
    entropy: u32,
}

async fn info(State(app): State<App>, headers: HeaderMap) -> Response {
    let info = Info {
        websocket: app.config.is_enabled(TransportKind::WebSocket),
        cookie_needed: app.config.cookie_needed,
        origins: ["*:*"],
        entropy: rand::random_range(1..=i32::MAX as u32),
    };
    match serde_json::to_string(&info) {
        Ok(body) => (response_headers(&headers, false, CONTENT_TYPE_JSON), body).into_response(),
        Err(e) => error_response(
            &SockJsError::internal_with("serialize info", e),
            &headers,
            false,
        ),
    }
}

async fn info_options(State(app): State<App>, headers: HeaderMap) -> Response {
    preflight(&headers, app.config.cookie_needed, "OPTIONS, GET")
}

async fn iframe(State(app): State<App>, Path(file): Path<String>, headers: HeaderMap) -> Response {
    if !(file.starts_with("iframe") && file.ends_with(".html")) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let mut response_headers = HeaderMap::new();
    http_header::cache_headers(&mut response_headers);
    let etag = app.iframe_etag.as_str();
    let cached = headers
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == etag || value == etag.trim_matches('"'));
    if let Ok(etag) = HeaderValue::from_str(etag) {
        response_headers.insert(ETAG, etag);
    }
    if cached {
        return (StatusCode::NOT_MODIFIED, response_headers).into_response();
    }
    response_headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_HTML));
    (response_headers, app.iframe_html.clone()).into_response()
}

async fn transport_handler(
    State(app): State<App>,
    Path((server, session, transport)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let kind = match transport.parse::<TransportKind>() {
        Ok(kind) if app.config.is_enabled(kind) && !server.contains('.') => kind,
        _ => return StatusCode::NOT_FOUND.into_response(),
    };
    app.manager.start().await;
    let request = TransportRequest {
        method,
        headers,
        query,
        body,
    };
    transport::process(&app, kind, &session, request).await
}

async fn sockjs_websocket(
    State(app): State<App>,
    Path((server, session)): Path<(String, String)>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !app.config.is_enabled(TransportKind::WebSocket) || server.contains('.') {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Ok(upgrade) = upgrade else {
        return upgrade_rejected();
    };
    app.manager.start().await;
    let session = match app.manager.get(&session, true).await {
        Ok(session) => session,
        Err(error) => return error_response(&error, &headers, app.config.cookie_needed),
    };
    let heartbeat = app.config.session.heartbeat_interval;
    upgrade.on_upgrade(move |socket| websocket::serve(socket, session, Flavor::SockJs, heartbeat))
}

async fn raw_websocket(
    State(app): State<App>,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !app.config.is_enabled(TransportKind::WebSocket) {
        return StatusCode::NOT_FOUND.into_response();
    }
    let Ok(upgrade) = upgrade else {
        return upgrade_rejected();
    };
    app.manager.start().await;
    let id = format!("{:09}", rand::random_range(1..=i32::MAX as u32));
    let session = match app.manager.get(&id, true).await {
        Ok(session) => session,
        Err(error) => return error_response(&error, &headers, app.config.cookie_needed),
    };
    let heartbeat = app.config.session.heartbeat_interval;
    upgrade.on_upgrade(move |socket| websocket::serve(socket, session, Flavor::Raw, heartbeat))
}
