//! The SockJS transports.
//!
//! Every transport maps HTTP requests (or one websocket) onto a [`Session`]:
//! the session is looked up (or created), the transport attaches to it,
//! exchanges frames in its own framing and detaches again.

use std::{collections::HashMap, fmt, str::FromStr};

use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};

use crate::{error::SockJsError, server::Endpoint, session::Session};

pub mod common;
pub(crate) mod framing;
mod polling;
pub(crate) mod pump;
mod receive;
mod streaming;
pub(crate) mod websocket;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransportKind {
    #[serde(rename = "websocket")]
    WebSocket,
    #[serde(rename = "xhr")]
    Xhr,
    #[serde(rename = "xhr_send")]
    XhrSend,
    #[serde(rename = "xhr_streaming")]
    XhrStreaming,
    #[serde(rename = "jsonp")]
    Jsonp,
    #[serde(rename = "jsonp_send")]
    JsonpSend,
    #[serde(rename = "eventsource")]
    EventSource,
    #[serde(rename = "htmlfile")]
    HtmlFile,
}

impl TransportKind {
    pub const ALL: [TransportKind; 8] = [
        TransportKind::WebSocket,
        TransportKind::Xhr,
        TransportKind::XhrSend,
        TransportKind::XhrStreaming,
        TransportKind::Jsonp,
        TransportKind::JsonpSend,
        TransportKind::EventSource,
        TransportKind::HtmlFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::WebSocket => "websocket",
            TransportKind::Xhr => "xhr",
            TransportKind::XhrSend => "xhr_send",
            TransportKind::XhrStreaming => "xhr_streaming",
            TransportKind::Jsonp => "jsonp",
            TransportKind::JsonpSend => "jsonp_send",
            TransportKind::EventSource => "eventsource",
            TransportKind::HtmlFile => "htmlfile",
        }
    }

    /// Whether a request with an unknown session id opens a new session.
    ///
    /// The send transports only ever talk to existing sessions.
    pub fn creates_session(&self) -> bool {
        !matches!(self, TransportKind::XhrSend | TransportKind::JsonpSend)
    }

    pub fn accepts(&self, method: &Method) -> bool {
        match self {
            TransportKind::WebSocket
            | TransportKind::Jsonp
            | TransportKind::EventSource
            | TransportKind::HtmlFile => method == Method::GET,
            TransportKind::JsonpSend => method == Method::POST,
            TransportKind::Xhr | TransportKind::XhrSend | TransportKind::XhrStreaming => {
                method == Method::POST || method == Method::OPTIONS
            }
        }
    }

    /// The xhr transports are used cross-origin and answer CORS preflights.
    pub fn allows_preflight(&self) -> bool {
        matches!(
            self,
            TransportKind::Xhr | TransportKind::XhrSend | TransportKind::XhrStreaming
        )
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = SockJsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransportKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(SockJsError::NotFound)
    }
}

/// The parts of an HTTP request a transport looks at.
#[derive(Debug, Clone, Default)]
pub struct TransportRequest {
    pub method: Method,
    pub headers: HeaderMap,
    pub query: HashMap<String, String>,
    pub body: Bytes,
}

impl TransportRequest {
    /// The validated JSONP / htmlfile callback name from the `c` query parameter.
    pub fn callback(&self) -> Result<&str, SockJsError> {
        let callback = self
            .query
            .get("c")
            .map(String::as_str)
            .filter(|callback| !callback.is_empty())
            .ok_or(SockJsError::CallbackRequired)?;
        let valid = callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if !valid {
            return Err(SockJsError::InvalidCallback);
        }
        Ok(callback)
    }
}

/// Serve one request of a (non websocket) transport for the given session id.
pub(crate) async fn process(
    endpoint: &Endpoint,
    kind: TransportKind,
    session_id: &str,
    request: TransportRequest,
) -> Response {
    let cookie_needed = endpoint.config.cookie_needed;
    match dispatch(endpoint, kind, session_id, &request).await {
        Ok(response) => response,
        Err(error) => {
            if error.is_request_scoped() {
                tracing::debug!(session_id, transport = %kind, %error, "request rejected");
            } else {
                tracing::error!(session_id, transport = %kind, %error, "transport failed");
            }
            common::error_response(&error, &request.headers, cookie_needed)
        }
    }
}

async fn dispatch(
    endpoint: &Endpoint,
    kind: TransportKind,
    session_id: &str,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    let cookie_needed = endpoint.config.cookie_needed;
    if request.method == Method::OPTIONS && kind.allows_preflight() {
        return Ok(common::preflight(&request.headers, cookie_needed, "OPTIONS, POST"));
    }
    if !kind.accepts(&request.method) {
        return Err(SockJsError::MethodNotAllowed(request.method.to_string().into()));
    }
    if kind == TransportKind::WebSocket {
        return Ok(common::upgrade_rejected());
    }
    let callback = match kind {
        TransportKind::Jsonp | TransportKind::HtmlFile => Some(request.callback()?.to_owned()),
        _ => None,
    };
    let session = endpoint
        .manager
        .get(session_id, kind.creates_session())
        .await?;
    tracing::trace!(session_id, transport = %kind, "dispatching");
    match (kind, callback) {
        (TransportKind::Xhr, _) => polling::xhr(endpoint, session, request).await,
        (TransportKind::Jsonp, Some(callback)) => {
            polling::jsonp(endpoint, session, request, callback).await
        }
        (TransportKind::XhrStreaming, _) => {
            streaming::xhr_streaming(endpoint, session, request).await
        }
        (TransportKind::EventSource, _) => streaming::eventsource(endpoint, session, request).await,
        (TransportKind::HtmlFile, Some(callback)) => {
            streaming::htmlfile(endpoint, session, request, callback).await
        }
        (TransportKind::XhrSend, _) => receive::xhr_send(endpoint, session, request).await,
        (TransportKind::JsonpSend, _) => receive::jsonp_send(endpoint, session, request).await,
        (TransportKind::WebSocket, _) => Ok(common::upgrade_rejected()),
        (TransportKind::Jsonp | TransportKind::HtmlFile, None) => {
            Err(SockJsError::CallbackRequired)
        }
    }
}

/// Attach `framing` to `session` and stream its frames into the response body.
pub(crate) async fn attach(
    endpoint: &Endpoint,
    session: Session,
    kind: TransportKind,
    framing: framing::Framing,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    let headers = common::response_headers(
        &request.headers,
        endpoint.config.cookie_needed,
        framing.content_type(),
    );
    let body = match endpoint.manager.acquire(&session).await {
        Ok(handle) => {
            let (idle, max_bytes) = if framing.is_streaming() {
                (
                    endpoint.config.session.heartbeat_interval,
                    endpoint.config.max_streaming_bytes,
                )
            } else {
                (endpoint.config.session.poll_timeout, 0)
            };
            pump::Pump {
                session,
                handle,
                kind,
                framing,
                idle,
                max_bytes,
            }
            .spawn()
        }
        Err(error @ (SockJsError::AlreadyAcquired(_) | SockJsError::SessionClosed(_))) => {
            tracing::debug!(session_id = %session.id(), transport = %kind, %error, "attach refused");
            framing.refusal(&error)
        }
        Err(error) => return Err(error),
    };
    Ok((headers, body).into_response())
}
