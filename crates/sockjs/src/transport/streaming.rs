//! Streaming transports: one long response carrying many frames.

use axum::response::Response;

use super::{TransportKind, TransportRequest, attach, framing::Framing};
use crate::{error::SockJsError, server::Endpoint, session::Session};

pub(super) async fn xhr_streaming(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    attach(
        endpoint,
        session,
        TransportKind::XhrStreaming,
        Framing::XhrStreaming,
        request,
    )
    .await
}

pub(super) async fn eventsource(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    attach(
        endpoint,
        session,
        TransportKind::EventSource,
        Framing::EventSource,
        request,
    )
    .await
}

pub(super) async fn htmlfile(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
    callback: String,
) -> Result<Response, SockJsError> {
    attach(
        endpoint,
        session,
        TransportKind::HtmlFile,
        Framing::HtmlFile { callback },
        request,
    )
    .await
}
