//! Polling transports: one frame per request.

use axum::response::Response;

use super::{TransportKind, TransportRequest, attach, framing::Framing};
use crate::{error::SockJsError, server::Endpoint, session::Session};

pub(super) async fn xhr(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    attach(endpoint, session, TransportKind::Xhr, Framing::Xhr, request).await
}

pub(super) async fn jsonp(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
    callback: String,
) -> Result<Response, SockJsError> {
    attach(
        endpoint,
        session,
        TransportKind::Jsonp,
        Framing::Jsonp { callback },
        request,
    )
    .await
}
