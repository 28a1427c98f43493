//! The client-to-server half of the polling and streaming transports.

use axum::response::{IntoResponse, Response};
use http::{StatusCode, header::CONTENT_TYPE};

use super::{
    TransportRequest,
    common::{http_header::CONTENT_TYPE_PLAIN, response_headers},
};
use crate::{
    error::{DecodeError, SockJsError},
    protocol::decode_messages,
    server::Endpoint,
    session::Session,
};

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

pub(super) async fn xhr_send(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    let messages = decode_messages(&request.body)?;
    session.deliver(messages).await?;
    let headers = response_headers(
        &request.headers,
        endpoint.config.cookie_needed,
        CONTENT_TYPE_PLAIN,
    );
    Ok((StatusCode::NO_CONTENT, headers).into_response())
}

pub(super) async fn jsonp_send(
    endpoint: &Endpoint,
    session: Session,
    request: &TransportRequest,
) -> Result<Response, SockJsError> {
    let messages = decode_messages(&jsonp_payload(request)?)?;
    session.deliver(messages).await?;
    let headers = response_headers(
        &request.headers,
        endpoint.config.cookie_needed,
        CONTENT_TYPE_PLAIN,
    );
    Ok((StatusCode::OK, headers, "ok").into_response())
}

/// Form posts carry the payload in the `d` field, anything else is the raw body.
fn jsonp_payload(request: &TransportRequest) -> Result<Vec<u8>, DecodeError> {
    let is_form = request
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with(FORM_URLENCODED));
    if !is_form {
        return Ok(request.body.to_vec());
    }
    url::form_urlencoded::parse(&request.body)
        .find(|(key, _)| key == "d")
        .map(|(_, value)| value.into_owned().into_bytes())
        .ok_or(DecodeError::EmptyPayload)
}
