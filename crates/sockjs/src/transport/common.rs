pub mod http_header;

use axum::response::{IntoResponse, Response};
use http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{ACCESS_CONTROL_ALLOW_METHODS, CONTENT_TYPE},
};

use crate::error::SockJsError;

/// Headers shared by every transport response: content type, no caching, CORS
/// and (when enabled) the session cookie.
pub(crate) fn response_headers(
    request: &HeaderMap,
    cookie_needed: bool,
    content_type: &'static str,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    http_header::no_cache(&mut headers);
    http_header::cors_headers(request, &mut headers);
    if cookie_needed {
        http_header::session_cookie(request, &mut headers);
    }
    headers
}

/// Answer a CORS preflight request.
pub(crate) fn preflight(request: &HeaderMap, cookie_needed: bool, methods: &'static str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(methods));
    http_header::cors_headers(request, &mut headers);
    http_header::cache_headers(&mut headers);
    if cookie_needed {
        http_header::session_cookie(request, &mut headers);
    }
    (StatusCode::NO_CONTENT, headers).into_response()
}

pub(crate) fn upgrade_rejected() -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(CONTENT_TYPE, http_header::CONTENT_TYPE_PLAIN)],
        r#"Can "Upgrade" only to "WebSocket"."#,
    )
        .into_response()
}

/// Map an error to the response the SockJS client expects.
///
/// Internal errors never leak their details into the body.
pub(crate) fn error_response(error: &SockJsError, request: &HeaderMap, cookie_needed: bool) -> Response {
    let plain = [(CONTENT_TYPE, http_header::CONTENT_TYPE_PLAIN)];
    match error {
        SockJsError::NotFound | SockJsError::SessionClosed(_) => {
            let mut headers = HeaderMap::new();
            if cookie_needed {
                http_header::session_cookie(request, &mut headers);
            }
            (StatusCode::NOT_FOUND, headers).into_response()
        }
        SockJsError::Decode(_) | SockJsError::CallbackRequired | SockJsError::InvalidCallback => {
            (StatusCode::INTERNAL_SERVER_ERROR, plain, error.to_string()).into_response()
        }
        SockJsError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED.into_response(),
        // attach refusals are answered in-band as a close frame, never through here
        SockJsError::AlreadyAcquired(_) | SockJsError::Internal { .. } => {
            (StatusCode::INTERNAL_SERVER_ERROR, plain, "Internal Server Error").into_response()
        }
    }
}
