use http::{
    HeaderMap, HeaderValue,
    header::{
        ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN,
        ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, CACHE_CONTROL, COOKIE, EXPIRES,
        ORIGIN, SET_COOKIE,
    },
};

pub const CONTENT_TYPE_PLAIN: &str = "text/plain; charset=UTF-8";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=UTF-8";
pub const CONTENT_TYPE_JAVASCRIPT: &str = "application/javascript; charset=UTF-8";
pub const CONTENT_TYPE_HTML: &str = "text/html; charset=UTF-8";
pub const CONTENT_TYPE_EVENT_STREAM: &str = "text/event-stream";

pub const NO_CACHE: &str = "no-store, no-cache, no-transform, must-revalidate, max-age=0";
pub const CACHE_FOREVER: &str = "public, max-age=31536000";
pub const ONE_YEAR_SECS: i64 = 31_536_000;

pub const SESSION_COOKIE: &str = "JSESSIONID";
const DUMMY_COOKIE_VALUE: &str = "dummy";

/// Allow the requesting origin, with credentials.
pub fn cors_headers(request: &HeaderMap, response: &mut HeaderMap) {
    let origin = request
        .get(ORIGIN)
        .filter(|origin| origin.as_bytes() != b"null")
        .cloned()
        .unwrap_or(HeaderValue::from_static("*"));
    response.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    response.insert(
        ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    if let Some(requested) = request.get(ACCESS_CONTROL_REQUEST_HEADERS) {
        response.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
    }
}

/// Let browsers and proxies keep the response for a year.
pub fn cache_headers(response: &mut HeaderMap) {
    response.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_FOREVER));
    response.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(ONE_YEAR_SECS));
    let expires = chrono::Utc::now() + chrono::Duration::seconds(ONE_YEAR_SECS);
    let expires = expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    if let Ok(expires) = HeaderValue::from_str(&expires) {
        response.insert(EXPIRES, expires);
    }
}

pub fn no_cache(response: &mut HeaderMap) {
    response.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
}

/// Sticky-session cookie for load balancers, reusing the client's value if it sent one.
pub fn session_cookie(request: &HeaderMap, response: &mut HeaderMap) {
    let value = request_cookie(request, SESSION_COOKIE).unwrap_or(DUMMY_COOKIE_VALUE);
    let cookie = HeaderValue::from_str(&format!("{SESSION_COOKIE}={value}; Path=/"))
        .unwrap_or(HeaderValue::from_static("JSESSIONID=dummy; Path=/"));
    response.insert(SET_COOKIE, cookie);
}

fn request_cookie<'a>(request: &'a HeaderMap, name: &str) -> Option<&'a str> {
    request
        .get_all(COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value)
}
