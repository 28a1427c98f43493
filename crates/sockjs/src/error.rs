use std::borrow::Cow;

use crate::session::SessionId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Malformed data received from a client, or a malformed frame handed to
/// [`Frame::decode`](crate::protocol::Frame::decode).
///
/// The display strings of the payload variants are the exact bodies the SockJS
/// client test-suite expects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("Payload expected.")]
    EmptyPayload,
    #[error("Broken JSON encoding.")]
    BrokenJson,
    #[error("unknown frame type: {0:?}")]
    UnknownFrame(Option<char>),
    #[error("malformed {kind} frame")]
    MalformedFrame { kind: &'static str },
}

/// This is an unified error type for everything that can go wrong while serving
/// a SockJS session.
#[derive(Debug, thiserror::Error)]
pub enum SockJsError {
    /// Unknown or disabled transport, unknown, malformed or closed session id.
    #[error("not found")]
    NotFound,
    #[error("session {0} is already acquired by another transport")]
    AlreadyAcquired(SessionId),
    #[error("session {0} is closed")]
    SessionClosed(SessionId),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("\"callback\" parameter required")]
    CallbackRequired,
    #[error("invalid \"callback\" parameter")]
    InvalidCallback,
    #[error("method {0} not allowed")]
    MethodNotAllowed(Cow<'static, str>),
    #[error("internal error: {context}")]
    Internal {
        context: Cow<'static, str>,
        #[source]
        source: Option<BoxError>,
    },
}

impl SockJsError {
    pub fn internal(context: impl Into<Cow<'static, str>>) -> Self {
        SockJsError::Internal {
            context: context.into(),
            source: None,
        }
    }

    pub fn internal_with(context: impl Into<Cow<'static, str>>, source: impl Into<BoxError>) -> Self {
        SockJsError::Internal {
            context: context.into(),
            source: Some(source.into()),
        }
    }

    /// Errors that only concern the current request and leave the session untouched.
    pub fn is_request_scoped(&self) -> bool {
        !matches!(self, SockJsError::Internal { .. })
    }
}
