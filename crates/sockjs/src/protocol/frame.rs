use std::fmt::Write;

use serde::Serialize;

use crate::error::DecodeError;

/// A single protocol unit exchanged between a session and a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Open,
    Heartbeat,
    Message(Vec<String>),
    Close { code: u16, reason: String },
}

impl Frame {
    pub fn close(code: u16, reason: impl Into<String>) -> Self {
        Frame::Close {
            code,
            reason: reason.into(),
        }
    }

    pub fn is_close(&self) -> bool {
        matches!(self, Frame::Close { .. })
    }

    /// Encode into the textual wire form shared by every transport.
    pub fn encode(&self) -> String {
        match self {
            Frame::Open => "o".to_string(),
            Frame::Heartbeat => "h".to_string(),
            Frame::Message(messages) => format!("a{}", to_ascii_json(messages)),
            Frame::Close { code, reason } => format!("c{}", to_ascii_json(&(code, reason))),
        }
    }

    pub fn decode(raw: &str) -> Result<Frame, DecodeError> {
        let mut chars = raw.chars();
        let tag = chars.next();
        let body = chars.as_str();
        match tag {
            Some('o') if body.is_empty() => Ok(Frame::Open),
            Some('h') if body.is_empty() => Ok(Frame::Heartbeat),
            Some('o') => Err(DecodeError::MalformedFrame { kind: "open" }),
            Some('h') => Err(DecodeError::MalformedFrame { kind: "heartbeat" }),
            Some('a') => serde_json::from_str::<Vec<String>>(body)
                .map(Frame::Message)
                .map_err(|_| DecodeError::MalformedFrame { kind: "message" }),
            Some('c') => serde_json::from_str::<(u16, String)>(body)
                .map(|(code, reason)| Frame::Close { code, reason })
                .map_err(|_| DecodeError::MalformedFrame { kind: "close" }),
            other => Err(DecodeError::UnknownFrame(other)),
        }
    }
}

/// Decode a payload sent by a client: either a JSON array of strings or a
/// single JSON string.
pub fn decode_messages(raw: &[u8]) -> Result<Vec<String>, DecodeError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(DecodeError::EmptyPayload);
    }
    match serde_json::from_slice::<serde_json::Value>(raw) {
        Ok(serde_json::Value::String(message)) => Ok(vec![message]),
        Ok(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(message) => Ok(message),
                _ => Err(DecodeError::BrokenJson),
            })
            .collect(),
        _ => Err(DecodeError::BrokenJson),
    }
}

/// Encode `text` as a JSON string literal with every non-ASCII code point escaped.
pub fn encode_json_string(text: &str) -> String {
    to_ascii_json(text)
}

fn to_ascii_json<T: Serialize + ?Sized>(value: &T) -> String {
    // serializing strings, string slices and integer tuples can not fail
    let json = serde_json::to_string(value).unwrap_or_default();
    if json.is_ascii() {
        return json;
    }
    let mut escaped = String::with_capacity(json.len() + 16);
    for c in json.chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                let _ = write!(escaped, "\\u{unit:04x}");
            }
        }
    }
    escaped
}
