use axum::body::Body;

use super::common::http_header::{
    CONTENT_TYPE_EVENT_STREAM, CONTENT_TYPE_HTML, CONTENT_TYPE_JAVASCRIPT,
};
use crate::{
    error::SockJsError,
    protocol::{CLOSE_ANOTHER_CONNECTION, CLOSE_GO_AWAY, Frame, encode_json_string, htmlfile_prelude},
};

// browsers buffer the first couple of kilobytes of a streamed xhr response
const XHR_STREAMING_PRELUDE: usize = 2048;

/// How frames are wrapped on an HTTP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Framing {
    Xhr,
    XhrStreaming,
    EventSource,
    HtmlFile { callback: String },
    Jsonp { callback: String },
}

impl Framing {
    pub(crate) fn content_type(&self) -> &'static str {
        match self {
            Framing::Xhr | Framing::XhrStreaming | Framing::Jsonp { .. } => CONTENT_TYPE_JAVASCRIPT,
            Framing::EventSource => CONTENT_TYPE_EVENT_STREAM,
            Framing::HtmlFile { .. } => CONTENT_TYPE_HTML,
        }
    }

    /// Streaming framings keep the response open for many frames.
    pub(crate) fn is_streaming(&self) -> bool {
        matches!(
            self,
            Framing::XhrStreaming | Framing::EventSource | Framing::HtmlFile { .. }
        )
    }

    pub(crate) fn prelude(&self) -> Option<String> {
        match self {
            Framing::XhrStreaming => {
                let mut prelude = "h".repeat(XHR_STREAMING_PRELUDE);
                prelude.push('\n');
                Some(prelude)
            }
            Framing::EventSource => Some("\r\n".to_string()),
            Framing::HtmlFile { callback } => Some(htmlfile_prelude(callback)),
            Framing::Xhr | Framing::Jsonp { .. } => None,
        }
    }

    pub(crate) fn encode(&self, frame: &Frame) -> String {
        let frame = frame.encode();
        match self {
            Framing::Xhr | Framing::XhrStreaming => format!("{frame}\n"),
            Framing::EventSource => format!("data: {frame}\r\n\r\n"),
            Framing::HtmlFile { .. } => {
                format!("<script>\np({});\n</script>\r\n", encode_json_string(&frame))
            }
            Framing::Jsonp { callback } => {
                format!("/**/{callback}({});\r\n", encode_json_string(&frame))
            }
        }
    }

    /// A complete body for a request that could not attach to its session.
    pub(crate) fn refusal(&self, error: &SockJsError) -> Body {
        let (code, reason) = match error {
            SockJsError::AlreadyAcquired(_) => CLOSE_ANOTHER_CONNECTION,
            _ => CLOSE_GO_AWAY,
        };
        let mut body = self.prelude().unwrap_or_default();
        body.push_str(&self.encode(&Frame::close(code, reason)));
        Body::from(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xhr_framing() {
        assert_eq!(Framing::Xhr.encode(&Frame::Open), "o\n");
        assert_eq!(Framing::Xhr.prelude(), None);
        let prelude = Framing::XhrStreaming.prelude().unwrap();
        assert_eq!(prelude.len(), XHR_STREAMING_PRELUDE + 1);
        assert!(prelude.starts_with("hhhh"));
        assert!(prelude.ends_with("h\n"));
    }

    #[test]
    fn test_eventsource_framing() {
        let frame = Frame::Message(vec!["x".into()]);
        assert_eq!(
            Framing::EventSource.encode(&frame),
            "data: a[\"x\"]\r\n\r\n"
        );
        assert_eq!(Framing::EventSource.prelude().as_deref(), Some("\r\n"));
    }

    #[test]
    fn test_callback_framings_wrap_json_string() {
        let jsonp = Framing::Jsonp {
            callback: "cb".into(),
        };
        assert_eq!(jsonp.encode(&Frame::Open), "/**/cb(\"o\");\r\n");
        let htmlfile = Framing::HtmlFile {
            callback: "cb".into(),
        };
        assert_eq!(
            htmlfile.encode(&Frame::Message(vec!["x".into()])),
            "<script>\np(\"a[\\\"x\\\"]\");\n</script>\r\n"
        );
        assert!(htmlfile.prelude().unwrap().contains("parent.cb"));
    }

    #[test]
    fn test_streaming_flags() {
        assert!(!Framing::Xhr.is_streaming());
        assert!(Framing::EventSource.is_streaming());
        assert_eq!(Framing::EventSource.content_type(), CONTENT_TYPE_EVENT_STREAM);
    }
}
