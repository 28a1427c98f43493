//! Protocol level constants and the frame codec.
//!
//! Everything in here is transport agnostic: the textual frames (`o`, `h`,
//! `a[...]`, `c[...]`), the default timings a SockJS client expects from the
//! server, and the two HTML documents the iframe based transports need.

use std::time::Duration;

mod frame;
mod html;

pub use frame::{Frame, decode_messages, encode_json_string};
pub use html::{htmlfile_prelude, iframe_html};

/// How long an attached transport may stay silent before a heartbeat frame is sent.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
/// How long a session may live without any attached transport.
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(5);
/// How long a polling request waits for outbound data before answering with a heartbeat.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(5);
/// How often the session manager looks for expired sessions.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(1);
/// Bytes written on a streaming response before the server forces a reconnect.
pub const DEFAULT_MAX_STREAMING_BYTES: usize = 128 * 1024;

pub const DEFAULT_SOCKJS_URL: &str =
    "https://cdn.jsdelivr.net/npm/sockjs-client@1/dist/sockjs.min.js";

pub const GREETING: &str = "Welcome to SockJS!\n";

pub const CLOSE_GO_AWAY: (u16, &str) = (3000, "Go away!");
pub const CLOSE_INTERNAL_ERROR: (u16, &str) = (3000, "Internal error");
pub const CLOSE_ANOTHER_CONNECTION: (u16, &str) = (2010, "Another connection still open");
