#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;
pub use error::{BoxError, DecodeError, SockJsError};

/// Frames, protocol constants and the iframe / htmlfile documents
pub mod protocol;
pub mod service;
pub mod session;

pub use service::SessionService;
pub use session::{Session, SessionConfig, SessionId, SessionManager, SessionState};

#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod transport;

#[cfg(feature = "server")]
pub use server::{SockJsServer, SockJsServerConfig};
#[cfg(feature = "server")]
pub use transport::TransportKind;
