use std::{collections::HashSet, io, net::SocketAddr, sync::Arc};

use ::axum::Router;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    protocol::{DEFAULT_MAX_STREAMING_BYTES, DEFAULT_SOCKJS_URL, iframe_html},
    service::SessionService,
    session::{SessionConfig, SessionManager},
    transport::TransportKind,
};

pub mod axum;

#[derive(Debug, Clone)]
pub struct SockJsServerConfig {
    /// Only used by [`SockJsServer::serve`].
    pub bind: SocketAddr,
    /// Path under which every SockJS route is mounted, e.g. `/echo`.
    pub prefix: String,
    /// Client library loaded by the iframe page.
    pub sockjs_url: String,
    pub disable_transports: HashSet<TransportKind>,
    /// Send a `JSESSIONID` cookie for sticky load balancing.
    pub cookie_needed: bool,
    /// Bytes a streaming response may carry before the client is made to reconnect.
    pub max_streaming_bytes: usize,
    pub session: SessionConfig,
    pub ct: CancellationToken,
}

impl Default for SockJsServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            prefix: "/sockjs".to_string(),
            sockjs_url: DEFAULT_SOCKJS_URL.to_string(),
            disable_transports: HashSet::new(),
            cookie_needed: true,
            max_streaming_bytes: DEFAULT_MAX_STREAMING_BYTES,
            session: SessionConfig::default(),
            ct: CancellationToken::new(),
        }
    }
}

impl SockJsServerConfig {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn disable(mut self, kind: TransportKind) -> Self {
        self.disable_transports.insert(kind);
        self
    }

    pub fn is_enabled(&self, kind: TransportKind) -> bool {
        !self.disable_transports.contains(&kind)
    }

    /// The prefix with a leading slash and without a trailing one; the root is `""`.
    pub(crate) fn normalized_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

/// Everything a request handler of one SockJS endpoint needs.
#[derive(Debug)]
pub(crate) struct Endpoint {
    pub(crate) config: SockJsServerConfig,
    pub(crate) manager: Arc<SessionManager>,
    pub(crate) iframe_html: Bytes,
    pub(crate) iframe_etag: String,
}

impl Endpoint {
    fn new(config: SockJsServerConfig, manager: Arc<SessionManager>) -> Self {
        let html = iframe_html(&config.sockjs_url);
        let iframe_etag = format!("\"{:x}\"", md5::compute(html.as_bytes()));
        Self {
            config,
            manager,
            iframe_html: Bytes::from(html),
            iframe_etag,
        }
    }
}

/// A SockJS endpoint: the session manager plus the routes that feed it.
///
/// Use [`SockJsServer::router`] to mount the endpoint into an existing axum
/// application, or [`SockJsServer::serve`] to run it on its own listener.
#[derive(Debug)]
pub struct SockJsServer {
    pub config: SockJsServerConfig,
    endpoint: Arc<Endpoint>,
}

impl SockJsServer {
    pub fn new(config: SockJsServerConfig, service: impl SessionService) -> Self {
        let manager = Arc::new(SessionManager::new(config.session.clone(), service));
        Self::with_manager(config, manager)
    }

    /// Build an endpoint around an existing manager, e.g. one shared with other code.
    pub fn with_manager(config: SockJsServerConfig, manager: Arc<SessionManager>) -> Self {
        let endpoint = Arc::new(Endpoint::new(config.clone(), manager));
        Self { config, endpoint }
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.endpoint.manager
    }

    pub fn router(&self) -> Router {
        axum::router(self.endpoint.clone())
    }

    pub async fn serve(
        mut config: SockJsServerConfig,
        service: impl SessionService,
    ) -> io::Result<Self> {
        let listener = tokio::net::TcpListener::bind(config.bind).await?;
        config.bind = listener.local_addr()?;
        let server = Self::new(config, service);
        server.manager().start().await;
        let ct = server.config.ct.child_token();
        let manager = server.manager().clone();
        let serve = ::axum::serve(listener, server.router()).with_graceful_shutdown(async move {
            ct.cancelled().await;
            tracing::info!("sockjs server cancelled");
        });
        tokio::spawn(
            async move {
                if let Err(e) = serve.await {
                    tracing::error!(error = %e, "sockjs server shutdown with error");
                }
                manager.stop().await;
            }
            .instrument(tracing::info_span!(
                "sockjs-server",
                bind_address = %server.config.bind,
                prefix = %server.config.prefix,
            )),
        );
        Ok(server)
    }

    /// Stop accepting requests and close every session.
    pub async fn shutdown(&self) {
        self.config.ct.cancel();
        self.endpoint.manager.stop().await;
    }
}
