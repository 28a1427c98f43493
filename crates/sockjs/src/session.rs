//! Sessions: the logical client connection that outlives every single HTTP
//! request or socket carrying it.
//!
//! A [`Session`] is a cheap, clonable handle. The application keeps one inside
//! its [`SessionService`](crate::service::SessionService) future, transports get
//! another one from the [`SessionManager`] for the duration of a request.
//!
//! Exactly one transport can be attached at a time: [`Session::acquire`] hands
//! out a [`TransportHandle`] and fails with
//! [`SockJsError::AlreadyAcquired`] while another handle is live.

use std::{
    collections::VecDeque,
    fmt,
    panic::AssertUnwindSafe,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::FutureExt;
use serde::Serialize;
use tokio::{
    sync::{Mutex, Notify, mpsc},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    error::SockJsError,
    protocol::{
        CLOSE_GO_AWAY, CLOSE_INTERNAL_ERROR, DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_POLL_TIMEOUT,
        DEFAULT_SESSION_TIMEOUT, DEFAULT_SWEEP_INTERVAL, Frame,
    },
    service::SessionService,
};

pub mod manager;

pub use manager::SessionManager;

pub type SessionId = Arc<str>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Proof of an exclusive attach, returned by [`Session::acquire`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportHandle(u64);

/// Timing knobs shared by every session of a manager.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Silence on an attached transport after which a heartbeat frame is sent.
    pub heartbeat_interval: Duration,
    /// Idle time without an attached transport after which a session expires.
    pub session_timeout: Duration,
    /// How long a polling request waits for data before answering with a heartbeat.
    pub poll_timeout: Duration,
    /// Period of the background sweep.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            session_timeout: DEFAULT_SESSION_TIMEOUT,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    core: Mutex<SessionCore>,
    outbound_ready: Notify,
    inbound: Mutex<mpsc::UnboundedReceiver<String>>,
    closed: CancellationToken,
    service: Arc<dyn SessionService>,
    next_handle: AtomicU64,
}

struct SessionCore {
    state: SessionState,
    outbound: VecDeque<Frame>,
    inbound_tx: Option<mpsc::UnboundedSender<String>>,
    acquired_by: Option<TransportHandle>,
    handshake_queued: bool,
    last_activity: Instant,
}

impl SessionCore {
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn push(&mut self, frame: Frame) {
        // consecutive message frames are delivered as one `a[...]` frame
        if let Frame::Message(messages) = &frame {
            if let Some(Frame::Message(pending)) = self.outbound.back_mut() {
                pending.extend(messages.iter().cloned());
                return;
            }
        }
        self.outbound.push_back(frame);
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("closed", &self.inner.closed.is_cancelled())
            .finish()
    }
}

impl Session {
    pub(crate) fn new(id: SessionId, service: Arc<dyn SessionService>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(SessionInner {
                id,
                core: Mutex::new(SessionCore {
                    state: SessionState::Connecting,
                    outbound: VecDeque::new(),
                    inbound_tx: Some(inbound_tx),
                    acquired_by: None,
                    handshake_queued: false,
                    last_activity: Instant::now(),
                }),
                outbound_ready: Notify::new(),
                inbound: Mutex::new(inbound_rx),
                closed: CancellationToken::new(),
                service,
                next_handle: AtomicU64::new(1),
            }),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.inner.id
    }

    pub async fn state(&self) -> SessionState {
        self.inner.core.lock().await.state
    }

    pub async fn last_activity(&self) -> Instant {
        self.inner.core.lock().await.last_activity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.is_cancelled()
    }

    /// Resolves once the session reached [`SessionState::Closed`].
    pub async fn closed(&self) {
        self.inner.closed.cancelled().await
    }

    pub(crate) fn ptr_eq(&self, other: &Session) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queue a message for the client. Only valid while the session is open.
    pub async fn send(&self, message: impl Into<String>) -> Result<(), SockJsError> {
        let mut core = self.inner.core.lock().await;
        if core.state != SessionState::Open {
            return Err(SockJsError::SessionClosed(self.inner.id.clone()));
        }
        core.push(Frame::Message(vec![message.into()]));
        drop(core);
        self.inner.outbound_ready.notify_one();
        Ok(())
    }

    /// Wait for the next message sent by the client.
    ///
    /// Returns `None` once the session is closing or closed.
    pub async fn receive(&self) -> Option<String> {
        self.inner.inbound.lock().await.recv().await
    }

    /// Close the session from the server side.
    ///
    /// The close frame is queued behind any pending messages and delivered to
    /// the next attached transport. Closing twice is a no-op.
    pub async fn close(&self, code: u16, reason: impl Into<String>) {
        let mut core = self.inner.core.lock().await;
        if matches!(core.state, SessionState::Closing | SessionState::Closed) {
            return;
        }
        core.state = SessionState::Closing;
        core.inbound_tx = None;
        core.push(Frame::close(code, reason));
        drop(core);
        tracing::debug!(session_id = %self.inner.id, code, "session closing");
        self.inner.outbound_ready.notify_one();
    }

    /// Attach a transport. Fails if another transport is attached or the session is closed.
    pub async fn acquire(&self) -> Result<TransportHandle, SockJsError> {
        let mut core = self.inner.core.lock().await;
        if core.state == SessionState::Closed {
            return Err(SockJsError::SessionClosed(self.inner.id.clone()));
        }
        if core.acquired_by.is_some() {
            return Err(SockJsError::AlreadyAcquired(self.inner.id.clone()));
        }
        let handle = TransportHandle(self.inner.next_handle.fetch_add(1, Ordering::Relaxed));
        core.acquired_by = Some(handle);
        core.touch();
        if core.state == SessionState::Connecting && !core.handshake_queued {
            core.handshake_queued = true;
            core.outbound.push_front(Frame::Open);
            drop(core);
            self.inner.outbound_ready.notify_one();
        }
        Ok(handle)
    }

    /// Detach the transport identified by `handle`. Returns `false` for a stale handle.
    pub async fn release(&self, handle: TransportHandle) -> bool {
        let mut core = self.inner.core.lock().await;
        if core.acquired_by != Some(handle) {
            return false;
        }
        core.acquired_by = None;
        core.touch();
        true
    }

    pub(crate) async fn force_release(&self) -> bool {
        let mut core = self.inner.core.lock().await;
        core.touch();
        core.acquired_by.take().is_some()
    }

    pub async fn is_acquired(&self) -> bool {
        self.inner.core.lock().await.acquired_by.is_some()
    }

    /// Take the next outbound frame, waiting at most `idle` for one to appear.
    ///
    /// An elapsed wait yields [`Frame::Heartbeat`]. Returns `None` once the
    /// session is closed. Dropping the returned future never loses a frame.
    pub async fn next_frame(&self, idle: Duration) -> Option<Frame> {
        let deadline = Instant::now() + idle;
        loop {
            let notified = self.inner.outbound_ready.notified();
            {
                let mut core = self.inner.core.lock().await;
                if core.state == SessionState::Closed {
                    return None;
                }
                if let Some(frame) = core.outbound.pop_front() {
                    core.touch();
                    let mut opened = false;
                    match &frame {
                        Frame::Open if core.state == SessionState::Connecting => {
                            core.state = SessionState::Open;
                            opened = true;
                        }
                        Frame::Close { .. } => {
                            core.state = SessionState::Closed;
                            core.inbound_tx = None;
                        }
                        _ => {}
                    }
                    drop(core);
                    if frame.is_close() {
                        tracing::debug!(session_id = %self.inner.id, "close frame flushed");
                        self.inner.closed.cancel();
                    }
                    if opened {
                        self.spawn_service();
                    }
                    return Some(frame);
                }
            }
            tokio::select! {
                _ = notified => {}
                _ = self.inner.closed.cancelled() => return None,
                _ = tokio::time::sleep_until(deadline) => {
                    self.inner.core.lock().await.touch();
                    return Some(Frame::Heartbeat);
                }
            }
        }
    }

    /// Hand messages received from the client to the application.
    pub async fn deliver(&self, messages: Vec<String>) -> Result<(), SockJsError> {
        let mut core = self.inner.core.lock().await;
        let Some(inbound_tx) = core.inbound_tx.as_ref() else {
            return Err(SockJsError::SessionClosed(self.inner.id.clone()));
        };
        for message in messages {
            if inbound_tx.send(message).is_err() {
                // the service stopped listening, nothing left to deliver to
                break;
            }
        }
        core.touch();
        Ok(())
    }

    /// The client closed the session (e.g. a websocket close message).
    pub async fn remote_close(&self) {
        self.terminate("closed by client").await;
    }

    pub(crate) async fn terminate(&self, why: &'static str) {
        let mut core = self.inner.core.lock().await;
        if core.state == SessionState::Closed {
            return;
        }
        core.state = SessionState::Closed;
        core.inbound_tx = None;
        core.outbound.clear();
        core.touch();
        drop(core);
        tracing::debug!(session_id = %self.inner.id, why, "session closed");
        self.inner.closed.cancel();
        self.inner.outbound_ready.notify_one();
    }

    /// Close the session if nothing is attached and it has been idle for `timeout`.
    pub(crate) async fn expire_if_idle(&self, timeout: Duration) -> bool {
        {
            let core = self.inner.core.lock().await;
            if core.acquired_by.is_some() || core.last_activity.elapsed() < timeout {
                return false;
            }
        }
        self.terminate("expired").await;
        true
    }

    fn spawn_service(&self) {
        let session = self.clone();
        let service = self.inner.service.clone();
        let span = tracing::info_span!("sockjs-session", session_id = %self.inner.id);
        tokio::spawn(
            async move {
                tracing::debug!("session opened");
                let served = AssertUnwindSafe(service.serve(session.clone()))
                    .catch_unwind()
                    .await;
                let (code, reason) = match served {
                    Ok(Ok(())) => CLOSE_GO_AWAY,
                    Ok(Err(error)) => {
                        tracing::error!(%error, "session service failed");
                        CLOSE_INTERNAL_ERROR
                    }
                    Err(_) => {
                        tracing::error!("session service panicked");
                        CLOSE_INTERNAL_ERROR
                    }
                };
                session.close(code, reason).await;
            }
            .instrument(span),
        );
    }
}
