use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use tokio::{
    sync::{Mutex, RwLock},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use super::{Session, SessionConfig, SessionId, TransportHandle};
use crate::{error::SockJsError, service::SessionService};

/// Owns every session of one endpoint.
///
/// Sessions are created lazily by the transports and expired by a background
/// sweep started with [`SessionManager::start`]. A closed session stays in the
/// registry (answering lookups with [`SockJsError::NotFound`]) until the sweep
/// removes it.
pub struct SessionManager {
    config: SessionConfig,
    service: Arc<dyn SessionService>,
    sessions: RwLock<HashMap<SessionId, Session>>,
    sweeper: Mutex<Option<Sweeper>>,
}

struct Sweeper {
    ct: CancellationToken,
    handle: JoinHandle<()>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn validate_id(id: &str) -> Result<(), SockJsError> {
    if id.is_empty() || id.contains('.') {
        return Err(SockJsError::NotFound);
    }
    Ok(())
}

impl SessionManager {
    pub fn new(config: SessionConfig, service: impl SessionService) -> Self {
        Self::with_service(config, Arc::new(service))
    }

    pub fn with_service(config: SessionConfig, service: Arc<dyn SessionService>) -> Self {
        Self {
            config,
            service,
            sessions: Default::default(),
            sweeper: Default::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Look up a session, creating it when `create` is set.
    ///
    /// Concurrent callers asking for the same unknown id all end up with the
    /// same session.
    pub async fn get(&self, id: &str, create: bool) -> Result<Session, SockJsError> {
        validate_id(id)?;
        if let Some(session) = self.sessions.read().await.get(id) {
            return live(session);
        }
        if !create {
            return Err(SockJsError::NotFound);
        }
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(id) {
            return live(session);
        }
        let id: SessionId = id.into();
        let session = Session::new(id.clone(), self.service.clone());
        sessions.insert(id.clone(), session.clone());
        tracing::debug!(session_id = %id, "session created");
        Ok(session)
    }

    pub async fn acquire(&self, session: &Session) -> Result<TransportHandle, SockJsError> {
        session.acquire().await
    }

    pub async fn is_acquired(&self, session: &Session) -> bool {
        session.is_acquired().await
    }

    pub async fn release(&self, session: &Session, handle: TransportHandle) -> bool {
        session.release(handle).await
    }

    /// Start the background sweep. Calling it again while running does nothing.
    pub async fn start(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }
        let ct = CancellationToken::new();
        let manager = Arc::downgrade(self);
        let handle = tokio::spawn(sweep_loop(manager, self.config.sweep_interval, ct.child_token()));
        tracing::debug!(interval = ?self.config.sweep_interval, "session sweep started");
        *sweeper = Some(Sweeper { ct, handle });
    }

    pub async fn is_started(&self) -> bool {
        self.sweeper.lock().await.is_some()
    }

    /// Stop the sweep and close every session.
    pub async fn stop(&self) {
        if let Some(Sweeper { ct, handle }) = self.sweeper.lock().await.take() {
            ct.cancel();
            if let Err(error) = handle.await {
                tracing::warn!(%error, "session sweep task failed");
            }
        }
        let sessions: Vec<Session> = self.sessions.write().await.drain().map(|(_, s)| s).collect();
        for session in &sessions {
            session.force_release().await;
            session.terminate("manager stopped").await;
        }
        tracing::debug!(closed = sessions.len(), "session manager stopped");
    }

    /// Expire idle sessions and drop closed ones. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let snapshot: Vec<Session> = self.sessions.read().await.values().cloned().collect();
        let mut expired = Vec::new();
        for session in snapshot {
            if session.is_closed() {
                if session.last_activity().await.elapsed() >= self.config.session_timeout {
                    expired.push(session);
                }
            } else if session.expire_if_idle(self.config.session_timeout).await {
                tracing::debug!(session_id = %session.id(), "session expired");
                expired.push(session);
            }
        }
        if expired.is_empty() {
            return 0;
        }
        let mut sessions = self.sessions.write().await;
        let mut removed = 0;
        for session in expired {
            // the id may have been reused since the snapshot
            if sessions
                .get(session.id())
                .is_some_and(|current| current.ptr_eq(&session))
            {
                sessions.remove(session.id());
                removed += 1;
            }
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn live(session: &Session) -> Result<Session, SockJsError> {
    if session.is_closed() {
        Err(SockJsError::NotFound)
    } else {
        Ok(session.clone())
    }
}

async fn sweep_loop(
    manager: Weak<SessionManager>,
    period: std::time::Duration,
    ct: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ct.cancelled() => break,
            _ = interval.tick() => {}
        }
        let Some(manager) = manager.upgrade() else {
            break;
        };
        let removed = manager.sweep().await;
        if removed > 0 {
            tracing::trace!(removed, "swept sessions");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        if let Some(sweeper) = self.sweeper.get_mut().take() {
            sweeper.ct.cancel();
        }
    }
}
