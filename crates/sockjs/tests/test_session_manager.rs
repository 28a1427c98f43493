use std::{sync::Arc, time::Duration};

use sockjs::{
    BoxError, Session, SessionConfig, SessionManager, SessionState, SockJsError, protocol::Frame,
};
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

async fn init() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

fn config() -> SessionConfig {
    SessionConfig {
        heartbeat_interval: Duration::from_millis(100),
        session_timeout: Duration::from_millis(100),
        poll_timeout: Duration::from_millis(100),
        sweep_interval: Duration::from_millis(20),
    }
}

#[tokio::test]
async fn test_get_or_create_is_shared() -> anyhow::Result<()> {
    init().await;
    let manager = SessionManager::new(config(), |_session: Session| async {
        Ok::<_, BoxError>(())
    });
    let created = manager.get("abc", true).await?;
    let found = manager.get("abc", false).await?;
    assert_eq!(created.id(), found.id());
    assert_eq!(manager.len().await, 1);
    assert!(matches!(
        manager.get("x.y", true).await,
        Err(SockJsError::NotFound)
    ));
    Ok(())
}

#[tokio::test]
async fn test_application_sees_messages_in_order() -> anyhow::Result<()> {
    init().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = SessionManager::new(config(), move |session: Session| {
        let tx = tx.clone();
        async move {
            while let Some(message) = session.receive().await {
                tx.send(message)?;
            }
            Ok::<_, BoxError>(())
        }
    });
    let session = manager.get("ordered", true).await?;
    let handle = manager.acquire(&session).await?;
    assert_eq!(session.next_frame(Duration::from_secs(1)).await, Some(Frame::Open));
    assert_eq!(session.state().await, SessionState::Open);

    session.deliver(vec!["1".into(), "2".into()]).await?;
    session.deliver(vec!["3".into()]).await?;
    for expected in ["1", "2", "3"] {
        let got = tokio::time::timeout(Duration::from_secs(1), rx.recv()).await?;
        assert_eq!(got.as_deref(), Some(expected));
    }
    assert!(manager.release(&session, handle).await);
    Ok(())
}

#[tokio::test]
async fn test_one_transport_at_a_time() -> anyhow::Result<()> {
    init().await;
    let manager = SessionManager::new(config(), |_session: Session| async {
        Ok::<_, BoxError>(())
    });
    let session = manager.get("exclusive", true).await?;
    let handle = manager.acquire(&session).await?;
    assert!(manager.is_acquired(&session).await);
    assert!(matches!(
        manager.acquire(&session).await,
        Err(SockJsError::AlreadyAcquired(_))
    ));
    assert!(manager.release(&session, handle).await);
    assert!(!manager.is_acquired(&session).await);
    manager.acquire(&session).await?;
    Ok(())
}

#[tokio::test]
async fn test_sweep_expires_idle_session_and_notifies_application() -> anyhow::Result<()> {
    init().await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let manager = Arc::new(SessionManager::new(config(), move |session: Session| {
        let tx = tx.clone();
        async move {
            while session.receive().await.is_some() {}
            tx.send(session.id().to_string())?;
            Ok::<_, BoxError>(())
        }
    }));
    manager.start().await;
    let session = manager.get("idle", true).await?;
    let handle = manager.acquire(&session).await?;
    session.next_frame(Duration::from_secs(1)).await;
    manager.release(&session, handle).await;

    let ended = tokio::time::timeout(Duration::from_secs(2), rx.recv()).await?;
    assert_eq!(ended.as_deref(), Some("idle"));
    assert!(session.is_closed());
    assert!(matches!(
        manager.get("idle", false).await,
        Err(SockJsError::NotFound)
    ));
    tokio::time::timeout(Duration::from_secs(2), async {
        while !manager.is_empty().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await?;
    manager.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_closes_everything() -> anyhow::Result<()> {
    init().await;
    let manager = Arc::new(SessionManager::new(config(), |_session: Session| async {
        Ok::<_, BoxError>(())
    }));
    manager.start().await;
    let a = manager.get("a", true).await?;
    let b = manager.get("b", true).await?;
    manager.acquire(&b).await?;
    manager.stop().await;
    assert!(!manager.is_started().await);
    assert!(a.is_closed() && b.is_closed());
    assert!(!manager.is_acquired(&b).await);
    assert!(manager.is_empty().await);
    assert_eq!(a.next_frame(Duration::from_millis(10)).await, None);
    Ok(())
}
