//! The application side of a session.
//!
//! A [`SessionService`] is started once for every session, right after the open
//! frame has been delivered to the client. It owns the conversation from then on
//! and talks to the client only through [`Session::send`], [`Session::receive`]
//! and [`Session::close`].
//!
//! When the service future completes the session is closed: `Ok(())` closes it
//! with `c[3000,"Go away!"]`, an error (or a panic) closes it with
//! `c[3000,"Internal error"]`.
//!
//! ```ignore
//! let echo = |session: Session| async move {
//!     while let Some(message) = session.receive().await {
//!         session.send(message).await?;
//!     }
//!     Ok::<_, sockjs::SockJsError>(())
//! };
//! ```

use futures::future::BoxFuture;

use crate::{error::BoxError, session::Session};

pub trait SessionService: Send + Sync + 'static {
    fn serve(&self, session: Session) -> BoxFuture<'static, Result<(), BoxError>>;
}

impl<F, Fut, E> SessionService for F
where
    F: Fn(Session) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Into<BoxError>,
{
    fn serve(&self, session: Session) -> BoxFuture<'static, Result<(), BoxError>> {
        let fut = (self)(session);
        Box::pin(async move { fut.await.map_err(Into::into) })
    }
}
