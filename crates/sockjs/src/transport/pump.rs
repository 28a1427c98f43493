use std::{convert::Infallible, panic::AssertUnwindSafe, time::Duration};

use axum::body::Body;
use bytes::Bytes;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

use super::{TransportKind, framing::Framing};
use crate::{
    protocol::{CLOSE_GO_AWAY, Frame},
    session::{Session, TransportHandle},
};

const BODY_CHANNEL_CAPACITY: usize = 16;

type Chunk = Result<Bytes, Infallible>;

/// Moves frames from an attached session into an HTTP response body.
///
/// The pump runs in its own task so that the body can be handed to the server
/// right away. It stops after the close frame, once `max_bytes` have been
/// written (`0` means a single frame, i.e. polling), or when the client goes
/// away, and always releases the session on the way out.
pub(crate) struct Pump {
    pub(crate) session: Session,
    pub(crate) handle: TransportHandle,
    pub(crate) kind: TransportKind,
    pub(crate) framing: Framing,
    pub(crate) idle: Duration,
    pub(crate) max_bytes: usize,
}

impl Pump {
    pub(crate) fn spawn(self) -> Body {
        let (tx, rx) = mpsc::channel::<Chunk>(BODY_CHANNEL_CAPACITY);
        let span = tracing::debug_span!(
            "sockjs-transport",
            session_id = %self.session.id(),
            transport = %self.kind,
        );
        tokio::spawn(self.run(tx).instrument(span));
        Body::from_stream(ReceiverStream::new(rx))
    }

    async fn run(self, tx: mpsc::Sender<Chunk>) {
        match AssertUnwindSafe(self.drive(&tx)).catch_unwind().await {
            Ok(written) => tracing::trace!(written, "transport detached"),
            Err(_) => tracing::error!("transport task panicked"),
        }
        self.session.release(self.handle).await;
    }

    async fn drive(&self, tx: &mpsc::Sender<Chunk>) -> usize {
        if let Some(prelude) = self.framing.prelude() {
            if tx.send(Ok(Bytes::from(prelude))).await.is_err() {
                return 0;
            }
        }
        let mut written = 0;
        loop {
            // a frame is only taken from the session once it can be written
            let permit = tokio::select! {
                biased;
                permit = tx.reserve() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.session.closed() => {
                    tracing::debug!("session closed while the client was not reading");
                    break;
                }
            };
            let frame = tokio::select! {
                frame = self.session.next_frame(self.idle) => frame,
                _ = tx.closed() => {
                    tracing::debug!("client went away");
                    break;
                }
            };
            let frame = frame.unwrap_or_else(|| Frame::close(CLOSE_GO_AWAY.0, CLOSE_GO_AWAY.1));
            let chunk = self.framing.encode(&frame);
            written += chunk.len();
            permit.send(Ok(Bytes::from(chunk)));
            if frame.is_close() || written >= self.max_bytes {
                break;
            }
        }
        written
    }
}
