//! WebSocket transports.
//!
//! Both flavors hold the session for the lifetime of the socket. The SockJS
//! flavor speaks the framed protocol (`o`, `h`, `a[...]`, `c[...]`), the raw
//! flavor exchanges bare application messages and maps the close frame onto a
//! websocket close.

use std::{future::Future, panic::AssertUnwindSafe, time::Duration};

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{
    FutureExt, SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tracing::Instrument;

use crate::{
    error::SockJsError,
    protocol::{CLOSE_ANOTHER_CONNECTION, CLOSE_GO_AWAY, Frame, decode_messages},
    session::{Session, TransportHandle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    SockJs,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ended {
    /// The server sent its close frame.
    Server,
    /// The client sent a close message.
    Client,
    /// The socket went away without a close message.
    Dropped,
    /// The client sent something that is not a valid payload.
    Broken,
}

type Sender = SplitSink<WebSocket, Message>;
type Receiver = SplitStream<WebSocket>;

pub(crate) async fn serve(socket: WebSocket, session: Session, flavor: Flavor, heartbeat: Duration) {
    let span = tracing::debug_span!(
        "sockjs-websocket",
        session_id = %session.id(),
        raw = flavor == Flavor::Raw,
    );
    async move {
        let (mut sender, mut receiver) = socket.split();
        let handle = match session.acquire().await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::debug!(%error, "attach refused");
                let (code, reason) = match error {
                    SockJsError::AlreadyAcquired(_) => CLOSE_ANOTHER_CONNECTION,
                    _ => CLOSE_GO_AWAY,
                };
                let _ = send_frame(&mut sender, flavor, Frame::close(code, reason)).await;
                let _ = sender.close().await;
                return;
            }
        };
        let attached = pump(&mut sender, &mut receiver, &session, flavor, heartbeat);
        let ended = hold(&session, handle, attached).await;
        if ended != Ended::Dropped {
            let _ = sender.close().await;
        }
    }
    .instrument(span)
    .await
}

/// Run the socket loop while holding `handle`. The session is released even
/// if the loop panics.
async fn hold(
    session: &Session,
    handle: TransportHandle,
    attached: impl Future<Output = Ended>,
) -> Ended {
    let ended = match AssertUnwindSafe(attached).catch_unwind().await {
        Ok(ended) => ended,
        Err(_) => {
            tracing::error!("websocket task panicked");
            Ended::Broken
        }
    };
    tracing::debug!(?ended, "websocket finished");
    if ended == Ended::Client {
        session.remote_close().await;
    }
    session.release(handle).await;
    ended
}

async fn pump(
    sender: &mut Sender,
    receiver: &mut Receiver,
    session: &Session,
    flavor: Flavor,
    heartbeat: Duration,
) -> Ended {
    loop {
        tokio::select! {
            frame = session.next_frame(heartbeat) => {
                let frame = frame.unwrap_or_else(|| Frame::close(CLOSE_GO_AWAY.0, CLOSE_GO_AWAY.1));
                let is_close = frame.is_close();
                if send_frame(sender, flavor, frame).await.is_err() {
                    return Ended::Dropped;
                }
                if is_close {
                    return Ended::Server;
                }
            }
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Err(error) = receive_text(session, flavor, text.as_str()).await {
                        tracing::warn!(%error, "invalid websocket payload");
                        return Ended::Broken;
                    }
                }
                Some(Ok(Message::Close(_))) => return Ended::Client,
                Some(Ok(_)) => {}
                Some(Err(error)) => {
                    tracing::debug!(%error, "websocket error");
                    return Ended::Dropped;
                }
                None => return Ended::Dropped,
            }
        }
    }
}

async fn receive_text(session: &Session, flavor: Flavor, text: &str) -> Result<(), SockJsError> {
    let messages = match flavor {
        Flavor::Raw => vec![text.to_owned()],
        // some clients send empty frames as keep-alives
        Flavor::SockJs if text.is_empty() => return Ok(()),
        Flavor::SockJs => decode_messages(text.as_bytes())?,
    };
    session.deliver(messages).await
}

async fn send_frame(sender: &mut Sender, flavor: Flavor, frame: Frame) -> Result<(), axum::Error> {
    match (flavor, frame) {
        (Flavor::SockJs, frame) => sender.send(Message::Text(frame.encode().into())).await,
        (Flavor::Raw, Frame::Open | Frame::Heartbeat) => Ok(()),
        (Flavor::Raw, Frame::Message(messages)) => {
            for message in messages {
                sender.send(Message::Text(message.into())).await?;
            }
            Ok(())
        }
        (Flavor::Raw, Frame::Close { code, reason }) => {
            sender
                .send(Message::Close(Some(CloseFrame {
                    code,
                    reason: reason.into(),
                })))
                .await
        }
    }
}
