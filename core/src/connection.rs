//! Push channel lifecycle.
//!
//! A [`ConnectionManager`] owns at most one open channel at a time and walks
//! the state machine
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> ...
//!                          \-> Disconnected (handshake failed)
//! ```
//!
//! forever. Every drop, whatever its cause, arms a single fixed-delay timer
//! before the next attempt. There is no backoff growth and no retry limit;
//! only [`ConnectionHandle::shutdown`] (or dropping the handle) ends the loop.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::error::ParlorErr;
use crate::error::Result;
use crate::protocol::InboundFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        })
    }
}

/// What the manager reports to the session, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Frame(InboundFrame),
}

/// A frame read from an open push channel, before JSON decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushFrame {
    Text(String),
    /// The peer sent a close frame. The channel is finished.
    Closed,
}

pub type FrameStream = BoxStream<'static, Result<PushFrame>>;

/// Opens push channels. The stream returned by `connect` ends (or yields an
/// error) when the channel drops.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<FrameStream>;
}

/// Production transport backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

#[async_trait]
impl PushTransport for WebSocketTransport {
    async fn connect(&self, url: &Url) -> Result<FrameStream> {
        let (ws, response) = connect_async(url.as_str())
            .await
            .map_err(|e| ParlorErr::Transport(e.to_string()))?;
        debug!(status = %response.status(), "push channel handshake complete");

        // The client never writes; tungstenite answers pings while reading.
        let frames = ws.filter_map(|message| {
            futures::future::ready(match message {
                Ok(message) => frame_from_message(message).map(Ok),
                Err(e) => Some(Err(ParlorErr::Transport(e.to_string()))),
            })
        });
        Ok(frames.boxed())
    }
}

fn frame_from_message(message: Message) -> Option<PushFrame> {
    match message {
        Message::Text(text) => Some(PushFrame::Text(text.as_str().to_owned())),
        Message::Close(_) => Some(PushFrame::Closed),
        Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
    }
}

pub struct ConnectionManager {
    transport: Arc<dyn PushTransport>,
    url: Url,
    reconnect_delay: Duration,
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    state_tx: watch::Sender<ConnectionState>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Start the connect/reconnect loop on the current Tokio runtime.
    pub fn spawn(
        transport: Arc<dyn PushTransport>,
        url: Url,
        reconnect_delay: Duration,
        events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    ) -> ConnectionHandle {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel = CancellationToken::new();
        let manager = Self {
            transport,
            url,
            reconnect_delay,
            events_tx,
            state_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(manager.run());
        ConnectionHandle {
            state_rx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(self) {
        let mut attempt: u64 = 0;
        loop {
            attempt = attempt.saturating_add(1);
            if !self.transition(ConnectionState::Connecting) {
                break;
            }
            info!(attempt, url = %self.url, "opening push channel");

            let connected = tokio::select! {
                res = self.transport.connect(&self.url) => res,
                _ = self.cancel.cancelled() => break,
            };

            match connected {
                Ok(stream) => {
                    if !self.transition(ConnectionState::Connected) {
                        break;
                    }
                    match self.pump(stream).await {
                        PumpExit::Dropped(reason) => info!(attempt, "push channel closed: {reason}"),
                        PumpExit::Cancelled => break,
                    }
                }
                Err(err) => warn!(attempt, "push channel connect failed: {err}"),
            }

            if !self.transition(ConnectionState::Disconnected) {
                break;
            }
            debug!(delay = ?self.reconnect_delay, "reconnect scheduled");
            if wait_with_cancel(&self.cancel, self.reconnect_delay)
                .await
                .is_err()
            {
                break;
            }
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
        debug!("connection manager stopped");
    }

    /// Forward frames from one open channel until it drops. The stream is
    /// dropped on return, so at most one channel is ever held.
    async fn pump(&self, mut stream: FrameStream) -> PumpExit {
        loop {
            let next = tokio::select! {
                next = stream.next() => next,
                _ = self.cancel.cancelled() => return PumpExit::Cancelled,
            };
            match next {
                Some(Ok(PushFrame::Text(text))) => match InboundFrame::parse(&text) {
                    Ok(frame) => {
                        if !self.emit(ConnectionEvent::Frame(frame)) {
                            return PumpExit::Cancelled;
                        }
                    }
                    Err(err) => warn!("dropping push frame: {err}"),
                },
                Some(Ok(PushFrame::Closed)) => {
                    return PumpExit::Dropped("close frame".to_string());
                }
                Some(Err(err)) => return PumpExit::Dropped(err.to_string()),
                None => return PumpExit::Dropped("stream ended".to_string()),
            }
        }
    }

    /// Returns false once nobody is listening, which ends the loop.
    fn transition(&self, state: ConnectionState) -> bool {
        self.state_tx.send_replace(state);
        self.emit(ConnectionEvent::StateChanged(state))
    }

    fn emit(&self, event: ConnectionEvent) -> bool {
        if self.events_tx.send(event).is_err() {
            debug!("connection event receiver dropped; stopping");
            self.cancel.cancel();
            return false;
        }
        true
    }
}

enum PumpExit {
    Dropped(String),
    Cancelled,
}

struct Cancelled;

async fn wait_with_cancel(
    cancel: &CancellationToken,
    duration: Duration,
) -> std::result::Result<(), Cancelled> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(Cancelled),
    }
}

/// Owner's view of a running [`ConnectionManager`]. Dropping the handle
/// cancels the loop.
pub struct ConnectionHandle {
    state_rx: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl ConnectionHandle {
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Stop reconnecting and close any open channel, then wait for the loop
    /// to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!("connection manager task failed: {err}");
            }
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
