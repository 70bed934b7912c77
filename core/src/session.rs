use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;
use url::Url;

use crate::api::ChatApiClient;
use crate::api::MessageSender;
use crate::api::SendOutcome;
use crate::config::Config;
use crate::connection::ConnectionEvent;
use crate::connection::ConnectionHandle;
use crate::connection::ConnectionManager;
use crate::connection::ConnectionState;
use crate::connection::PushTransport;
use crate::error::ParlorErr;
use crate::error::Result;
use crate::protocol::ChatMessage;
use crate::protocol::InboundFrame;
use crate::protocol::MessageKey;
use crate::render::LogView;
use crate::render::MessageLog;
use crate::render::StatusLine;

/// The local user's display name: non-empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(String);

impl Identity {
    /// Returns `None` for empty or whitespace-only input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything one chat session is scoped to.
#[derive(Debug, Clone)]
pub struct Session {
    identity: Identity,
    config: Config,
}

impl Session {
    pub fn new(identity: Identity, config: Config) -> Self {
        Self { identity, config }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn push_url(&self) -> Result<Url> {
        self.config.push_url(self.identity.as_str())
    }
}

/// Drives one session: history first, then the push channel, rendering
/// everything into a single [`MessageLog`].
pub struct SessionController {
    session: Session,
    api: ChatApiClient,
    transport: Arc<dyn PushTransport>,
    log: MessageLog,
    /// Display keys of history messages a pushed duplicate may still consume.
    /// Only the leading frames of the first channel are matched; the map is
    /// cleared on the first non-matching chat frame or the first drop.
    history_keys: HashMap<MessageKey, usize>,
    connection: Option<Live>,
}

struct Live {
    handle: ConnectionHandle,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl SessionController {
    pub fn new(
        session: Session,
        view: Box<dyn LogView>,
        transport: Arc<dyn PushTransport>,
    ) -> Result<Self> {
        let api = ChatApiClient::new(session.config())?;
        let log = MessageLog::new(session.identity().as_str(), view);
        Ok(Self {
            session,
            api,
            transport,
            log,
            history_keys: HashMap::new(),
            connection: None,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    /// A sender bound to this session's identity, for the input surface.
    pub fn sender(&self) -> MessageSender {
        MessageSender::new(self.api.clone(), self.session.identity().clone())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map_or(ConnectionState::Disconnected, |live| live.handle.state())
    }

    /// Load and render history, then open the push channel. The channel is
    /// only opened once every history message is in the log; if history
    /// fails the error is returned and no channel is opened.
    pub async fn start(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Err(ParlorErr::Config("session already started".to_string()));
        }
        let push_url = self.session.push_url()?;

        let history = self.api.load_history().await?;
        self.render_history(&history);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let handle = ConnectionManager::spawn(
            Arc::clone(&self.transport),
            push_url,
            self.session.config().reconnect_delay,
            events_tx,
        );
        info!(identity = %self.session.identity(), "session started");
        self.connection = Some(Live { handle, events_rx });
        Ok(())
    }

    fn render_history(&mut self, history: &[ChatMessage]) {
        for message in history {
            self.log.append(message);
            if self.session.config().dedup_history_overlap {
                *self.history_keys.entry(message.key()).or_default() += 1;
            }
        }
    }

    /// Wait for the next connection event and apply it to the log. Returns
    /// `None` when the session was never started or the manager has stopped.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        let event = self.connection.as_mut()?.events_rx.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Apply events until `shutdown` fires or the manager stops.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                event = self.next_event() => {
                    if event.is_none() {
                        break;
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }
    }

    pub fn apply(&mut self, event: &ConnectionEvent) {
        match event {
            ConnectionEvent::StateChanged(ConnectionState::Disconnected) => {
                self.history_keys.clear();
                // The status line only exists once the server has reported
                // which instance is serving us, and failed retries keep it
                // as it is.
                if matches!(self.log.status(), Some(StatusLine::Connected(_))) {
                    self.log.set_status(StatusLine::Reconnecting);
                }
            }
            ConnectionEvent::StateChanged(state) => {
                debug!(%state, "push channel state changed");
            }
            ConnectionEvent::Frame(InboundFrame::ConnectionInfo(info)) => {
                self.log.set_status(StatusLine::Connected(info.clone()));
            }
            ConnectionEvent::Frame(InboundFrame::Chat(message)) => {
                if self.consume_history_duplicate(message) {
                    debug!(
                        username = %message.username,
                        timestamp = %message.timestamp,
                        "dropping pushed message already rendered from history"
                    );
                    return;
                }
                self.log.append(message);
            }
        }
    }

    fn consume_history_duplicate(&mut self, message: &ChatMessage) -> bool {
        if self.history_keys.is_empty() {
            return false;
        }
        let key = message.key();
        match self.history_keys.get_mut(&key) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.history_keys.remove(&key);
                true
            }
            None => {
                self.history_keys.clear();
                false
            }
        }
    }

    /// Close the push channel and stop reconnecting.
    pub async fn shutdown(mut self) {
        if let Some(live) = self.connection.take() {
            live.handle.shutdown().await;
        }
    }
}

/// The text input surface. Cleared only after the server accepts the
/// message; kept intact on failure so the user can retry.
#[derive(Debug, Default, Clone)]
pub struct InputLine {
    text: String,
}

impl InputLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub async fn submit(&mut self, sender: &MessageSender) -> Result<SendOutcome> {
        match sender.send(&self.text).await {
            Ok(SendOutcome::Sent) => {
                self.text.clear();
                Ok(SendOutcome::Sent)
            }
            Ok(SendOutcome::Skipped) => Ok(SendOutcome::Skipped),
            Err(err) => {
                warn!("error sending message: {err}");
                Err(err)
            }
        }
    }
}
