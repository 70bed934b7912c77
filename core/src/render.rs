use std::fmt;

use crate::protocol::ChatMessage;
use crate::protocol::InstanceInfo;

/// Whether an entry was authored by the local identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOrigin {
    Own,
    Other,
}

impl EntryOrigin {
    /// Style class name: `self` or `other`.
    pub fn class_name(self) -> &'static str {
        match self {
            EntryOrigin::Own => "self",
            EntryOrigin::Other => "other",
        }
    }
}

/// One visible line of the chat log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub author: String,
    pub timestamp: String,
    pub content: String,
    pub origin: EntryOrigin,
}

/// Status indicator fed by `connection_info` events and channel drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    Connected(InstanceInfo),
    Reconnecting,
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Connected(info) => write!(
                f,
                "Connected to: {} ({})",
                info.instance_id, info.availability_zone
            ),
            StatusLine::Reconnecting => f.write_str("Disconnected - Reconnecting..."),
        }
    }
}

/// Classify and format a message for display. Authorship is an exact,
/// case-sensitive comparison against the local identity.
pub fn render(message: &ChatMessage, local_identity: &str) -> LogEntry {
    let origin = if message.username == local_identity {
        EntryOrigin::Own
    } else {
        EntryOrigin::Other
    };
    LogEntry {
        author: message.username.clone(),
        timestamp: message.timestamp.clone(),
        content: message.content.clone(),
        origin,
    }
}

/// A display surface for the chat log.
pub trait LogView: Send {
    /// Append `entry` after every entry already shown.
    fn append(&mut self, entry: &LogEntry);

    /// Bring the newest entry into view.
    fn scroll_to_latest(&mut self) {}

    fn set_status(&mut self, status: &StatusLine);
}

/// Append-only chat log. Entries are never reordered or replaced, and there
/// is no dedup here: appending the same message twice shows it twice.
pub struct MessageLog {
    local_identity: String,
    entries: Vec<LogEntry>,
    status: Option<StatusLine>,
    view: Box<dyn LogView>,
}

impl MessageLog {
    pub fn new(local_identity: impl Into<String>, view: Box<dyn LogView>) -> Self {
        Self {
            local_identity: local_identity.into(),
            entries: Vec::new(),
            status: None,
            view,
        }
    }

    pub fn append(&mut self, message: &ChatMessage) {
        let entry = render(message, &self.local_identity);
        self.view.append(&entry);
        self.view.scroll_to_latest();
        self.entries.push(entry);
    }

    pub fn set_status(&mut self, status: StatusLine) {
        self.view.set_status(&status);
        self.status = Some(status);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn status(&self) -> Option<&StatusLine> {
        self.status.as_ref()
    }
}
