//! Root of the `parlor-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// user-visible output must go through a `LogView` or the tracing stack.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
mod flags;
pub mod protocol;
pub mod render;
pub mod session;

pub use api::ChatApiClient;
pub use api::MessageSender;
pub use api::SendOutcome;
pub use connection::ConnectionEvent;
pub use connection::ConnectionHandle;
pub use connection::ConnectionManager;
pub use connection::ConnectionState;
pub use connection::PushTransport;
pub use connection::WebSocketTransport;
pub use protocol::ChatMessage;
pub use protocol::InboundFrame;
pub use protocol::InstanceInfo;
pub use render::LogEntry;
pub use render::LogView;
pub use render::MessageLog;
pub use session::Identity;
pub use session::InputLine;
pub use session::Session;
pub use session::SessionController;
