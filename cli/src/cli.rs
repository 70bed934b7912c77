use clap::Parser;

/// Terminal client for a parlor chat server.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Cli {
    /// Base URL of the chat server, e.g. `http://127.0.0.1:8000`.
    #[arg(long = "server", value_name = "URL")]
    pub server_url: Option<String>,

    /// API version token used in every endpoint path.
    #[arg(long, value_name = "TOKEN")]
    pub api_version: Option<String>,

    /// Display name to chat as. Prompted for when missing or blank.
    #[arg(long, short = 'u')]
    pub username: Option<String>,

    /// Fixed delay before every reconnect attempt.
    #[arg(long, value_name = "MS")]
    pub reconnect_delay_ms: Option<u64>,

    /// Log at info level instead of warn (overridden by `RUST_LOG`).
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}
