use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ParlorErr>;

#[derive(Error, Debug)]
pub enum ParlorErr {
    /// The server answered with a non-success status code. The body is kept
    /// verbatim so it can be surfaced in logs.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("invalid server url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("push channel error: {0}")]
    Transport(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
