use std::time::Duration;

use reqwest::Response;
use tracing::debug;
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::error::ParlorErr;
use crate::error::Result;
use crate::protocol::ChatMessage;
use crate::protocol::HistoryResponse;
use crate::protocol::PostMessageRequest;
use crate::session::Identity;

const USER_AGENT: &str = concat!("parlor/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the request/response half of the chat server: the history
/// snapshot and the post endpoint.
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    client: reqwest::Client,
    messages_url: Url,
}

impl ChatApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            messages_url: config.messages_url()?,
        })
    }

    pub fn messages_url(&self) -> &Url {
        &self.messages_url
    }

    /// Fetch every message the server currently holds, oldest first. Not
    /// retried: a transport error, a non-success status, or a body without a
    /// `messages` array is returned to the caller.
    pub async fn load_history(&self) -> Result<Vec<ChatMessage>> {
        let resp = self.client.get(self.messages_url.clone()).send().await?;
        let resp = error_for_status(resp).await?;
        let bytes = resp.bytes().await?;
        let history: HistoryResponse = serde_json::from_slice(&bytes)?;
        info!(count = history.messages.len(), "loaded message history");
        Ok(history.messages)
    }

    /// Post `content` as `username`. The acknowledgement body is ignored.
    pub async fn post_message(&self, username: &str, content: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.messages_url.clone())
            .json(&PostMessageRequest { username, content })
            .send()
            .await?;
        error_for_status(resp).await?;
        Ok(())
    }
}

async fn error_for_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ParlorErr::UnexpectedStatus { status, body })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The server accepted the message. It is rendered when the push channel
    /// echoes it back, not here.
    Sent,
    /// Nothing to send after trimming; no request was issued.
    Skipped,
}

/// Posts messages on behalf of one session identity.
#[derive(Debug, Clone)]
pub struct MessageSender {
    api: ChatApiClient,
    identity: Identity,
}

impl MessageSender {
    pub fn new(api: ChatApiClient, identity: Identity) -> Self {
        Self { api, identity }
    }

    pub async fn send(&self, content: &str) -> Result<SendOutcome> {
        let content = content.trim();
        if content.is_empty() {
            debug!("ignoring blank message");
            return Ok(SendOutcome::Skipped);
        }
        self.api.post_message(self.identity.as_str(), content).await?;
        Ok(SendOutcome::Sent)
    }
}
