//! Backend command surface.
//!
//! Each command is a single request/response with no retry of its own; the
//! transport layer's fixed poll cadence is what retries.

use std::time::Duration;

use async_trait::async_trait;
use coach_proto::{
    AdviceEvent, CMD_DRAIN_ADVICE_QUEUE, CMD_DRAIN_EVENT_LOG, CMD_GET_CONNECTION_STATUS,
    CMD_GET_STATE_SNAPSHOT, ConnectionStatus, StateSnapshot,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("failed to decode {command} response: {source}")]
    Decode {
        command: &'static str,
        source: serde_json::Error,
    },
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type CommandResult<T> = Result<T, CommandError>;

#[async_trait]
pub trait CommandClient: Send + Sync {
    async fn get_connection_status(&self) -> CommandResult<ConnectionStatus>;
    async fn get_state_snapshot(&self) -> CommandResult<StateSnapshot>;
    /// Removes and returns advice not handed out by an earlier call.
    async fn drain_advice_queue(&self) -> CommandResult<Vec<AdviceEvent>>;
    /// Removes and returns pending diagnostic lines. Best-effort.
    async fn drain_event_log(&self) -> CommandResult<Vec<String>>;
}

/// Invokes backend commands as `POST {base}/invoke/{command}`.
#[derive(Clone)]
pub struct HttpCommandClient {
    http: Client,
    base_url: String,
}

impl HttpCommandClient {
    /// Fails only if the HTTP stack cannot be initialised.
    pub fn new(base_url: impl Into<String>) -> CommandResult<Self> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn invoke<T>(&self, command: &'static str) -> CommandResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/invoke/{}", self.base_url, command);
        let res = self.http.post(url).send().await?;

        if res.status().is_success() {
            let body = res.bytes().await?;
            serde_json::from_slice(&body).map_err(|source| CommandError::Decode { command, source })
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(CommandError::UnexpectedStatus { status, body })
        }
    }
}

#[async_trait]
impl CommandClient for HttpCommandClient {
    async fn get_connection_status(&self) -> CommandResult<ConnectionStatus> {
        self.invoke(CMD_GET_CONNECTION_STATUS).await
    }

    async fn get_state_snapshot(&self) -> CommandResult<StateSnapshot> {
        self.invoke(CMD_GET_STATE_SNAPSHOT).await
    }

    async fn drain_advice_queue(&self) -> CommandResult<Vec<AdviceEvent>> {
        self.invoke(CMD_DRAIN_ADVICE_QUEUE).await
    }

    async fn drain_event_log(&self) -> CommandResult<Vec<String>> {
        self.invoke(CMD_DRAIN_EVENT_LOG).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = HttpCommandClient::new("http://127.0.0.1:7878/").expect("client");
        assert_eq!(client.base_url(), "http://127.0.0.1:7878");
    }
}
