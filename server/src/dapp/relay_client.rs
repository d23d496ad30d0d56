//! HTTP and WebSocket client for the relay API.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::models::{LedgerEvent, RefundRecord, RelayMessage, StatusInfo, WithdrawRecord};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("relay request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("relay push channel failed: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

#[derive(Clone)]
pub struct RelayClient {
    base_url: String,
    http: Client,
}

impl RelayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    pub async fn status(&self) -> Result<Option<StatusInfo>, RelayError> {
        self.get("/status").await
    }

    pub async fn refunds(&self) -> Result<Vec<RefundRecord>, RelayError> {
        self.get("/refunds").await
    }

    pub async fn withdraws(&self) -> Result<Vec<WithdrawRecord>, RelayError> {
        self.get("/withdraws").await
    }

    /// Opens the push channel. Events recorded before this call are not
    /// replayed.
    pub async fn watch(&self) -> Result<LedgerWatch, RelayError> {
        let (stream, _) = connect_async(format!("{}/ws", ws_base(&self.base_url))).await?;
        Ok(LedgerWatch { stream })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RelayError> {
        let envelope = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?
            .error_for_status()?
            .json::<RelayMessage<T>>()
            .await?;
        Ok(envelope.message)
    }
}

/// Live feed of relay ledger events.
pub struct LedgerWatch {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl LedgerWatch {
    /// First event accepted by `matches` within `timeout`. `None` on timeout
    /// or if the channel closes first.
    pub async fn wait_for(
        &mut self,
        timeout: Duration,
        matches: impl Fn(&LedgerEvent) -> bool,
    ) -> Option<LedgerEvent> {
        let wait = async {
            while let Some(frame) = self.stream.next().await {
                match frame {
                    Ok(Message::Text(text)) => match serde_json::from_str::<LedgerEvent>(&text) {
                        Ok(event) if matches(&event) => return Some(event),
                        Ok(_) => {}
                        Err(err) => tracing::warn!(error = %err, "unreadable relay event"),
                    },
                    Ok(Message::Close(_)) => return None,
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(error = %err, "relay push channel dropped");
                        return None;
                    }
                }
            }
            None
        };

        tokio::time::timeout(timeout, wait).await.ok().flatten()
    }
}

fn ws_base(base_url: &str) -> String {
    if let Some(rest) = base_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        base_url.to_string()
    }
}
