//! HTTP client for the WhatsApp bridge sidecar.
//!
//! All WhatsApp operations go through this client, which communicates
//! with the Node.js bridge via HTTP on port 3001. Events arrive through the
//! long-poll listener in [`super::events`] and are fanned out on a broadcast
//! channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::events::spawn_event_listener;
use super::{
    Channel, ChannelId, ClientEvent, MessagingClient, SendOptions, SentMessage, WhatsAppError,
};

/// Default port the WhatsApp bridge listens on.
pub const DEFAULT_BRIDGE_PORT: u16 = 3001;

/// HTTP connect timeout for the reqwest client.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// HTTP request timeout for normal operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Number of reachability retries before giving up.
const HEALTH_CHECK_RETRIES: u32 = 5;

/// Delay between reachability attempts in milliseconds.
const HEALTH_CHECK_DELAY_MS: u64 = 2000;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Client for the WhatsApp HTTP bridge.
pub struct WhatsAppClient {
    client: reqwest::Client,
    base_url: String,
    events: broadcast::Sender<ClientEvent>,
    listener: Mutex<Option<JoinHandle<()>>>,
    destroyed: AtomicBool,
}

/// Connection status from the sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppStatus {
    /// Whether the sidecar is connected to WhatsApp.
    pub connected: bool,
    /// The phone number linked, if connected.
    pub phone_number: Option<String>,
}

/// Body of a successful `/send` call.
#[derive(Debug, Deserialize)]
struct SendReceipt {
    message_id: String,
    #[serde(default)]
    jid: Option<ChannelId>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

/// Response envelope from the bridge HTTP API.
#[derive(Deserialize)]
struct BridgeResponse<T> {
    #[allow(dead_code)]
    #[serde(default)]
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl WhatsAppClient {
    /// Create a new client pointing at the given base URL.
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "failed to build HTTP client with timeouts, using default");
                reqwest::Client::default()
            });
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            events,
            listener: Mutex::new(None),
            destroyed: AtomicBool::new(false),
        }
    }

    /// Get the current connection status from the sidecar.
    pub async fn status(&self) -> Result<WhatsAppStatus, WhatsAppError> {
        let url = format!("{}/status", self.base_url);
        let resp = self.client.get(&url).send().await?;
        read_envelope::<WhatsAppStatus>(resp)
            .await?
            .ok_or(WhatsAppError::SidecarNotRunning)
    }

    /// Wait for the sidecar to answer `/status`, retrying with a fixed delay.
    ///
    /// Only reachability is checked; the session may still need linking.
    pub async fn wait_reachable(&self) -> Result<WhatsAppStatus, WhatsAppError> {
        for attempt in 0..HEALTH_CHECK_RETRIES {
            match self.status().await {
                Ok(status) => return Ok(status),
                Err(e) => debug!(error = %e, attempt, "WhatsApp bridge not reachable yet"),
            }
            if attempt < HEALTH_CHECK_RETRIES.saturating_sub(1) {
                tokio::time::sleep(Duration::from_millis(HEALTH_CHECK_DELAY_MS)).await;
            }
        }
        Err(WhatsAppError::SidecarNotRunning)
    }

    /// Returns the base URL of the sidecar.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn take_listener(&self) -> Option<JoinHandle<()>> {
        match self.listener.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    fn store_listener(&self, handle: JoinHandle<()>) {
        let previous = match self.listener.lock() {
            Ok(mut guard) => guard.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }
}

impl Drop for WhatsAppClient {
    fn drop(&mut self) {
        if let Some(handle) = self.take_listener() {
            handle.abort();
        }
    }
}

#[async_trait]
impl MessagingClient for WhatsAppClient {
    async fn initialize(&self) -> Result<(), WhatsAppError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(WhatsAppError::NotConnected);
        }

        let status = self.wait_reachable().await?;
        debug!(connected = status.connected, "WhatsApp bridge reachable");

        self.store_listener(spawn_event_listener(
            self.base_url.clone(),
            self.events.clone(),
        ));

        let url = format!("{}/session/start", self.base_url);
        let resp = self.client.post(&url).send().await?;
        read_envelope::<serde_json::Value>(resp).await?;
        info!(base_url = %self.base_url, "WhatsApp session starting");
        Ok(())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, WhatsAppError> {
        let url = format!("{}/chats", self.base_url);
        let resp = self.client.get(&url).send().await?;
        Ok(read_envelope::<Vec<Channel>>(resp).await?.unwrap_or_default())
    }

    async fn send(
        &self,
        channel: &ChannelId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage, WhatsAppError> {
        let url = format!("{}/send", self.base_url);
        let body = serde_json::json!({
            "jid": channel.as_str(),
            "text": text,
            "send_seen": options.send_seen,
        });
        let resp = self.client.post(&url).json(&body).send().await?;
        let receipt = read_envelope::<SendReceipt>(resp)
            .await?
            .ok_or_else(|| WhatsAppError::Bridge("send returned no message id".to_owned()))?;
        debug!(jid = %channel, message_id = %receipt.message_id, "message sent via WhatsApp");

        Ok(SentMessage {
            id: receipt.message_id,
            channel_id: receipt.jid.unwrap_or_else(|| channel.clone()),
            sent_at: receipt.timestamp.unwrap_or_else(Utc::now),
        })
    }

    async fn destroy(&self) -> Result<(), WhatsAppError> {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            debug!("WhatsApp client already destroyed");
            return Ok(());
        }
        if let Some(handle) = self.take_listener() {
            handle.abort();
        }

        let url = format!("{}/session/close", self.base_url);
        let resp = self.client.post(&url).send().await?;
        read_envelope::<serde_json::Value>(resp).await?;
        info!("WhatsApp session closed");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }
}

/// Decode the bridge envelope, surfacing its `error` text verbatim.
async fn read_envelope<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<Option<T>, WhatsAppError> {
    let status = resp.status();
    let body = resp.text().await?;

    match serde_json::from_str::<BridgeResponse<T>>(&body) {
        Ok(envelope) => {
            if let Some(error) = envelope.error {
                return Err(WhatsAppError::Bridge(error));
            }
            if !status.is_success() {
                return Err(WhatsAppError::Bridge(format!("bridge returned {status}")));
            }
            Ok(envelope.data)
        }
        Err(e) if status.is_success() => Err(WhatsAppError::Bridge(format!(
            "malformed bridge response: {e}"
        ))),
        Err(_) => {
            warn!(%status, "WhatsApp bridge request failed: {body}");
            Err(WhatsAppError::Bridge(format!("bridge returned {status}: {body}")))
        }
    }
}
