//! Event listener for WhatsApp bridge events.
//!
//! Connects to the sidecar's `/events/poll` HTTP long-polling endpoint and
//! publishes lifecycle and receipt events on a broadcast channel.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::{AckObservation, ClientEvent};

/// An event as serialized by the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeEvent {
    /// Session authenticated and ready to send.
    #[serde(rename = "ready")]
    Ready,
    /// QR code to scan for linking.
    #[serde(rename = "qr")]
    Qr {
        /// Raw QR payload.
        code: String,
    },
    /// Authentication rejected.
    #[serde(rename = "auth_failure")]
    AuthFailure {
        /// Human-readable reason, if available.
        reason: Option<String>,
    },
    /// WhatsApp connection lost.
    #[serde(rename = "disconnected")]
    Disconnected {
        /// Human-readable reason, if available.
        reason: Option<String>,
    },
    /// Delivery receipt for a message.
    #[serde(rename = "ack")]
    Ack {
        /// Acknowledged message identifier.
        message_id: String,
        /// Receipt level.
        level: i32,
    },
    /// Unhandled error inside the bridge's client.
    #[serde(rename = "error")]
    Error {
        /// Error text.
        message: String,
    },
    /// Event types this crate does not consume.
    #[serde(other)]
    Unknown,
}

impl From<BridgeEvent> for ClientEvent {
    fn from(event: BridgeEvent) -> Self {
        match event {
            BridgeEvent::Ready => Self::Ready,
            BridgeEvent::Qr { code } => Self::Qr { code },
            BridgeEvent::AuthFailure { reason } => Self::AuthFailure {
                reason: reason.unwrap_or_else(|| "unknown".to_owned()),
            },
            BridgeEvent::Disconnected { reason } => Self::Disconnected {
                reason: reason.unwrap_or_else(|| "unknown".to_owned()),
            },
            BridgeEvent::Ack { message_id, level } => {
                Self::Ack(AckObservation { message_id, level })
            }
            BridgeEvent::Error { message } => Self::Failure { message },
            BridgeEvent::Unknown => Self::Other,
        }
    }
}

/// Long-poll timeout for the HTTP client (seconds).
const POLL_TIMEOUT_SECS: u64 = 60;

/// Initial reconnect backoff (milliseconds).
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Maximum reconnect backoff (milliseconds).
const MAX_BACKOFF_MS: u64 = 30_000;

/// Spawn an event listener that publishes events on the given channel.
///
/// Returns immediately. The listener runs as a background Tokio task and
/// reconnects automatically on error with exponential backoff. It stops once
/// a batch arrives while nothing is subscribed, or when aborted.
pub fn spawn_event_listener(
    base_url: String,
    event_tx: broadcast::Sender<ClientEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let poll_url = format!("{base_url}/events/poll");
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            info!(url = %poll_url, "connecting to WhatsApp event stream");

            match poll_events(&poll_url, &event_tx).await {
                Ok(()) => {
                    info!("WhatsApp event stream closed normally");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, backoff_ms, "WhatsApp event stream error, reconnecting");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms = next_backoff(backoff_ms);
                }
            }
        }
    })
}

/// Double the backoff, capped at [`MAX_BACKOFF_MS`].
pub fn next_backoff(current_ms: u64) -> u64 {
    current_ms.saturating_mul(2).min(MAX_BACKOFF_MS)
}

/// Poll the sidecar for events in a loop. Returns `Ok` when an event finds no
/// subscriber, and `Err` on non-timeout network errors so the caller can
/// reconnect with backoff.
async fn poll_events(
    poll_url: &str,
    event_tx: &broadcast::Sender<ClientEvent>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(POLL_TIMEOUT_SECS))
        .build()?;

    loop {
        match client.get(poll_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.json::<Vec<BridgeEvent>>().await {
                Ok(events) => {
                    for event in events {
                        debug!(?event, "received WhatsApp event");
                        if event_tx.send(ClientEvent::from(event)).is_err() {
                            debug!("no WhatsApp event subscribers left");
                            return Ok(());
                        }
                    }
                }
                Err(e) => warn!(error = %e, "undecodable WhatsApp event batch"),
            },
            Ok(resp) => {
                debug!(status = %resp.status(), "event poll returned non-200");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Err(e) if e.is_timeout() => {
                // Normal: long-poll timeout expired, just retry immediately.
                continue;
            }
            Err(e) => {
                return Err(e.into());
            }
        }
    }
}
