//! WhatsApp adapter: the messaging-client seam, HTTP bridge client, and event listener.
//!
//! Communicates with a WhatsApp bridge sidecar via HTTP on port 3001 and
//! long-polling for lifecycle and acknowledgment events. The sidecar owns the
//! session on disk and the QR linking flow; this crate only drives it.

pub mod client;
pub mod events;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Suffix of WhatsApp group JIDs.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Suffix of WhatsApp individual contact JIDs.
pub const CONTACT_SUFFIX: &str = "@c.us";

/// Errors from the WhatsApp adapter.
#[derive(Debug, thiserror::Error)]
pub enum WhatsAppError {
    /// HTTP request to the sidecar failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The sidecar container is not running or not reachable.
    #[error("sidecar not running")]
    SidecarNotRunning,

    /// The sidecar is running but WhatsApp is not connected (needs QR scan).
    #[error("not connected to WhatsApp")]
    NotConnected,

    /// The bridge reported an error. The text is kept verbatim so callers can
    /// classify it.
    #[error("{0}")]
    Bridge(String),
}

/// Opaque WhatsApp destination identifier (a JID such as `123@c.us`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wrap a raw JID.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw JID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of the bridge's chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Serialized JID of the chat.
    pub id: ChannelId,
    /// Display name (group subject or contact name).
    #[serde(default)]
    pub name: String,
    /// Whether the chat is a group.
    #[serde(default)]
    pub is_group: bool,
}

/// Options forwarded with a send call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Whether the bridge should mark the conversation as read after sending.
    pub send_seen: bool,
}

impl SendOptions {
    /// Options that suppress the read receipt on the remote conversation.
    pub fn without_read_receipt() -> Self {
        Self { send_seen: false }
    }
}

/// A message accepted by the client. Created once per successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Bridge-assigned message identifier.
    pub id: String,
    /// Destination the message was sent to.
    pub channel_id: ChannelId,
    /// When the send call returned.
    pub sent_at: DateTime<Utc>,
}

/// A delivery receipt for some message. Not necessarily one we sent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AckObservation {
    /// Identifier of the acknowledged message.
    pub message_id: String,
    /// Receipt level; `1` and above means the server accepted the message.
    pub level: i32,
}

/// Lifecycle and receipt events emitted by a messaging client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The session is authenticated and can send.
    Ready,
    /// A QR code must be scanned to link the device.
    Qr {
        /// Raw QR payload.
        code: String,
    },
    /// Authentication was rejected.
    AuthFailure {
        /// Human-readable reason.
        reason: String,
    },
    /// The session was lost.
    Disconnected {
        /// Human-readable reason.
        reason: String,
    },
    /// A delivery receipt was observed.
    Ack(AckObservation),
    /// An unhandled asynchronous failure inside the client.
    Failure {
        /// Error text as reported by the client.
        message: String,
    },
    /// Anything else the client emits.
    Other,
}

/// The external messaging client the delivery pipeline depends on.
///
/// Implementations must be safe to [`destroy`](MessagingClient::destroy)
/// more than once.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Start (or restore) the session. Readiness is signalled later through
    /// [`ClientEvent::Ready`].
    async fn initialize(&self) -> Result<(), WhatsAppError>;

    /// Snapshot of the chats currently known to the client.
    async fn list_channels(&self) -> Result<Vec<Channel>, WhatsAppError>;

    /// Send `text` to `channel`.
    async fn send(
        &self,
        channel: &ChannelId,
        text: &str,
        options: SendOptions,
    ) -> Result<SentMessage, WhatsAppError>;

    /// Release the session and any background tasks.
    async fn destroy(&self) -> Result<(), WhatsAppError>;

    /// Subscribe to the client's event stream. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<ClientEvent>;
}
