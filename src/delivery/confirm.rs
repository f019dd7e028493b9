//! Race a server acknowledgment for the sent message against a timeout.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::outcome::Outcome;
use crate::whatsapp::{ClientEvent, SentMessage};

/// Result of waiting for an acknowledgment. Advisory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    /// The server accepted the message.
    Acknowledged {
        /// Receipt level observed.
        level: i32,
    },
    /// No acknowledgment in time. The message may still have been delivered.
    NotAcknowledged,
}

/// Wait up to `timeout` for an acknowledgment of `message` on `events`.
///
/// `events` should be subscribed before the send so early receipts are not
/// missed. It is consumed and dropped on return, which unsubscribes in both
/// outcomes. On acknowledgment the outcome is marked acked.
pub async fn confirm_delivery(
    events: broadcast::Receiver<ClientEvent>,
    message: &SentMessage,
    timeout: Duration,
    outcome: &Outcome,
) -> AckStatus {
    let status = match tokio::time::timeout(timeout, wait_for_ack(events, &message.id)).await {
        Ok(Some(level)) => AckStatus::Acknowledged { level },
        Ok(None) | Err(_) => AckStatus::NotAcknowledged,
    };

    match status {
        AckStatus::Acknowledged { level } => {
            outcome.mark_acked();
            info!(message_id = %message.id, level, "message acknowledged by server");
        }
        AckStatus::NotAcknowledged => {
            warn!(
                message_id = %message.id,
                ?timeout,
                "no acknowledgment before timeout, message may still be delivered"
            );
        }
    }
    status
}

/// Resolve with the level of the first matching receipt at level 1 or above,
/// or `None` if the stream closes. Holds no timer of its own.
async fn wait_for_ack(
    mut events: broadcast::Receiver<ClientEvent>,
    message_id: &str,
) -> Option<i32> {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Ack(ack)) if ack.message_id == message_id && ack.level >= 1 => {
                return Some(ack.level);
            }
            Ok(ClientEvent::Ack(ack)) => {
                debug!(message_id = %ack.message_id, level = ack.level, "ignoring unrelated receipt");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "acknowledgment listener lagged");
            }
            Err(RecvError::Closed) => return None,
        }
    }
}
