//! Send orchestration with the single benign retry.

use tracing::{error, info, warn};

use super::classify::{ErrorClass, ErrorClassifier};
use super::outcome::Outcome;
use super::Failure;
use crate::whatsapp::{ChannelId, MessagingClient, SendOptions, SentMessage};

/// Send `text` to `channel` with read receipts suppressed.
///
/// A first failure whose text is a benign suppression artifact is retried
/// once with identical arguments. On success the outcome is marked sent
/// before returning.
///
/// # Errors
///
/// Returns [`Failure::SendFailure`] for a real first error, or for any error
/// on the retry.
pub async fn send_message(
    client: &dyn MessagingClient,
    channel: &ChannelId,
    text: &str,
    classifier: &ErrorClassifier,
    outcome: &Outcome,
) -> Result<SentMessage, Failure> {
    let options = SendOptions::without_read_receipt();

    let message = match client.send(channel, text, options).await {
        Ok(message) => message,
        Err(e) => {
            let reason = e.to_string();
            if classifier.classify(&reason) == ErrorClass::Real {
                error!(channel = %channel, error = %reason, "send failed");
                return Err(Failure::SendFailure(reason));
            }

            let artifact = Failure::BenignPostSendArtifact(reason);
            warn!(channel = %channel, error = %artifact, "retrying send once");
            client.send(channel, text, options).await.map_err(|retry_err| {
                error!(channel = %channel, error = %retry_err, "send retry failed");
                Failure::SendFailure(retry_err.to_string())
            })?
        }
    };

    outcome.mark_sent();
    info!(channel = %channel, message_id = %message.id, "message sent");
    Ok(message)
}
