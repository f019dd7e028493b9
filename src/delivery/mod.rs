//! Single-message delivery: resolve the target, send, confirm, and decide the
//! process exit status.
//!
//! The stages run as one linear pipeline ([`pipeline::run`]) while lifecycle
//! events from the messaging client race against it. Every terminal path is
//! decided by the [`outcome::Coordinator`], which consults the shared
//! [`outcome::Outcome`] record so that a message that went out is never
//! reported as failed because of an unrelated later error.

pub mod classify;
pub mod confirm;
pub mod outcome;
pub mod pipeline;
pub mod send;
pub mod target;

use std::time::Duration;

use crate::whatsapp::Channel;

/// Everything that can end or disturb a delivery run.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Failure {
    /// Configuration was unreadable, malformed, or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// No message text was given on the command line.
    #[error("no message text given")]
    NoMessage,

    /// A contact target contained no digits.
    #[error("contact target {0:?} contains no digits")]
    InvalidContact(String),

    /// No group matched the configured target.
    #[error("group not found: {target}")]
    TargetNotFound {
        /// The configured target.
        target: String,
        /// Every group in the snapshot, for the operator to pick from.
        available: Vec<Channel>,
    },

    /// The client could not be started or queried.
    #[error("messaging client error: {0}")]
    Client(String),

    /// Send raised an error known to be a side effect of read-receipt
    /// suppression rather than a delivery failure.
    #[error("benign post-send artifact: {0}")]
    BenignPostSendArtifact(String),

    /// Send failed for a real reason.
    #[error("send failed: {0}")]
    SendFailure(String),

    /// The session could not authenticate.
    #[error("authentication failed: {0}")]
    AuthFailure(String),

    /// The session was lost.
    #[error("disconnected: {0}")]
    Disconnected(String),

    /// Any other asynchronous error reported by the client.
    #[error("unhandled client failure: {0}")]
    UnhandledAsyncFailure(String),

    /// The operator interrupted the run.
    #[error("interrupted")]
    Interrupted,

    /// The run did not finish in time.
    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),
}

/// Timing and classification knobs for one run.
#[derive(Debug, Clone)]
pub struct DeliverySettings {
    /// How long to wait for the server acknowledgment.
    pub ack_timeout: Duration,
    /// Pause between a finished send and releasing the client.
    pub settle_delay: Duration,
    /// Hard limit on the whole run.
    pub deadline: Duration,
    /// Error substrings treated as benign post-send artifacts.
    pub benign_patterns: Vec<String>,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            ack_timeout: Duration::from_millis(20_000),
            settle_delay: Duration::from_millis(1_000),
            deadline: Duration::from_secs(120),
            benign_patterns: classify::DEFAULT_BENIGN_PATTERNS
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
        }
    }
}
