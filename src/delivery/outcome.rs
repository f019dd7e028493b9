//! The outcome record and the coordinator that turns failures into an exit
//! status.
//!
//! Rules, in order:
//! - authentication failure always fails the run;
//! - once a send has returned, the run succeeds (confirmed send wins);
//! - before that, every failure fails the run.
//!
//! Asynchronous client failures after a send are not terminal: the pipeline
//! is left to finish on its own.

use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use super::classify::ErrorClassifier;
use super::Failure;
use crate::whatsapp::MessagingClient;

/// Process-wide delivery state. Both flags only ever go from `false` to `true`.
#[derive(Debug, Default)]
pub struct Outcome {
    sent: AtomicBool,
    acked: AtomicBool,
}

/// Point-in-time copy of [`Outcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutcomeSnapshot {
    /// A send call returned a message id.
    pub sent: bool,
    /// The server acknowledged that message.
    pub acked: bool,
}

impl Outcome {
    /// Fresh record with both flags cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful send. Returns `true` the first time only.
    pub fn mark_sent(&self) -> bool {
        !self.sent.swap(true, Ordering::SeqCst)
    }

    /// Record a server acknowledgment. Returns `true` the first time only.
    ///
    /// Refused while nothing has been sent, keeping `acked ⇒ sent`.
    pub fn mark_acked(&self) -> bool {
        if !self.is_sent() {
            warn!("ignoring acknowledgment recorded before any send");
            return false;
        }
        !self.acked.swap(true, Ordering::SeqCst)
    }

    /// Whether a send has returned.
    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::SeqCst)
    }

    /// Whether the sent message was acknowledged.
    pub fn is_acked(&self) -> bool {
        self.acked.load(Ordering::SeqCst)
    }

    /// Copy both flags.
    pub fn snapshot(&self) -> OutcomeSnapshot {
        OutcomeSnapshot {
            sent: self.is_sent(),
            acked: self.is_acked(),
        }
    }
}

/// Final result of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Message sent (acknowledged or not), or sending disabled.
    Success,
    /// Nothing was sent, or authentication failed.
    Failed,
}

impl ExitStatus {
    /// Numeric process exit code.
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failed => 1,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// What to do about an asynchronous failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Log it and keep going.
    Continue,
    /// Stop now with this status.
    Exit(ExitStatus),
}

/// Owns the [`Outcome`] and applies the exit-status rules uniformly to every
/// terminal path.
#[derive(Debug)]
pub struct Coordinator {
    outcome: Outcome,
    classifier: ErrorClassifier,
    released: AtomicBool,
}

impl Coordinator {
    /// Coordinator with a fresh outcome record.
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self {
            outcome: Outcome::new(),
            classifier,
            released: AtomicBool::new(false),
        }
    }

    /// The shared outcome record.
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// The benign-error classifier.
    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Status for a pipeline that ran to completion.
    pub fn complete(&self) -> ExitStatus {
        let snapshot = self.outcome.snapshot();
        info!(acked = snapshot.acked, "delivery finished");
        ExitStatus::Success
    }

    /// Decide on a failure arriving from the client's event stream while the
    /// pipeline may still be running.
    pub fn assess(&self, failure: &Failure) -> Verdict {
        let Failure::UnhandledAsyncFailure(message) = failure else {
            return Verdict::Exit(self.conclude(failure));
        };

        let snapshot = self.outcome.snapshot();
        let benign = self.classifier.is_benign(message);
        if benign && (snapshot.sent || snapshot.acked) {
            warn!(error = %message, "benign client error after send, ignoring");
            Verdict::Continue
        } else if snapshot.sent {
            error!(error = %message, "client error after confirmed send, keeping success");
            Verdict::Continue
        } else {
            self.log_failure(failure);
            Verdict::Exit(ExitStatus::Failed)
        }
    }

    /// Final status for a failure that ends the run.
    pub fn conclude(&self, failure: &Failure) -> ExitStatus {
        if let Failure::AuthFailure(_) = failure {
            self.log_failure(failure);
            return ExitStatus::Failed;
        }
        if self.outcome.is_sent() {
            warn!(reason = %failure, "run ended early, message was already sent");
            return ExitStatus::Success;
        }
        self.log_failure(failure);
        ExitStatus::Failed
    }

    /// Release the client. Safe to call repeatedly; errors are logged and
    /// swallowed.
    pub async fn release(&self, client: &dyn MessagingClient) {
        if self.released.swap(true, Ordering::SeqCst) {
            debug!("client already released");
            return;
        }
        if let Err(e) = client.destroy().await {
            warn!(error = %e, "failed to release WhatsApp client");
        }
    }

    fn log_failure(&self, failure: &Failure) {
        error!(error = %failure, "delivery failed");
        if let Failure::TargetNotFound { available, .. } = failure {
            if available.is_empty() {
                error!("no groups are available to this account");
            }
            for group in available {
                error!(name = %group.name, id = %group.id, "available group");
            }
        }
    }
}
