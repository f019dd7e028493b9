//! End-to-end delivery run.
//!
//! The resolve → send → confirm pipeline is raced against the client's
//! terminal events, an operator interrupt, and the overall deadline. Every
//! branch hands a [`Failure`] (or completion) to the [`Coordinator`], which
//! is the only place an exit status is decided.

use std::future::Future;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use super::classify::ErrorClassifier;
use super::confirm::{confirm_delivery, AckStatus};
use super::outcome::{Coordinator, ExitStatus, Verdict};
use super::send::send_message;
use super::target::{self, TargetDescriptor};
use super::{DeliverySettings, Failure};
use crate::whatsapp::{ClientEvent, MessagingClient, SentMessage};

/// What a completed pipeline produced.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    /// The message as accepted by the client.
    pub message: SentMessage,
    /// Whether the server acknowledged it in time.
    pub ack: AckStatus,
}

/// Deliver `text` to `target` and return the process exit status.
///
/// The client is always released before returning. `shutdown` resolving
/// counts as an interrupt.
pub async fn run<F>(
    client: &dyn MessagingClient,
    target: &TargetDescriptor,
    text: &str,
    settings: &DeliverySettings,
    shutdown: F,
) -> ExitStatus
where
    F: Future<Output = ()>,
{
    let coordinator = Coordinator::new(ErrorClassifier::new(settings.benign_patterns.clone()));

    // Both subscriptions exist before initialize so no early event is lost.
    let mut terminal_events = client.subscribe();
    let ready_events = client.subscribe();

    let mut pipeline = Box::pin(deliver(
        client,
        target,
        text,
        settings,
        &coordinator,
        ready_events,
    ));
    let deadline = tokio::time::sleep(settings.deadline);
    tokio::pin!(deadline, shutdown);

    let mut settle_before_release = false;
    let status = loop {
        tokio::select! {
            result = &mut pipeline => {
                break match result {
                    Ok(report) => {
                        debug!(message_id = %report.message.id, ack = ?report.ack, "pipeline complete");
                        coordinator.complete()
                    }
                    Err(failure) => coordinator.conclude(&failure),
                };
            }
            failure = next_terminal_failure(&mut terminal_events) => {
                match coordinator.assess(&failure) {
                    Verdict::Continue => continue,
                    Verdict::Exit(status) => break status,
                }
            }
            () = &mut shutdown => {
                settle_before_release = coordinator.outcome().is_sent();
                break coordinator.conclude(&Failure::Interrupted);
            }
            () = &mut deadline => {
                settle_before_release = coordinator.outcome().is_sent();
                break coordinator.conclude(&Failure::DeadlineExceeded(settings.deadline));
            }
        }
    };

    // Drops any in-flight stage and its event subscriptions.
    drop(pipeline);
    drop(terminal_events);

    // Interrupt and deadline skip the pipeline's own settle delay.
    if settle_before_release {
        debug!(delay = ?settings.settle_delay, "settling before release");
        tokio::time::sleep(settings.settle_delay).await;
    }

    coordinator.release(client).await;
    info!(exit_code = status.code(), "run finished");
    status
}

async fn deliver(
    client: &dyn MessagingClient,
    target: &TargetDescriptor,
    text: &str,
    settings: &DeliverySettings,
    coordinator: &Coordinator,
    ready_events: broadcast::Receiver<ClientEvent>,
) -> Result<DeliveryReport, Failure> {
    client
        .initialize()
        .await
        .map_err(|e| Failure::Client(format!("failed to initialize: {e}")))?;
    wait_ready(ready_events).await?;

    let channel = target::resolve(target, client).await?;

    let ack_events = client.subscribe();
    let message = send_message(
        client,
        &channel,
        text,
        coordinator.classifier(),
        coordinator.outcome(),
    )
    .await?;
    let ack = confirm_delivery(
        ack_events,
        &message,
        settings.ack_timeout,
        coordinator.outcome(),
    )
    .await;

    // Let the client finish bookkeeping triggered by the send before teardown.
    tokio::time::sleep(settings.settle_delay).await;
    Ok(DeliveryReport { message, ack })
}

async fn wait_ready(mut events: broadcast::Receiver<ClientEvent>) -> Result<(), Failure> {
    loop {
        match events.recv().await {
            Ok(ClientEvent::Ready) => {
                info!("WhatsApp client ready");
                return Ok(());
            }
            Ok(ClientEvent::Qr { code }) => {
                info!(qr = %code, "scan this QR code with WhatsApp to link the session");
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "ready listener lagged"),
            Err(RecvError::Closed) => {
                return Err(Failure::Client(
                    "event stream closed before the client was ready".to_owned(),
                ));
            }
        }
    }
}

/// Next event that may end the run. Never resolves once the stream closes.
async fn next_terminal_failure(events: &mut broadcast::Receiver<ClientEvent>) -> Failure {
    loop {
        match events.recv().await {
            Ok(ClientEvent::AuthFailure { reason }) => return Failure::AuthFailure(reason),
            Ok(ClientEvent::Disconnected { reason }) => return Failure::Disconnected(reason),
            Ok(ClientEvent::Failure { message }) => return Failure::UnhandledAsyncFailure(message),
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "terminal event listener lagged"),
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}
