//! Submission and status tracking
//!
//! Submits a request through the chain client and folds the status feed into
//! one terminal outcome:
//! - `InBlock` carrying `System.ExtrinsicSuccess` resolves `Succeeded`
//! - `InBlock` carrying `System.ExtrinsicFailed` resolves `Failed`
//! - `InBlock` carrying neither stays in block and waits for finality
//! - `Finalized` applies the same inspection; with no marker at all the
//!   submission resolves `Failed` with reason "indeterminate"
//!
//! The first terminal determination wins. The feed is released as soon as
//! one is reached, so later statuses are never observed.

use super::call::TransactionRequest;
use super::outcome::SubmissionOutcome;
use crate::cancel::CancelHandle;
use crate::chain::{ChainClient, StatusEvent, StatusPhase, Subscription, SystemEvent};
use crate::error::{ClientError, ClientResult};

use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Reason recorded when a block finalizes without a success or failure marker
pub const INDETERMINATE: &str = "indeterminate";

/// Drives one submission at a time to a terminal outcome.
///
/// Nonce ordering between concurrent submissions from the same account is
/// the caller's responsibility.
pub struct SubmissionTracker<'a, C: ChainClient> {
    client: &'a C,
    observer: Option<mpsc::UnboundedSender<SubmissionOutcome>>,
}

impl<'a, C: ChainClient> SubmissionTracker<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self {
            client,
            observer: None,
        }
    }

    /// Publish every forward transition to `observer`
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<SubmissionOutcome>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Sign, submit and track until a terminal outcome.
    ///
    /// A synchronous rejection is `SubmissionRejected` and no status feed is
    /// opened. An on-chain failure is returned as `Ok(Failed { .. })`.
    #[instrument(skip_all, fields(submission_id = %Uuid::new_v4(), kind = request.kind().name()))]
    pub async fn submit(
        &self,
        request: TransactionRequest<C::Call>,
        credential: &C::Credential,
        cancel: &CancelHandle,
    ) -> ClientResult<SubmissionOutcome> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let kind = request.kind().name();
        let started = Instant::now();

        let subscription = match self.client.submit(request.call(), credential).await {
            Ok(subscription) => subscription,
            Err(e) => {
                warn!("Submission rejected: {}", e);
                crate::metrics::record_tx_outcome("rejected");
                return Err(match e {
                    ClientError::SubmissionRejected(_) => e,
                    other => ClientError::SubmissionRejected(other.to_string()),
                });
            }
        };

        info!(
            sender = %request.sender(),
            amount = request.amount(),
            "Extrinsic submitted"
        );
        crate::metrics::record_tx_submitted(kind);

        let result = self.track(subscription, cancel).await;
        crate::metrics::record_tx_latency(kind, started.elapsed().as_secs_f64());
        result
    }

    /// Fold an already-open status feed into a terminal outcome
    pub async fn track(
        &self,
        mut subscription: Subscription<ClientResult<StatusEvent>>,
        cancel: &CancelHandle,
    ) -> ClientResult<SubmissionOutcome> {
        let mut outcome = SubmissionOutcome::Pending;
        self.publish(&outcome);

        let result = loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(ClientError::Cancelled),
                item = subscription.next() => item,
            };

            let event = match item {
                Some(Ok(event)) => event,
                Some(Err(e)) => break Err(ClientError::MonitorInterrupted(e.to_string())),
                None => {
                    break Err(ClientError::MonitorInterrupted(
                        "status feed closed before a terminal state".to_string(),
                    ))
                }
            };

            debug!(
                phase = ?event.phase,
                block_hash = ?event.block_hash,
                events = event.events.len(),
                "Status update"
            );

            let candidates = match fold_status(event) {
                Ok(candidates) => candidates,
                Err(e) => break Err(e),
            };
            for candidate in candidates {
                match outcome.advance(candidate) {
                    Ok(next) => {
                        outcome = next;
                        self.publish(&outcome);
                    }
                    Err(e) => debug!("Ignoring status: {}", e),
                }
            }

            if outcome.is_terminal() {
                break Ok(outcome);
            }
        };

        subscription.release();

        match &result {
            Ok(outcome) => {
                info!("Submission resolved: {}", outcome);
                crate::metrics::record_tx_outcome(outcome.name());
            }
            Err(ClientError::Cancelled) => {
                info!("Submission tracking cancelled");
                crate::metrics::record_tx_outcome("cancelled");
            }
            Err(e) => {
                warn!("Submission tracking ended without outcome: {}", e);
                crate::metrics::record_tx_outcome("interrupted");
            }
        }
        result
    }

    fn publish(&self, outcome: &SubmissionOutcome) {
        if let Some(observer) = &self.observer {
            // Observer gone is fine
            let _ = observer.send(outcome.clone());
        }
    }
}

/// Outcomes implied by one status event, in the order they apply
fn fold_status(event: StatusEvent) -> ClientResult<Vec<SubmissionOutcome>> {
    let StatusEvent {
        phase,
        block_hash,
        tx_hash,
        events,
    } = event;

    let require_block = |phase: &str| {
        block_hash.clone().ok_or_else(|| {
            ClientError::Chain(format!("{} status without a block hash", phase))
        })
    };

    match phase {
        StatusPhase::Pending => Ok(vec![SubmissionOutcome::Pending]),
        StatusPhase::InBlock => {
            let block_hash = require_block("in-block")?;
            let mut outcomes = vec![SubmissionOutcome::InBlock {
                block_hash: block_hash.clone(),
            }];
            outcomes.extend(inspect_markers(&events, &block_hash, &tx_hash));
            Ok(outcomes)
        }
        StatusPhase::Finalized => {
            let block_hash = require_block("finalized")?;
            let terminal = inspect_markers(&events, &block_hash, &tx_hash).unwrap_or_else(|| {
                SubmissionOutcome::Failed {
                    block_hash: block_hash.clone(),
                    reason: INDETERMINATE.to_string(),
                }
            });
            Ok(vec![
                SubmissionOutcome::Finalized { block_hash },
                terminal,
            ])
        }
        StatusPhase::Dropped { reason } => Err(ClientError::SubmissionRejected(reason)),
    }
}

/// First success or failure marker in event order
fn inspect_markers(
    events: &[SystemEvent],
    block_hash: &str,
    tx_hash: &str,
) -> Option<SubmissionOutcome> {
    events.iter().find_map(|event| {
        if event.is_extrinsic_success() {
            Some(SubmissionOutcome::Succeeded {
                block_hash: block_hash.to_string(),
                tx_hash: tx_hash.to_string(),
            })
        } else if event.is_extrinsic_failed() {
            let reason = if event.payload.is_empty() {
                event.to_string()
            } else {
                event.payload.clone()
            };
            Some(SubmissionOutcome::Failed {
                block_hash: block_hash.to_string(),
                reason,
            })
        } else {
            None
        }
    })
}
