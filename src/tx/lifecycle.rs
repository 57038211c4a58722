//! End-to-end lifecycle: estimate, then submit and track

use super::call::TransactionRequest;
use super::fee::FeeEstimator;
use super::outcome::SubmissionOutcome;
use super::tracker::SubmissionTracker;
use crate::cancel::CancelHandle;
use crate::chain::{ChainClient, FeeEstimate};
use crate::error::ClientResult;
use crate::units;

use tokio::sync::mpsc;
use tracing::info;

/// What a completed lifecycle produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleReport {
    pub fee: FeeEstimate,
    pub outcome: SubmissionOutcome,
}

/// Estimate the fee for `request`, then submit it and wait for a terminal outcome.
///
/// The estimate is informational only, but an unreachable network fails the
/// lifecycle before anything is signed.
pub async fn execute<C: ChainClient>(
    client: &C,
    credential: &C::Credential,
    request: TransactionRequest<C::Call>,
    cancel: &CancelHandle,
    observer: Option<mpsc::UnboundedSender<SubmissionOutcome>>,
) -> ClientResult<LifecycleReport> {
    let fee = FeeEstimator::new(client).estimate(&request).await?;
    info!(
        kind = request.kind().name(),
        amount = %units::from_smallest_unit(request.amount()),
        fee = %units::from_smallest_unit(fee.partial_fee),
        "Submitting extrinsic"
    );

    let mut tracker = SubmissionTracker::new(client);
    if let Some(observer) = observer {
        tracker = tracker.with_observer(observer);
    }
    let outcome = tracker.submit(request, credential, cancel).await?;

    Ok(LifecycleReport { fee, outcome })
}
