//! Block inclusion monitoring from a transaction hash alone
//!
//! Used when no live status feed exists, e.g. after a restart. Each newly
//! finalized block is fetched and its extrinsics scanned linearly for the
//! target hash. The first match resolves the search and unsubscribes; blocks
//! are bounded in size, so the scan is O(extrinsics) per block.
//!
//! The monitor never gives up on its own. Bound it with a `CancelHandle`.

use super::{normalize_hash, ChainClient, Subscription};
use crate::cancel::CancelHandle;
use crate::error::{ClientError, ClientResult};

use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Where a transaction was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InclusionRecord {
    pub block_number: u64,
    pub block_hash: String,
    pub tx_hash: String,
}

/// Single-shot search of finalized blocks for one extrinsic hash
pub struct InclusionMonitor<'a, C: ChainClient> {
    client: &'a C,
}

impl<'a, C: ChainClient> InclusionMonitor<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Wait until `tx_hash` appears in a finalized block
    #[instrument(skip_all, fields(tx_hash = %tx_hash))]
    pub async fn wait_for(
        &self,
        tx_hash: &str,
        cancel: &CancelHandle,
    ) -> ClientResult<InclusionRecord> {
        if cancel.is_cancelled() {
            return Err(ClientError::Cancelled);
        }

        let target = normalize_hash(tx_hash);
        let heads = self
            .client
            .subscribe_finalized_heads()
            .await
            .map_err(|e| match e {
                ClientError::MonitorUnavailable(_) => e,
                other => ClientError::MonitorUnavailable(other.to_string()),
            })?;

        info!("Watching finalized blocks for {}", target);
        let started = Instant::now();
        let result = self.scan(heads, &target, cancel).await;

        match &result {
            Ok(record) => {
                info!(
                    block_number = record.block_number,
                    block_hash = %record.block_hash,
                    "Transaction included"
                );
                crate::metrics::record_inclusion_latency(started.elapsed().as_secs_f64());
            }
            Err(ClientError::Cancelled) => info!("Inclusion monitor cancelled"),
            Err(e) => warn!("Inclusion monitor stopped: {}", e),
        }
        result
    }

    async fn scan(
        &self,
        mut heads: Subscription<ClientResult<super::FinalizedHead>>,
        target: &str,
        cancel: &CancelHandle,
    ) -> ClientResult<InclusionRecord> {
        let result = loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(ClientError::Cancelled),
                item = heads.next() => item,
            };

            let head = match item {
                Some(Ok(head)) => head,
                Some(Err(e)) => break Err(ClientError::MonitorInterrupted(e.to_string())),
                None => {
                    break Err(ClientError::MonitorInterrupted(
                        "finalized block feed closed".to_string(),
                    ))
                }
            };

            let extrinsics = tokio::select! {
                biased;
                _ = cancel.cancelled() => break Err(ClientError::Cancelled),
                extrinsics = self.client.get_block_extrinsics(&head.block_hash) => extrinsics,
            };
            let extrinsics = match extrinsics {
                Ok(extrinsics) => extrinsics,
                Err(e) => {
                    break Err(ClientError::MonitorInterrupted(format!(
                        "failed to fetch block #{}: {}",
                        head.block_number, e
                    )))
                }
            };

            crate::metrics::record_block_scanned();
            debug!(
                block_number = head.block_number,
                extrinsics = extrinsics.len(),
                "Scanning finalized block"
            );

            if extrinsics
                .iter()
                .any(|extrinsic| normalize_hash(&extrinsic.hash) == target)
            {
                break Ok(InclusionRecord {
                    block_number: head.block_number,
                    block_hash: head.block_hash,
                    tx_hash: target.to_string(),
                });
            }
        };

        heads.release();
        result
    }
}
