//! Fee projection for transaction requests

use super::call::TransactionRequest;
use crate::chain::{ChainClient, FeeEstimate};
use crate::error::{ClientError, ClientResult};
use crate::units;

use tracing::{debug, warn};

/// Projected fee next to the amount it is charged on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostProjection {
    pub fee: FeeEstimate,
    pub amount: u128,
    /// `amount + fee.partial_fee`, in planck
    pub total: u128,
}

/// Asks the chain client what a request would cost. Never submits, never caches.
pub struct FeeEstimator<'a, C: ChainClient> {
    client: &'a C,
}

impl<'a, C: ChainClient> FeeEstimator<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Project `{partial_fee, weight}` for the request's sender
    pub async fn estimate(
        &self,
        request: &TransactionRequest<C::Call>,
    ) -> ClientResult<FeeEstimate> {
        match self
            .client
            .estimate_fee(request.call(), request.sender())
            .await
        {
            Ok(estimate) => {
                debug!(
                    kind = request.kind().name(),
                    partial_fee = %units::from_smallest_unit(estimate.partial_fee),
                    ref_time = estimate.weight.ref_time,
                    "Fee estimated"
                );
                crate::metrics::record_fee_estimate(true);
                Ok(estimate)
            }
            Err(e) => {
                warn!("Fee estimation failed: {}", e);
                crate::metrics::record_fee_estimate(false);
                Err(match e {
                    ClientError::EstimationUnavailable(_) => e,
                    other => ClientError::EstimationUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Projected fee plus the total the sender parts with
    pub async fn estimate_total(
        &self,
        request: &TransactionRequest<C::Call>,
    ) -> ClientResult<CostProjection> {
        let fee = self.estimate(request).await?;
        let amount = request.amount();
        let total = amount
            .checked_add(fee.partial_fee)
            .ok_or_else(|| ClientError::InvalidAmount("amount plus fee overflows".to_string()))?;
        Ok(CostProjection { fee, amount, total })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainClient, TestAccount, Weight};
    use crate::tx::{CallKind, CallParams, RequestBuilder};

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn client() -> MockChainClient {
        let mut client = MockChainClient::new();
        client.expect_validate_address().returning(|_| true);
        client.expect_build_call().returning(|kind| Ok(kind.clone()));
        client
    }

    fn request(client: &MockChainClient) -> TransactionRequest<CallKind> {
        RequestBuilder::new(client)
            .build(&TestAccount(ALICE.into()), BOB, "1", CallParams::Transfer)
            .unwrap()
    }

    #[tokio::test]
    async fn test_estimate_uses_sender_address() {
        let mut client = client();
        client
            .expect_estimate_fee()
            .withf(|call, sender| sender.to_string() == ALICE && matches!(call, CallKind::Transfer { .. }))
            .times(1)
            .returning(|_, _| {
                Ok(FeeEstimate {
                    partial_fee: 15_900_000_000,
                    weight: Weight {
                        ref_time: 145_000_000,
                        proof_size: 3_593,
                    },
                })
            });

        let request = request(&client);
        let estimator = FeeEstimator::new(&client);
        let estimate = estimator.estimate(&request).await.unwrap();
        assert_eq!(estimate.partial_fee, 15_900_000_000);
        assert_eq!(estimate.weight.proof_size, 3_593);
    }

    #[tokio::test]
    async fn test_estimate_total_adds_amount() {
        let mut client = client();
        client.expect_estimate_fee().returning(|_, _| {
            Ok(FeeEstimate {
                partial_fee: 10,
                weight: Weight::default(),
            })
        });

        let request = request(&client);
        let cost = FeeEstimator::new(&client)
            .estimate_total(&request)
            .await
            .unwrap();
        assert_eq!(cost.amount, 1_000_000_000_000);
        assert_eq!(cost.fee.partial_fee, 10);
        assert_eq!(cost.total, 1_000_000_000_010);
    }

    #[tokio::test]
    async fn test_network_failure_surfaces_as_unavailable() {
        let mut client = client();
        client
            .expect_estimate_fee()
            .returning(|_, _| Err(ClientError::Chain("connection reset by peer".into())));

        let request = request(&client);
        let err = FeeEstimator::new(&client)
            .estimate(&request)
            .await
            .unwrap_err();
        match err {
            ClientError::EstimationUnavailable(message) => {
                assert!(message.contains("connection reset by peer"))
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
