//! Transaction request construction and local validation
//!
//! Validation happens before anything reaches the network: the amount is
//! checked first, then addresses (format check delegated to the client),
//! then kind-specific parameters. The only client calls made here are
//! `validate_address` and `build_call`, neither of which does I/O.

use super::call::{CallKind, TransactionRequest, MAX_CONVICTION};
use crate::chain::{AccountCredential, ChainClient};
use crate::error::{ClientError, ClientResult};
use crate::units;

use tracing::debug;

/// Kind selector for single-recipient requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallParams {
    /// Recipient receives the amount
    Transfer,
    /// Amount is bonded; recipient receives staking rewards
    Stake,
    /// Amount is reserve-transferred to recipient on `para_id`
    CrossChainTransfer { para_id: u32 },
}

/// Builds transaction requests against a chain client
pub struct RequestBuilder<'a, C: ChainClient> {
    client: &'a C,
}

impl<'a, C: ChainClient> RequestBuilder<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    /// Build from a display-unit amount such as "1.5"
    pub fn build(
        &self,
        sender: &C::Credential,
        recipient: &str,
        amount: &str,
        params: CallParams,
    ) -> ClientResult<TransactionRequest<C::Call>> {
        let planck = units::to_smallest_unit(amount)?;
        self.build_planck(sender, recipient, planck, params)
    }

    /// Build from an amount already in planck
    pub fn build_planck(
        &self,
        sender: &C::Credential,
        recipient: &str,
        amount: u128,
        params: CallParams,
    ) -> ClientResult<TransactionRequest<C::Call>> {
        let kind = match params {
            CallParams::Transfer => CallKind::Transfer {
                dest: recipient.to_string(),
                value: amount,
            },
            CallParams::Stake => CallKind::Stake {
                value: amount,
                payee: recipient.to_string(),
            },
            CallParams::CrossChainTransfer { para_id } => CallKind::CrossChainTransfer {
                para_id,
                beneficiary: recipient.to_string(),
                amount,
            },
        };
        self.validate_kind(&kind)?;
        self.finish(sender, kind)
    }

    /// Build a standard conviction vote locking `balance` planck
    pub fn build_vote(
        &self,
        sender: &C::Credential,
        referendum: u32,
        aye: bool,
        conviction: u8,
        balance: u128,
    ) -> ClientResult<TransactionRequest<C::Call>> {
        let kind = CallKind::Vote {
            referendum,
            aye,
            conviction,
            balance,
        };
        self.validate_kind(&kind)?;
        self.finish(sender, kind)
    }

    /// Wrap pre-built sub-calls into one atomic call, preserving their order
    pub fn build_batch(
        &self,
        sender: &C::Credential,
        calls: Vec<CallKind>,
    ) -> ClientResult<TransactionRequest<C::Call>> {
        let kind = CallKind::Batch { calls };
        self.validate_kind(&kind)?;
        self.finish(sender, kind)
    }

    fn validate_kind(&self, kind: &CallKind) -> ClientResult<()> {
        validate_kind(kind, &|address| self.client.validate_address(address))
    }

    fn finish(
        &self,
        sender: &C::Credential,
        kind: CallKind,
    ) -> ClientResult<TransactionRequest<C::Call>> {
        let call = self.client.build_call(&kind)?;
        let amount = kind.amount().unwrap_or_default();
        debug!(kind = kind.name(), amount, "Built transaction request");
        Ok(TransactionRequest::new(sender.address(), kind, amount, call))
    }
}

/// Amount, address and kind checks for a call, with the address format
/// check supplied by the caller. Nested batch calls are checked in order.
pub fn validate_kind(kind: &CallKind, valid_address: &dyn Fn(&str) -> bool) -> ClientResult<()> {
    match kind {
        CallKind::Transfer { value, .. }
        | CallKind::Stake { value, .. }
        | CallKind::CrossChainTransfer { amount: value, .. } => {
            ensure_positive(*value)?;
            ensure_address(kind.recipient().unwrap_or_default(), valid_address)
        }
        CallKind::Vote {
            conviction,
            balance,
            ..
        } => {
            ensure_positive(*balance)?;
            if *conviction > MAX_CONVICTION {
                return Err(ClientError::InvalidAmount(format!(
                    "conviction {} exceeds maximum of {}",
                    conviction, MAX_CONVICTION
                )));
            }
            Ok(())
        }
        CallKind::Batch { calls } => {
            if calls.is_empty() {
                return Err(ClientError::InvalidBatch(
                    "batch must contain at least one call".to_string(),
                ));
            }
            for (index, call) in calls.iter().enumerate() {
                validate_kind(call, valid_address).map_err(|e| match e {
                    ClientError::InvalidAddress(_) => e,
                    other => ClientError::InvalidBatch(format!("call #{}: {}", index, other)),
                })?;
            }
            if kind.amount().is_none() {
                return Err(ClientError::InvalidAmount(
                    "batch total overflows".to_string(),
                ));
            }
            Ok(())
        }
    }
}

fn ensure_address(address: &str, valid_address: &dyn Fn(&str) -> bool) -> ClientResult<()> {
    if valid_address(address) {
        Ok(())
    } else {
        Err(ClientError::InvalidAddress(address.to_string()))
    }
}

fn ensure_positive(amount: u128) -> ClientResult<()> {
    if amount == 0 {
        return Err(ClientError::InvalidAmount(
            "amount must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockChainClient, TestAccount};

    const ALICE: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
    const BOB: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";

    fn alice() -> TestAccount {
        TestAccount(ALICE.to_string())
    }

    /// Client that accepts exactly the given addresses and echoes call kinds
    fn client_accepting(valid: &'static [&'static str]) -> MockChainClient {
        let mut client = MockChainClient::new();
        client
            .expect_validate_address()
            .returning(move |address| valid.contains(&address));
        client
            .expect_build_call()
            .returning(|kind| Ok(kind.clone()));
        client
    }

    #[test]
    fn test_build_transfer() {
        let client = client_accepting(&[BOB]);
        let request = RequestBuilder::new(&client)
            .build(&alice(), BOB, "1.5", CallParams::Transfer)
            .unwrap();

        assert_eq!(request.sender(), ALICE);
        assert_eq!(request.recipient(), Some(BOB));
        assert_eq!(request.amount(), 1_500_000_000_000);
        assert_eq!(
            request.call(),
            &CallKind::Transfer {
                dest: BOB.to_string(),
                value: 1_500_000_000_000
            }
        );
    }

    #[test]
    fn test_invalid_amounts_never_touch_client() {
        // No expectations: any client call panics
        let client = MockChainClient::new();
        let builder = RequestBuilder::new(&client);

        for amount in ["0", "-3", "abc", "", "0.0", "1..2"] {
            let err = builder
                .build(&alice(), BOB, amount, CallParams::Transfer)
                .unwrap_err();
            assert!(
                matches!(err, ClientError::InvalidAmount(_)),
                "{amount:?} gave {err:?}"
            );
        }
        let err = builder
            .build_planck(&alice(), BOB, 0, CallParams::Stake)
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidAmount(_)));
    }

    #[test]
    fn test_invalid_address_stops_before_build() {
        let mut client = MockChainClient::new();
        client
            .expect_validate_address()
            .times(1)
            .returning(|_| false);
        client.expect_build_call().never();
        client.expect_estimate_fee().never();
        client.expect_submit().never();

        let err = RequestBuilder::new(&client)
            .build(&alice(), "not-an-address", "1", CallParams::Transfer)
            .unwrap_err();
        assert_eq!(err, ClientError::InvalidAddress("not-an-address".to_string()));
    }

    #[test]
    fn test_cross_chain_transfer() {
        let client = client_accepting(&[BOB]);
        let request = RequestBuilder::new(&client)
            .build(
                &alice(),
                BOB,
                "2",
                CallParams::CrossChainTransfer { para_id: 1000 },
            )
            .unwrap();
        assert_eq!(
            request.kind(),
            &CallKind::CrossChainTransfer {
                para_id: 1000,
                beneficiary: BOB.to_string(),
                amount: 2_000_000_000_000
            }
        );
    }

    #[test]
    fn test_vote_validation() {
        let client = client_accepting(&[]);
        let builder = RequestBuilder::new(&client);

        let request = builder.build_vote(&alice(), 12, true, 3, 1_000).unwrap();
        assert_eq!(request.recipient(), None);
        assert_eq!(request.amount(), 1_000);

        let err = builder.build_vote(&alice(), 12, true, 7, 1_000).unwrap_err();
        assert!(matches!(err, ClientError::InvalidAmount(_)));
    }

    #[test]
    fn test_batch_preserves_order() {
        let client = client_accepting(&[ALICE, BOB]);
        let calls = vec![
            CallKind::Transfer {
                dest: BOB.to_string(),
                value: 3,
            },
            CallKind::Stake {
                value: 1,
                payee: ALICE.to_string(),
            },
            CallKind::Transfer {
                dest: ALICE.to_string(),
                value: 2,
            },
        ];

        let request = RequestBuilder::new(&client)
            .build_batch(&alice(), calls.clone())
            .unwrap();
        assert_eq!(request.amount(), 6);
        assert_eq!(request.call(), &CallKind::Batch { calls });
    }

    #[test]
    fn test_batch_rejections() {
        let client = client_accepting(&[BOB]);
        let builder = RequestBuilder::new(&client);

        let err = builder.build_batch(&alice(), Vec::new()).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBatch(_)));

        let zero = vec![CallKind::Transfer {
            dest: BOB.to_string(),
            value: 0,
        }];
        let err = builder.build_batch(&alice(), zero).unwrap_err();
        assert!(matches!(err, ClientError::InvalidBatch(_)));

        let bad_dest = vec![CallKind::Transfer {
            dest: "nope".to_string(),
            value: 1,
        }];
        let err = builder.build_batch(&alice(), bad_dest).unwrap_err();
        assert_eq!(err, ClientError::InvalidAddress("nope".to_string()));
    }

    #[test]
    fn test_validate_kind_without_client() {
        let known = |address: &str| address == BOB;
        let vote = CallKind::Vote {
            referendum: 1,
            aye: true,
            conviction: MAX_CONVICTION + 1,
            balance: 1,
        };
        assert!(matches!(
            validate_kind(&vote, &known),
            Err(ClientError::InvalidAmount(_))
        ));

        let stake = CallKind::Stake {
            value: 5,
            payee: ALICE.to_string(),
        };
        assert_eq!(
            validate_kind(&stake, &known),
            Err(ClientError::InvalidAddress(ALICE.to_string()))
        );
        assert!(validate_kind(&stake, &|_: &str| true).is_ok());
    }
}
