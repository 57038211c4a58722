//! Substrate client backed by subxt
//!
//! Calls are built dynamically against the connected runtime's metadata, so
//! the same binary works for any relay chain exposing the standard pallets.

use super::{
    AccountCredential, BlockExtrinsic, ChainClient, FeeEstimate, FinalizedHead, StatusEvent,
    Subscription, SystemEvent, Weight,
};
use crate::config::NetworkConfig;
use crate::error::{ClientError, ClientResult};
use crate::tx::CallKind;

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use std::fmt;
use std::ops::ControlFlow;
use std::str::FromStr;
use subxt::backend::rpc::{rpc_params, RpcClient};
use subxt::config::substrate::BlakeTwo256;
use subxt::config::{DefaultExtrinsicParamsBuilder, Hasher};
use subxt::dynamic::Value;
use subxt::events::EventDetails;
use subxt::ext::codec::{Compact, Encode};
use subxt::tx::{DynamicPayload, TxInBlock, TxStatus};
use subxt::utils::{AccountId32, MultiAddress, MultiSignature, H256};
use subxt::{OnlineClient, PolkadotConfig};
use subxt_signer::sr25519::Keypair;
use subxt_signer::SecretUri;
use tracing::{debug, info, warn};

/// Signing account derived from a secret
#[derive(Clone)]
pub struct SubstrateAccount {
    keypair: Keypair,
    account_id: AccountId32,
}

impl SubstrateAccount {
    /// Derive from a hex seed, mnemonic or dev URI. Purely local.
    pub fn from_secret(secret: &str) -> ClientResult<Self> {
        let uri = SecretUri::from_str(secret.trim())
            .map_err(|e| ClientError::InvalidSecret(e.to_string()))?;
        let keypair =
            Keypair::from_uri(&uri).map_err(|e| ClientError::InvalidSecret(e.to_string()))?;
        let account_id = keypair.public_key().to_account_id();
        Ok(Self {
            keypair,
            account_id,
        })
    }

    pub fn account_id(&self) -> &AccountId32 {
        &self.account_id
    }
}

impl AccountCredential for SubstrateAccount {
    fn address(&self) -> String {
        self.account_id.to_string()
    }
}

impl fmt::Debug for SubstrateAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubstrateAccount")
            .field("address", &self.account_id.to_string())
            .finish_non_exhaustive()
    }
}

/// Response of the `payment_queryInfo` RPC
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInfo {
    weight: RpcWeight,
    partial_fee: RpcBalance,
}

/// Weight is a bare number on older runtimes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcWeight {
    V2 {
        #[serde(rename = "refTime")]
        ref_time: u64,
        #[serde(rename = "proofSize")]
        proof_size: u64,
    },
    V1(u64),
}

impl From<RpcWeight> for Weight {
    fn from(weight: RpcWeight) -> Self {
        match weight {
            RpcWeight::V2 {
                ref_time,
                proof_size,
            } => Weight {
                ref_time,
                proof_size,
            },
            RpcWeight::V1(ref_time) => Weight {
                ref_time,
                proof_size: 0,
            },
        }
    }
}

/// Balances are serialized as decimal strings once they exceed u64
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RpcBalance {
    Number(u64),
    Text(String),
}

impl RpcBalance {
    fn planck(&self) -> ClientResult<u128> {
        match self {
            RpcBalance::Number(n) => Ok(*n as u128),
            RpcBalance::Text(s) => {
                let s = s.trim();
                let parsed = match s.strip_prefix("0x") {
                    Some(hex) => u128::from_str_radix(hex, 16),
                    None => s.parse::<u128>(),
                };
                parsed.map_err(|_| {
                    ClientError::EstimationUnavailable(format!("unparseable partialFee: {}", s))
                })
            }
        }
    }
}

/// Live connection to one network
pub struct SubstrateClient {
    api: OnlineClient<PolkadotConfig>,
    rpc: RpcClient,
    network: NetworkConfig,
}

impl SubstrateClient {
    /// Connect to the network's websocket endpoint and fetch its metadata
    pub async fn connect(network: &NetworkConfig) -> ClientResult<Self> {
        info!("Connecting to {} at {}", network.name, network.ws_url);

        let rpc = RpcClient::from_url(&network.ws_url).await.map_err(|e| {
            ClientError::Chain(format!("failed to connect to {}: {}", network.ws_url, e))
        })?;
        let api = OnlineClient::<PolkadotConfig>::from_rpc_client(rpc.clone()).await?;

        info!(
            network = %network.name,
            spec_version = api.runtime_version().spec_version,
            token = %network.token_symbol,
            "Connected"
        );

        Ok(Self {
            api,
            rpc,
            network: network.clone(),
        })
    }

    pub fn network(&self) -> &NetworkConfig {
        &self.network
    }

    /// Tear down the connection. Open subscriptions end with it.
    pub fn disconnect(self) {
        info!("Disconnecting from {}", self.network.name);
        drop(self.api);
        drop(self.rpc);
    }

    fn multi_address(account: AccountId32) -> Value {
        Value::unnamed_variant("Id", [Value::from_bytes(account.0)])
    }

    fn encode_call(&self, kind: &CallKind) -> ClientResult<DynamicPayload> {
        let payload = match kind {
            CallKind::Transfer { dest, value } => subxt::dynamic::tx(
                "Balances",
                "transfer_keep_alive",
                vec![
                    Self::multi_address(parse_address(dest)?),
                    Value::u128(*value),
                ],
            ),
            CallKind::Stake { value, payee } => {
                let payee = parse_address(payee)?;
                subxt::dynamic::tx(
                    "Staking",
                    "bond",
                    vec![
                        Value::u128(*value),
                        Value::unnamed_variant("Account", [Value::from_bytes(payee.0)]),
                    ],
                )
            }
            CallKind::Vote {
                referendum,
                aye,
                conviction,
                balance,
            } => {
                let vote = Value::unnamed_composite([Value::u128(
                    CallKind::vote_byte(*aye, *conviction) as u128,
                )]);
                subxt::dynamic::tx(
                    "ConvictionVoting",
                    "vote",
                    vec![
                        Value::u128(*referendum as u128),
                        Value::named_variant(
                            "Standard",
                            [("vote", vote), ("balance", Value::u128(*balance))],
                        ),
                    ],
                )
            }
            CallKind::Batch { calls } => {
                let calls = calls
                    .iter()
                    .map(|call| self.encode_call(call).map(DynamicPayload::into_value))
                    .collect::<ClientResult<Vec<_>>>()?;
                subxt::dynamic::tx(
                    "Utility",
                    "batch_all",
                    vec![Value::unnamed_composite(calls)],
                )
            }
            CallKind::CrossChainTransfer {
                para_id,
                beneficiary,
                amount,
            } => {
                let beneficiary = parse_address(beneficiary)?;
                let dest = Value::unnamed_variant(
                    "V3",
                    [location(Value::unnamed_variant(
                        "X1",
                        [Value::unnamed_variant(
                            "Parachain",
                            [Value::u128(*para_id as u128)],
                        )],
                    ))],
                );
                let beneficiary = Value::unnamed_variant(
                    "V3",
                    [location(Value::unnamed_variant(
                        "X1",
                        [Value::named_variant(
                            "AccountId32",
                            [
                                ("network", Value::unnamed_variant("None", [])),
                                ("id", Value::from_bytes(beneficiary.0)),
                            ],
                        )],
                    ))],
                );
                let native = Value::named_composite([
                    (
                        "id",
                        Value::unnamed_variant(
                            "Concrete",
                            [location(Value::unnamed_variant("Here", []))],
                        ),
                    ),
                    (
                        "fun",
                        Value::unnamed_variant("Fungible", [Value::u128(*amount)]),
                    ),
                ]);
                subxt::dynamic::tx(
                    "XcmPallet",
                    "limited_reserve_transfer_assets",
                    vec![
                        dest,
                        beneficiary,
                        Value::unnamed_variant("V3", [Value::unnamed_composite([native])]),
                        Value::u128(0),
                        Value::unnamed_variant("Unlimited", []),
                    ],
                )
            }
        };
        Ok(payload)
    }

    async fn query_payment_info(&self, encoded: &[u8]) -> ClientResult<FeeEstimate> {
        let info: PaymentInfo = self
            .rpc
            .request(
                "payment_queryInfo",
                rpc_params![format!("0x{}", hex::encode(encoded))],
            )
            .await
            .map_err(|e| ClientError::EstimationUnavailable(e.to_string()))?;

        Ok(FeeEstimate {
            partial_fee: info.partial_fee.planck()?,
            weight: info.weight.into(),
        })
    }
}

/// SS58 address check, performed without a connection
pub fn parse_address(address: &str) -> ClientResult<AccountId32> {
    AccountId32::from_str(address.trim())
        .map_err(|e| ClientError::InvalidAddress(format!("{}: {}", address, e)))
}

/// Extrinsic hash as reported at submission: blake2-256 over the
/// length-prefixed encoding. Block bodies hand out the bytes without the
/// prefix, so it is restored here.
fn extrinsic_hash(unprefixed: &[u8]) -> String {
    let mut encoded = Compact(unprefixed.len() as u32).encode();
    encoded.extend_from_slice(unprefixed);
    hash_hex(BlakeTwo256::hash(&encoded))
}

/// Pool-level reading of one watched status
enum Progress<B> {
    Pending,
    /// Best block retracted; a fresh in-block status follows
    Retracted,
    Included { block: B, finalized: bool },
    /// Dropped or invalidated by the pool
    Rejected(String),
    /// The watch itself failed
    WatchFailed(String),
}

fn classify<C>(status: TxStatus<PolkadotConfig, C>) -> Progress<TxInBlock<PolkadotConfig, C>> {
    match status {
        TxStatus::Validated | TxStatus::Broadcasted { .. } => Progress::Pending,
        TxStatus::NoLongerInBestBlock => Progress::Retracted,
        TxStatus::InBestBlock(block) => Progress::Included {
            block,
            finalized: false,
        },
        TxStatus::InFinalizedBlock(block) => Progress::Included {
            block,
            finalized: true,
        },
        TxStatus::Invalid { message } | TxStatus::Dropped { message } => {
            Progress::Rejected(message)
        }
        TxStatus::Error { message } => Progress::WatchFailed(message),
    }
}

impl<B> Progress<B> {
    /// Feed item for this status, or the block whose events must be fetched first
    fn settle(self, tx_hash: &str) -> ControlFlow<Option<ClientResult<StatusEvent>>, (B, bool)> {
        match self {
            Progress::Pending => ControlFlow::Break(Some(Ok(StatusEvent::pending(tx_hash)))),
            Progress::Retracted => ControlFlow::Break(None),
            Progress::Included { block, finalized } => ControlFlow::Continue((block, finalized)),
            Progress::Rejected(reason) => {
                ControlFlow::Break(Some(Ok(StatusEvent::dropped(tx_hash, &reason))))
            }
            Progress::WatchFailed(reason) => ControlFlow::Break(Some(Err(ClientError::Chain(
                format!("status watch failed: {}", reason),
            )))),
        }
    }
}

fn included_event(
    tx_hash: &str,
    block_hash: H256,
    finalized: bool,
    events: Vec<SystemEvent>,
) -> StatusEvent {
    let block_hash = hash_hex(block_hash);
    if finalized {
        StatusEvent::finalized(tx_hash, &block_hash, events)
    } else {
        StatusEvent::in_block(tx_hash, &block_hash, events)
    }
}

/// Local (`parents: 0`) multilocation around `interior`
fn location(interior: Value) -> Value {
    Value::named_composite([("parents", Value::u128(0)), ("interior", interior)])
}

fn hash_hex(hash: H256) -> String {
    format!("0x{}", hex::encode(hash.0))
}

fn parse_block_hash(block_hash: &str) -> ClientResult<H256> {
    let normalized = super::normalize_hash(block_hash);
    let bytes = hex::decode(&normalized[2..])
        .map_err(|e| ClientError::Chain(format!("invalid block hash {}: {}", block_hash, e)))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| ClientError::Chain(format!("block hash must be 32 bytes: {}", block_hash)))?;
    Ok(H256(bytes))
}

#[async_trait]
impl ChainClient for SubstrateClient {
    type Credential = SubstrateAccount;
    type Call = DynamicPayload;

    async fn derive_account(&self, secret: &str) -> ClientResult<SubstrateAccount> {
        let account = SubstrateAccount::from_secret(secret)?;
        debug!("Derived account {}", account.account_id);
        Ok(account)
    }

    fn validate_address(&self, address: &str) -> bool {
        parse_address(address).is_ok()
    }

    fn build_call(&self, kind: &CallKind) -> ClientResult<DynamicPayload> {
        self.encode_call(kind)
    }

    async fn estimate_fee(&self, call: &DynamicPayload, sender: &str) -> ClientResult<FeeEstimate> {
        let account = parse_address(sender)?;
        let params = DefaultExtrinsicParamsBuilder::<PolkadotConfig>::new().build();
        // The partial extrinsic is not Send; it must be gone before the next await
        let unsigned = {
            let partial = self
                .api
                .tx()
                .create_partial_signed(call, &account, params)
                .await
                .map_err(|e| ClientError::EstimationUnavailable(e.to_string()))?;

            // Fee depends on length and weight, not on signature validity
            partial.sign_with_address_and_signature(
                &MultiAddress::Id(account),
                &MultiSignature::Sr25519([0u8; 64]),
            )
        };

        match self.query_payment_info(unsigned.encoded()).await {
            Ok(estimate) => Ok(estimate),
            Err(e) => {
                warn!("payment_queryInfo failed, falling back to runtime API: {}", e);
                let partial_fee = unsigned
                    .partial_fee_estimate()
                    .await
                    .map_err(|e| ClientError::EstimationUnavailable(e.to_string()))?;
                Ok(FeeEstimate {
                    partial_fee,
                    weight: Weight::default(),
                })
            }
        }
    }

    async fn submit(
        &self,
        call: &DynamicPayload,
        credential: &SubstrateAccount,
    ) -> ClientResult<Subscription<ClientResult<StatusEvent>>> {
        let progress = self
            .api
            .tx()
            .sign_and_submit_then_watch_default(call, &credential.keypair)
            .await
            .map_err(|e| ClientError::SubmissionRejected(e.to_string()))?;

        let tx_hash = hash_hex(progress.extrinsic_hash());
        info!("Broadcast extrinsic {}", tx_hash);

        let stream = progress.filter_map(move |status| {
            let tx_hash = tx_hash.clone();
            async move {
                let status = match status {
                    Ok(status) => status,
                    Err(e) => return Some(Err(ClientError::from(e))),
                };
                let (block, finalized) = match classify(status).settle(&tx_hash) {
                    ControlFlow::Break(item) => return item,
                    ControlFlow::Continue(included) => included,
                };
                match block.fetch_events().await {
                    Ok(events) => Some(Ok(included_event(
                        &tx_hash,
                        block.block_hash(),
                        finalized,
                        collect_events(events.iter()),
                    ))),
                    Err(e) => Some(Err(ClientError::from(e))),
                }
            }
        });

        Ok(Subscription::new(stream).with_release_hook(|| debug!("Status feed released")))
    }

    async fn subscribe_finalized_heads(
        &self,
    ) -> ClientResult<Subscription<ClientResult<FinalizedHead>>> {
        let blocks = self
            .api
            .blocks()
            .subscribe_finalized()
            .await
            .map_err(|e| ClientError::MonitorUnavailable(e.to_string()))?;

        let heads = blocks.map(|block| {
            block.map_err(ClientError::from).map(|block| FinalizedHead {
                block_number: block.number().into(),
                block_hash: hash_hex(block.hash()),
            })
        });

        Ok(Subscription::new(heads).with_release_hook(|| debug!("Finalized head feed released")))
    }

    async fn get_block_extrinsics(&self, block_hash: &str) -> ClientResult<Vec<BlockExtrinsic>> {
        let block = self.api.blocks().at(parse_block_hash(block_hash)?).await?;
        let extrinsics = block.extrinsics().await?;

        extrinsics
            .iter()
            .map(|extrinsic| -> ClientResult<BlockExtrinsic> {
                let extrinsic = extrinsic?;
                let raw = extrinsic.bytes().to_vec();
                Ok(BlockExtrinsic {
                    hash: extrinsic_hash(&raw),
                    raw,
                })
            })
            .collect()
    }
}

fn collect_events<E: fmt::Display>(
    events: impl Iterator<Item = Result<EventDetails<PolkadotConfig>, E>>,
) -> Vec<SystemEvent> {
    events
        .filter_map(|event| match event {
            Ok(event) => {
                let payload = event
                    .field_values()
                    .map(|fields| fields.to_string())
                    .unwrap_or_default();
                Some(SystemEvent::new(
                    event.pallet_name(),
                    event.variant_name(),
                    payload,
                ))
            }
            Err(e) => {
                warn!("Skipping undecodable event: {}", e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_info_weight_v2() {
        let json = r#"{"weight":{"refTime":145224000,"proofSize":3593},"class":"normal","partialFee":"15600000014"}"#;
        let info: PaymentInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.partial_fee.planck().unwrap(), 15_600_000_014);
        assert_eq!(
            Weight::from(info.weight),
            Weight {
                ref_time: 145_224_000,
                proof_size: 3_593
            }
        );
    }

    #[test]
    fn test_payment_info_legacy_weight() {
        let json = r#"{"weight":195952000,"class":"normal","partialFee":156000000}"#;
        let info: PaymentInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.partial_fee.planck().unwrap(), 156_000_000);
        assert_eq!(Weight::from(info.weight).proof_size, 0);
    }

    #[test]
    fn test_unparseable_fee() {
        let balance = RpcBalance::Text("lots".into());
        assert!(matches!(
            balance.planck(),
            Err(ClientError::EstimationUnavailable(_))
        ));
    }

    #[test]
    fn test_parse_block_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_block_hash(&hash).unwrap(), H256([0xab; 32]));
        assert!(parse_block_hash("0x1234").is_err());
        assert!(parse_block_hash("0xzz").is_err());
    }

    #[test]
    fn test_address_validation() {
        assert!(
            parse_address("5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY").is_ok()
        );
        assert!(matches!(
            parse_address("5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQZ"),
            Err(ClientError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_extrinsic_hash_includes_length_prefix() {
        let short: Vec<u8> = (1..=10).collect();
        let mut prefixed = vec![0x28];
        prefixed.extend_from_slice(&short);
        assert_eq!(
            extrinsic_hash(&short),
            hash_hex(BlakeTwo256::hash(&prefixed))
        );
        assert_ne!(extrinsic_hash(&short), hash_hex(BlakeTwo256::hash(&short)));

        // Two-byte compact length from 64 bytes on
        let long = vec![7u8; 100];
        let mut prefixed = vec![0x91, 0x01];
        prefixed.extend_from_slice(&long);
        assert_eq!(extrinsic_hash(&long), hash_hex(BlakeTwo256::hash(&prefixed)));
    }

    type Status = TxStatus<PolkadotConfig, OnlineClient<PolkadotConfig>>;

    fn settled(status: Status) -> Option<ClientResult<StatusEvent>> {
        match classify(status).settle("0xabc") {
            ControlFlow::Break(item) => item,
            ControlFlow::Continue(_) => panic!("status should not need a block fetch"),
        }
    }

    #[test]
    fn test_pool_statuses_map_to_feed_items() {
        assert_eq!(
            settled(Status::Validated).unwrap().unwrap(),
            StatusEvent::pending("0xabc")
        );
        assert_eq!(
            settled(Status::Broadcasted { num_peers: 3 }).unwrap().unwrap(),
            StatusEvent::pending("0xabc")
        );
        assert!(settled(Status::NoLongerInBestBlock).is_none());
        assert_eq!(
            settled(Status::Invalid {
                message: "bad nonce".into()
            })
            .unwrap()
            .unwrap(),
            StatusEvent::dropped("0xabc", "bad nonce")
        );
        assert_eq!(
            settled(Status::Dropped {
                message: "pool full".into()
            })
            .unwrap()
            .unwrap(),
            StatusEvent::dropped("0xabc", "pool full")
        );
    }

    #[test]
    fn test_watch_error_is_feed_error() {
        let item = settled(Status::Error {
            message: "subscription closed".into(),
        })
        .unwrap();
        match item {
            Err(ClientError::Chain(message)) => assert!(message.contains("subscription closed")),
            other => panic!("expected a feed error, got {:?}", other),
        }
    }

    #[test]
    fn test_included_statuses_carry_block() {
        let best = Progress::Included {
            block: 7u8,
            finalized: false,
        };
        assert!(matches!(best.settle("0xabc"), ControlFlow::Continue((7, false))));

        let events = vec![SystemEvent::new("System", "ExtrinsicSuccess", "")];
        let block_hash = H256([0x11; 32]);
        let expected_hash = format!("0x{}", "11".repeat(32));
        assert_eq!(
            included_event("0xabc", block_hash, false, events.clone()),
            StatusEvent::in_block("0xabc", &expected_hash, events.clone())
        );
        assert_eq!(
            included_event("0xabc", block_hash, true, events.clone()),
            StatusEvent::finalized("0xabc", &expected_hash, events)
        );
    }

    #[test]
    fn test_account_from_dev_uri_uses_generic_prefix() {
        let alice = SubstrateAccount::from_secret("//Alice").unwrap();
        assert_eq!(
            alice.address(),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
        assert!(matches!(
            SubstrateAccount::from_secret("not a secret uri"),
            Err(ClientError::InvalidSecret(_))
        ));
    }

    // Compile-time check: the estimate future must satisfy async_trait's Send bound
    #[allow(dead_code)]
    fn estimate_fee_future_is_send(client: &SubstrateClient, call: &DynamicPayload) {
        fn assert_send<T: Send>(_: &T) {}
        assert_send(&client.estimate_fee(call, "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"));
    }
}
