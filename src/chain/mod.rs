//! Chain module - the capability surface consumed from the Substrate SDK
//!
//! This module provides:
//! - The `ChainClient` trait every lifecycle component is generic over
//! - Status, block and fee value types exchanged with the client
//! - Releasable subscriptions over asynchronous feeds
//! - A finalized-block inclusion monitor
//! - A `subxt`-backed client for live networks

pub mod inclusion;
pub mod subscription;
pub mod substrate;

pub use inclusion::{InclusionMonitor, InclusionRecord};
pub use subscription::Subscription;
pub use substrate::{parse_address, SubstrateAccount, SubstrateClient};

use crate::error::ClientResult;
use crate::tx::CallKind;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A derived signing account. Holds key material, never the raw secret.
pub trait AccountCredential: Send + Sync {
    /// SS58 address of the account
    fn address(&self) -> String;
}

/// Everything the lifecycle needs from the chain SDK.
///
/// Implementations own the connection; components receive the client
/// explicitly and hold no other shared state.
#[cfg_attr(test, mockall::automock(type Credential = TestAccount; type Call = CallKind;))]
#[async_trait]
pub trait ChainClient: Send + Sync {
    type Credential: AccountCredential;
    /// Encoded, signable call description
    type Call: Send + Sync;

    /// Derive an account from a secret seed or URI
    async fn derive_account(&self, secret: &str) -> ClientResult<Self::Credential>;

    /// Address format check, performed locally
    fn validate_address(&self, address: &str) -> bool;

    /// Turn a call kind into the SDK's call description. No network I/O.
    fn build_call(&self, kind: &CallKind) -> ClientResult<Self::Call>;

    /// Project the cost of a call for a sender without submitting it
    async fn estimate_fee(&self, call: &Self::Call, sender: &str) -> ClientResult<FeeEstimate>;

    /// Sign and broadcast, returning the per-submission status feed
    async fn submit(
        &self,
        call: &Self::Call,
        credential: &Self::Credential,
    ) -> ClientResult<Subscription<ClientResult<StatusEvent>>>;

    async fn subscribe_finalized_heads(
        &self,
    ) -> ClientResult<Subscription<ClientResult<FinalizedHead>>>;

    async fn get_block_extrinsics(&self, block_hash: &str) -> ClientResult<Vec<BlockExtrinsic>>;
}

/// Computational cost of a call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weight {
    pub ref_time: u64,
    pub proof_size: u64,
}

/// Fee projection for a call. Recomputed on demand, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeEstimate {
    /// Fee in planck, excluding any tip
    pub partial_fee: u128,
    pub weight: Weight,
}

/// Phase reported by the submission status feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusPhase {
    /// Validated or broadcast, not yet in a block
    Pending,
    InBlock,
    Finalized,
    /// Invalidated or dropped by the pool after broadcast
    Dropped { reason: String },
}

/// A runtime event attached to an in-block status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub pallet: String,
    pub variant: String,
    /// Rendered event fields
    pub payload: String,
}

impl SystemEvent {
    pub fn new(pallet: &str, variant: &str, payload: impl Into<String>) -> Self {
        Self {
            pallet: pallet.to_string(),
            variant: variant.to_string(),
            payload: payload.into(),
        }
    }

    /// `System.ExtrinsicSuccess`
    pub fn is_extrinsic_success(&self) -> bool {
        self.pallet == "System" && self.variant == "ExtrinsicSuccess"
    }

    /// `System.ExtrinsicFailed`
    pub fn is_extrinsic_failed(&self) -> bool {
        self.pallet == "System" && self.variant == "ExtrinsicFailed"
    }
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pallet, self.variant)
    }
}

/// One item of the submission status feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub phase: StatusPhase,
    pub block_hash: Option<String>,
    pub tx_hash: String,
    pub events: Vec<SystemEvent>,
}

impl StatusEvent {
    pub fn pending(tx_hash: &str) -> Self {
        Self {
            phase: StatusPhase::Pending,
            block_hash: None,
            tx_hash: tx_hash.to_string(),
            events: Vec::new(),
        }
    }

    pub fn in_block(tx_hash: &str, block_hash: &str, events: Vec<SystemEvent>) -> Self {
        Self {
            phase: StatusPhase::InBlock,
            block_hash: Some(block_hash.to_string()),
            tx_hash: tx_hash.to_string(),
            events,
        }
    }

    pub fn finalized(tx_hash: &str, block_hash: &str, events: Vec<SystemEvent>) -> Self {
        Self {
            phase: StatusPhase::Finalized,
            block_hash: Some(block_hash.to_string()),
            tx_hash: tx_hash.to_string(),
            events,
        }
    }

    pub fn dropped(tx_hash: &str, reason: &str) -> Self {
        Self {
            phase: StatusPhase::Dropped {
                reason: reason.to_string(),
            },
            block_hash: None,
            tx_hash: tx_hash.to_string(),
            events: Vec::new(),
        }
    }
}

/// Header of a newly finalized block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedHead {
    pub block_number: u64,
    pub block_hash: String,
}

/// An extrinsic as stored in a block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockExtrinsic {
    /// 0x-prefixed blake2-256 hash of the encoded extrinsic
    pub hash: String,
    pub raw: Vec<u8>,
}

/// Canonical form of a hex hash for comparisons: lowercase, `0x`-prefixed
pub fn normalize_hash(hash: &str) -> String {
    let trimmed = hash.trim();
    let bare = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    format!("0x{}", bare.to_ascii_lowercase())
}

/// Account type used by the mocked client in tests
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAccount(pub String);

#[cfg(test)]
impl AccountCredential for TestAccount {
    fn address(&self) -> String {
        self.0.clone()
    }
}
