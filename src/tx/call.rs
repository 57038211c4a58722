//! Call kinds and the immutable transaction request built from them

use serde::{Deserialize, Serialize};

/// Highest conviction multiplier accepted by `ConvictionVoting.vote` (Locked6x)
pub const MAX_CONVICTION: u8 = 6;

/// What a transaction does, with kind-specific parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallKind {
    /// `Balances.transfer_keep_alive`
    Transfer { dest: String, value: u128 },
    /// `Staking.bond` with rewards paid to `payee`
    Stake { value: u128, payee: String },
    /// `ConvictionVoting.vote` with a standard vote
    Vote {
        referendum: u32,
        aye: bool,
        conviction: u8,
        balance: u128,
    },
    /// `Utility.batch_all`; sub-calls execute in order, atomically
    Batch { calls: Vec<CallKind> },
    /// `XcmPallet.limited_reserve_transfer_assets` to a parachain account
    CrossChainTransfer {
        para_id: u32,
        beneficiary: String,
        amount: u128,
    },
}

impl CallKind {
    /// Short label for logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            CallKind::Transfer { .. } => "transfer",
            CallKind::Stake { .. } => "stake",
            CallKind::Vote { .. } => "vote",
            CallKind::Batch { .. } => "batch",
            CallKind::CrossChainTransfer { .. } => "cross_chain_transfer",
        }
    }

    /// Amount moved or locked by this call; a batch sums its sub-calls.
    /// `None` on overflow.
    pub fn amount(&self) -> Option<u128> {
        match self {
            CallKind::Transfer { value, .. } | CallKind::Stake { value, .. } => Some(*value),
            CallKind::Vote { balance, .. } => Some(*balance),
            CallKind::CrossChainTransfer { amount, .. } => Some(*amount),
            CallKind::Batch { calls } => calls
                .iter()
                .try_fold(0u128, |acc, call| acc.checked_add(call.amount()?)),
        }
    }

    /// Account receiving funds or rewards, if any
    pub fn recipient(&self) -> Option<&str> {
        match self {
            CallKind::Transfer { dest, .. } => Some(dest),
            CallKind::Stake { payee, .. } => Some(payee),
            CallKind::CrossChainTransfer { beneficiary, .. } => Some(beneficiary),
            CallKind::Vote { .. } | CallKind::Batch { .. } => None,
        }
    }

    /// Encoded `Vote` byte: high bit is aye, low bits the conviction
    pub fn vote_byte(aye: bool, conviction: u8) -> u8 {
        (if aye { 0x80 } else { 0x00 }) | (conviction & 0x7f)
    }
}

/// A signable transaction. Immutable once built and consumed by submission.
#[derive(Debug, Clone)]
pub struct TransactionRequest<P> {
    sender: String,
    recipient: Option<String>,
    amount: u128,
    kind: CallKind,
    call: P,
}

impl<P> TransactionRequest<P> {
    pub(crate) fn new(sender: String, kind: CallKind, amount: u128, call: P) -> Self {
        Self {
            sender,
            recipient: kind.recipient().map(str::to_string),
            amount,
            kind,
            call,
        }
    }

    /// Address of the signing account
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipient(&self) -> Option<&str> {
        self.recipient.as_deref()
    }

    /// Amount in planck
    pub fn amount(&self) -> u128 {
        self.amount
    }

    pub fn kind(&self) -> &CallKind {
        &self.kind
    }

    /// The client's call description
    pub fn call(&self) -> &P {
        &self.call
    }
}
