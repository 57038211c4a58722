//! Transaction module - request building, fee estimation and submission tracking

mod builder;
mod call;
mod fee;
pub mod lifecycle;
mod outcome;
mod tracker;

pub use builder::{validate_kind, CallParams, RequestBuilder};
pub use call::{CallKind, TransactionRequest, MAX_CONVICTION};
pub use fee::{CostProjection, FeeEstimator};
pub use lifecycle::{execute, LifecycleReport};
pub use outcome::SubmissionOutcome;
pub use tracker::{SubmissionTracker, INDETERMINATE};
