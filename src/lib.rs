//! substrate-txgen - builds, prices, submits and tracks extrinsics against
//! Substrate-based networks.
//!
//! Every lifecycle component is generic over [`chain::ChainClient`] and
//! receives the client explicitly. [`chain::SubstrateClient`] is the live
//! implementation over subxt.

pub mod cancel;
pub mod chain;
pub mod config;
pub mod error;
pub mod metrics;
pub mod prompt;
pub mod tx;
pub mod units;

pub use cancel::CancelHandle;
pub use error::{ClientError, ClientResult};
