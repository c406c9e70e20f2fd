//! # Platform and ledger contracts
//!
//! * [`OrderPlatform`] is everything the engine needs from the commerce platform: order search, fulfillment order
//!   listing and fulfillment creation.
//! * [`ProcessedLedger`] remembers which external references have already been synced, across runs.
mod order_platform;
mod processed_ledger;

pub use order_platform::{OrderPlatform, PlatformError};
pub use processed_ledger::{LedgerError, ProcessedLedger};
