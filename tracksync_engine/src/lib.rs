//! Tracking Sync Engine
//!
//! The engine takes rows from a supplier export (an external order reference plus a tracking number), finds the
//! matching order on the commerce platform and marks it as fulfilled with that tracking number.
//!
//! The library is divided into the following parts:
//! 1. The platform and ledger contracts ([`mod@traits`]). The engine never talks to Shopify directly; it goes through
//!    [`OrderPlatform`], which is implemented for Shopify in [`mod@integrations`]. Already-processed references are
//!    kept in a [`ProcessedLedger`], with file and memory backends in [`mod@ledger`].
//! 2. The [`OrderResolver`], which runs an ordered list of match strategies (tag, verified text search, deep scan of
//!    open orders) and stops at the first verified match.
//! 3. The [`FulfillmentUpdater`], which fulfills the first open fulfillment order of a resolved order, unless the
//!    tracking number is already on it.
//! 4. The [`SyncOrchestrator`], which drives a batch row by row, records one outcome per row and keeps the ledger up
//!    to date.
//!
//! Reading the supplier sheet from CSV or Google Sheets ([`mod@sheet`]) and writing the CSV report ([`mod@report`]) live here too, since both
//! the CLI and the tests need them.
pub mod integrations;
pub mod ledger;
pub mod orchestrator;
pub mod report;
pub mod resolver;
pub mod sheet;
pub mod sync_types;
pub mod traits;
pub mod updater;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(test)]
mod mocks;

pub use integrations::shopify::ShopifyPlatform;
pub use ledger::{JsonFileLedger, MemoryLedger};
pub use orchestrator::{SyncError, SyncOptions, SyncOrchestrator};
pub use resolver::{MatchStrategy, OrderResolver, ResolverConfig};
pub use traits::{LedgerError, OrderPlatform, PlatformError, ProcessedLedger};
pub use updater::{FulfillmentError, FulfillmentResult, FulfillmentUpdater};
