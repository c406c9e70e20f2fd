use thiserror::Error;

use crate::sync_types::ExternalOrderRef;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Could not access the ledger at {path}. {reason}")]
    Io { path: String, reason: String },
    #[error("The ledger at {path} is not a valid list of order references. {reason}")]
    Corrupt { path: String, reason: String },
    #[error("Ledger backend error: {0}")]
    Backend(String),
}

/// The set of external references that have been synced already. Backends must make `add` durable before returning,
/// so that an interrupted run never forgets a completed row.
#[allow(async_fn_in_trait)]
pub trait ProcessedLedger {
    /// Loads the ledger from its backing store and returns the number of known references.
    async fn load(&mut self) -> Result<usize, LedgerError>;

    async fn contains(&self, id: &ExternalOrderRef) -> Result<bool, LedgerError>;

    /// Records `id`. Returns `false` if it was already present.
    async fn add(&mut self, id: &ExternalOrderRef) -> Result<bool, LedgerError>;

    /// Removes `id`, so that it will be synced again on the next run. Returns `false` if it was not present.
    async fn remove(&mut self, id: &ExternalOrderRef) -> Result<bool, LedgerError>;

    /// All known references, in ascending order.
    async fn entries(&self) -> Result<Vec<ExternalOrderRef>, LedgerError>;
}
