//! Drives a sync batch.
//!
//! Rows are handled strictly one after another: a row is resolved, fulfilled and recorded before the next one is
//! looked at. Row failures never stop the batch. The abort flag is checked between rows, so an aborted run leaves the
//! ledger consistent up to the last completed row.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::*;
use thiserror::Error;

use crate::{
    resolver::{OrderResolver, ResolverConfig},
    sync_types::{OutcomeStatus, RowOutcome, SyncRow, SyncSummary, TrackingInfo, DEFAULT_CARRIER},
    traits::{LedgerError, OrderPlatform, ProcessedLedger},
    updater::{FulfillmentError, FulfillmentResult, FulfillmentUpdater},
};

pub const MSG_NO_TRACKING: &str = "No tracking number found in row.";
pub const MSG_NO_EXTERNAL_ID: &str = "No external order reference found in row.";
pub const MSG_NOT_FOUND: &str = "Could not find a platform order for this reference.";
pub const MSG_DRY_RUN: &str = "Dry Run - Match found, no update performed.";
pub const MSG_FULFILLED: &str = "Successfully updated tracking.";
pub const MSG_ALREADY_FULFILLED: &str = "Tracking number already recorded on the order.";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Could not load the ledger. {0}")]
    Ledger(#[from] LedgerError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    pub dry_run: bool,
    /// Carrier used for rows that do not name one
    pub default_carrier: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self { dry_run: false, default_carrier: DEFAULT_CARRIER.to_string() }
    }
}

pub struct SyncOrchestrator<P, L> {
    resolver: OrderResolver<Arc<P>>,
    updater: FulfillmentUpdater<Arc<P>>,
    ledger: L,
    options: SyncOptions,
    abort: Arc<AtomicBool>,
}

impl<P, L> SyncOrchestrator<P, L>
where
    P: OrderPlatform,
    L: ProcessedLedger,
{
    pub fn new(platform: P, ledger: L, resolver_config: ResolverConfig, options: SyncOptions) -> Self {
        let platform = Arc::new(platform);
        Self {
            resolver: OrderResolver::new(Arc::clone(&platform), resolver_config),
            updater: FulfillmentUpdater::new(platform),
            ledger,
            options,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A flag that, once set, stops the batch before the next row.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn into_ledger(self) -> L {
        self.ledger
    }

    /// Loads the ledger. Call this before [`Self::run`]; a ledger that cannot be read is fatal to the run.
    pub async fn prepare(&mut self) -> Result<usize, SyncError> {
        let count = self.ledger.load().await?;
        info!("🔄️ {count} references already processed in previous runs");
        Ok(count)
    }

    pub async fn run<I>(&mut self, rows: I) -> SyncSummary
    where I: IntoIterator<Item = SyncRow> {
        self.run_with(rows, |_| {}).await
    }

    /// Processes `rows` in order, calling `on_outcome` as soon as each row has an outcome.
    pub async fn run_with<I, F>(&mut self, rows: I, mut on_outcome: F) -> SyncSummary
    where
        I: IntoIterator<Item = SyncRow>,
        F: FnMut(&RowOutcome),
    {
        let mut summary = SyncSummary::default();
        for row in rows {
            if self.abort.load(Ordering::SeqCst) {
                warn!("🔄️ Sync aborted. Remaining rows were not processed.");
                summary.aborted = true;
                break;
            }
            if !row.external_id.is_empty() {
                match self.ledger.contains(&row.external_id).await {
                    Ok(true) => {
                        debug!("🔄️ {} was processed in an earlier run. Skipping.", row.external_id);
                        summary.already_processed += 1;
                        continue;
                    },
                    Ok(false) => {},
                    Err(e) => {
                        let outcome = RowOutcome::new(&row, OutcomeStatus::Failed, format!("Ledger lookup failed. {e}"));
                        on_outcome(&outcome);
                        summary.outcomes.push(outcome);
                        continue;
                    },
                }
            }
            let outcome = self.process_row(&row).await;
            on_outcome(&outcome);
            summary.outcomes.push(outcome);
        }
        info!(
            "🔄️ Batch complete. Success: {}. Failed: {}. Already processed: {}",
            summary.success_count(),
            summary.fail_count(),
            summary.already_processed
        );
        summary
    }

    /// Resolves and fulfills a single row. Does not consult the ledger, but records successes in it.
    pub async fn process_row(&mut self, row: &SyncRow) -> RowOutcome {
        if row.external_id.is_empty() {
            warn!("🔄️ Row {} has no external order reference", row.line);
            return RowOutcome::new(row, OutcomeStatus::Failed, MSG_NO_EXTERNAL_ID);
        }
        let Some(tracking_number) = row.tracking_number.as_deref() else {
            warn!("🔄️ Skipping {}: {MSG_NO_TRACKING}", row.external_id);
            return RowOutcome::new(row, OutcomeStatus::Failed, MSG_NO_TRACKING);
        };
        info!("🔄️ Processing {} -> tracking {tracking_number}", row.external_id);
        let tracking = TrackingInfo::new(tracking_number)
            .with_carrier(Some(self.options.default_carrier.as_str()))
            .with_carrier(row.carrier.as_deref());

        let resolved = match self.resolver.resolve(&row.external_id).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => return RowOutcome::new(row, OutcomeStatus::Failed, MSG_NOT_FOUND),
            Err(e) => {
                error!("🔄️ Search for {} failed. {e}", row.external_id);
                return RowOutcome::new(row, OutcomeStatus::Failed, format!("Order search failed. {e}"));
            },
        };
        let mut order = resolved.order;
        let name = order.display_name.clone();
        info!("🔄️ Match found for {}: {name} (via {})", row.external_id, resolved.tier);

        match self.updater.fulfill(&mut order, &tracking, self.options.dry_run).await {
            Ok(FulfillmentResult::DryRun { .. }) => {
                RowOutcome::new(row, OutcomeStatus::Skipped, MSG_DRY_RUN).with_order_name(&name)
            },
            Ok(FulfillmentResult::Fulfilled { .. }) => self.record_success(row, &name, MSG_FULFILLED).await,
            Ok(FulfillmentResult::AlreadyFulfilled) => self.record_success(row, &name, MSG_ALREADY_FULFILLED).await,
            Err(e @ FulfillmentError::NoOpenFulfillment(_)) => {
                RowOutcome::new(row, OutcomeStatus::Failed, e.to_string()).with_order_name(&name)
            },
            Err(FulfillmentError::ApiError(e)) => {
                RowOutcome::new(row, OutcomeStatus::Failed, format!("Failed to update fulfillment. {e}"))
                    .with_order_name(&name)
            },
        }
    }

    async fn record_success(&mut self, row: &SyncRow, name: &str, message: &str) -> RowOutcome {
        let message = match self.ledger.add(&row.external_id).await {
            Ok(_) => message.to_string(),
            Err(e) => {
                error!("📒️ Could not record {} in the ledger. It may be processed again next run. {e}", row.external_id);
                format!("{message} Warning: the ledger could not be updated. {e}")
            },
        };
        RowOutcome::new(row, OutcomeStatus::Success, message).with_order_name(name)
    }
}
