//! [`ProcessedLedger`](crate::traits::ProcessedLedger) backends.
//!
//! * [`JsonFileLedger`] keeps the references in a JSON array on disk and rewrites the file after every change.
//! * [`MemoryLedger`] keeps them in memory only. Useful for tests and for dry runs that must not touch the file.
mod json_file;
mod memory;

pub use json_file::JsonFileLedger;
pub use memory::MemoryLedger;

pub const DEFAULT_LEDGER_PATH: &str = "processed_orders.json";
