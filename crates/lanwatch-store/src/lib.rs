//! lanwatch-store: Persistence for scan runs.
//!
//! A scan run is one [`ScanRecord`](lanwatch_core::ScanRecord) plus the
//! device batches the discovery pipeline produced while it ran. Batches
//! are written one file at a time so a crashed or failed insert never
//! leaves a half-written batch behind.

pub mod store;

pub use store::{FileScanStore, ScanQuery, ScanStore, StoreError, DEFAULT_PAGE_SIZE};
