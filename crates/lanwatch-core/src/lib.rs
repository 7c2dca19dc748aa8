//! lanwatch-core: Shared types for the lanwatch network scanner.
//!
//! This crate provides the types passed between the discovery pipeline
//! and its collaborators:
//! - Device records produced by each discovery batch
//! - Scan records and the starter tag that identifies what triggered a run
//! - The placeholder strings used for unresolved enrichment fields

pub mod error;
pub mod types;

pub use error::ParseStarterError;
pub use types::{
    DeviceRecord, ScanId, ScanRecord, Starter, HOSTNAME_UNKNOWN, MAC_UNKNOWN, VENDOR_NOT_FOUND,
};
