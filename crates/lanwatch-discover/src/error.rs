//! Error types for the lanwatch-discover crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("No usable target subnets: no interfaces matched and no custom ranges were given")]
    NoUsableTarget,

    #[error("Invalid target expression '{input}': {reason}")]
    InvalidTarget { input: String, reason: String },

    #[error("Interface enumeration failed: {0}")]
    Interfaces(String),

    #[error("Reachability probe failed: {0}")]
    Probe(String),

    #[error("Vendor database unavailable: {0}")]
    VendorDb(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] lanwatch_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DiscoverError {
    pub(crate) fn invalid_target(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DiscoverError>;

/// Failure of a single per-address lookup. Never escapes its resolver:
/// callers map it to the matching placeholder value.
#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Lookup timed out")]
    Timeout,

    #[error("Lookup failed: {0}")]
    Failed(String),
}

/// Enrichment produced result lists of different lengths for one batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Result lengths differ: ips={ips} macs={macs} hostnames={hostnames} vendors={vendors}")]
pub struct LengthMismatch {
    pub ips: usize,
    pub macs: usize,
    pub hostnames: usize,
    pub vendors: usize,
}
