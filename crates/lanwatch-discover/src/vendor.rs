//! Hardware vendor lookup by OUI prefix.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lanwatch_core::VENDOR_NOT_FOUND;
use mac_oui::Oui;
use tokio::time::timeout;

use crate::error::{DiscoverError, LookupError, Result};

/// A single vendor lookup. `mac` is in `AA:BB:CC:DD:EE:FF` form.
/// `Ok(None)` means the OUI is not registered.
#[async_trait]
pub trait VendorLookup: Send + Sync {
    async fn vendor(&self, mac: &str) -> std::result::Result<Option<String>, LookupError>;
}

/// Lookup against the IEEE OUI database bundled with `mac_oui`.
///
/// Loading the database takes a while; build one and share it.
pub struct OuiVendorLookup {
    db: Oui,
}

impl OuiVendorLookup {
    pub fn load() -> Result<Self> {
        let db = Oui::default().map_err(|e| DiscoverError::VendorDb(format!("{e:?}")))?;
        Ok(Self { db })
    }
}

#[async_trait]
impl VendorLookup for OuiVendorLookup {
    async fn vendor(&self, mac: &str) -> std::result::Result<Option<String>, LookupError> {
        match self.db.lookup_by_mac(mac) {
            Ok(Some(entry)) => Ok(Some(entry.company_name.clone())),
            Ok(None) => Ok(None),
            Err(e) => Err(LookupError::Failed(format!("{e:?}"))),
        }
    }
}

/// Canonical `AA:BB:CC:DD:EE:FF` form of a colon- or dash-separated MAC,
/// or `None` if it is not six hex octets.
pub fn normalize_mac(mac: &str) -> Option<String> {
    let octets: Vec<&str> = mac.trim().split([':', '-']).collect();
    let valid = octets.len() == 6
        && octets
            .iter()
            .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()));
    valid.then(|| octets.join(":").to_uppercase())
}

/// Runs one bounded-time vendor lookup per MAC, at most `concurrency` at once.
#[derive(Clone)]
pub struct VendorResolver {
    lookup: Arc<dyn VendorLookup>,
    timeout: Duration,
    concurrency: usize,
}

impl VendorResolver {
    pub fn new(lookup: Arc<dyn VendorLookup>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            lookup,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// One vendor per MAC, in input order. Placeholder or malformed MACs,
    /// unknown OUIs, and failed lookups yield [`VENDOR_NOT_FOUND`].
    pub async fn resolve(&self, macs: &[String]) -> Vec<String> {
        tracing::debug!(count = macs.len(), "Resolving vendors");

        stream::iter(macs.iter())
            .map(|mac| async move {
                let Some(normalized) = normalize_mac(mac) else {
                    return VENDOR_NOT_FOUND.to_string();
                };
                let outcome = match timeout(self.timeout, self.lookup.vendor(&normalized)).await {
                    Ok(result) => result,
                    Err(_) => Err(LookupError::Timeout),
                };
                match outcome {
                    Ok(Some(vendor)) => vendor,
                    Ok(None) => VENDOR_NOT_FOUND.to_string(),
                    Err(e) => {
                        tracing::debug!(mac = %normalized, error = %e, "Vendor lookup failed");
                        VENDOR_NOT_FOUND.to_string()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
