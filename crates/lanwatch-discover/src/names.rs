//! Reverse DNS resolution for live addresses.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lanwatch_core::HOSTNAME_UNKNOWN;
use tokio::time::timeout;

use crate::error::LookupError;

/// A single reverse lookup. `Ok(None)` means the address has no name.
#[async_trait]
pub trait NameLookup: Send + Sync {
    async fn reverse(&self, ip: Ipv4Addr) -> Result<Option<String>, LookupError>;
}

/// Resolver-library lookup (`getnameinfo`) run on the blocking pool.
pub struct SystemNameLookup;

#[async_trait]
impl NameLookup for SystemNameLookup {
    async fn reverse(&self, ip: Ipv4Addr) -> Result<Option<String>, LookupError> {
        let addr = IpAddr::V4(ip);
        let name = tokio::task::spawn_blocking(move || dns_lookup::lookup_addr(&addr))
            .await
            .map_err(|e| LookupError::Failed(e.to_string()))?
            .map_err(|e| LookupError::Failed(e.to_string()))?;

        // getnameinfo falls back to the numeric form when there is no PTR record.
        if name == ip.to_string() {
            Ok(None)
        } else {
            Ok(Some(name))
        }
    }
}

/// Runs one bounded-time lookup per address, at most `concurrency` at once.
#[derive(Clone)]
pub struct NameResolver {
    lookup: Arc<dyn NameLookup>,
    timeout: Duration,
    concurrency: usize,
}

impl NameResolver {
    pub fn new(lookup: Arc<dyn NameLookup>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            lookup,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// One hostname per address, in input order. Failed or timed-out
    /// lookups yield [`HOSTNAME_UNKNOWN`].
    pub async fn resolve(&self, ips: &[Ipv4Addr]) -> Vec<String> {
        tracing::debug!(count = ips.len(), "Resolving hostnames");

        stream::iter(ips.iter().copied())
            .map(|ip| async move {
                let outcome = match timeout(self.timeout, self.lookup.reverse(ip)).await {
                    Ok(result) => result,
                    Err(_) => Err(LookupError::Timeout),
                };
                match outcome {
                    Ok(Some(name)) => name,
                    Ok(None) => HOSTNAME_UNKNOWN.to_string(),
                    Err(e) => {
                        tracing::debug!(ip = %ip, error = %e, "Reverse lookup failed");
                        HOSTNAME_UNKNOWN.to_string()
                    }
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
