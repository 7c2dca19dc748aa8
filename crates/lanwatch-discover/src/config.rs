//! Configuration for the lanwatch discovery daemon.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{DiscoverError, Result};

/// Top-level discover configuration.
///
/// Loaded from `lanwatch.toml` `[discover]` section or
/// `LANWATCH_DISCOVER__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverConfig {
    /// Interface names whose networks are not scanned.
    #[serde(default)]
    pub exclude: Option<Vec<String>>,

    /// Subnet expressions to scan: CIDR, dotted ranges (`10.0.1-2.1-50`), or bare addresses.
    #[serde(default)]
    pub subs: Option<Vec<String>>,

    /// Number of addresses probed per batch.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Per-probe ICMP echo timeout in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Extra echo attempts after a probe times out.
    #[serde(default)]
    pub probe_retries: u32,

    /// Maximum in-flight echo probes.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,

    /// Per-lookup reverse DNS / vendor timeout in milliseconds.
    #[serde(default = "default_lookup_timeout_ms")]
    pub lookup_timeout_ms: u64,

    /// Maximum in-flight name and vendor lookups.
    #[serde(default = "default_max_concurrent_lookups")]
    pub max_concurrent_lookups: usize,

    /// Location of the kernel neighbor table.
    #[serde(default = "default_arp_table_path")]
    pub arp_table_path: String,

    /// Directory for scan storage.
    #[serde(default = "default_store_dir")]
    pub store_dir: String,

    /// Seconds between scheduled scans in daemon mode.
    #[serde(default = "default_schedule_interval")]
    pub schedule_interval_secs: u64,
}

impl DiscoverConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(DiscoverError::Config("chunk_size must be positive".into()));
        }
        if self.max_concurrent_probes == 0 || self.max_concurrent_lookups == 0 {
            return Err(DiscoverError::Config(
                "concurrency limits must be positive".into(),
            ));
        }
        if self.schedule_interval_secs == 0 {
            return Err(DiscoverError::Config(
                "schedule_interval_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_chunk_size() -> usize {
    300
}

fn default_probe_timeout_ms() -> u64 {
    200
}

fn default_max_concurrent_probes() -> usize {
    200
}

fn default_lookup_timeout_ms() -> u64 {
    1000
}

fn default_max_concurrent_lookups() -> usize {
    200
}

fn default_arp_table_path() -> String {
    "/proc/net/arp".to_string()
}

fn default_store_dir() -> String {
    "./scans".to_string()
}

fn default_schedule_interval() -> u64 {
    60
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            exclude: None,
            subs: None,
            chunk_size: default_chunk_size(),
            probe_timeout_ms: default_probe_timeout_ms(),
            probe_retries: 0,
            max_concurrent_probes: default_max_concurrent_probes(),
            lookup_timeout_ms: default_lookup_timeout_ms(),
            max_concurrent_lookups: default_max_concurrent_lookups(),
            arp_table_path: default_arp_table_path(),
            store_dir: default_store_dir(),
            schedule_interval_secs: default_schedule_interval(),
        }
    }
}
