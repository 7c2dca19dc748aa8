//! Core domain types shared by the scanner, the store, and the CLI.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ParseStarterError;

/// Placeholder for a MAC address that is not in the neighbor table.
pub const MAC_UNKNOWN: &str = "N/A";

/// Placeholder for a hostname whose reverse lookup failed or timed out.
pub const HOSTNAME_UNKNOWN: &str = "N/A";

/// Placeholder for a vendor that has no OUI mapping ("not found").
pub const VENDOR_NOT_FOUND: &str = "N/F";

// ── Devices ───────────────────────────────────────────────────────

/// One live host found during a scan, with its enrichment results.
///
/// Fields that could not be resolved carry the placeholder strings
/// [`MAC_UNKNOWN`], [`HOSTNAME_UNKNOWN`] and [`VENDOR_NOT_FOUND`]
/// rather than being optional, so every record has the same shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceRecord {
    pub ip: Ipv4Addr,
    pub mac: String,
    pub hostname: String,
    pub vendor: String,
}

impl DeviceRecord {
    /// A record for `ip` with every enrichment field unresolved.
    pub fn unresolved(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            mac: MAC_UNKNOWN.to_string(),
            hostname: HOSTNAME_UNKNOWN.to_string(),
            vendor: VENDOR_NOT_FOUND.to_string(),
        }
    }

    pub fn has_mac(&self) -> bool {
        self.mac != MAC_UNKNOWN
    }
}

// ── Scans ─────────────────────────────────────────────────────────

/// Unique identifier for a scan run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScanId(pub Uuid);

impl ScanId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScanId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ScanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What triggered a scan run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Starter {
    #[default]
    Manual,
    Scheduler,
    Api,
}

impl Starter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Scheduler => "scheduler",
            Self::Api => "api",
        }
    }
}

impl fmt::Display for Starter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Starter {
    type Err = ParseStarterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "manual" => Ok(Self::Manual),
            "scheduler" => Ok(Self::Scheduler),
            "api" => Ok(Self::Api),
            _ => Err(ParseStarterError(s.to_string())),
        }
    }
}

/// A single scan run as persisted by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRecord {
    pub id: ScanId,
    pub start: DateTime<Utc>,
    pub finish: Option<DateTime<Utc>>,
    pub starter: Starter,
}

impl ScanRecord {
    pub fn new(starter: Starter, start: DateTime<Utc>) -> Self {
        Self {
            id: ScanId::new(),
            start,
            finish: None,
            starter,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }
}
