//! Hardware address lookup from the kernel neighbor (ARP) table.

use std::collections::HashMap;
use std::io;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use lanwatch_core::MAC_UNKNOWN;

/// IP → MAC mapping taken from the neighbor table at one point in time.
pub type NeighborSnapshot = HashMap<Ipv4Addr, String>;

/// Read-only view of the local neighbor table.
pub trait NeighborTable: Send + Sync {
    fn snapshot(&self) -> io::Result<NeighborSnapshot>;
}

/// Linux `/proc/net/arp` reader.
pub struct ProcArpTable {
    path: PathBuf,
}

impl ProcArpTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse the `/proc/net/arp` text format. Incomplete entries (all-zero
    /// hardware address) are skipped; MACs are lowercased.
    pub fn parse(contents: &str) -> NeighborSnapshot {
        let mut table = NeighborSnapshot::new();
        for line in contents.lines().skip(1) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() < 4 || parts[3] == "00:00:00:00:00:00" {
                continue;
            }
            if let Ok(ip) = parts[0].parse::<Ipv4Addr>() {
                table.insert(ip, parts[3].to_lowercase());
            }
        }
        table
    }
}

impl Default for ProcArpTable {
    fn default() -> Self {
        Self::new("/proc/net/arp")
    }
}

impl NeighborTable for ProcArpTable {
    fn snapshot(&self) -> io::Result<NeighborSnapshot> {
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(Self::parse(&contents))
    }
}

/// MAC address for each address in `ips`, or [`MAC_UNKNOWN`].
///
/// The table is read once per call so every address in a batch is
/// answered from the same snapshot.
pub fn resolve_macs(table: &dyn NeighborTable, ips: &[Ipv4Addr]) -> Vec<String> {
    let snapshot = match table.snapshot() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "Neighbor table unavailable");
            NeighborSnapshot::new()
        }
    };

    ips.iter()
        .map(|ip| {
            snapshot
                .get(ip)
                .cloned()
                .unwrap_or_else(|| MAC_UNKNOWN.to_string())
        })
        .collect()
}
