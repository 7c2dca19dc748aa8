//! Pull-based discovery session.
//!
//! A [`DiscoverySession`] walks its target subnets one address chunk at a
//! time. Each call to [`DiscoverySession::next_batch`] probes one chunk,
//! enriches the live addresses, and hands back their device records.
//! Nothing runs between calls, so a caller that stops pulling stops the scan.

use std::collections::VecDeque;
use std::net::Ipv4Addr;
use std::sync::Arc;

use ipnet::Ipv4Net;
use lanwatch_core::{DeviceRecord, HOSTNAME_UNKNOWN, MAC_UNKNOWN, VENDOR_NOT_FOUND};

use crate::chunker::AddressChunker;
use crate::config::DiscoverConfig;
use crate::error::{LengthMismatch, Result};
use crate::names::{NameResolver, SystemNameLookup};
use crate::neighbor::{resolve_macs, NeighborTable, ProcArpTable};
use crate::probe::{IcmpProbe, ReachabilityProbe};
use crate::targets::{resolve_targets, InterfaceSource};
use crate::vendor::{OuiVendorLookup, VendorResolver};

/// The probe and the three enrichment resolvers a session runs per chunk.
///
/// Clone is cheap (inner Arcs), so one pipeline can serve many scans.
#[derive(Clone)]
pub struct Pipeline {
    pub probe: Arc<dyn ReachabilityProbe>,
    pub neighbors: Arc<dyn NeighborTable>,
    pub names: NameResolver,
    pub vendors: VendorResolver,
}

impl Pipeline {
    /// ICMP probing, `/proc/net/arp`, system reverse DNS, and the bundled
    /// OUI database, tuned from `config`.
    pub fn system(config: &DiscoverConfig) -> Result<Self> {
        let vendor_db = OuiVendorLookup::load()?;
        tracing::info!("OUI vendor database loaded");

        Ok(Self {
            probe: Arc::new(IcmpProbe::from_config(config)),
            neighbors: Arc::new(ProcArpTable::new(&config.arp_table_path)),
            names: NameResolver::new(
                Arc::new(SystemNameLookup),
                config.lookup_timeout(),
                config.max_concurrent_lookups,
            ),
            vendors: VendorResolver::new(
                Arc::new(vendor_db),
                config.lookup_timeout(),
                config.max_concurrent_lookups,
            ),
        })
    }
}

/// Where a session is in its walk over the target subnets.
///
/// Target resolution happens inside the constructor, so a session is
/// never observed before it has its subnet list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the next pull; at least one chunk may remain.
    HasPendingSubnet,
    /// A chunk is being probed and enriched.
    BatchInProgress,
    /// Every subnet is used up; pulls return `None`.
    Exhausted,
}

/// The records from one probed chunk.
#[derive(Debug, Clone)]
pub struct DiscoveryBatch {
    /// Subnet the chunk was drawn from.
    pub subnet: Ipv4Net,
    /// Number of addresses probed to produce this batch.
    pub probed: usize,
    /// One record per live address, in address order.
    pub devices: Vec<DeviceRecord>,
}

pub struct DiscoverySession {
    state: SessionState,
    pending: VecDeque<Ipv4Net>,
    current: Option<AddressChunker>,
    chunk_size: usize,
    pipeline: Pipeline,
}

impl DiscoverySession {
    /// Validate `config`, resolve its targets, and prepare to scan them.
    ///
    /// Configuration faults (zero chunk size, bad range syntax, nothing to
    /// scan) are reported here, before any probe is sent.
    pub fn new(
        config: &DiscoverConfig,
        interfaces: &dyn InterfaceSource,
        pipeline: Pipeline,
    ) -> Result<Self> {
        config.validate()?;
        let targets = resolve_targets(
            config.exclude.as_deref(),
            config.subs.as_deref(),
            interfaces,
        )?;
        Ok(Self::with_targets(targets, config.chunk_size, pipeline))
    }

    /// Scan an already-resolved subnet list in the given order.
    pub fn with_targets(targets: Vec<Ipv4Net>, chunk_size: usize, pipeline: Pipeline) -> Self {
        let state = if targets.is_empty() {
            SessionState::Exhausted
        } else {
            SessionState::HasPendingSubnet
        };
        Self {
            state,
            pending: targets.into(),
            current: None,
            chunk_size,
            pipeline,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Subnets not yet started.
    pub fn remaining_subnets(&self) -> usize {
        self.pending.len()
    }

    /// Probe and enrich the next chunk that has live hosts.
    ///
    /// Returns `Ok(None)` once every subnet is exhausted, and on every
    /// call after that. Chunks with no live address are skipped, so a
    /// returned batch always has at least one device.
    pub async fn next_batch(&mut self) -> Result<Option<DiscoveryBatch>> {
        loop {
            if self.state == SessionState::Exhausted {
                return Ok(None);
            }

            let Some((subnet, addresses)) = self.next_addresses() else {
                self.state = SessionState::Exhausted;
                tracing::info!("All target subnets exhausted");
                return Ok(None);
            };

            let probed = addresses.len();
            let live = {
                let _busy = InProgress::enter(&mut self.state);
                self.pipeline.probe.alive(&addresses).await?
            };

            tracing::debug!(
                subnet = %subnet,
                first = %addresses[0],
                probed,
                live = live.len(),
                "Chunk probed"
            );

            if live.is_empty() {
                continue;
            }

            let devices = {
                let _busy = InProgress::enter(&mut self.state);
                enrich(&self.pipeline, &live).await
            };

            tracing::info!(subnet = %subnet, probed, devices = devices.len(), "Discovery batch ready");

            return Ok(Some(DiscoveryBatch {
                subnet,
                probed,
                devices,
            }));
        }
    }

    /// The next address chunk, moving on to later subnets as earlier ones
    /// run out. Subnets without usable hosts are passed over.
    fn next_addresses(&mut self) -> Option<(Ipv4Net, Vec<Ipv4Addr>)> {
        loop {
            if let Some(chunker) = self.current.as_mut() {
                if let Some(chunk) = chunker.next_chunk() {
                    return Some((chunker.subnet(), chunk));
                }
                tracing::debug!(subnet = %chunker.subnet(), "Subnet exhausted");
                self.current = None;
            }

            let subnet = self.pending.pop_front()?;
            tracing::debug!(subnet = %subnet, remaining = self.pending.len(), "Starting subnet");
            self.current = Some(AddressChunker::new(subnet, self.chunk_size));
        }
    }
}

/// Holds the session in [`SessionState::BatchInProgress`] while a chunk
/// is being worked on, and puts it back when the work ends or the pull
/// is dropped mid-flight.
struct InProgress<'a>(&'a mut SessionState);

impl<'a> InProgress<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::BatchInProgress;
        Self(state)
    }
}

impl Drop for InProgress<'_> {
    fn drop(&mut self) {
        *self.0 = SessionState::HasPendingSubnet;
    }
}

/// MAC lookup first (the vendor step needs it), then names and vendors together.
async fn enrich(pipeline: &Pipeline, live: &[Ipv4Addr]) -> Vec<DeviceRecord> {
    let macs = resolve_macs(pipeline.neighbors.as_ref(), live);
    let (hostnames, vendors) = tokio::join!(
        pipeline.names.resolve(live),
        pipeline.vendors.resolve(&macs),
    );
    assemble_records(live, macs, hostnames, vendors)
}

/// Zip the enrichment lists into records. A length mismatch is logged at
/// error level and the records are still produced, one per live address.
pub fn assemble_records(
    live: &[Ipv4Addr],
    macs: Vec<String>,
    hostnames: Vec<String>,
    vendors: Vec<String>,
) -> Vec<DeviceRecord> {
    if let Err(fault) = check_lengths(live, &macs, &hostnames, &vendors) {
        tracing::error!(error = %fault, "Enrichment results are misaligned; emitting batch anyway");
    }
    zip_records(live, macs, hostnames, vendors)
}

/// Verify that every enrichment list has one entry per live address.
pub fn check_lengths(
    ips: &[Ipv4Addr],
    macs: &[String],
    hostnames: &[String],
    vendors: &[String],
) -> std::result::Result<(), LengthMismatch> {
    let n = ips.len();
    if macs.len() == n && hostnames.len() == n && vendors.len() == n {
        Ok(())
    } else {
        Err(LengthMismatch {
            ips: n,
            macs: macs.len(),
            hostnames: hostnames.len(),
            vendors: vendors.len(),
        })
    }
}

/// One record per address. Positions missing from a shorter list get the
/// placeholder value; surplus entries are ignored.
pub fn zip_records(
    ips: &[Ipv4Addr],
    macs: Vec<String>,
    hostnames: Vec<String>,
    vendors: Vec<String>,
) -> Vec<DeviceRecord> {
    let mut macs = macs.into_iter();
    let mut hostnames = hostnames.into_iter();
    let mut vendors = vendors.into_iter();

    ips.iter()
        .map(|&ip| DeviceRecord {
            ip,
            mac: macs.next().unwrap_or_else(|| MAC_UNKNOWN.to_string()),
            hostname: hostnames
                .next()
                .unwrap_or_else(|| HOSTNAME_UNKNOWN.to_string()),
            vendor: vendors
                .next()
                .unwrap_or_else(|| VENDOR_NOT_FOUND.to_string()),
        })
        .collect()
}
