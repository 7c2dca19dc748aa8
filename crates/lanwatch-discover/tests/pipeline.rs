//! End-to-end discovery runs against in-process fakes.
//!
//! No sockets, DNS, or neighbor table are touched: every seam of the
//! pipeline is replaced with a table-driven fake.

use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use lanwatch_core::{DeviceRecord, ScanId, ScanRecord, Starter};
use lanwatch_discover::config::DiscoverConfig;
use lanwatch_discover::error::{DiscoverError, LookupError, Result};
use lanwatch_discover::names::{NameLookup, NameResolver};
use lanwatch_discover::neighbor::{NeighborSnapshot, NeighborTable};
use lanwatch_discover::probe::ReachabilityProbe;
use lanwatch_discover::scheduler::{run_single_scan, ScanScheduler};
use lanwatch_discover::session::{DiscoverySession, Pipeline, SessionState};
use lanwatch_discover::targets::{InterfaceNetwork, InterfaceSource};
use lanwatch_discover::vendor::{VendorLookup, VendorResolver};
use lanwatch_store::{FileScanStore, ScanQuery, ScanStore, StoreError};

// ── Fakes ─────────────────────────────────────────────────────────

/// Answers for a fixed set of live addresses and records every batch it sees.
#[derive(Default)]
struct FakeProbe {
    live: HashSet<Ipv4Addr>,
    fail: bool,
    seen: Mutex<Vec<Vec<Ipv4Addr>>>,
}

#[async_trait]
impl ReachabilityProbe for FakeProbe {
    async fn alive(&self, batch: &[Ipv4Addr]) -> Result<Vec<Ipv4Addr>> {
        self.seen.lock().unwrap().push(batch.to_vec());
        if self.fail {
            return Err(DiscoverError::Probe("operation not permitted".into()));
        }
        Ok(batch
            .iter()
            .copied()
            .filter(|ip| self.live.contains(ip))
            .collect())
    }
}

/// Never answers.
struct SilentProbe;

#[async_trait]
impl ReachabilityProbe for SilentProbe {
    async fn alive(&self, _batch: &[Ipv4Addr]) -> Result<Vec<Ipv4Addr>> {
        std::future::pending().await
    }
}

struct FakeNeighbors(NeighborSnapshot);

impl NeighborTable for FakeNeighbors {
    fn snapshot(&self) -> std::io::Result<NeighborSnapshot> {
        Ok(self.0.clone())
    }
}

struct FakeNames(HashMap<Ipv4Addr, String>);

#[async_trait]
impl NameLookup for FakeNames {
    async fn reverse(&self, ip: Ipv4Addr) -> std::result::Result<Option<String>, LookupError> {
        Ok(self.0.get(&ip).cloned())
    }
}

/// Maps the first three octets (`AA:BB:CC`) to a vendor.
struct FakeVendors(HashMap<String, String>);

#[async_trait]
impl VendorLookup for FakeVendors {
    async fn vendor(&self, mac: &str) -> std::result::Result<Option<String>, LookupError> {
        Ok(self.0.get(&mac[..8]).cloned())
    }
}

struct NoInterfaces;

impl InterfaceSource for NoInterfaces {
    fn ipv4_networks(&self) -> Result<Vec<InterfaceNetwork>> {
        Ok(Vec::new())
    }
}

/// File store whose first `failures` inserts fail.
struct FlakyStore {
    inner: FileScanStore,
    failures: AtomicUsize,
}

impl ScanStore for FlakyStore {
    fn create_scan(
        &self,
        starter: Starter,
        start: DateTime<Utc>,
    ) -> std::result::Result<ScanRecord, StoreError> {
        self.inner.create_scan(starter, start)
    }

    fn insert_devices(
        &self,
        scan_id: ScanId,
        devices: &[DeviceRecord],
    ) -> std::result::Result<(), StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.inner.insert_devices(scan_id, devices)
    }

    fn finish_scan(
        &self,
        scan_id: ScanId,
        finish: DateTime<Utc>,
    ) -> std::result::Result<ScanRecord, StoreError> {
        self.inner.finish_scan(scan_id, finish)
    }

    fn get_scan(&self, scan_id: ScanId) -> std::result::Result<ScanRecord, StoreError> {
        self.inner.get_scan(scan_id)
    }

    fn list_scans(&self, query: &ScanQuery) -> std::result::Result<Vec<ScanRecord>, StoreError> {
        self.inner.list_scans(query)
    }

    fn devices(&self, scan_id: ScanId) -> std::result::Result<Vec<DeviceRecord>, StoreError> {
        self.inner.devices(scan_id)
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn ip(s: &str) -> Ipv4Addr {
    s.parse().unwrap()
}

fn config(subs: &[&str], chunk_size: usize) -> DiscoverConfig {
    DiscoverConfig {
        subs: Some(subs.iter().map(|s| s.to_string()).collect()),
        chunk_size,
        ..Default::default()
    }
}

fn probe_for(live: &[&str]) -> Arc<FakeProbe> {
    Arc::new(FakeProbe {
        live: live.iter().map(|s| ip(s)).collect(),
        ..Default::default()
    })
}

fn pipeline(probe: Arc<FakeProbe>) -> Pipeline {
    let neighbors = HashMap::from([
        (ip("192.168.1.1"), "b8:27:eb:00:00:01".to_string()),
        (ip("192.168.1.2"), "02:00:00:00:00:02".to_string()),
    ]);
    let names = HashMap::from([(ip("192.168.1.1"), "gateway.lan".to_string())]);
    let vendors = HashMap::from([("B8:27:EB".to_string(), "Raspberry Pi Foundation".to_string())]);

    Pipeline {
        probe,
        neighbors: Arc::new(FakeNeighbors(neighbors)),
        names: NameResolver::new(Arc::new(FakeNames(names)), Duration::from_millis(200), 8),
        vendors: VendorResolver::new(
            Arc::new(FakeVendors(vendors)),
            Duration::from_millis(200),
            8,
        ),
    }
}

// ── Session ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_small_subnet_yields_one_batch_then_ends() {
    let probe = probe_for(&["192.168.1.1", "192.168.1.2"]);
    let mut session = DiscoverySession::new(
        &config(&["192.168.1.0/30"], 300),
        &NoInterfaces,
        pipeline(probe.clone()),
    )
    .unwrap();
    assert_eq!(session.state(), SessionState::HasPendingSubnet);

    let batch = session.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.subnet, "192.168.1.0/30".parse().unwrap());
    assert_eq!(batch.probed, 2);
    assert_eq!(
        batch.devices,
        vec![
            DeviceRecord {
                ip: ip("192.168.1.1"),
                mac: "b8:27:eb:00:00:01".into(),
                hostname: "gateway.lan".into(),
                vendor: "Raspberry Pi Foundation".into(),
            },
            DeviceRecord {
                ip: ip("192.168.1.2"),
                mac: "02:00:00:00:00:02".into(),
                hostname: "N/A".into(),
                vendor: "N/F".into(),
            },
        ]
    );

    assert!(session.next_batch().await.unwrap().is_none());
    assert_eq!(session.state(), SessionState::Exhausted);
    assert!(session.next_batch().await.unwrap().is_none());
    assert_eq!(probe.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unresolvable_host_gets_placeholders() {
    let probe = probe_for(&["10.9.9.9"]);
    let mut session =
        DiscoverySession::new(&config(&["10.9.9.9"], 300), &NoInterfaces, pipeline(probe))
            .unwrap();

    let batch = session.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.devices, vec![DeviceRecord::unresolved(ip("10.9.9.9"))]);
    assert_eq!(batch.devices[0].mac, "N/A");
    assert_eq!(batch.devices[0].hostname, "N/A");
    assert_eq!(batch.devices[0].vendor, "N/F");
}

#[tokio::test]
async fn test_chunk_size_one_walks_hosts_in_order() {
    let hosts: Vec<String> = (1..=6).map(|i| format!("10.0.0.{i}")).collect();
    let live: Vec<&str> = hosts.iter().map(String::as_str).collect();
    let mut session = DiscoverySession::new(
        &config(&["10.0.0.0/29"], 1),
        &NoInterfaces,
        pipeline(probe_for(&live)),
    )
    .unwrap();

    let mut found = Vec::new();
    while let Some(batch) = session.next_batch().await.unwrap() {
        assert_eq!(batch.devices.len(), 1);
        found.push(batch.devices[0].ip);
    }
    let expected: Vec<Ipv4Addr> = hosts.iter().map(|s| ip(s)).collect();
    assert_eq!(found, expected);
}

#[tokio::test]
async fn test_silent_chunks_are_skipped_within_one_pull() {
    let probe = probe_for(&["10.0.0.5"]);
    let mut session = DiscoverySession::new(
        &config(&["10.0.0.0/29"], 2),
        &NoInterfaces,
        pipeline(probe.clone()),
    )
    .unwrap();

    let batch = session.next_batch().await.unwrap().unwrap();
    assert_eq!(batch.devices.len(), 1);
    assert_eq!(batch.devices[0].ip, ip("10.0.0.5"));
    assert_eq!(probe.seen.lock().unwrap().len(), 3);

    assert!(session.next_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_subnets_are_scanned_in_turn() {
    let probe = probe_for(&["10.0.0.1", "10.0.1.2"]);
    let mut session = DiscoverySession::new(
        &config(&["10.0.0.0/30", "10.0.1.0/30"], 300),
        &NoInterfaces,
        pipeline(probe),
    )
    .unwrap();
    assert_eq!(session.remaining_subnets(), 2);

    let first = session.next_batch().await.unwrap().unwrap();
    let second = session.next_batch().await.unwrap().unwrap();
    assert_eq!(first.devices[0].ip, ip("10.0.0.1"));
    assert_eq!(second.devices[0].ip, ip("10.0.1.2"));
    assert_eq!(session.remaining_subnets(), 0);
    assert!(session.next_batch().await.unwrap().is_none());
}

#[tokio::test]
async fn test_probe_failure_is_returned() {
    let probe = Arc::new(FakeProbe {
        fail: true,
        ..Default::default()
    });
    let mut session =
        DiscoverySession::new(&config(&["10.0.0.0/30"], 300), &NoInterfaces, pipeline(probe))
            .unwrap();

    let err = session.next_batch().await.unwrap_err();
    assert!(matches!(err, DiscoverError::Probe(_)));
}

#[tokio::test]
async fn test_abandoned_pull_leaves_session_idle() {
    let mut pipeline = pipeline(probe_for(&[]));
    pipeline.probe = Arc::new(SilentProbe);
    let mut session =
        DiscoverySession::new(&config(&["10.0.0.0/30"], 300), &NoInterfaces, pipeline).unwrap();

    let pull = tokio::time::timeout(Duration::from_millis(20), session.next_batch()).await;
    assert!(pull.is_err());
    assert_eq!(session.state(), SessionState::HasPendingSubnet);
}

#[test]
fn test_config_faults_fail_construction() {
    let zero = DiscoverySession::new(
        &config(&["10.0.0.0/30"], 0),
        &NoInterfaces,
        pipeline(probe_for(&[])),
    );
    assert!(matches!(zero, Err(DiscoverError::Config(_))));

    let bad = DiscoverySession::new(
        &config(&["10.0.0-300.1"], 300),
        &NoInterfaces,
        pipeline(probe_for(&[])),
    );
    assert!(matches!(bad, Err(DiscoverError::InvalidTarget { .. })));

    let nothing = DiscoverySession::new(
        &DiscoverConfig::default(),
        &NoInterfaces,
        pipeline(probe_for(&[])),
    );
    assert!(matches!(nothing, Err(DiscoverError::NoUsableTarget)));
}

// ── Scan runs ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_run_single_scan_stores_devices() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileScanStore::new(dir.path()).unwrap();
    let pipeline = pipeline(probe_for(&["192.168.1.1", "192.168.1.2"]));

    let summary = run_single_scan(
        &config(&["192.168.1.0/30"], 300),
        &NoInterfaces,
        &pipeline,
        &store,
        Starter::Manual,
    )
    .await
    .unwrap();

    assert_eq!(summary.batches, 1);
    assert_eq!(summary.devices, 2);
    assert_eq!(summary.failed_batches, 0);

    let scan = store.get_scan(summary.scan_id).unwrap();
    assert!(scan.is_finished());
    assert_eq!(scan.starter, Starter::Manual);

    let stored = store.devices(summary.scan_id).unwrap();
    let ips: Vec<Ipv4Addr> = stored.iter().map(|d| d.ip).collect();
    assert_eq!(ips, vec![ip("192.168.1.1"), ip("192.168.1.2")]);
}

#[tokio::test]
async fn test_failed_insert_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = FlakyStore {
        inner: FileScanStore::new(dir.path()).unwrap(),
        failures: AtomicUsize::new(1),
    };
    let hosts: Vec<String> = (1..=6).map(|i| format!("10.0.0.{i}")).collect();
    let live: Vec<&str> = hosts.iter().map(String::as_str).collect();

    let summary = run_single_scan(
        &config(&["10.0.0.0/29"], 1),
        &NoInterfaces,
        &pipeline(probe_for(&live)),
        &store,
        Starter::Api,
    )
    .await
    .unwrap();

    assert_eq!(summary.batches, 6);
    assert_eq!(summary.failed_batches, 1);
    assert_eq!(summary.devices, 5);

    let stored = store.devices(summary.scan_id).unwrap();
    assert_eq!(stored.len(), 5);
    assert_eq!(stored[0].ip, ip("10.0.0.2"));
    assert!(store.get_scan(summary.scan_id).unwrap().is_finished());
}

#[tokio::test]
async fn test_config_fault_creates_no_scan_record() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileScanStore::new(dir.path()).unwrap();

    let result = run_single_scan(
        &config(&["10.0.0.0/30"], 0),
        &NoInterfaces,
        &pipeline(probe_for(&[])),
        &store,
        Starter::Manual,
    )
    .await;

    assert!(matches!(result, Err(DiscoverError::Config(_))));
    assert!(store.list_scans(&ScanQuery::default()).unwrap().is_empty());
}

#[tokio::test]
async fn test_probe_failure_still_finishes_scan() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileScanStore::new(dir.path()).unwrap();
    let probe = Arc::new(FakeProbe {
        fail: true,
        ..Default::default()
    });

    let result = run_single_scan(
        &config(&["10.0.0.0/30"], 300),
        &NoInterfaces,
        &pipeline(probe),
        &store,
        Starter::Manual,
    )
    .await;
    assert!(matches!(result, Err(DiscoverError::Probe(_))));

    let scans = store.list_scans(&ScanQuery::default()).unwrap();
    assert_eq!(scans.len(), 1);
    assert!(scans[0].is_finished());
}

#[tokio::test]
async fn test_scheduler_tags_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileScanStore::new(dir.path()).unwrap());
    let config = DiscoverConfig {
        schedule_interval_secs: 1,
        ..config(&["192.168.1.0/30"], 300)
    };

    ScanScheduler::new(
        config,
        pipeline(probe_for(&["192.168.1.1"])),
        store.clone(),
        Arc::new(NoInterfaces),
    )
    .with_max_runs(2)
    .run()
    .await
    .unwrap();

    let scans = store.list_scans(&ScanQuery::default()).unwrap();
    assert_eq!(scans.len(), 2);
    assert!(scans
        .iter()
        .all(|s| s.starter == Starter::Scheduler && s.is_finished()));
}
