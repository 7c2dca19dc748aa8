//! Scan runner and periodic scheduling.
//!
//! [`run_single_scan`] drives one discovery session to completion and
//! records it in the scan store. [`ScanScheduler`] repeats that on a
//! fixed interval.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use lanwatch_core::{ScanId, Starter};
use lanwatch_store::ScanStore;

use crate::config::DiscoverConfig;
use crate::error::Result;
use crate::persist::persist_batch;
use crate::session::{DiscoverySession, Pipeline};
use crate::targets::InterfaceSource;

/// Outcome of one completed scan run.
#[derive(Debug, Clone)]
pub struct ScanSummary {
    pub scan_id: ScanId,
    /// Batches the session produced.
    pub batches: usize,
    /// Devices successfully stored.
    pub devices: usize,
    /// Batches whose insert failed and was rolled back.
    pub failed_batches: usize,
    pub duration: std::time::Duration,
}

/// Run one scan: resolve targets → create scan record → drain batches → finish.
///
/// Configuration faults are returned before the scan record exists. A
/// failed batch insert is logged and skipped. The finish time is always
/// stamped once the record exists, even if probing fails partway.
pub async fn run_single_scan(
    config: &DiscoverConfig,
    interfaces: &dyn InterfaceSource,
    pipeline: &Pipeline,
    store: &dyn ScanStore,
    starter: Starter,
) -> Result<ScanSummary> {
    let started = Instant::now();
    let mut session = DiscoverySession::new(config, interfaces, pipeline.clone())?;

    let scan = store.create_scan(starter, Utc::now())?;
    tracing::info!(
        scan_id = %scan.id,
        starter = %starter,
        subnets = session.remaining_subnets(),
        "Scan started"
    );

    let mut summary = ScanSummary {
        scan_id: scan.id,
        batches: 0,
        devices: 0,
        failed_batches: 0,
        duration: Default::default(),
    };

    let drained = loop {
        match session.next_batch().await {
            Ok(Some(batch)) => {
                summary.batches += 1;
                if persist_batch(store, scan.id, &batch) {
                    summary.devices += batch.devices.len();
                } else {
                    summary.failed_batches += 1;
                }
            }
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };

    if let Err(e) = store.finish_scan(scan.id, Utc::now()) {
        tracing::error!(scan_id = %scan.id, error = %e, "Failed to stamp scan finish time");
    }
    summary.duration = started.elapsed();

    if let Err(e) = drained {
        tracing::error!(
            scan_id = %scan.id,
            batches = summary.batches,
            error = %e,
            "Scan aborted"
        );
        return Err(e);
    }

    tracing::info!(
        scan_id = %scan.id,
        batches = summary.batches,
        devices = summary.devices,
        failed_batches = summary.failed_batches,
        duration_ms = summary.duration.as_millis() as u64,
        "Scan complete"
    );

    Ok(summary)
}

/// Runs a scan every `schedule_interval_secs`, tagged [`Starter::Scheduler`].
pub struct ScanScheduler {
    config: DiscoverConfig,
    pipeline: Pipeline,
    store: Arc<dyn ScanStore>,
    interfaces: Arc<dyn InterfaceSource>,
    max_runs: Option<usize>,
}

impl ScanScheduler {
    pub fn new(
        config: DiscoverConfig,
        pipeline: Pipeline,
        store: Arc<dyn ScanStore>,
        interfaces: Arc<dyn InterfaceSource>,
    ) -> Self {
        Self {
            config,
            pipeline,
            store,
            interfaces,
            max_runs: None,
        }
    }

    /// Stop after `runs` ticks instead of running forever.
    pub fn with_max_runs(mut self, runs: usize) -> Self {
        self.max_runs = Some(runs);
        self
    }

    /// Tick, scan, repeat. The first scan starts immediately. A tick that
    /// falls due while a scan is still running is skipped, so scans never
    /// overlap. Failed scans are logged and the loop continues.
    pub async fn run(&self) -> Result<()> {
        self.config.validate()?;

        let period = Duration::from_secs(self.config.schedule_interval_secs);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_secs = period.as_secs(), "Scheduler started");

        let mut runs = 0usize;
        while self.max_runs.map_or(true, |max| runs < max) {
            ticker.tick().await;
            runs += 1;

            tracing::info!(run = runs, "Scheduled scan triggered");

            if let Err(e) = run_single_scan(
                &self.config,
                self.interfaces.as_ref(),
                &self.pipeline,
                self.store.as_ref(),
                Starter::Scheduler,
            )
            .await
            {
                tracing::error!(run = runs, error = %e, "Scheduled scan failed");
            }
        }

        tracing::info!(runs, "Scheduler stopped");
        Ok(())
    }
}
