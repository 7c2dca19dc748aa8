//! Batch persistence: hand each discovery batch to the scan store.

use lanwatch_core::ScanId;
use lanwatch_store::ScanStore;

use crate::session::DiscoveryBatch;

/// Insert one batch of devices under `scan_id`.
///
/// A failed insert has already been rolled back by the store; it is
/// logged here and reported as `false` so the run can move on to the
/// next batch.
pub fn persist_batch(store: &dyn ScanStore, scan_id: ScanId, batch: &DiscoveryBatch) -> bool {
    if batch.devices.is_empty() {
        return true;
    }

    match store.insert_devices(scan_id, &batch.devices) {
        Ok(()) => {
            tracing::debug!(
                scan_id = %scan_id,
                subnet = %batch.subnet,
                devices = batch.devices.len(),
                "Batch stored"
            );
            true
        }
        Err(e) => {
            tracing::error!(
                scan_id = %scan_id,
                subnet = %batch.subnet,
                devices = batch.devices.len(),
                error = %e,
                "Failed to store batch, continuing with next"
            );
            false
        }
    }
}
