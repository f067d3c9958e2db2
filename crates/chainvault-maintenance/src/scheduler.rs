//! `MaintenanceScheduler` (spec §4.13, §5): three periodic background tasks —
//! size monitoring, VACUUM/compaction, and off-chain cleanup — run on a small
//! dedicated thread pool so maintenance I/O never competes with request
//! threads.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chainvault_core::{
    MAINTENANCE_CLEANUP_INTERVAL_SECS, MAINTENANCE_CLEANUP_MAX_FILES, MAINTENANCE_POOL_THREADS,
    MAINTENANCE_SIZE_CRITICAL_FRACTION, MAINTENANCE_SIZE_MONITOR_INTERVAL_SECS,
    MAINTENANCE_SIZE_WARN_FRACTION, MAINTENANCE_VACUUM_INTERVAL_SECS,
    MAINTENANCE_VACUUM_MIN_INTERVAL_SECS, MAINTENANCE_VACUUM_TIMEOUT_SECS,
    OFF_CHAIN_COMPRESS_AGE_SECS,
};
use chainvault_offchain::{find_orphans, OffChainStore};
use chainvault_storage::LedgerDb;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Tunables an embedder may override; everything else in the scheduler's
/// behaviour (which tasks run, what they do) is fixed.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Soft capacity used to compute the size-monitor's warn/critical
    /// thresholds and the cleanup task's free-space guard.
    pub max_db_size_bytes: u64,
    pub size_monitor_interval: Duration,
    pub vacuum_interval: Duration,
    pub vacuum_min_interval: Duration,
    pub vacuum_timeout: Duration,
    pub cleanup_interval: Duration,
    pub cleanup_max_files: usize,
    pub off_chain_compress_age: Duration,
    /// Cleanup refuses to run below this much headroom under
    /// `max_db_size_bytes`.
    pub min_free_space_bytes: u64,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            max_db_size_bytes: 10 * 1024 * 1024 * 1024,
            size_monitor_interval: Duration::from_secs(MAINTENANCE_SIZE_MONITOR_INTERVAL_SECS),
            vacuum_interval: Duration::from_secs(MAINTENANCE_VACUUM_INTERVAL_SECS),
            vacuum_min_interval: Duration::from_secs(MAINTENANCE_VACUUM_MIN_INTERVAL_SECS),
            vacuum_timeout: Duration::from_secs(MAINTENANCE_VACUUM_TIMEOUT_SECS),
            cleanup_interval: Duration::from_secs(MAINTENANCE_CLEANUP_INTERVAL_SECS),
            cleanup_max_files: MAINTENANCE_CLEANUP_MAX_FILES,
            off_chain_compress_age: Duration::from_secs(OFF_CHAIN_COMPRESS_AGE_SECS as u64),
            min_free_space_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Runs the size monitor, VACUUM, and cleanup tasks on a dedicated
/// multi-thread runtime, independent of whatever runtime the rest of the
/// ledger runs on. Dropping the scheduler does not stop the tasks; call
/// [`Self::stop`] first.
pub struct MaintenanceScheduler {
    db: Arc<LedgerDb>,
    offchain: Arc<OffChainStore>,
    config: MaintenanceConfig,
    cancel: CancellationToken,
    last_vacuum_epoch_secs: Arc<AtomicI64>,
    runtime: tokio::runtime::Runtime,
}

impl MaintenanceScheduler {
    pub fn new(
        db: Arc<LedgerDb>,
        offchain: Arc<OffChainStore>,
        config: MaintenanceConfig,
    ) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(MAINTENANCE_POOL_THREADS)
            .thread_name("chainvault-maintenance")
            .enable_all()
            .build()?;
        Ok(Self {
            db,
            offchain,
            config,
            cancel: CancellationToken::new(),
            last_vacuum_epoch_secs: Arc::new(AtomicI64::new(0)),
            runtime,
        })
    }

    /// Starts all three periodic tasks. Returns immediately; each task keeps
    /// running on the dedicated pool until [`Self::stop`] is called.
    pub fn start(&self) {
        self.spawn_size_monitor();
        self.spawn_vacuum();
        self.spawn_cleanup();
        info!("maintenance scheduler started");
    }

    /// Signals every running task to stop at its next cancellation check.
    /// Does not block for them to finish.
    pub fn stop(&self) {
        self.cancel.cancel();
        info!("maintenance scheduler stop requested");
    }

    /// Runs VACUUM immediately, bypassing `vacuum_min_interval`.
    pub fn force_vacuum(&self) {
        let db = Arc::clone(&self.db);
        let last_vacuum = Arc::clone(&self.last_vacuum_epoch_secs);
        let timeout = self.config.vacuum_timeout;
        self.runtime.spawn(async move {
            run_vacuum(&db, &last_vacuum, timeout).await;
        });
    }

    fn spawn_size_monitor(&self) {
        let db = Arc::clone(&self.db);
        let cancel = self.cancel.clone();
        let interval = self.config.size_monitor_interval;
        let max_size = self.config.max_db_size_bytes;
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => check_size(&db, max_size),
                }
            }
        });
    }

    fn spawn_vacuum(&self) {
        let db = Arc::clone(&self.db);
        let cancel = self.cancel.clone();
        let interval = self.config.vacuum_interval;
        let min_interval = self.config.vacuum_min_interval;
        let timeout = self.config.vacuum_timeout;
        let last_vacuum = Arc::clone(&self.last_vacuum_epoch_secs);
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let elapsed = chrono::Utc::now().timestamp() - last_vacuum.load(Ordering::SeqCst);
                        if elapsed < min_interval.as_secs() as i64 {
                            info!(elapsed_secs = elapsed, "skipping scheduled VACUUM, below minimum interval");
                            continue;
                        }
                        run_vacuum(&db, &last_vacuum, timeout).await;
                    }
                }
            }
        });
    }

    fn spawn_cleanup(&self) {
        let db = Arc::clone(&self.db);
        let offchain = Arc::clone(&self.offchain);
        let cancel = self.cancel.clone();
        let interval = self.config.cleanup_interval;
        let max_files = self.config.cleanup_max_files;
        let compress_age = self.config.off_chain_compress_age;
        let min_free = self.config.min_free_space_bytes;
        let max_db_size = self.config.max_db_size_bytes;
        self.runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        run_cleanup(&db, &offchain, max_files, compress_age, min_free, max_db_size);
                    }
                }
            }
        });
    }
}

fn check_size(db: &LedgerDb, max_size: u64) {
    let size = match db.size_on_disk() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "size monitor failed to read database size");
            return;
        }
    };
    let fraction = size as f64 / max_size as f64;
    if fraction >= MAINTENANCE_SIZE_CRITICAL_FRACTION {
        error!(size_bytes = size, max_bytes = max_size, fraction, "database size critical");
    } else if fraction >= MAINTENANCE_SIZE_WARN_FRACTION {
        warn!(size_bytes = size, max_bytes = max_size, fraction, "database size warning");
    } else {
        info!(size_bytes = size, max_bytes = max_size, fraction, "size monitor check");
    }
}

async fn run_vacuum(db: &LedgerDb, last_vacuum: &AtomicI64, timeout: Duration) {
    let start = std::time::Instant::now();
    match tokio::time::timeout(timeout, async { db.flush() }).await {
        Ok(Ok(())) => {
            last_vacuum.store(chrono::Utc::now().timestamp(), Ordering::SeqCst);
            info!(elapsed_ms = start.elapsed().as_millis() as u64, "VACUUM completed");
        }
        Ok(Err(e)) => error!(error = %e, "VACUUM failed"),
        Err(_) => warn!(
            timeout_secs = timeout.as_secs(),
            "VACUUM exceeded its timeout; it was not interrupted and may still be running"
        ),
    }
}

fn run_cleanup(
    db: &LedgerDb,
    offchain: &OffChainStore,
    max_files: usize,
    compress_age: Duration,
    min_free_bytes: u64,
    max_db_size_bytes: u64,
) {
    let used = match db.size_on_disk() {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "cleanup failed to read database size");
            return;
        }
    };
    let headroom = max_db_size_bytes.saturating_sub(used);
    if headroom < min_free_bytes {
        warn!(headroom_bytes = headroom, min_free_bytes, "cleanup skipped: insufficient free-space headroom");
        return;
    }

    let live = match db.live_off_chain_hashes() {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "cleanup failed to read live off-chain index");
            return;
        }
    };
    let on_disk = match offchain.list_content_hashes() {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, "cleanup failed to list off-chain files");
            return;
        }
    };

    let orphans = find_orphans(&live, &on_disk);
    let mut removed = 0usize;
    for content_hash in orphans.iter().take(max_files) {
        match offchain.delete(content_hash) {
            Ok(()) => removed += 1,
            Err(e) => warn!(content_hash, error = %e, "failed to remove orphaned off-chain file"),
        }
    }
    if orphans.len() > max_files {
        warn!(
            dropped = orphans.len() - max_files,
            cap = max_files,
            "cleanup cycle hit the per-run orphan cap, remainder deferred to next cycle"
        );
    }

    let now = chrono::Utc::now();
    let mut compressed = 0usize;
    for content_hash in &on_disk {
        if !live.contains(content_hash) {
            continue;
        }
        if let Some(age) = offchain.age_secs(content_hash, now) {
            if age as u64 >= compress_age.as_secs() {
                match offchain.compress(content_hash) {
                    Ok(()) => compressed += 1,
                    Err(e) => warn!(content_hash, error = %e, "failed to compress aged off-chain file"),
                }
            }
        }
    }

    info!(removed, compressed, orphans_found = orphans.len(), "cleanup cycle complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainvault_storage::LedgerDb;

    fn scheduler(dir: &std::path::Path) -> MaintenanceScheduler {
        let db = Arc::new(LedgerDb::open(dir.join("db")).unwrap());
        let offchain = Arc::new(OffChainStore::new(dir.join("blobs")).unwrap());
        MaintenanceScheduler::new(db, offchain, MaintenanceConfig::default()).unwrap()
    }

    #[test]
    fn start_and_stop_is_idempotent_and_non_blocking() {
        let dir = tempfile::tempdir().unwrap();
        let sched = scheduler(dir.path());
        sched.start();
        sched.stop();
        sched.stop();
    }

    #[test]
    fn size_monitor_detects_critical_fraction() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path().join("db")).unwrap();
        let size = db.size_on_disk().unwrap();
        // A max size smaller than the current on-disk size forces fraction >= 1.0.
        check_size(&db, size.max(1) / 2 + 1);
    }

    #[test]
    fn cleanup_skips_when_headroom_below_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let db = LedgerDb::open(dir.path().join("db")).unwrap();
        let offchain = OffChainStore::new(dir.path().join("blobs")).unwrap();
        let used = db.size_on_disk().unwrap();
        // max_db_size_bytes == used leaves zero headroom, below any positive minimum.
        run_cleanup(&db, &offchain, 1000, Duration::from_secs(1), 1, used);
    }

    #[test]
    fn force_vacuum_runs_without_waiting_for_interval() {
        let dir = tempfile::tempdir().unwrap();
        let sched = scheduler(dir.path());
        sched.force_vacuum();
        sched.stop();
    }
}
