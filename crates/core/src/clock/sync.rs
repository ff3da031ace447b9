//! Periodic clock synchronisation feeding the scheduler.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::metrics::{CLOCK_OFFSET_MS, CLOCK_SYNC_FAILURES};
use crate::scheduler::Scheduler;

use super::{ClockError, ClockOffsetSource};

/// Last successful sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockReading {
    /// Authority time minus local time.
    pub offset_ms: i64,
    pub synced_at: DateTime<Utc>,
}

/// Keeps the scheduler's offset in line with the time authority.
///
/// Sale times are on the authority clock, so a local clock that is behind by
/// `d` must fire `d` earlier: the scheduler shift is the negated authority
/// offset. A failed sync keeps the previous offset.
pub struct ClockSync {
    source: Arc<dyn ClockOffsetSource>,
    scheduler: Arc<Scheduler>,
    interval: StdDuration,
    last: Arc<RwLock<Option<ClockReading>>>,
    failures: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ClockSync {
    pub fn new(
        source: Arc<dyn ClockOffsetSource>,
        scheduler: Arc<Scheduler>,
        interval: StdDuration,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            source,
            scheduler,
            interval,
            last: Arc::new(RwLock::new(None)),
            failures: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    /// Sync once now and apply the result.
    pub async fn sync_once(&self) -> Result<Duration, ClockError> {
        Self::apply(
            self.source.as_ref(),
            &self.scheduler,
            &self.last,
            &self.failures,
        )
        .await
    }

    async fn apply(
        source: &dyn ClockOffsetSource,
        scheduler: &Scheduler,
        last: &RwLock<Option<ClockReading>>,
        failures: &AtomicU64,
    ) -> Result<Duration, ClockError> {
        match source.sync().await {
            Ok(offset) => {
                scheduler.set_global_offset(-offset).await;
                *last.write().await = Some(ClockReading {
                    offset_ms: offset.num_milliseconds(),
                    synced_at: Utc::now(),
                });
                CLOCK_OFFSET_MS.set(offset.num_milliseconds());
                debug!(
                    source = source.name(),
                    offset_ms = offset.num_milliseconds(),
                    "Clock synced"
                );
                Ok(offset)
            }
            Err(e) => {
                failures.fetch_add(1, Ordering::Relaxed);
                CLOCK_SYNC_FAILURES.inc();
                warn!(source = source.name(), error = %e, "Clock sync failed, keeping previous offset");
                Err(e)
            }
        }
    }

    /// Spawn the sync loop: one sync immediately, then one per interval.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Clock sync already running");
            return;
        }

        let source = Arc::clone(&self.source);
        let scheduler = Arc::clone(&self.scheduler);
        let last = Arc::clone(&self.last);
        let failures = Arc::clone(&self.failures);
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Clock sync loop started");
            let _ = Self::apply(source.as_ref(), &scheduler, &last, &failures).await;
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Clock sync loop received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        let _ = Self::apply(source.as_ref(), &scheduler, &last, &failures).await;
                    }
                }
            }
            info!("Clock sync loop stopped");
        });
    }

    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub async fn reading(&self) -> Option<ClockReading> {
        *self.last.read().await
    }

    pub async fn last_offset(&self) -> Option<Duration> {
        self.reading()
            .await
            .map(|r| Duration::milliseconds(r.offset_ms))
    }

    pub async fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.reading().await.map(|r| r.synced_at)
    }

    /// Failed syncs since creation.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
