//! Sync scheduler for periodic congress.gov synchronization
//!
//! This module provides a scheduler that triggers a sync run after an
//! initial delay and then on a fixed interval with optional jitter.
//! Runs are spawned so the scheduler keeps answering manual triggers and
//! shutdown while a run is in flight. Shutdown stops the timer; runs already
//! started are awaited, never cancelled.

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::models::{SyncOutcome, SyncReport};
use crate::sync::orchestrator::SyncOrchestrator;
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Configuration for the sync scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Initial delay before first sync (seconds) - for startup load distribution
    pub initial_delay_secs: u64,
    /// Jitter range (seconds) - randomization added to each interval
    pub jitter_secs: u64,
    /// Seconds between scheduled runs
    pub interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SchedulerConfig {
    fn from(config: &SyncConfig) -> Self {
        Self {
            initial_delay_secs: config.initial_delay_secs,
            jitter_secs: config.jitter_secs,
            interval_secs: config.interval_secs,
        }
    }
}

impl SchedulerConfig {
    fn jitter(&self) -> Duration {
        if self.jitter_secs > 0 {
            Duration::from_secs(rand::thread_rng().gen_range(0..self.jitter_secs))
        } else {
            Duration::ZERO
        }
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Scheduler bookkeeping
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerStatus {
    /// Report of the latest completed run
    pub last_report: Option<SyncReport>,
    /// Runs that completed
    pub runs_completed: u64,
    /// Triggers rejected because a run was in progress
    pub runs_skipped: u64,
}

/// Anything the scheduler can run
#[async_trait]
pub trait Syncable: Send + Sync {
    /// Perform one sync run
    async fn sync(&self) -> SyncOutcome;
}

#[async_trait]
impl Syncable for SyncOrchestrator {
    async fn sync(&self) -> SyncOutcome {
        self.run().await
    }
}

/// Manual sync request
struct ManualSyncRequest {
    response: oneshot::Sender<SyncOutcome>,
}

/// Periodic sync scheduler
pub struct SyncScheduler {
    config: SchedulerConfig,
    source: Arc<dyn Syncable>,
    status: Arc<RwLock<SchedulerStatus>>,
    shutdown_rx: broadcast::Receiver<()>,
    manual_sync_rx: mpsc::Receiver<ManualSyncRequest>,
    manual_sync_tx: mpsc::Sender<ManualSyncRequest>,
}

impl SyncScheduler {
    /// Create a new sync scheduler
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduler configuration
    /// * `source` - The sync to run
    /// * `shutdown_rx` - Broadcast receiver for shutdown signal
    pub fn new(
        config: SchedulerConfig,
        source: Arc<dyn Syncable>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        let (manual_sync_tx, manual_sync_rx) = mpsc::channel(32);

        Self {
            config,
            source,
            status: Arc::new(RwLock::new(SchedulerStatus::default())),
            shutdown_rx,
            manual_sync_rx,
            manual_sync_tx,
        }
    }

    /// Get a handle for triggering manual syncs
    pub fn manual_sync_handle(&self) -> ManualSyncHandle {
        ManualSyncHandle {
            tx: self.manual_sync_tx.clone(),
        }
    }

    /// Shared view of the scheduler status
    pub fn status(&self) -> Arc<RwLock<SchedulerStatus>> {
        self.status.clone()
    }

    /// Run the scheduler until shutdown is signaled
    pub async fn run(mut self) {
        info!(
            interval_secs = self.config.interval_secs,
            initial_delay_secs = self.config.initial_delay_secs,
            "Starting sync scheduler"
        );

        let first = Instant::now() + Duration::from_secs(self.config.initial_delay_secs);
        let timer = tokio::time::sleep_until(first);
        tokio::pin!(timer);

        let mut in_flight: Vec<JoinHandle<()>> = Vec::new();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping sync scheduler");
                    break;
                }
                () = &mut timer => {
                    info!("Performing scheduled sync");
                    in_flight.retain(|h| !h.is_finished());
                    in_flight.push(self.spawn_sync(None));

                    let next = self.config.interval() + self.config.jitter();
                    debug!(next_in_secs = next.as_secs(), "Scheduled next sync");
                    timer.as_mut().reset(Instant::now() + next);
                }
                Some(request) = self.manual_sync_rx.recv() => {
                    info!("Manual sync triggered");
                    in_flight.retain(|h| !h.is_finished());
                    in_flight.push(self.spawn_sync(Some(request.response)));
                }
            }
        }

        if !in_flight.is_empty() {
            info!(
                runs = in_flight.len(),
                "Waiting for in-flight sync to finish"
            );
        }
        for handle in in_flight {
            let _ = handle.await;
        }

        info!("Sync scheduler stopped");
    }

    fn spawn_sync(&self, response: Option<oneshot::Sender<SyncOutcome>>) -> JoinHandle<()> {
        let source = self.source.clone();
        let status = self.status.clone();

        tokio::spawn(async move {
            let outcome = source.sync().await;

            {
                let mut status = status.write().await;
                match &outcome {
                    SyncOutcome::Completed(report) => {
                        status.runs_completed += 1;
                        status.last_report = Some(report.clone());
                    }
                    SyncOutcome::AlreadyRunning => status.runs_skipped += 1,
                }
            }

            match &outcome {
                SyncOutcome::Completed(report) if report.success => {
                    info!(errors = report.errors.len(), "Sync completed");
                }
                SyncOutcome::Completed(report) => {
                    warn!(
                        aborted = report.aborted,
                        stalled = report.stalled,
                        errors = report.errors.len(),
                        "Sync finished with failures"
                    );
                }
                SyncOutcome::AlreadyRunning => {
                    debug!("Sync skipped, a run is already in progress");
                }
            }

            if let Some(tx) = response {
                let _ = tx.send(outcome);
            }
        })
    }
}

/// Handle for triggering manual syncs
#[derive(Clone)]
pub struct ManualSyncHandle {
    tx: mpsc::Sender<ManualSyncRequest>,
}

impl ManualSyncHandle {
    /// Trigger a sync and wait for its outcome
    ///
    /// Returns [`SyncOutcome::AlreadyRunning`] when a run is active; the
    /// request is not queued.
    pub async fn trigger_sync(&self) -> Result<SyncOutcome, SyncError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.tx
            .send(ManualSyncRequest {
                response: response_tx,
            })
            .await
            .map_err(|_| SyncError::Network("Scheduler not running".to_string()))?;

        response_rx
            .await
            .map_err(|_| SyncError::Network("No response from scheduler".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncStats;
    use chrono::Utc;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    /// Test implementation of `Syncable` that counts runs and rejects
    /// overlapping ones the way the orchestrator does.
    struct TestSource {
        sync_count: Arc<AtomicU32>,
        running: AtomicBool,
        delay: Duration,
    }

    impl TestSource {
        fn new(delay_secs: u64) -> Self {
            Self {
                sync_count: Arc::new(AtomicU32::new(0)),
                running: AtomicBool::new(false),
                delay: Duration::from_secs(delay_secs),
            }
        }

        fn sync_count(&self) -> Arc<AtomicU32> {
            self.sync_count.clone()
        }
    }

    #[async_trait]
    impl Syncable for TestSource {
        async fn sync(&self) -> SyncOutcome {
            if self
                .running
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return SyncOutcome::AlreadyRunning;
            }
            let started_at = Utc::now();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.sync_count.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::Release);

            SyncOutcome::Completed(SyncReport {
                success: true,
                aborted: false,
                stalled: false,
                started_at,
                finished_at: Utc::now(),
                stats: SyncStats::default(),
                errors: Vec::new(),
            })
        }
    }

    fn config(initial_delay_secs: u64, interval_secs: u64) -> SchedulerConfig {
        SchedulerConfig {
            initial_delay_secs,
            jitter_secs: 0,
            interval_secs,
        }
    }

    // Test 1: first run waits for the initial delay
    #[tokio::test(start_paused = true)]
    async fn test_initial_delay() {
        let source = TestSource::new(0);
        let sync_count = source.sync_count();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let scheduler = SyncScheduler::new(config(5, 3600), Arc::new(source), shutdown_rx);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(sync_count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(sync_count.load(Ordering::SeqCst), 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    // Test 2: runs repeat on the interval
    #[tokio::test(start_paused = true)]
    async fn test_sync_interval() {
        let source = TestSource::new(0);
        let sync_count = source.sync_count();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let scheduler = SyncScheduler::new(config(0, 100), Arc::new(source), shutdown_rx);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sync_count.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(sync_count.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(sync_count.load(Ordering::SeqCst), 3);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    // Test 3: shutdown stops the timer
    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timer() {
        let source = TestSource::new(0);
        let sync_count = source.sync_count();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let scheduler = SyncScheduler::new(config(0, 10), Arc::new(source), shutdown_rx);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sync_count.load(Ordering::SeqCst), 1);
    }

    // Test 4: shutdown waits for the in-flight run instead of cancelling it
    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_run() {
        let source = TestSource::new(30);
        let sync_count = source.sync_count();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let scheduler = SyncScheduler::new(config(0, 3600), Arc::new(source), shutdown_rx);
        let handle = tokio::spawn(scheduler.run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(()).unwrap();

        let started = Instant::now();
        handle.await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(29));
        assert_eq!(sync_count.load(Ordering::SeqCst), 1);
    }

    // Test 5: manual trigger returns the report; an overlapping trigger is rejected
    #[tokio::test(start_paused = true)]
    async fn test_manual_trigger_and_overlap() {
        let source = TestSource::new(10);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let scheduler = SyncScheduler::new(config(3600, 3600), Arc::new(source), shutdown_rx);
        let handle = scheduler.manual_sync_handle();
        let status = scheduler.status();
        let task = tokio::spawn(scheduler.run());

        let first = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.trigger_sync().await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;

        let second = handle.trigger_sync().await.unwrap();
        assert_eq!(second, SyncOutcome::AlreadyRunning);

        let first = first.await.unwrap().unwrap();
        assert!(first.report().unwrap().success);

        let status = status.read().await.clone();
        assert_eq!(status.runs_completed, 1);
        assert_eq!(status.runs_skipped, 1);
        assert!(status.last_report.is_some());

        shutdown_tx.send(()).unwrap();
        task.await.unwrap();
    }

    // Test 6: triggering a stopped scheduler is an error
    #[tokio::test]
    async fn test_trigger_after_shutdown_fails() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let scheduler =
            SyncScheduler::new(config(3600, 3600), Arc::new(TestSource::new(0)), shutdown_rx);
        let handle = scheduler.manual_sync_handle();

        let task = tokio::spawn(scheduler.run());
        shutdown_tx.send(()).unwrap();
        task.await.unwrap();

        let result = handle.trigger_sync().await;
        assert!(matches!(result, Err(SyncError::Network(_))));
    }

    #[test]
    fn test_scheduler_config_from_sync_config() {
        let sync = SyncConfig {
            interval_secs: 600,
            initial_delay_secs: 2,
            jitter_secs: 30,
            ..SyncConfig::default()
        };
        let config = SchedulerConfig::from(&sync);
        assert_eq!(config.interval_secs, 600);
        assert_eq!(config.initial_delay_secs, 2);
        assert_eq!(config.jitter_secs, 30);
        assert_eq!(config.interval(), Duration::from_secs(600));
        assert!(config.jitter() < Duration::from_secs(30));
    }
}
