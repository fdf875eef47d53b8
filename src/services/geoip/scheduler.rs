//! Refresh scheduler
//!
//! Runs acquire -> load -> publish cycles on a fixed period and on demand.
//! A single-flight guard makes any trigger that arrives while a cycle is
//! running a no-op.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, info, warn};

use super::acquisition::AcquisitionOrchestrator;
use super::source::SourceKind;
use super::store::{DatasetHandle, HotSwapStore};
use crate::errors::{GeoIpError, Result};
use crate::utils::time_parser::format_interval;

/// tokio 的 interval 不接受零周期，过大的周期会让 Instant 溢出
const MIN_PERIOD: Duration = Duration::from_secs(1);
const MAX_PERIOD: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);
const IDLE_POLL: Duration = Duration::from_millis(10);

/// What started a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// No usable local database at startup
    Startup,
    /// Periodic timer
    Scheduled,
    /// SIGUSR1, CLI `update`, or an explicit `refresh_now` call
    Manual,
}

impl std::fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefreshTrigger::Startup => write!(f, "startup"),
            RefreshTrigger::Scheduled => write!(f, "scheduled"),
            RefreshTrigger::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new dataset from this source is now active
    Updated(SourceKind),
    /// Another cycle was already running, or the worker is closed
    Skipped,
}

/// Result of one finished refresh cycle
#[derive(Debug, Clone)]
pub struct RefreshResult {
    pub trigger: RefreshTrigger,
    pub success: bool,
    /// Source that delivered the dataset, on success
    pub source: Option<SourceKind>,
    /// Error message if failed
    pub message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RefreshResult {
    fn success(trigger: RefreshTrigger, source: SourceKind, started_at: DateTime<Utc>) -> Self {
        Self::finish(trigger, true, Some(source), None, started_at)
    }

    fn failure(trigger: RefreshTrigger, started_at: DateTime<Utc>, error: String) -> Self {
        Self::finish(trigger, false, None, Some(error), started_at)
    }

    fn finish(
        trigger: RefreshTrigger,
        success: bool,
        source: Option<SourceKind>,
        message: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            trigger,
            success,
            source,
            message,
            started_at,
            finished_at,
            duration_ms,
        }
    }
}

/// Current refresh system status
#[derive(Debug, Clone, Default)]
pub struct RefreshStatus {
    pub is_refreshing: bool,
    pub last_result: Option<RefreshResult>,
}

/// Clears the in-flight flag when the cycle ends, however it ends.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(Arc::clone(flag)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Executes refresh cycles against a store.
pub struct RefreshWorker {
    orchestrator: AcquisitionOrchestrator,
    store: Arc<HotSwapStore>,
    database_path: PathBuf,
    in_flight: Arc<AtomicBool>,
    closed: AtomicBool,
    status: RwLock<RefreshStatus>,
}

impl RefreshWorker {
    pub fn new(
        orchestrator: AcquisitionOrchestrator,
        store: Arc<HotSwapStore>,
        database_path: PathBuf,
    ) -> Self {
        Self {
            orchestrator,
            store,
            database_path,
            in_flight: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            status: RwLock::new(RefreshStatus::default()),
        }
    }

    pub fn status(&self) -> RefreshStatus {
        self.status
            .read()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    pub fn is_refreshing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Refuse new cycles and stop publishing. Idempotent.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the cycle currently on the blocking pool, if any, has
    /// released the in-flight guard.
    pub async fn wait_idle(&self) {
        if self.is_refreshing() {
            debug!("Waiting for in-flight GeoIP update to finish");
        }
        while self.is_refreshing() {
            tokio::time::sleep(IDLE_POLL).await;
        }
    }

    /// Run one cycle on the blocking pool unless one is already running.
    pub async fn refresh(self: &Arc<Self>, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
        if self.is_closed() {
            info!("GeoIP service is closed, ignoring {} trigger", trigger);
            return Ok(RefreshOutcome::Skipped);
        }

        let Some(guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            info!("GeoIP database update already in progress, skipping {} trigger", trigger);
            return Ok(RefreshOutcome::Skipped);
        };

        let worker = Arc::clone(self);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            worker.run_cycle(trigger)
        })
        .await?
    }

    /// Load the local dataset, or acquire one if it is missing or unusable.
    pub async fn warm_up(self: &Arc<Self>) -> Result<()> {
        if self.is_closed() {
            return Err(GeoIpError::Task("GeoIP service is closed".to_string()));
        }

        let worker = Arc::clone(self);
        tokio::task::spawn_blocking(move || worker.warm_up_blocking()).await?
    }

    fn warm_up_blocking(&self) -> Result<()> {
        let Some(_guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            return Err(GeoIpError::Task(
                "a refresh cycle is already running".to_string(),
            ));
        };

        match DatasetHandle::load(&self.database_path) {
            Ok(handle) => {
                self.publish_unless_closed(handle);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to load existing database: {}", e);
                info!("Downloading initial GeoIP database...");
                self.run_cycle(RefreshTrigger::Startup).map(|_| ())
            }
        }
    }

    /// acquire -> load -> publish. Caller must hold the in-flight guard.
    fn run_cycle(&self, trigger: RefreshTrigger) -> Result<RefreshOutcome> {
        info!("Starting {} GeoIP database update...", trigger);
        let started_at = Utc::now();
        self.set_refreshing(true);

        let result = self
            .orchestrator
            .acquire()
            .map_err(GeoIpError::from)
            .and_then(|source| {
                let handle = DatasetHandle::load(&self.database_path)?;
                Ok(self.publish_unless_closed(handle).then_some(source))
            });

        let record = match &result {
            Ok(Some(source)) => Some(RefreshResult::success(trigger, *source, started_at)),
            Ok(None) => None,
            Err(e) => Some(RefreshResult::failure(trigger, started_at, e.to_string())),
        };

        match (&result, &record) {
            (Ok(Some(source)), Some(record)) => info!(
                "{} GeoIP database update completed successfully from {} in {} ms",
                trigger, source, record.duration_ms
            ),
            (Err(e), _) => error!("{} GeoIP database update failed: {}", trigger, e),
            _ => {}
        }

        if let Ok(mut status) = self.status.write() {
            status.is_refreshing = false;
            if record.is_some() {
                status.last_result = record;
            }
        }

        result.map(|source| match source {
            Some(source) => RefreshOutcome::Updated(source),
            None => RefreshOutcome::Skipped,
        })
    }

    /// 关闭后不再发布；丢弃已加载的句柄
    fn publish_unless_closed(&self, handle: DatasetHandle) -> bool {
        if self.is_closed() {
            info!(
                "GeoIP service closed, discarding dataset loaded from {}",
                handle.path().display()
            );
            return false;
        }
        self.store.publish(handle);
        true
    }

    fn set_refreshing(&self, refreshing: bool) {
        if let Ok(mut status) = self.status.write() {
            status.is_refreshing = refreshing;
        }
    }
}

/// Owns the periodic background task.
pub struct RefreshScheduler {
    worker: Arc<RefreshWorker>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(worker: Arc<RefreshWorker>) -> Self {
        Self {
            worker,
            task: Mutex::new(None),
        }
    }

    /// Spawn the periodic task. The first tick fires one full `period` from now.
    /// Calling `start` again replaces the previous task.
    pub fn start(&self, period: Duration) {
        let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
        let worker = Arc::clone(&self.worker);

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match worker.refresh(RefreshTrigger::Scheduled).await {
                    Ok(RefreshOutcome::Updated(source)) => {
                        debug!("Scheduled update published dataset from {}", source);
                    }
                    Ok(RefreshOutcome::Skipped) => {}
                    // run_cycle has already logged acquisition/load failures
                    Err(GeoIpError::Task(e)) => {
                        error!("Scheduled GeoIP update task failed: {}", e);
                    }
                    Err(_) => {}
                }
            }
        });

        if let Ok(mut slot) = self.task.lock()
            && let Some(previous) = slot.replace(handle)
        {
            previous.abort();
        }

        info!(
            "Scheduled automatic database updates every {}",
            format_interval(period)
        );
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the periodic task. A cycle already on the blocking pool runs to
    /// completion but no further cycles are started.
    pub fn stop(&self) {
        if let Ok(mut slot) = self.task.lock()
            && let Some(handle) = slot.take()
        {
            handle.abort();
            info!("GeoIP update scheduler stopped");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
