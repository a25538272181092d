use crate::config::SchedulerConfig;
use crate::error::{AppError, AppResult};
use crate::models::RunResult;
use crate::repositories::PriceHistoryRepository;
use crate::services::engine::PricingEngine;
use chrono::{Local, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Name of the single recurring job
pub const JOB_NAME: &str = "auto_reprice";

/// Error recorded when a cycle is requested while another is in flight
pub const ALREADY_RUNNING: &str = "a repricing cycle is already running";

const DEFAULT_MAX_HISTORY: usize = 50;
const STATUS_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

/// When the recurring job fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Fixed delay between the end of one wait and the next
    Interval(Duration),
    /// Every day at a local wall-clock time
    DailyAt(NaiveTime),
}

impl Trigger {
    pub fn every(interval: Duration) -> AppResult<Self> {
        if interval.is_zero() {
            return Err(AppError::Validation("Scheduler interval must be greater than zero".to_string()));
        }
        Ok(Trigger::Interval(interval))
    }

    pub fn every_hours(hours: u32, minutes: u32) -> AppResult<Self> {
        Self::every(Duration::from_secs(u64::from(hours) * 3600 + u64::from(minutes) * 60))
    }

    pub fn daily_at(hour: u32, minute: u32) -> AppResult<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Trigger::DailyAt)
            .ok_or_else(|| AppError::Validation(format!("Invalid time of day {:02}:{:02}", hour, minute)))
    }

    /// Parse an `HH:MM` daily trigger
    pub fn parse_daily(raw: &str) -> AppResult<Self> {
        let (hour, minute) = raw
            .trim()
            .split_once(':')
            .ok_or_else(|| AppError::Validation(format!("Expected HH:MM, got '{}'", raw)))?;
        let hour: u32 = hour
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid hour in '{}'", raw)))?;
        let minute: u32 = minute
            .parse()
            .map_err(|_| AppError::Validation(format!("Invalid minute in '{}'", raw)))?;
        Self::daily_at(hour, minute)
    }

    /// A configured daily time takes precedence over the interval
    pub fn from_config(config: &SchedulerConfig) -> AppResult<Self> {
        match &config.daily_at {
            Some(at) => Self::parse_daily(at),
            None => Self::every_hours(config.interval_hours, config.interval_minutes),
        }
    }

    pub fn description(&self) -> String {
        match self {
            Trigger::Interval(interval) => {
                let secs = interval.as_secs();
                format!("{} every {}h{}m", JOB_NAME, secs / 3600, (secs % 3600) / 60)
            }
            Trigger::DailyAt(time) => {
                format!("{} daily at {:02}:{:02}", JOB_NAME, time.hour(), time.minute())
            }
        }
    }

    /// Next fire time after `now` and how long to wait for it
    pub fn next_after(&self, now: NaiveDateTime) -> (NaiveDateTime, Duration) {
        match self {
            Trigger::Interval(interval) => {
                let step = chrono::Duration::from_std(*interval).unwrap_or_else(|_| chrono::Duration::zero());
                (now + step, *interval)
            }
            Trigger::DailyAt(time) => {
                let mut next = now.date().and_time(*time);
                if next <= now {
                    next += chrono::Duration::days(1);
                }
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                (next, wait)
            }
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Snapshot returned by [`PriceScheduler::get_status`]
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub dry_run: bool,
    pub job_name: Option<String>,
    pub next_run: Option<String>,
    pub last_run: String,
    pub total_runs: u64,
    pub strategies: Vec<String>,
}

#[derive(Default)]
struct CycleState {
    history: RwLock<VecDeque<RunResult>>,
    total_runs: AtomicU64,
    cycle_lock: Mutex<()>,
}

/// Everything a cycle needs, cheap to hand to the background task
#[derive(Clone)]
struct CycleRunner {
    engine: Arc<PricingEngine>,
    journal: Option<Arc<PriceHistoryRepository>>,
    dry_run: bool,
    max_history: usize,
    state: Arc<CycleState>,
}

impl CycleRunner {
    /// Run one cycle; never fails, every outcome becomes a RunResult
    async fn execute(&self, cancel: Arc<AtomicBool>) -> RunResult {
        let started_at = now_local();

        let Ok(_guard) = self.state.cycle_lock.try_lock() else {
            warn!("Skipping repricing cycle: {}", ALREADY_RUNNING);
            let result = RunResult::failed(started_at, now_local(), self.dry_run, ALREADY_RUNNING);
            self.push(result.clone()).await;
            return result;
        };

        info!("--- Repricing cycle started (dry_run={}) ---", self.dry_run);

        let engine = Arc::clone(&self.engine);
        let dry_run = self.dry_run;
        let outcome = tokio::spawn(async move { engine.run_with_cancel(dry_run, &cancel).await }).await;
        let finished_at = now_local();

        let mut result = match outcome {
            Ok(Ok(actions)) => RunResult::completed(started_at, finished_at, dry_run, actions),
            Ok(Err(e)) => {
                error!("Repricing cycle failed: {}", e);
                RunResult::failed(started_at, finished_at, dry_run, e.to_string())
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    format!("cycle panicked: {}", panic_message(join_error.into_panic()))
                } else {
                    "cycle task was aborted".to_string()
                };
                error!("Repricing cycle crashed: {}", message);
                RunResult::failed(started_at, finished_at, dry_run, message)
            }
        };

        if let Some(journal) = &self.journal {
            if !result.actions.is_empty() {
                if let Err(e) = journal.record_many(&result.actions).await {
                    error!("Failed to journal {} price changes: {}", result.actions.len(), e);
                    result.journal_error = Some(e.to_string());
                }
            }
        }

        info!("--- Repricing cycle finished: {} ---", result);
        if !result.actions.is_empty() {
            info!("\n{}", PricingEngine::summary(&result.actions));
        }

        self.state.total_runs.fetch_add(1, Ordering::SeqCst);
        self.push(result.clone()).await;
        result
    }

    async fn push(&self, result: RunResult) {
        let mut history = self.state.history.write().await;
        while history.len() >= self.max_history {
            history.pop_front();
        }
        history.push_back(result);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "unknown panic".to_string()
}

/// Background task driving one trigger
struct Job {
    trigger: Trigger,
    stopped: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    wake: Arc<Notify>,
    next_run: Arc<RwLock<Option<NaiveDateTime>>>,
    _handle: JoinHandle<()>,
}

impl Job {
    fn spawn(runner: CycleRunner, trigger: Trigger) -> Self {
        let stopped = Arc::new(AtomicBool::new(false));
        let cancel = Arc::new(AtomicBool::new(false));
        let wake = Arc::new(Notify::new());
        let next_run = Arc::new(RwLock::new(None));

        let handle = tokio::spawn(job_loop(
            runner,
            trigger,
            Arc::clone(&stopped),
            Arc::clone(&cancel),
            Arc::clone(&wake),
            Arc::clone(&next_run),
        ));

        Self {
            trigger,
            stopped,
            cancel,
            wake,
            next_run,
            _handle: handle,
        }
    }

    /// Signal the loop to exit without waiting for it
    fn retire(self, cancel_in_flight: bool) {
        self.stopped.store(true, Ordering::SeqCst);
        if cancel_in_flight {
            self.cancel.store(true, Ordering::SeqCst);
        }
        self.wake.notify_one();
    }
}

async fn job_loop(
    runner: CycleRunner,
    trigger: Trigger,
    stopped: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    wake: Arc<Notify>,
    next_run: Arc<RwLock<Option<NaiveDateTime>>>,
) {
    info!("Scheduled {}", trigger);

    while !stopped.load(Ordering::SeqCst) {
        let (next, wait) = trigger.next_after(now_local());
        *next_run.write().await = Some(next);

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = wake.notified() => {}
        }

        if stopped.load(Ordering::SeqCst) {
            break;
        }
        runner.execute(Arc::clone(&cancel)).await;
    }

    *next_run.write().await = None;
    debug!("{} loop exited", trigger);
}

/// Stateful wrapper around one engine and one dry-run flag
///
/// At most one recurring job exists; cycles from the job and from
/// [`run_now`](Self::run_now) are serialised, a cycle requested while another
/// is in flight is recorded as failed instead of running twice.
pub struct PriceScheduler {
    runner: CycleRunner,
    trigger: Mutex<Option<Trigger>>,
    job: Mutex<Option<Job>>,
    running: AtomicBool,
}

impl PriceScheduler {
    pub fn new(engine: Arc<PricingEngine>, dry_run: bool) -> Self {
        Self {
            runner: CycleRunner {
                engine,
                journal: None,
                dry_run,
                max_history: DEFAULT_MAX_HISTORY,
                state: Arc::new(CycleState::default()),
            },
            trigger: Mutex::new(None),
            job: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    /// Build from configuration: trigger, dry-run flag and history size
    pub fn from_config(engine: Arc<PricingEngine>, config: &SchedulerConfig) -> AppResult<Self> {
        let trigger = Trigger::from_config(config)?;
        Ok(Self::new(engine, config.dry_run)
            .with_trigger(trigger)
            .with_max_history(config.max_history))
    }

    /// Journal every cycle's actions
    pub fn with_journal(mut self, journal: Arc<PriceHistoryRepository>) -> Self {
        self.runner.journal = Some(journal);
        self
    }

    pub fn with_max_history(mut self, max_history: usize) -> Self {
        self.runner.max_history = max_history.max(1);
        self
    }

    pub fn with_trigger(mut self, trigger: Trigger) -> Self {
        self.trigger = Mutex::new(Some(trigger));
        self
    }

    pub fn dry_run(&self) -> bool {
        self.runner.dry_run
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Replace the recurring job's trigger
    ///
    /// A running scheduler swaps its job immediately; an in-flight cycle of
    /// the old job is allowed to finish.
    pub async fn set_trigger(&self, trigger: Trigger) {
        let mut slot = self.job.lock().await;
        *self.trigger.lock().await = Some(trigger);

        if self.is_running() {
            if let Some(previous) = slot.replace(Job::spawn(self.runner.clone(), trigger)) {
                previous.retire(false);
            }
            info!("Rescheduled: {}", trigger);
        }
    }

    /// Start the recurring job
    pub async fn start(&self) -> AppResult<()> {
        // Flag and job change together under the job lock
        let mut slot = self.job.lock().await;
        if self.is_running() {
            warn!("Scheduler already running");
            return Ok(());
        }

        let Some(trigger) = *self.trigger.lock().await else {
            return Err(AppError::Config("No schedule configured".to_string()));
        };

        if let Some(previous) = slot.replace(Job::spawn(self.runner.clone(), trigger)) {
            previous.retire(false);
        }
        self.running.store(true, Ordering::SeqCst);
        info!("Scheduler started: {} (dry_run={})", trigger, self.runner.dry_run);
        Ok(())
    }

    /// Stop the recurring job without waiting for an in-flight cycle
    pub async fn stop(&self) {
        let mut slot = self.job.lock().await;
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Scheduler not running");
            return;
        }

        if let Some(previous) = slot.take() {
            previous.retire(true);
        }
        info!("Scheduler stopped");
    }

    /// Run one cycle right now, outside the schedule
    pub async fn run_now(&self) -> RunResult {
        info!("Manual repricing run (dry_run={})", self.runner.dry_run);
        self.runner.execute(Arc::new(AtomicBool::new(false))).await
    }

    pub async fn get_status(&self) -> SchedulerStatus {
        let running = self.is_running();

        let (job_name, next_run) = if running {
            match &*self.job.lock().await {
                Some(job) => (
                    Some(job.trigger.description()),
                    (*job.next_run.read().await).map(|at| at.format(STATUS_TIME_FORMAT).to_string()),
                ),
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let last_run = self
            .runner
            .state
            .history
            .read()
            .await
            .back()
            .map(|result| result.to_string())
            .unwrap_or_else(|| "never run".to_string());

        SchedulerStatus {
            running,
            dry_run: self.runner.dry_run,
            job_name,
            next_run,
            last_run,
            total_runs: self.runner.state.total_runs.load(Ordering::SeqCst),
            strategies: self.runner.engine.strategy_names(),
        }
    }

    /// The last `n` results, oldest first
    pub async fn get_history(&self, n: usize) -> Vec<RunResult> {
        let history = self.runner.state.history.read().await;
        let skip = history.len().saturating_sub(n);
        history.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriceUpdate, ProductItem, SaleRecord};
    use crate::providers::{AnalyticsProvider, PriceWriter, ProductsProvider, StockProvider};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_trigger_descriptions() {
        assert_eq!(Trigger::every_hours(4, 0).unwrap().description(), "auto_reprice every 4h0m");
        assert_eq!(Trigger::every_hours(1, 30).unwrap().description(), "auto_reprice every 1h30m");
        assert_eq!(Trigger::daily_at(2, 0).unwrap().description(), "auto_reprice daily at 02:00");
    }

    #[test]
    fn test_trigger_validation() {
        assert!(Trigger::every_hours(0, 0).is_err());
        assert!(Trigger::daily_at(24, 0).is_err());
        assert!(Trigger::parse_daily("2am").is_err());
        assert_eq!(Trigger::parse_daily(" 07:45 ").unwrap(), Trigger::daily_at(7, 45).unwrap());
    }

    #[test]
    fn test_daily_next_fire_rolls_over() {
        let trigger = Trigger::daily_at(2, 0).unwrap();

        let (next, wait) = trigger.next_after(at(1, 0));
        assert_eq!(next, at(2, 0));
        assert_eq!(wait, Duration::from_secs(3600));

        // Exactly at the fire time means tomorrow
        let (next, _) = trigger.next_after(at(2, 0));
        assert_eq!(next, at(2, 0) + chrono::Duration::days(1));
    }

    #[test]
    fn test_interval_next_fire() {
        let trigger = Trigger::every_hours(4, 0).unwrap();
        let (next, wait) = trigger.next_after(at(10, 0));
        assert_eq!(next, at(14, 0));
        assert_eq!(wait, Duration::from_secs(4 * 3600));
    }

    #[test]
    fn test_from_config_prefers_daily_time() {
        let config = SchedulerConfig {
            daily_at: Some("03:15".to_string()),
            ..SchedulerConfig::default()
        };
        assert_eq!(Trigger::from_config(&config).unwrap(), Trigger::daily_at(3, 15).unwrap());

        let config = SchedulerConfig::default();
        assert_eq!(Trigger::from_config(&config).unwrap(), Trigger::every_hours(4, 0).unwrap());
    }

    /// Marketplace with an empty catalog
    struct Idle;

    #[async_trait]
    impl ProductsProvider for Idle {
        async fn get_priced_items(&self, _limit: usize) -> AppResult<Vec<ProductItem>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl StockProvider for Idle {
        async fn get_marketplace_stock(&self) -> AppResult<HashMap<i64, i64>> {
            Ok(HashMap::new())
        }

        async fn get_seller_stock(&self) -> AppResult<HashMap<i64, i64>> {
            Ok(HashMap::new())
        }
    }

    #[async_trait]
    impl AnalyticsProvider for Idle {
        async fn get_avg_daily_orders(&self, _item_ids: &[i64], _window_days: u32) -> AppResult<HashMap<i64, f64>> {
            Ok(HashMap::new())
        }

        async fn get_raw_sales(&self, _date_from: NaiveDate) -> AppResult<Vec<SaleRecord>> {
            Ok(Vec::new())
        }
    }

    #[async_trait]
    impl PriceWriter for Idle {
        async fn submit_batch(&self, _updates: &[PriceUpdate]) -> AppResult<Option<String>> {
            Ok(None)
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_start_and_stop_keep_flag_and_job_in_step() {
        let engine = PricingEngine::new(Arc::new(Idle), Arc::new(Idle), Arc::new(Idle), Arc::new(Idle), Vec::new());
        let scheduler = Arc::new(
            PriceScheduler::new(Arc::new(engine), true).with_trigger(Trigger::every_hours(1, 0).unwrap()),
        );

        for _ in 0..50 {
            let starter = Arc::clone(&scheduler);
            let stopper = Arc::clone(&scheduler);
            let _ = tokio::join!(
                tokio::spawn(async move { starter.start().await }),
                tokio::spawn(async move { stopper.stop().await }),
            );
            assert_eq!(scheduler.is_running(), scheduler.job.lock().await.is_some());
        }

        scheduler.stop().await;
        assert!(scheduler.job.lock().await.is_none());
    }
}
