//! Periodic reset of completed recurring items.
//!
//! One driver task wakes on a fixed interval, loads every completed item that
//! references a schedule, and flips the ones whose next boundary has passed
//! back to incomplete. A tick that reset anything publishes a single
//! aggregate `task_reset` notification.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{RecurrenceEvaluator, SchedulerError};
use crate::database::TaskStore;
use crate::domain::ResetCandidate;
use crate::events::{EventPublisher, Notification, ResetEvent};
use crate::logging::OpTimer;

/// Default tick cadence.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Driver lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// No driver task is running.
    Stopped,
    /// The periodic driver is ticking.
    Running,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Candidates loaded from the store.
    pub candidates: usize,
    /// Items flipped back to incomplete.
    pub reset: usize,
    /// Items skipped because their schedule could not be evaluated.
    pub invalid: usize,
    /// Items that qualified but could not be written.
    pub write_failures: usize,
    /// Whether a `task_reset` notification was published.
    pub published: bool,
}

/// The per-tick work, shared between the scheduler and its driver task.
#[derive(Debug)]
struct ResetWorker {
    store: Arc<dyn TaskStore>,
    publisher: Option<Arc<dyn EventPublisher>>,
    evaluator: RecurrenceEvaluator,
    /// Held for a whole tick so manual and periodic ticks never overlap.
    tick_lock: Mutex<()>,
}

impl ResetWorker {
    async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        let _tick = self.tick_lock.lock().await;

        let candidates = self
            .store
            .load_resettable_candidates()
            .await
            .map_err(SchedulerError::LoadCandidates)?;

        let mut report = TickReport {
            candidates: candidates.len(),
            ..TickReport::default()
        };
        let mut item_ids = Vec::new();
        let mut schedule_names = BTreeSet::new();

        for ResetCandidate { item, schedule } in candidates {
            if !item.is_reset_candidate() {
                continue;
            }

            match self.evaluator.should_reset(
                &schedule.expression,
                &schedule.timezone,
                item.last_modified,
                now,
            ) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::warn!(
                        item_id = %item.id,
                        schedule = %schedule.name,
                        error = %e,
                        "Skipping item with unusable schedule"
                    );
                    report.invalid += 1;
                    continue;
                }
            }

            match self.store.mark_incomplete(&item.id, now).await {
                Ok(()) => {
                    tracing::debug!(
                        item_id = %item.id,
                        schedule = %schedule.name,
                        "Item reset"
                    );
                    item_ids.push(item.id);
                    schedule_names.insert(schedule.name);
                }
                Err(e) => {
                    tracing::error!(
                        item_id = %item.id,
                        schedule = %schedule.name,
                        error = %format!("{e:#}"),
                        "Failed to reset item"
                    );
                    report.write_failures += 1;
                }
            }
        }

        report.reset = item_ids.len();
        if item_ids.is_empty() {
            return Ok(report);
        }

        tracing::info!(
            reset = report.reset,
            schedules = schedule_names.len(),
            "Recurring items reset"
        );

        if let Some(publisher) = &self.publisher {
            let event = ResetEvent {
                reset_count: item_ids.len(),
                item_ids,
                schedule_names: schedule_names.into_iter().collect(),
                occurred_at: now,
            };
            publisher.publish(Notification::task_reset(&event)).await;
            report.published = true;
        }

        Ok(report)
    }
}

#[derive(Debug)]
struct Driver {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Recurrence reset scheduler.
///
/// `tick`/`tick_at` can be driven by hand; `start` spawns the periodic driver.
#[derive(Debug)]
pub struct ResetScheduler {
    worker: Arc<ResetWorker>,
    interval: Duration,
    driver: Mutex<Option<Driver>>,
}

impl ResetScheduler {
    /// Create a stopped scheduler. `publisher: None` disables notifications.
    #[must_use]
    pub fn new(store: Arc<dyn TaskStore>, publisher: Option<Arc<dyn EventPublisher>>) -> Self {
        Self {
            worker: Arc::new(ResetWorker {
                store,
                publisher,
                evaluator: RecurrenceEvaluator::new(),
                tick_lock: Mutex::new(()),
            }),
            interval: DEFAULT_TICK_INTERVAL,
            driver: Mutex::new(None),
        }
    }

    /// Override the tick cadence.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Tick cadence.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The parsed-expression cache, for invalidation after schedule edits.
    pub fn evaluator(&self) -> &RecurrenceEvaluator {
        &self.worker.evaluator
    }

    /// Run one tick against the current time.
    pub async fn tick(&self) -> Result<TickReport, SchedulerError> {
        self.tick_at(Utc::now()).await
    }

    /// Run one tick with an explicit `now`; every reset in the tick uses it.
    ///
    /// Waits for a tick already in progress (manual or periodic) to finish,
    /// then loads a fresh candidate set.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::LoadCandidates`] if the candidate set could
    /// not be loaded. Per-item evaluation and write failures are logged and
    /// counted in the report instead.
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickReport, SchedulerError> {
        self.worker.tick_at(now).await
    }

    /// Spawn the periodic driver. The first tick fires immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the driver is running.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut driver = self.driver.lock().await;
        if driver.as_ref().is_some_and(|d| !d.handle.is_finished()) {
            return Err(SchedulerError::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive(
            Arc::clone(&self.worker),
            self.interval,
            cancel.clone(),
        ));
        *driver = Some(Driver { cancel, handle });

        tracing::info!(
            interval_secs = self.interval.as_secs_f64(),
            "Reset scheduler started"
        );
        Ok(())
    }

    /// Stop the driver, letting an in-flight tick finish first. No-op when stopped.
    pub async fn stop(&self) {
        let Some(driver) = self.driver.lock().await.take() else {
            return;
        };

        driver.cancel.cancel();
        if let Err(e) = driver.handle.await {
            tracing::error!(error = %e, "Reset scheduler driver ended abnormally");
        }
        tracing::info!("Reset scheduler stopped");
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> SchedulerState {
        match self.driver.lock().await.as_ref() {
            Some(driver) if !driver.handle.is_finished() => SchedulerState::Running,
            _ => SchedulerState::Stopped,
        }
    }

    /// Whether the periodic driver is running.
    pub async fn is_running(&self) -> bool {
        self.state().await == SchedulerState::Running
    }
}

async fn drive(worker: Arc<ResetWorker>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        // Not raced against cancellation: stop() waits for the tick to finish.
        let timer = OpTimer::new("scheduler", "tick");
        let result = worker.tick_at(Utc::now()).await;
        if let Ok(report) = &result {
            tracing::debug!(
                candidates = report.candidates,
                reset = report.reset,
                invalid = report.invalid,
                write_failures = report.write_failures,
                "Tick finished"
            );
        }
        timer.finish_with_result(result.as_ref());
    }
}
