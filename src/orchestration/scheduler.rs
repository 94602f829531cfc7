//! Periodic driver for the settlement jobs.
//!
//! Each registered job gets its own timer task. A job never runs twice at
//! once: the timer and [`SettlementScheduler::trigger`] share a per-job
//! guard, and a run that finds the guard held is skipped rather than queued.
//! Jobs do not share a guard with each other.

use crate::config::MAX_DURATION_SECS;
use crate::error::SettlementError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Counts reported by one run of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobSummary {
    pub examined: usize,
    pub settled: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(JobSummary),
    /// The run could not start its pass; nothing was changed.
    Failed(String),
    /// A previous run of the same job was still in flight.
    Skipped,
}

/// A unit of periodic settlement work.
#[async_trait]
pub trait SettlementJob: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run_once(&self) -> Result<JobSummary, SettlementError>;
}

#[derive(Clone)]
struct ScheduledJob {
    job: Arc<dyn SettlementJob>,
    every: Duration,
    guard: Arc<tokio::sync::Mutex<()>>,
}

impl ScheduledJob {
    async fn run_guarded(&self) -> RunOutcome {
        let name = self.job.name();
        let Ok(_running) = self.guard.try_lock() else {
            debug!(job = name, "Previous run still in flight, skipping");
            return RunOutcome::Skipped;
        };

        let started = Instant::now();
        match self.job.run_once().await {
            Ok(summary) => {
                info!(
                    job = name,
                    examined = summary.examined,
                    settled = summary.settled,
                    failed = summary.failed,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job run completed"
                );
                RunOutcome::Completed(summary)
            }
            Err(e) => {
                error!(job = name, error = %e, "Job run failed");
                RunOutcome::Failed(e.to_string())
            }
        }
    }
}

/// Owns the timers of every registered job.
pub struct SettlementScheduler {
    jobs: Vec<ScheduledJob>,
    cancel: Mutex<CancellationToken>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for SettlementScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl SettlementScheduler {
    pub fn new() -> Self {
        Self {
            jobs: Vec::new(),
            cancel: Mutex::new(CancellationToken::new()),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Add a job that runs every `every` once the scheduler is started.
    /// A job registered under an existing name replaces it. The interval is
    /// clamped to between 1ms and [`MAX_DURATION_SECS`].
    pub fn register(&mut self, job: Arc<dyn SettlementJob>, every: Duration) {
        let every = every.clamp(
            Duration::from_millis(1),
            Duration::from_secs(MAX_DURATION_SECS),
        );
        self.jobs.retain(|j| j.job.name() != job.name());
        self.jobs.push(ScheduledJob {
            job,
            every,
            guard: Arc::new(tokio::sync::Mutex::new(())),
        });
    }

    pub fn job_names(&self) -> Vec<&'static str> {
        self.jobs.iter().map(|j| j.job.name()).collect()
    }

    pub fn interval_of(&self, name: &str) -> Option<Duration> {
        self.jobs
            .iter()
            .find(|j| j.job.name() == name)
            .map(|j| j.every)
    }

    pub fn is_running(&self) -> bool {
        !lock(&self.handles).is_empty()
    }

    /// Spawn one timer task per job. The first run of each job happens one
    /// interval after start. Calling `start` on a running scheduler does
    /// nothing.
    pub fn start(&self) {
        let mut handles = lock(&self.handles);
        if !handles.is_empty() {
            warn!("Scheduler already started");
            return;
        }

        let cancel = lock(&self.cancel).clone();
        for scheduled in &self.jobs {
            let scheduled = scheduled.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                run_timer(scheduled, cancel).await;
            }));
        }
        info!(jobs = self.jobs.len(), "Settlement scheduler started");
    }

    /// Run a job now, outside its timer, under the same re-entrancy guard.
    ///
    /// # Errors
    /// `NotFound` if no job is registered under `name`.
    pub async fn trigger(&self, name: &str) -> Result<RunOutcome, SettlementError> {
        let scheduled = self
            .jobs
            .iter()
            .find(|j| j.job.name() == name)
            .ok_or_else(|| SettlementError::NotFound(format!("job {}", name)))?;
        Ok(scheduled.run_guarded().await)
    }

    /// Cancel every timer and wait for the tasks to exit. A run in flight
    /// finishes before its task exits. The scheduler can be started again.
    pub async fn stop(&self) {
        let handles: Vec<JoinHandle<()>> = lock(&self.handles).drain(..).collect();
        let cancel = std::mem::replace(&mut *lock(&self.cancel), CancellationToken::new());
        cancel.cancel();

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
        info!("Settlement scheduler stopped");
    }
}

async fn run_timer(scheduled: ScheduledJob, cancel: CancellationToken) {
    let Some(start) = tokio::time::Instant::now().checked_add(scheduled.every) else {
        error!(job = scheduled.job.name(), "Job interval out of range, timer not started");
        return;
    };
    let mut ticker = interval_at(start, scheduled.every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    debug!(
        job = scheduled.job.name(),
        interval_ms = scheduled.every.as_millis() as u64,
        "Job timer started"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(job = scheduled.job.name(), "Job timer shutting down");
                break;
            }
            _ = ticker.tick() => {
                scheduled.run_guarded().await;
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct CountingJob {
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SettlementJob for CountingJob {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn run_once(&self) -> Result<JobSummary, SettlementError> {
            let runs = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(JobSummary {
                examined: runs,
                ..Default::default()
            })
        }
    }

    struct BlockingJob {
        started: Notify,
        release: Notify,
        runs: AtomicUsize,
    }

    #[async_trait]
    impl SettlementJob for BlockingJob {
        fn name(&self) -> &'static str {
            "blocking"
        }

        async fn run_once(&self) -> Result<JobSummary, SettlementError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(JobSummary::default())
        }
    }

    struct FailingJob;

    #[async_trait]
    impl SettlementJob for FailingJob {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run_once(&self) -> Result<JobSummary, SettlementError> {
            Err(SettlementError::Rejected("store offline".to_string()))
        }
    }

    #[tokio::test]
    async fn test_trigger_runs_job() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut scheduler = SettlementScheduler::new();
        scheduler.register(job.clone(), Duration::from_secs(3600));

        let outcome = scheduler.trigger("counting").await.unwrap();

        assert_eq!(
            outcome,
            RunOutcome::Completed(JobSummary {
                examined: 1,
                ..Default::default()
            })
        );
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_trigger_unknown_job_is_not_found() {
        let scheduler = SettlementScheduler::new();
        let err = scheduler.trigger("nope").await.unwrap_err();
        assert!(matches!(err, SettlementError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_job_in_flight_is_not_rerun() {
        let job = Arc::new(BlockingJob {
            started: Notify::new(),
            release: Notify::new(),
            runs: AtomicUsize::new(0),
        });
        let mut scheduler = SettlementScheduler::new();
        scheduler.register(job.clone(), Duration::from_secs(3600));
        let scheduler = Arc::new(scheduler);

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger("blocking").await })
        };
        job.started.notified().await;

        let second = scheduler.trigger("blocking").await.unwrap();
        assert_eq!(second, RunOutcome::Skipped);

        job.release.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, RunOutcome::Completed(JobSummary::default()));
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_run_is_reported() {
        let mut scheduler = SettlementScheduler::new();
        scheduler.register(Arc::new(FailingJob), Duration::from_secs(3600));

        let outcome = scheduler.trigger("failing").await.unwrap();
        assert!(matches!(outcome, RunOutcome::Failed(msg) if msg.contains("store offline")));
    }

    #[tokio::test]
    async fn test_register_same_name_replaces_job() {
        let mut scheduler = SettlementScheduler::new();
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        scheduler.register(job.clone(), Duration::from_secs(60));
        scheduler.register(job, Duration::from_secs(120));
        assert_eq!(scheduler.job_names(), vec!["counting"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_runs_until_stopped() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut scheduler = SettlementScheduler::new();
        scheduler.register(job.clone(), Duration::from_millis(20));

        scheduler.start();
        assert!(scheduler.is_running());
        tokio::time::sleep(Duration::from_millis(150)).await;
        scheduler.stop().await;
        assert!(!scheduler.is_running());

        // Ticks at 20ms, 40ms, ... 140ms; the first fires one interval in.
        let after_stop = job.runs.load(Ordering::SeqCst);
        assert_eq!(after_stop, 7);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(job.runs.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_restarts_after_stop() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut scheduler = SettlementScheduler::new();
        scheduler.register(job.clone(), Duration::from_millis(10));

        scheduler.start();
        scheduler.stop().await;
        let before = job.runs.load(Ordering::SeqCst);

        scheduler.start();
        tokio::time::sleep(Duration::from_millis(80)).await;
        scheduler.stop().await;
        assert!(job.runs.load(Ordering::SeqCst) > before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_interval_is_clamped_and_runs() {
        let job = Arc::new(CountingJob {
            runs: AtomicUsize::new(0),
        });
        let mut scheduler = SettlementScheduler::new();
        scheduler.register(job.clone(), Duration::MAX);

        let year = Duration::from_secs(MAX_DURATION_SECS);
        assert_eq!(scheduler.interval_of("counting"), Some(year));
        assert_eq!(scheduler.interval_of("missing"), None);

        scheduler.start();
        tokio::time::sleep(year + Duration::from_secs(1)).await;
        scheduler.stop().await;
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
    }
}
