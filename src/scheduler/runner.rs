//! The minute-granularity job scheduler.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{info, warn};

use super::cron::CronSchedule;
use super::error::{SchedulerError, SchedulerResult};

#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct JobResultMetadata {
    pub manual: bool,
}

#[derive(Debug, Clone)]
pub struct JobResult {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration: std::time::Duration,
    pub success: bool,
    pub error: Option<String>,
    pub metadata: JobResultMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct JobMetrics {
    pub executions: u64,
    pub failures: u64,
    pub total_duration: std::time::Duration,
    pub last_execution: Option<DateTime<Utc>>,
}

impl JobMetrics {
    pub fn average_duration(&self) -> std::time::Duration {
        if self.executions == 0 {
            std::time::Duration::ZERO
        } else {
            self.total_duration / self.executions as u32
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.executions == 0 {
            1.0
        } else {
            1.0 - (self.failures as f64 / self.executions as f64)
        }
    }
}

struct JobEntry {
    schedule: CronSchedule,
    job: Arc<dyn Job>,
    enabled: bool,
    next_run: Option<DateTime<Utc>>,
    last_run: Option<DateTime<Utc>>,
    run_count: u64,
    fail_count: u64,
}

type StartHook = Arc<dyn Fn(&str) + Send + Sync>;
type CompleteHook = Arc<dyn Fn(&JobResult) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&str, &anyhow::Error) + Send + Sync>;

#[derive(Clone, Default)]
pub struct SchedulerHooks {
    pub on_start: Option<StartHook>,
    pub on_complete: Option<CompleteHook>,
    pub on_error: Option<ErrorHook>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub history_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { history_capacity: 1000 }
    }
}

pub struct Scheduler {
    config: SchedulerConfig,
    jobs: Mutex<HashMap<String, JobEntry>>,
    history: Mutex<VecDeque<JobResult>>,
    metrics: Mutex<HashMap<String, JobMetrics>>,
    global: Mutex<JobMetrics>,
    hooks: SchedulerHooks,
    inflight: Mutex<JoinSet<()>>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
}

fn until_next_minute_boundary(now: DateTime<Utc>) -> std::time::Duration {
    let next = now
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
        + ChronoDuration::minutes(1);
    (next - now).to_std().unwrap_or(std::time::Duration::from_secs(60))
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Arc<Self> {
        Self::with_hooks(config, SchedulerHooks::default())
    }

    pub fn with_hooks(config: SchedulerConfig, hooks: SchedulerHooks) -> Arc<Self> {
        let (stop_tx, stop_rx) = watch::channel(false);
        Arc::new(Self {
            config,
            jobs: Mutex::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            metrics: Mutex::new(HashMap::new()),
            global: Mutex::new(JobMetrics::default()),
            hooks,
            inflight: Mutex::new(JoinSet::new()),
            stop_tx,
            stop_rx,
        })
    }

    pub async fn register(&self, name: impl Into<String>, schedule: CronSchedule, job: Arc<dyn Job>) -> SchedulerResult<()> {
        let name = name.into();
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&name) {
            return Err(SchedulerError::JobAlreadyExists(name));
        }
        let next_run = schedule.next_utc(Utc::now()).ok();
        jobs.insert(
            name,
            JobEntry {
                schedule,
                job,
                enabled: true,
                next_run,
                last_run: None,
                run_count: 0,
                fail_count: 0,
            },
        );
        Ok(())
    }

    pub async fn unregister(&self, name: &str) -> SchedulerResult<()> {
        self.jobs
            .lock()
            .await
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))
    }

    pub async fn set_enabled(&self, name: &str, enabled: bool) -> SchedulerResult<()> {
        let mut jobs = self.jobs.lock().await;
        let entry = jobs
            .get_mut(name)
            .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?;
        entry.enabled = enabled;
        Ok(())
    }

    pub async fn enable(&self, name: &str) -> SchedulerResult<()> {
        self.set_enabled(name, true).await
    }

    pub async fn disable(&self, name: &str) -> SchedulerResult<()> {
        self.set_enabled(name, false).await
    }

    /// Bypasses the schedule entirely; does not touch `next_run`.
    pub async fn run_now(self: &Arc<Self>, name: &str) -> SchedulerResult<()> {
        let job = {
            let jobs = self.jobs.lock().await;
            jobs.get(name)
                .map(|e| e.job.clone())
                .ok_or_else(|| SchedulerError::JobNotFound(name.to_string()))?
        };
        let scheduler = self.clone();
        let name = name.to_string();
        self.inflight
            .lock()
            .await
            .spawn(async move { scheduler.execute(name, job, true).await });
        Ok(())
    }

    async fn execute(self: Arc<Self>, name: String, job: Arc<dyn Job>, manual: bool) {
        if let Some(hook) = &self.hooks.on_start {
            hook(&name);
        }

        let started_at = Utc::now();
        let result = job.run().await;
        let completed_at = Utc::now();
        let duration = (completed_at - started_at).to_std().unwrap_or_default();
        let success = result.is_ok();

        if let Err(err) = &result {
            warn!(job = %name, error = %err, "job execution failed");
            if let Some(hook) = &self.hooks.on_error {
                hook(&name, err);
            }
        }

        let job_result = JobResult {
            job_name: name.clone(),
            started_at,
            completed_at,
            duration,
            success,
            error: result.err().map(|e| e.to_string()),
            metadata: JobResultMetadata { manual },
        };

        {
            let mut history = self.history.lock().await;
            if history.len() == self.config.history_capacity {
                history.pop_front();
            }
            history.push_back(job_result.clone());
        }

        {
            let mut metrics = self.metrics.lock().await;
            let entry = metrics.entry(name.clone()).or_default();
            entry.executions += 1;
            entry.total_duration += duration;
            entry.last_execution = Some(completed_at);
            if !success {
                entry.failures += 1;
            }
        }

        {
            let mut global = self.global.lock().await;
            global.executions += 1;
            global.total_duration += duration;
            global.last_execution = Some(completed_at);
            if !success {
                global.failures += 1;
            }
        }

        if !manual {
            let mut jobs = self.jobs.lock().await;
            if let Some(entry) = jobs.get_mut(&name) {
                if !success {
                    entry.fail_count += 1;
                }
            }
        }

        if let Some(hook) = &self.hooks.on_complete {
            hook(&job_result);
        }
    }

    /// Snapshots due jobs under the lock, bumps their bookkeeping, then
    /// launches each as an independent concurrent task.
    async fn tick(self: &Arc<Self>, now: DateTime<Utc>) {
        let due: Vec<(String, Arc<dyn Job>)> = {
            let mut jobs = self.jobs.lock().await;
            let mut due = Vec::new();
            for (name, entry) in jobs.iter_mut() {
                let is_due = entry.enabled && entry.next_run.is_some_and(|t| t <= now);
                if is_due {
                    entry.last_run = Some(now);
                    entry.next_run = entry.schedule.next_utc(now).ok();
                    entry.run_count += 1;
                    due.push((name.clone(), entry.job.clone()));
                }
            }
            due
        };

        if due.is_empty() {
            return;
        }
        info!(count = due.len(), "firing due jobs");
        let mut inflight = self.inflight.lock().await;
        for (name, job) in due {
            let scheduler = self.clone();
            inflight.spawn(async move { scheduler.execute(name, job, false).await });
        }
    }

    /// Runs the control loop until [`Self::stop`] is called. Returns
    /// promptly on cancellation; in-flight job tasks keep running on their
    /// own and are awaited by `stop`.
    pub async fn run(self: Arc<Self>) {
        loop {
            if *self.stop_rx.borrow() {
                return;
            }
            let sleep = until_next_minute_boundary(Utc::now());
            let mut stop_rx = self.stop_rx.clone();
            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = stop_rx.changed() => { return; }
            }
            if *self.stop_rx.borrow() {
                return;
            }
            self.tick(Utc::now()).await;
        }
    }

    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let mut inflight = self.inflight.lock().await;
        while inflight.join_next().await.is_some() {}
    }

    pub async fn history(&self) -> Vec<JobResult> {
        self.history.lock().await.iter().cloned().collect()
    }

    pub async fn job_metrics(&self, name: &str) -> Option<JobMetrics> {
        self.metrics.lock().await.get(name).cloned()
    }

    pub async fn global_metrics(&self) -> JobMetrics {
        self.global.lock().await.clone()
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("history_capacity", &self.config.history_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingJob {
        calls: Arc<AtomicU32>,
        fail: bool,
    }

    #[async_trait]
    impl Job for CountingJob {
        async fn run(&self) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn register_rejects_duplicate_name() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let schedule = CronSchedule::parse("* * * * *").unwrap();
        let job = Arc::new(CountingJob { calls: Arc::new(AtomicU32::new(0)), fail: false });
        scheduler.register("sync", schedule.clone(), job.clone()).await.unwrap();
        assert!(matches!(
            scheduler.register("sync", schedule, job).await,
            Err(SchedulerError::JobAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn run_now_records_manual_result_without_touching_next_run() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let schedule = CronSchedule::parse("0 0 1 1 *").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let job = Arc::new(CountingJob { calls: calls.clone(), fail: false });
        scheduler.register("yearly", schedule, job).await.unwrap();

        scheduler.run_now("yearly").await.unwrap();
        scheduler.stop().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let history = scheduler.history().await;
        assert_eq!(history.len(), 1);
        assert!(history[0].metadata.manual);
    }

    #[tokio::test]
    async fn disabled_job_is_never_due() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let schedule = CronSchedule::parse("* * * * *").unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let job = Arc::new(CountingJob { calls: calls.clone(), fail: false });
        scheduler.register("every-minute", schedule, job).await.unwrap();
        scheduler.disable("every-minute").await.unwrap();
        scheduler.tick(Utc::now() + ChronoDuration::minutes(2)).await;
        scheduler.stop().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_job_is_recorded_but_does_not_abort_scheduler() {
        let scheduler = Scheduler::new(SchedulerConfig::default());
        let schedule = CronSchedule::parse("* * * * *").unwrap();
        let job = Arc::new(CountingJob { calls: Arc::new(AtomicU32::new(0)), fail: true });
        scheduler.register("flaky", schedule, job).await.unwrap();
        scheduler.run_now("flaky").await.unwrap();
        scheduler.stop().await;
        let metrics = scheduler.job_metrics("flaky").await.unwrap();
        assert_eq!(metrics.executions, 1);
        assert_eq!(metrics.failures, 1);
    }

    #[tokio::test]
    async fn history_is_capped_fifo() {
        let scheduler = Scheduler::new(SchedulerConfig { history_capacity: 2 });
        let schedule = CronSchedule::parse("* * * * *").unwrap();
        let job = Arc::new(CountingJob { calls: Arc::new(AtomicU32::new(0)), fail: false });
        scheduler.register("j", schedule, job).await.unwrap();
        for _ in 0..3 {
            scheduler.run_now("j").await.unwrap();
        }
        // Give spawned tasks a chance to finish before stopping.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        scheduler.stop().await;
        assert_eq!(scheduler.history().await.len(), 2);
    }
}
