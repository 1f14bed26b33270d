use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::{watch, Mutex, Notify};
use tokio::time::{Duration, MissedTickBehavior};

pub type ExecutorFuture = Pin<Box<dyn Future<Output = bool> + Send>>;
pub type Executor = Arc<dyn Fn() -> ExecutorFuture + Send + Sync>;

/// Boxes an async closure into an [`Executor`]. The future resolves to
/// `true` when the run failed.
pub fn executor_fn<F, Fut>(f: F) -> Executor
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = bool> + Send + 'static,
{
    Arc::new(move || -> ExecutorFuture { Box::pin(f()) })
}

/// Fires the executor on a fixed cadence, on demand, until shut down.
///
/// A tick that arrives while the previous execution is still running is
/// skipped instead of queued.
#[derive(Clone)]
pub struct Scheduler {
    period: Duration,
    trigger: Arc<Notify>,
    shutdown: Arc<watch::Sender<bool>>,
    in_flight: Arc<Mutex<()>>,
    executor: Arc<RwLock<Option<Executor>>>,
    completed_runs: Arc<AtomicU64>,
    skipped_runs: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            period,
            trigger: Arc::new(Notify::new()),
            shutdown: Arc::new(shutdown),
            in_flight: Arc::new(Mutex::new(())),
            executor: Arc::new(RwLock::new(None)),
            completed_runs: Arc::new(AtomicU64::new(0)),
            skipped_runs: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn set_executor(&self, executor: Executor) {
        match self.executor.write() {
            Ok(mut writer) => *writer = Some(executor),
            Err(poisoned) => *poisoned.into_inner() = Some(executor),
        }
    }

    pub fn start(&self) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_loop().await;
        });
    }

    /// Requests an extra execution without waiting for the next tick.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }

    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs.load(Ordering::SeqCst)
    }

    pub fn skipped_runs(&self) -> u64 {
        self.skipped_runs.load(Ordering::SeqCst)
    }

    async fn run_loop(self) {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow() {
            return;
        }
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(period_secs = self.period.as_secs(), "sweep scheduler started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.trigger.notified() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.run_once().await;
            });
        }
        tracing::info!("sweep scheduler stopped");
    }

    /// Runs the executor unless a previous run is still in flight.
    /// Returns `false` when the run was skipped.
    pub async fn run_once(&self) -> bool {
        let Ok(_guard) = self.in_flight.try_lock() else {
            self.skipped_runs.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("sweep still running, skipping tick");
            return false;
        };

        let failed = self.execute().await;
        self.completed_runs.fetch_add(1, Ordering::SeqCst);
        if failed {
            tracing::warn!("scheduled sweep finished with errors");
        }
        true
    }

    async fn execute(&self) -> bool {
        let executor = match self.executor.read() {
            Ok(reader) => reader.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match executor {
            Some(executor) => executor().await,
            None => true,
        }
    }
}
