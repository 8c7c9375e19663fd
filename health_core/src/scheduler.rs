//! Periodic module sweeps, integration sweeps and metrics ticks

use crate::config::SchedulerConfig;
use crate::health::SweepSummary;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// "Is running" flag for one class of work. Sweeps of the same kind and the
/// orchestrators that mutate the same records all go through it.
#[derive(Debug, Clone)]
pub struct SweepGuard {
    name: &'static str,
    lock: Arc<Mutex<()>>,
}

impl SweepGuard {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// `None` when the work is already running.
    pub fn try_begin(&self) -> Option<OwnedMutexGuard<()>> {
        match self.lock.clone().try_lock_owned() {
            Ok(guard) => Some(guard),
            Err(_) => {
                debug!(guard = self.name, "Already running");
                None
            }
        }
    }

    pub async fn begin(&self) -> OwnedMutexGuard<()> {
        self.lock.clone().lock_owned().await
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// What the scheduler drives. `None` from a sweep means the tick was skipped
/// because the previous one was still running.
#[async_trait::async_trait]
pub trait SweepTarget: Send + Sync + 'static {
    async fn module_sweep(&self) -> Option<SweepSummary>;
    async fn integration_sweep(&self) -> Option<SweepSummary>;
    async fn metrics_tick(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerIntervals {
    pub module_sweep: Duration,
    pub integration_sweep: Duration,
    pub metrics: Duration,
}

impl From<&SchedulerConfig> for SchedulerIntervals {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            module_sweep: config.module_sweep_interval(),
            integration_sweep: config.integration_sweep_interval(),
            metrics: config.metrics_interval(),
        }
    }
}

pub struct HealthScheduler;

impl HealthScheduler {
    /// Starts one task per cycle. Each task awaits its own tick before
    /// waiting for the next, and ticks missed meanwhile are dropped.
    pub fn spawn<T: SweepTarget>(target: Arc<T>, intervals: SchedulerIntervals) -> SchedulerHandle {
        let (shutdown, receiver) = watch::channel(false);

        let modules = {
            let target = target.clone();
            tokio::spawn(run_cycle("module_sweep", intervals.module_sweep, receiver.clone(), move || {
                let target = target.clone();
                async move {
                    if target.module_sweep().await.is_none() {
                        debug!("Skipped module sweep tick, previous sweep still running");
                    }
                }
            }))
        };

        let integrations = {
            let target = target.clone();
            tokio::spawn(run_cycle(
                "integration_sweep",
                intervals.integration_sweep,
                receiver.clone(),
                move || {
                    let target = target.clone();
                    async move {
                        if target.integration_sweep().await.is_none() {
                            debug!("Skipped integration sweep tick, previous sweep still running");
                        }
                    }
                },
            ))
        };

        let metrics = {
            let target = target.clone();
            tokio::spawn(run_cycle("metrics", intervals.metrics, receiver, move || {
                let target = target.clone();
                async move {
                    if !target.metrics_tick().await {
                        debug!("Skipped metrics tick, previous tick still running");
                    }
                }
            }))
        };

        info!(
            "Health scheduler started (modules every {:?}, integrations every {:?}, metrics every {:?})",
            intervals.module_sweep, intervals.integration_sweep, intervals.metrics
        );

        SchedulerHandle {
            shutdown,
            tasks: vec![modules, integrations, metrics],
        }
    }
}

async fn run_cycle<F, Fut>(name: &'static str, period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = async {
                interval.tick().await;
                tick().await;
            } => {}
        }
    }

    debug!(cycle = name, "Scheduler cycle stopped");
}

/// Owns the scheduler tasks. Dropping the handle closes the shutdown channel,
/// which stops them as well. A target that stores its own handle keeps
/// itself alive through the tasks and has to call [`Self::stop`].
#[derive(Debug)]
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Signals every cycle and waits for them to exit. A sweep in progress
    /// is abandoned at its next await point.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Scheduler task ended abnormally: {}", e);
                }
            }
        }
        info!("Health scheduler stopped");
    }

    pub fn abort(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|task| task.is_finished())
    }
}
