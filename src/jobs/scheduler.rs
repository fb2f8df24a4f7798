use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::time::{sleep, timeout, Instant};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::jobs::Executor;
use crate::metrics;
use crate::services::CronJobService;

/// Preemptive scheduler loop.
///
/// One loop per replica: preemption is serial, execution is concurrent and
/// capped by a semaphore. Each leased job runs on its own task, renews its
/// lease through the heartbeat owned by the lease, and releases it on the
/// way out, including when shutdown cancels the execution mid-flight.
pub struct Scheduler {
    svc: Arc<CronJobService>,
    execs: HashMap<String, Arc<dyn Executor>>,
    interval: Duration,
    db_timeout: Duration,
    limiter: Arc<Semaphore>,
}

impl Scheduler {
    pub fn new(svc: Arc<CronJobService>, cfg: &SchedulerConfig) -> Self {
        Self {
            svc,
            execs: HashMap::new(),
            interval: Duration::from_millis(cfg.interval_ms),
            db_timeout: Duration::from_millis(cfg.db_timeout_ms),
            limiter: Arc::new(Semaphore::new(cfg.max_in_flight)),
        }
    }

    /// Register an executor. The registry is frozen once `schedule` starts.
    pub fn register_executor(&mut self, exec: Arc<dyn Executor>) {
        self.execs.insert(exec.name().to_string(), exec);
    }

    /// Drive the loop until the shutdown signal fires.
    pub async fn schedule(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            in_flight_cap = self.limiter.available_permits(),
            "scheduler loop starting"
        );

        loop {
            let permit = tokio::select! {
                _ = shutdown.recv() => break,
                permit = self.limiter.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let lease = match timeout(self.db_timeout, self.svc.preempt()).await {
                Ok(Ok(Some(lease))) => lease,
                Ok(Ok(None)) => {
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = sleep(self.interval) => continue,
                    }
                }
                Ok(Err(e)) => {
                    warn!("preempt failed: {}", e);
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = sleep(self.interval) => continue,
                    }
                }
                Err(_) => {
                    warn!("preempt timed out after {:?}", self.db_timeout);
                    drop(permit);
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = sleep(self.interval) => continue,
                    }
                }
            };

            let Some(exec) = self.execs.get(&lease.job.executor).cloned() else {
                error!(
                    executor = %lease.job.executor,
                    job = %lease.job.name,
                    "no executor registered for tag"
                );
                lease.release().await;
                drop(permit);
                continue;
            };

            let svc = self.svc.clone();
            let mut child_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let job = lease.job.clone();
                let started = Instant::now();

                let result = tokio::select! {
                    _ = child_shutdown.recv() => {
                        Err(anyhow::anyhow!("scheduler shutting down"))
                    }
                    r = exec.exec(&job) => r,
                };

                metrics::CRON_JOB_DURATION_SECONDS
                    .with_label_values(&[&job.name])
                    .observe(started.elapsed().as_secs_f64());

                match result {
                    Ok(()) => {
                        metrics::CRON_JOB_EXECUTIONS
                            .with_label_values(&[&job.name, "ok"])
                            .inc();
                        if let Err(e) = svc.reset_next_time(&job).await {
                            error!(job = %job.name, "rescheduling failed: {}", e);
                        }
                    }
                    Err(e) => {
                        metrics::CRON_JOB_EXECUTIONS
                            .with_label_values(&[&job.name, "error"])
                            .inc();
                        error!(job = %job.name, job_id = job.id, "job execution failed: {}", e);
                    }
                }

                lease.release().await;
                drop(permit);
            });
        }

        info!("scheduler loop stopped");
    }
}

/// Background sweep for leases whose holder died: re-arms Running jobs with
/// stalled heartbeats so another replica can pick them up.
pub async fn run_lease_sweeper(svc: Arc<CronJobService>, mut shutdown: broadcast::Receiver<()>) {
    let every = svc.refresh_interval() * 3;
    info!(interval_secs = every.as_secs(), "lease sweeper starting");

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            _ = sleep(every) => {}
        }

        if let Err(e) = svc.reap_stalled().await {
            warn!("lease sweep failed: {}", e);
        }
    }

    info!("lease sweeper stopped");
}
