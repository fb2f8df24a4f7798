use std::str::FromStr;
use std::time::Duration;

use chrono::Utc;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::db::job_repo;
use crate::error::{AppError, Result};
use crate::models::CronJob;

/// Deadline for each heartbeat/release write.
const LEASE_DB_TIMEOUT: Duration = Duration::from_secs(1);

/// How many missed heartbeats make a lease reapable.
const STALL_FACTOR: u32 = 3;

/// A successfully preempted job. Holds the background heartbeat task; the
/// lease must be released exactly once when execution finishes.
pub struct LeasedJob {
    pub job: CronJob,
    pool: PgPool,
    heartbeat: JoinHandle<()>,
}

impl LeasedJob {
    /// Stop renewing and hand the job back. Safe to call after the row was
    /// marked End, since the release update skips non-Running rows.
    pub async fn release(self) {
        self.heartbeat.abort();

        match timeout(LEASE_DB_TIMEOUT, job_repo::release(&self.pool, self.job.id)).await {
            Ok(Ok(())) => debug!(job_id = self.job.id, "lease released"),
            Ok(Err(e)) => error!(job_id = self.job.id, "lease release failed: {}", e),
            Err(_) => error!(job_id = self.job.id, "lease release timed out"),
        }
    }
}

/// Preemptive cron job service shared by all scheduler replicas.
pub struct CronJobService {
    pool: PgPool,
    refresh_interval: Duration,
}

impl CronJobService {
    pub fn new(pool: PgPool, refresh_interval: Duration) -> Self {
        Self {
            pool,
            refresh_interval,
        }
    }

    /// Register a job under a unique name; an existing row wins. The first
    /// fire time comes from the expression.
    pub async fn add_job(
        &self,
        name: &str,
        executor: &str,
        cfg: &str,
        expression: &str,
    ) -> Result<()> {
        let schedule = cron::Schedule::from_str(expression).map_err(|e| {
            AppError::Validation(format!("invalid cron expression '{}': {}", expression, e))
        })?;
        let next = schedule.after(&Utc::now()).next().ok_or_else(|| {
            AppError::Validation(format!("expression '{}' never fires", expression))
        })?;

        job_repo::insert(&self.pool, name, executor, cfg, expression, next).await?;
        info!(name, executor, expression, "job registered");
        Ok(())
    }

    /// Lease one due job, if any. A successful lease starts heartbeat
    /// renewal in the background until the lease is released.
    pub async fn preempt(&self) -> Result<Option<LeasedJob>> {
        let Some(job) = job_repo::preempt(&self.pool).await? else {
            return Ok(None);
        };

        debug!(job_id = job.id, name = %job.name, "job preempted");

        let pool = self.pool.clone();
        let job_id = job.id;
        let every = self.refresh_interval;
        let heartbeat = tokio::spawn(async move {
            let mut tick = tokio::time::interval(every);
            // The first tick completes immediately; the lease itself just
            // stamped utime, so skip it.
            tick.tick().await;
            loop {
                tick.tick().await;
                match timeout(LEASE_DB_TIMEOUT, job_repo::update_heartbeat(&pool, job_id)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!(job_id, "lease heartbeat failed: {}", e),
                    Err(_) => warn!(job_id, "lease heartbeat timed out"),
                }
            }
        });

        Ok(Some(LeasedJob {
            job,
            pool: self.pool.clone(),
            heartbeat,
        }))
    }

    /// Schedule the next occurrence after a successful run. A job whose
    /// expression yields nothing further is finished for good.
    pub async fn reset_next_time(&self, job: &CronJob) -> Result<()> {
        match job.next_run(Utc::now()) {
            Some(next) => {
                debug!(job_id = job.id, %next, "next fire scheduled");
                job_repo::update_next_time(&self.pool, job.id, next).await
            }
            None => {
                info!(job_id = job.id, name = %job.name, "no further occurrence, marking job End");
                job_repo::mark_end(&self.pool, job.id).await
            }
        }
    }

    /// Re-arm Running jobs whose heartbeat has stalled. The leaseholder
    /// replica is presumed dead after `STALL_FACTOR` missed renewals.
    pub async fn reap_stalled(&self) -> Result<u64> {
        let stall = chrono::Duration::from_std(self.refresh_interval * STALL_FACTOR)
            .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let reaped = job_repo::reap_stalled(&self.pool, Utc::now() - stall).await?;
        if reaped > 0 {
            warn!(reaped, "re-armed jobs with stalled leases");
        }
        Ok(reaped)
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }
}
