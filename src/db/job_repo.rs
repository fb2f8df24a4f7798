use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::Result;
use crate::models::{CronJob, JobStatus};

/// Register a named job. Idempotent: an existing name is left untouched so
/// replicas can all seed the same job at startup.
pub async fn insert(
    pool: &PgPool,
    name: &str,
    executor: &str,
    cfg: &str,
    expression: &str,
    next_time: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO jobs (name, executor, cfg, expression, status, next_time, version, ctime, utime)
        VALUES ($1, $2, $3, $4, $5, $6, 0, NOW(), NOW())
        ON CONFLICT (name) DO NOTHING
        "#,
    )
    .bind(name)
    .bind(executor)
    .bind(cfg)
    .bind(expression)
    .bind(JobStatus::Waiting.as_i16())
    .bind(next_time)
    .execute(pool)
    .await?;

    Ok(())
}

/// Try to lease one due job.
///
/// Picks any Waiting row whose `next_time` has passed, then claims it with
/// a version-guarded CAS update. A lost race retries with a fresh
/// candidate; no due job at all returns `Ok(None)` so callers can back off.
/// The returned job carries the version captured *before* the bump.
pub async fn preempt(pool: &PgPool) -> Result<Option<CronJob>> {
    loop {
        let now = Utc::now();

        let candidate = sqlx::query_as::<_, CronJob>(
            r#"
            SELECT id, name, executor, cfg, expression, status, next_time, version, ctime, utime
            FROM jobs
            WHERE next_time <= $1 AND status = $2
            LIMIT 1
            "#,
        )
        .bind(now)
        .bind(JobStatus::Waiting.as_i16())
        .fetch_optional(pool)
        .await?;

        let Some(job) = candidate else {
            return Ok(None);
        };

        let res = sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1, version = version + 1, utime = $2
            WHERE id = $3 AND version = $4
            "#,
        )
        .bind(JobStatus::Running.as_i16())
        .bind(now)
        .bind(job.id)
        .bind(job.version)
        .execute(pool)
        .await?;

        if res.rows_affected() == 1 {
            return Ok(Some(job));
        }
        // Lost the CAS to another replica; try the next candidate.
    }
}

/// Re-arm a leased job. Idempotent, and a no-op for rows that have since
/// been marked End, so one-shot completion is not undone by the release.
pub async fn release(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1, utime = NOW()
        WHERE id = $2 AND status = $3
        "#,
    )
    .bind(JobStatus::Waiting.as_i16())
    .bind(id)
    .bind(JobStatus::Running.as_i16())
    .execute(pool)
    .await?;

    Ok(())
}

/// Lease heartbeat: refresh `utime` so the reaper can tell live leases from
/// abandoned ones.
pub async fn update_heartbeat(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE jobs SET utime = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn update_next_time(pool: &PgPool, id: i64, next_time: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE jobs SET next_time = $1, utime = NOW() WHERE id = $2")
        .bind(next_time)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Terminal state for jobs with no further occurrence.
pub async fn mark_end(pool: &PgPool, id: i64) -> Result<()> {
    sqlx::query("UPDATE jobs SET status = $1, utime = NOW() WHERE id = $2")
        .bind(JobStatus::End.as_i16())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Re-arm Running jobs whose heartbeat is older than `cutoff`. A scheduler
/// replica that died mid-lease leaves such a row behind.
pub async fn reap_stalled(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
    let res = sqlx::query(
        r#"
        UPDATE jobs
        SET status = $1, utime = NOW()
        WHERE status = $2 AND utime < $3
        "#,
    )
    .bind(JobStatus::Waiting.as_i16())
    .bind(JobStatus::Running.as_i16())
    .bind(cutoff)
    .execute(pool)
    .await?;

    Ok(res.rows_affected())
}
