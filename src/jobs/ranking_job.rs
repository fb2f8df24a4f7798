use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::time::timeout;
use tracing::info;

use crate::cache::RemoteTopList;
use crate::error::Result;
use crate::jobs::LocalFuncExecutor;
use crate::services::{CronJobService, RankingService};

/// Name (and local-executor key) of the ranking job.
pub const RANKING_JOB_NAME: &str = "ranking";

/// Every minute, at second zero.
const RANKING_JOB_EXPRESSION: &str = "0 * * * * *";

/// Hard cap for a single ranking run.
const RANKING_JOB_TIMEOUT: Duration = Duration::from_secs(30);

/// Map the ranking job onto the local executor.
pub fn register_ranking_job<R>(local: &mut LocalFuncExecutor, svc: Arc<RankingService<R>>)
where
    R: RemoteTopList + 'static,
{
    local.register(RANKING_JOB_NAME, move |_job| {
        let svc = svc.clone();
        async move {
            timeout(RANKING_JOB_TIMEOUT, svc.rank_top_n())
                .await
                .context("ranking run timed out")??;
            Ok(())
        }
    });
}

/// Seed the ranking job row. Idempotent across replicas: the first insert
/// wins and the rest are no-ops.
pub async fn ensure_ranking_job(svc: &CronJobService) -> Result<()> {
    svc.add_job(RANKING_JOB_NAME, "local", "", RANKING_JOB_EXPRESSION)
        .await?;
    info!(job = RANKING_JOB_NAME, "ranking job seeded");
    Ok(())
}
