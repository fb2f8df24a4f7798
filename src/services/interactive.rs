use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tracing::{error, warn};

use crate::cache::InteractiveCache;
use crate::db::interactive_repo;
use crate::error::{AppError, Result};
use crate::models::Interactive;

/// Counter snapshot joined with the caller's own flags.
#[derive(Debug, Clone, Serialize)]
pub struct InteractiveStats {
    #[serde(flatten)]
    pub interactive: Interactive,
    pub liked: bool,
    pub collected: bool,
}

/// Engagement repository: couples the Postgres counter store with the
/// Redis hash cache. Writes go through the DB first (the authority), then
/// the cache; cache failures are logged, never surfaced.
pub struct InteractiveService {
    pool: PgPool,
    cache: Arc<InteractiveCache>,
}

impl InteractiveService {
    pub fn new(pool: PgPool, cache: Arc<InteractiveCache>) -> Self {
        Self { pool, cache }
    }

    /// Single read-count bump: DB upsert, then conditional cache delta.
    pub async fn incr_read_cnt(&self, biz: &str, biz_id: i64) -> Result<()> {
        interactive_repo::incr_read_cnt(&self.pool, biz, biz_id).await?;

        if let Err(e) = self.cache.incr_read_cnt_if_present(biz, biz_id).await {
            warn!(biz, biz_id, "read counter cache update failed: {}", e);
        }
        Ok(())
    }

    /// Batched read-count bump. One DB round trip; the cache is deliberately
    /// left alone here. Consumer lag already absorbs staleness, and N cache
    /// scripts would dominate the batch's tail latency.
    pub async fn batch_incr_read_cnt(&self, bizs: &[String], biz_ids: &[i64]) -> Result<()> {
        interactive_repo::batch_incr_read_cnt(&self.pool, bizs, biz_ids).await
    }

    pub async fn like(&self, biz: &str, biz_id: i64, uid: i64) -> Result<()> {
        interactive_repo::insert_like(&self.pool, biz, biz_id, uid).await?;

        if let Err(e) = self.cache.incr_like_cnt_if_present(biz, biz_id).await {
            warn!(biz, biz_id, uid, "like counter cache update failed: {}", e);
        }
        Ok(())
    }

    pub async fn cancel_like(&self, biz: &str, biz_id: i64, uid: i64) -> Result<()> {
        interactive_repo::delete_like(&self.pool, biz, biz_id, uid).await?;

        if let Err(e) = self.cache.decr_like_cnt_if_present(biz, biz_id).await {
            warn!(biz, biz_id, uid, "like counter cache update failed: {}", e);
        }
        Ok(())
    }

    pub async fn collect(&self, biz: &str, biz_id: i64, cid: i64, uid: i64) -> Result<()> {
        interactive_repo::insert_collection(&self.pool, biz, biz_id, cid, uid).await?;

        if let Err(e) = self.cache.incr_collect_cnt_if_present(biz, biz_id).await {
            warn!(biz, biz_id, uid, "collect counter cache update failed: {}", e);
        }
        Ok(())
    }

    /// Snapshot plus the caller's liked/collected flags, fetched
    /// concurrently.
    pub async fn get(&self, biz: &str, biz_id: i64, uid: i64) -> Result<InteractiveStats> {
        let (interactive, liked, collected) = tokio::try_join!(
            self.snapshot(biz, biz_id),
            self.liked(biz, biz_id, uid),
            self.collected(biz, biz_id, uid),
        )?;

        Ok(InteractiveStats {
            interactive,
            liked,
            collected,
        })
    }

    /// Read-through snapshot: cache first, DB on miss, write-back on fill.
    async fn snapshot(&self, biz: &str, biz_id: i64) -> Result<Interactive> {
        match self.cache.get(biz, biz_id).await {
            Ok(intr) => return Ok(intr),
            Err(AppError::NotFound(_)) => {}
            Err(e) => warn!(biz, biz_id, "counter cache read failed: {}", e),
        }

        let intr = interactive_repo::get(&self.pool, biz, biz_id)
            .await?
            .unwrap_or_else(|| Interactive {
                biz: biz.to_string(),
                biz_id,
                ..Default::default()
            });

        let cache = self.cache.clone();
        let back = intr.clone();
        let biz_owned = biz.to_string();
        tokio::spawn(async move {
            if let Err(e) = cache.set(&biz_owned, biz_id, &back).await {
                error!(biz = %biz_owned, biz_id, "counter cache backfill failed: {}", e);
            }
        });

        Ok(intr)
    }

    pub async fn liked(&self, biz: &str, biz_id: i64, uid: i64) -> Result<bool> {
        let row = interactive_repo::get_like_info(&self.pool, biz, biz_id, uid).await?;
        Ok(row.is_some())
    }

    pub async fn collected(&self, biz: &str, biz_id: i64, uid: i64) -> Result<bool> {
        let row = interactive_repo::get_collection_info(&self.pool, biz, biz_id, uid).await?;
        Ok(row.is_some())
    }

    /// Batched DB-only snapshot fetch, keyed by biz_id for the ranking join.
    pub async fn get_by_ids(&self, biz: &str, ids: &[i64]) -> Result<HashMap<i64, Interactive>> {
        let rows = interactive_repo::get_by_ids(&self.pool, biz, ids).await?;
        Ok(rows.into_iter().map(|i| (i.biz_id, i)).collect())
    }
}

#[async_trait::async_trait]
impl crate::services::ranking::EngagementSource for InteractiveService {
    async fn get_by_ids(&self, biz: &str, ids: &[i64]) -> Result<HashMap<i64, Interactive>> {
        let rows = interactive_repo::get_by_ids(&self.pool, biz, ids).await?;
        Ok(rows.into_iter().map(|i| (i.biz_id, i)).collect())
    }
}
