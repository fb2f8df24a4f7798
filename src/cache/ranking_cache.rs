use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::ArticleView;

/// Remote tier seam. Production uses Redis; tests swap in fakes to drive
/// the brown-out path.
#[async_trait]
pub trait RemoteTopList: Send + Sync {
    async fn store(&self, arts: &[ArticleView]) -> Result<()>;
    async fn load(&self) -> Result<Vec<ArticleView>>;
}

/// Redis-backed top list: a single JSON blob under `ranking:article`.
#[derive(Clone)]
pub struct RankingRedisCache {
    redis: ConnectionManager,
    key: String,
    ttl: Duration,
}

impl RankingRedisCache {
    pub fn new(redis: ConnectionManager, ttl: Duration) -> Self {
        Self {
            redis,
            key: "ranking:article".to_string(),
            ttl,
        }
    }
}

#[async_trait]
impl RemoteTopList for RankingRedisCache {
    async fn store(&self, arts: &[ArticleView]) -> Result<()> {
        let data = serde_json::to_string(arts)?;
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&self.key, data, self.ttl.as_secs())
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;

        Ok(())
    }

    async fn load(&self) -> Result<Vec<ArticleView>> {
        let mut conn = self.redis.clone();
        let data: Option<String> = conn.get(&self.key).await?;
        let raw = data.ok_or_else(|| AppError::NotFound("ranking blob missing".to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Local tier: the current snapshot plus a deadline, each swapped whole so
/// readers never observe a torn list.
pub struct RankingLocalCache {
    top_n: RwLock<Arc<Vec<ArticleView>>>,
    deadline: RwLock<DateTime<Utc>>,
    ttl: chrono::Duration,
}

impl RankingLocalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            top_n: RwLock::new(Arc::new(Vec::new())),
            deadline: RwLock::new(Utc::now()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::minutes(3)),
        }
    }

    pub fn set(&self, arts: Vec<ArticleView>) {
        *self.top_n.write().unwrap() = Arc::new(arts);
        *self.deadline.write().unwrap() = Utc::now() + self.ttl;
    }

    /// Fresh snapshot, or None when empty or past the deadline.
    pub fn get(&self) -> Option<Arc<Vec<ArticleView>>> {
        let arts = self.top_n.read().unwrap().clone();
        if arts.is_empty() || *self.deadline.read().unwrap() < Utc::now() {
            return None;
        }
        Some(arts)
    }

    /// The snapshot regardless of freshness. Brown-out reads prefer a stale
    /// list over an empty one.
    pub fn force_get(&self) -> Arc<Vec<ArticleView>> {
        self.top_n.read().unwrap().clone()
    }
}

/// Two-tier ranking store: local snapshot in front of the shared Redis
/// blob, with stale-local fallback when Redis is unreachable.
pub struct RankingStore<R: RemoteTopList> {
    local: RankingLocalCache,
    remote: R,
}

impl<R: RemoteTopList> RankingStore<R> {
    pub fn new(local: RankingLocalCache, remote: R) -> Self {
        Self { local, remote }
    }

    /// Replace both tiers, local first so this replica serves the new list
    /// even when the remote write fails. The remote copy is stripped of
    /// content before it leaves the process: the shared blob holds N
    /// summaries, not N article bodies.
    pub async fn replace_top_n(&self, arts: Vec<ArticleView>) -> Result<()> {
        let stripped: Vec<ArticleView> = arts
            .iter()
            .cloned()
            .map(|mut a| {
                a.content = String::new();
                a
            })
            .collect();

        self.local.set(arts);
        self.remote.store(&stripped).await
    }

    pub async fn get_top_n(&self) -> Result<Vec<ArticleView>> {
        if let Some(arts) = self.local.get() {
            metrics::RANKING_CACHE_EVENTS
                .with_label_values(&["local_hit"])
                .inc();
            return Ok(arts.as_ref().clone());
        }

        match self.remote.load().await {
            Ok(arts) => {
                metrics::RANKING_CACHE_EVENTS
                    .with_label_values(&["remote_hit"])
                    .inc();
                self.local.set(arts.clone());
                Ok(arts)
            }
            Err(e) => {
                warn!("remote ranking cache unavailable, serving local snapshot: {}", e);
                metrics::RANKING_CACHE_EVENTS
                    .with_label_values(&["force_local"])
                    .inc();
                Ok(self.local.force_get().as_ref().clone())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn view(id: i64) -> ArticleView {
        ArticleView {
            id,
            title: format!("title {}", id),
            content: "body".to_string(),
            author: crate::models::Author {
                id: 1,
                name: "alice".to_string(),
            },
            status: 2,
            ctime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            utime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    struct DownRemote;

    #[async_trait]
    impl RemoteTopList for DownRemote {
        async fn store(&self, _arts: &[ArticleView]) -> Result<()> {
            Err(AppError::Cache("connection refused".to_string()))
        }
        async fn load(&self) -> Result<Vec<ArticleView>> {
            Err(AppError::Cache("connection refused".to_string()))
        }
    }

    #[test]
    fn local_cache_serves_fresh_snapshot() {
        let cache = RankingLocalCache::new(Duration::from_secs(60));
        cache.set(vec![view(1), view(2)]);

        let got = cache.get().expect("fresh snapshot");
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, 1);
    }

    #[test]
    fn local_cache_expires_but_force_get_survives() {
        let cache = RankingLocalCache::new(Duration::from_secs(0));
        cache.set(vec![view(1)]);

        assert!(cache.get().is_none());
        assert_eq!(cache.force_get().len(), 1);
    }

    #[test]
    fn empty_local_cache_is_a_miss() {
        let cache = RankingLocalCache::new(Duration::from_secs(60));
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn get_falls_back_to_stale_local_when_remote_is_down() {
        let store = RankingStore::new(RankingLocalCache::new(Duration::from_secs(0)), DownRemote);
        // Seeding fails on the remote write but still lands locally.
        assert!(store.replace_top_n(vec![view(7)]).await.is_err());

        let got = store.get_top_n().await.unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, 7);
    }

    #[tokio::test]
    async fn fresh_local_short_circuits_the_remote() {
        let store = RankingStore::new(RankingLocalCache::new(Duration::from_secs(60)), DownRemote);
        assert!(store.replace_top_n(vec![view(3), view(4)]).await.is_err());

        let got = store.get_top_n().await.unwrap();
        assert_eq!(got.iter().map(|a| a.id).collect::<Vec<_>>(), vec![3, 4]);
    }
}
