use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::metrics::ARTICLE_CACHE_EVENTS;
use crate::models::{Article, ArticleView};

/// Article caches: the author's first list page, a preloaded hot article,
/// and the reader-facing published view.
#[derive(Clone)]
pub struct ArticleCache {
    redis: ConnectionManager,
    first_page_ttl: Duration,
    detail_ttl: Duration,
    pub_ttl: Duration,
}

impl ArticleCache {
    pub fn new(redis: ConnectionManager) -> Self {
        Self {
            redis,
            first_page_ttl: Duration::from_secs(10 * 60),
            detail_ttl: Duration::from_secs(10 * 60),
            pub_ttl: Duration::from_secs(10 * 60),
        }
    }

    fn first_page_key(author_id: i64) -> String {
        format!("article:first_page:{}", author_id)
    }

    fn detail_key(id: i64) -> String {
        format!("article:detail:{}", id)
    }

    fn pub_key(id: i64) -> String {
        format!("article:pub:{}", id)
    }

    /// Shared read path: one GET, decoded as JSON, with hit/miss/error
    /// accounting per cache kind.
    async fn read<T: serde::de::DeserializeOwned>(
        cache: &str,
        redis: &ConnectionManager,
        key: String,
    ) -> Result<Option<T>> {
        let mut conn = redis.clone();
        let data: Option<String> = match conn.get(&key).await {
            Ok(d) => d,
            Err(e) => {
                ARTICLE_CACHE_EVENTS
                    .with_label_values(&[cache, "error"])
                    .inc();
                return Err(e.into());
            }
        };

        match data {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    ARTICLE_CACHE_EVENTS
                        .with_label_values(&[cache, "hit"])
                        .inc();
                    Ok(Some(value))
                }
                Err(e) => {
                    ARTICLE_CACHE_EVENTS
                        .with_label_values(&[cache, "error"])
                        .inc();
                    Err(AppError::Cache(format!("{}: {}", key, e)))
                }
            },
            None => {
                ARTICLE_CACHE_EVENTS
                    .with_label_values(&[cache, "miss"])
                    .inc();
                Ok(None)
            }
        }
    }

    pub async fn get_first_page(&self, author_id: i64) -> Result<Option<Vec<Article>>> {
        Self::read("first_page", &self.redis, Self::first_page_key(author_id)).await
    }

    pub async fn set_first_page(&self, author_id: i64, arts: &[Article]) -> Result<()> {
        let key = Self::first_page_key(author_id);
        let data = serde_json::to_string(arts)?;

        // Jitter the TTL so pages cached in the same burst do not expire
        // in the same instant.
        let jitter = (rand::random::<u32>() % 10) as f64 / 100.0;
        let ttl = self.first_page_ttl.as_secs()
            + (self.first_page_ttl.as_secs_f64() * jitter).round() as u64;

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(&key, data, ttl)
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;

        debug!(author_id, articles = arts.len(), "first page cache WRITE");
        Ok(())
    }

    pub async fn del_first_page(&self, author_id: i64) -> Result<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(Self::first_page_key(author_id)).await?;
        debug!(author_id, "first page cache INVALIDATE");
        Ok(())
    }

    pub async fn get_article(&self, id: i64) -> Result<Option<Article>> {
        Self::read("detail", &self.redis, Self::detail_key(id)).await
    }

    pub async fn set_article(&self, art: &Article) -> Result<()> {
        let data = serde_json::to_string(art)?;
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(Self::detail_key(art.id), data, self.detail_ttl.as_secs())
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
        Ok(())
    }

    pub async fn get_pub(&self, id: i64) -> Result<Option<ArticleView>> {
        Self::read("pub", &self.redis, Self::pub_key(id)).await
    }

    pub async fn set_pub(&self, view: &ArticleView) -> Result<()> {
        let data = serde_json::to_string(view)?;
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(Self::pub_key(view.id), data, self.pub_ttl.as_secs())
            .await
            .map_err(|e| AppError::Cache(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_formats() {
        assert_eq!(ArticleCache::first_page_key(12), "article:first_page:12");
        assert_eq!(ArticleCache::detail_key(7), "article:detail:7");
        assert_eq!(ArticleCache::pub_key(7), "article:pub:7");
    }
}
