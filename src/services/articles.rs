use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, warn};

use crate::cache::ArticleCache;
use crate::db::{article_repo, user_repo};
use crate::error::{AppError, Result};
use crate::kafka::{ReadEvent, ReadEventProducer};
use crate::models::{Article, ArticleStatus, ArticleView, Author};

/// A single cached hot article must stay under this to be worth preloading.
const HOT_ARTICLE_MAX_BYTES: usize = 1024 * 1024;

/// Article authoring and reading: the draft/published pair, the caching
/// policy around it, and the read-event side effect.
pub struct ArticleService {
    pool: PgPool,
    cache: Arc<ArticleCache>,
    producer: Arc<ReadEventProducer>,
}

impl ArticleService {
    pub fn new(pool: PgPool, cache: Arc<ArticleCache>, producer: Arc<ReadEventProducer>) -> Self {
        Self {
            pool,
            cache,
            producer,
        }
    }

    /// Save a draft without publishing. A zero id creates; otherwise the
    /// row is replaced under the author predicate.
    pub async fn save(&self, uid: i64, id: i64, title: &str, content: &str) -> Result<i64> {
        let id = if id > 0 {
            article_repo::update_by_id(
                &self.pool,
                id,
                uid,
                title,
                content,
                ArticleStatus::Unpublished,
            )
            .await?;
            id
        } else {
            article_repo::create(&self.pool, uid, title, content).await?
        };

        if let Err(e) = self.cache.del_first_page(uid).await {
            warn!(author_id = uid, "first page invalidation failed: {}", e);
        }
        Ok(id)
    }

    /// Publish: transactional draft/published sync, then asynchronous cache
    /// maintenance (invalidate the author's first page, pre-warm the
    /// published view).
    pub async fn publish(&self, uid: i64, id: i64, title: &str, content: &str) -> Result<i64> {
        let id = article_repo::sync(&self.pool, id, uid, title, content).await?;

        let cache = self.cache.clone();
        let pool = self.pool.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.del_first_page(uid).await {
                warn!(author_id = uid, "first page invalidation failed: {}", e);
            }
            match article_repo::find_published_by_id(&pool, id).await {
                Ok(Some(art)) => {
                    let name = match user_repo::find_nickname(&pool, uid).await {
                        Ok(n) => n.unwrap_or_default(),
                        Err(e) => {
                            warn!(author_id = uid, "author lookup for cache warm failed: {}", e);
                            String::new()
                        }
                    };
                    let view = to_view(art, name);
                    if let Err(e) = cache.set_pub(&view).await {
                        error!(article_id = id, "published view cache warm failed: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(article_id = id, "published row reload failed: {}", e),
            }
        });

        Ok(id)
    }

    /// Withdraw from readers: both rows flip to Private in one transaction.
    pub async fn withdraw(&self, uid: i64, id: i64) -> Result<()> {
        article_repo::sync_status(&self.pool, uid, id, ArticleStatus::Private).await?;

        if let Err(e) = self.cache.del_first_page(uid).await {
            warn!(author_id = uid, "first page invalidation failed: {}", e);
        }
        Ok(())
    }

    /// The author's own list. Only the canonical first page is cached; any
    /// other paging goes straight to the DB.
    pub async fn list(&self, uid: i64, offset: i64, limit: i64) -> Result<Vec<Article>> {
        if offset == 0 && limit == 100 {
            match self.cache.get_first_page(uid).await {
                Ok(Some(arts)) => {
                    self.preload_head(&arts);
                    return Ok(arts);
                }
                Ok(None) => {}
                Err(e) => warn!(author_id = uid, "first page cache read failed: {}", e),
            }
        }

        let arts = article_repo::find_by_author(&self.pool, uid, offset, limit).await?;

        if offset == 0 && limit == 100 {
            if let Err(e) = self.cache.set_first_page(uid, &arts).await {
                warn!(author_id = uid, "first page cache write failed: {}", e);
            }
            self.preload_head(&arts);
        }
        Ok(arts)
    }

    /// Pre-warm the head of the first page: the article the author is most
    /// likely to open next.
    fn preload_head(&self, arts: &[Article]) {
        let Some(head) = arts.first() else { return };
        if head.content.len() > HOT_ARTICLE_MAX_BYTES {
            return;
        }
        let cache = self.cache.clone();
        let art = head.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.set_article(&art).await {
                warn!(article_id = art.id, "hot article preload failed: {}", e);
            }
        });
    }

    /// The author's own draft. Requesting someone else's draft is reported
    /// exactly like a missing row.
    pub async fn detail(&self, uid: i64, id: i64) -> Result<Article> {
        match self.cache.get_article(id).await {
            Ok(Some(art)) if art.author_id == uid => return Ok(art),
            Ok(Some(_)) => {
                warn!(uid, article_id = id, "draft requested by non-author");
                return Err(AppError::PossibleIncorrectAuthor);
            }
            Ok(None) => {}
            Err(e) => warn!(article_id = id, "article cache read failed: {}", e),
        }

        let art = article_repo::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("article {}", id)))?;

        if art.author_id != uid {
            warn!(uid, article_id = id, "draft requested by non-author");
            return Err(AppError::PossibleIncorrectAuthor);
        }
        Ok(art)
    }

    /// Reader-facing detail. On success a read event is fired through the
    /// bus on a detached task with the producer's own deadline.
    pub async fn get_published_by_id(&self, id: i64, uid: i64) -> Result<ArticleView> {
        if let Some(view) = self.cached_pub(id).await {
            self.emit_read_event(uid, id);
            return Ok(view);
        }

        let art = article_repo::find_published_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("published article {}", id)))?;

        let name = user_repo::find_nickname(&self.pool, art.author_id)
            .await?
            .unwrap_or_default();
        let view = to_view(art, name);

        let cache = self.cache.clone();
        let warm = view.clone();
        tokio::spawn(async move {
            if let Err(e) = cache.set_pub(&warm).await {
                error!(article_id = warm.id, "published view cache fill failed: {}", e);
            }
        });

        self.emit_read_event(uid, id);
        Ok(view)
    }

    async fn cached_pub(&self, id: i64) -> Option<ArticleView> {
        match self.cache.get_pub(id).await {
            Ok(view) => view,
            Err(e) => {
                warn!(article_id = id, "published view cache read failed: {}", e);
                None
            }
        }
    }

    fn emit_read_event(&self, uid: i64, aid: i64) {
        let producer = self.producer.clone();
        tokio::spawn(async move {
            if let Err(e) = producer.produce_read_event(ReadEvent { uid, aid }).await {
                error!(uid, aid, "read event publish failed: {}", e);
            }
        });
    }

    /// Paged published-article scan for the ranking engine, newest first.
    pub async fn list_published(
        &self,
        before: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<Article>> {
        article_repo::list_published_before(&self.pool, before, offset, limit).await
    }
}

fn to_view(art: Article, author_name: String) -> ArticleView {
    ArticleView {
        id: art.id,
        title: art.title,
        content: art.content,
        author: Author {
            id: art.author_id,
            name: author_name,
        },
        status: art.status,
        ctime: art.ctime,
        utime: art.utime,
    }
}

#[async_trait::async_trait]
impl crate::services::ranking::PublishedArticleSource for ArticleService {
    async fn list_published(
        &self,
        before: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ArticleView>> {
        let arts = article_repo::list_published_before(&self.pool, before, offset, limit).await?;
        Ok(arts
            .into_iter()
            .map(|a| to_view(a, String::new()))
            .collect())
    }
}
