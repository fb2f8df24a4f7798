//! Ranking engine and two-tier store exercised against in-memory sources.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use article_service::cache::{RankingLocalCache, RankingStore, RemoteTopList};
use article_service::error::{AppError, Result};
use article_service::models::{ArticleView, Author, Interactive};
use article_service::services::{
    default_score_fn, EngagementSource, PublishedArticleSource, RankingService,
};

fn view(id: i64, utime: DateTime<Utc>) -> ArticleView {
    ArticleView {
        id,
        title: format!("article {}", id),
        content: format!("body of article {}", id),
        author: Author {
            id: 1,
            name: String::new(),
        },
        status: 2,
        ctime: utime,
        utime,
    }
}

/// Published articles held in memory, already sorted newest-first.
struct FixedArticles {
    arts: Vec<ArticleView>,
}

#[async_trait]
impl PublishedArticleSource for FixedArticles {
    async fn list_published(
        &self,
        before: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ArticleView>> {
        let page: Vec<ArticleView> = self
            .arts
            .iter()
            .filter(|a| a.utime < before)
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(page)
    }
}

struct FixedEngagement {
    likes: HashMap<i64, i64>,
}

#[async_trait]
impl EngagementSource for FixedEngagement {
    async fn get_by_ids(&self, biz: &str, ids: &[i64]) -> Result<HashMap<i64, Interactive>> {
        let mut out = HashMap::new();
        for id in ids {
            if let Some(like_cnt) = self.likes.get(id) {
                out.insert(
                    *id,
                    Interactive {
                        biz: biz.to_string(),
                        biz_id: *id,
                        like_cnt: *like_cnt,
                        ..Default::default()
                    },
                );
            }
        }
        Ok(out)
    }
}

/// Remote tier fake: records what was stored, optionally refuses service.
struct MemoryRemote {
    data: Arc<Mutex<Option<Vec<ArticleView>>>>,
    down: bool,
}

impl MemoryRemote {
    fn up() -> Self {
        Self {
            data: Arc::new(Mutex::new(None)),
            down: false,
        }
    }

    /// Like `up`, but hands back a second handle onto the stored blob so
    /// tests can inspect what production code wrote.
    fn up_with_handle() -> (Self, Arc<Mutex<Option<Vec<ArticleView>>>>) {
        let remote = Self::up();
        let handle = remote.data.clone();
        (remote, handle)
    }

    fn down() -> Self {
        Self {
            data: Arc::new(Mutex::new(None)),
            down: true,
        }
    }
}

#[async_trait]
impl RemoteTopList for MemoryRemote {
    async fn store(&self, arts: &[ArticleView]) -> Result<()> {
        if self.down {
            return Err(AppError::Cache("remote unavailable".to_string()));
        }
        *self.data.lock().unwrap() = Some(arts.to_vec());
        Ok(())
    }

    async fn load(&self) -> Result<Vec<ArticleView>> {
        if self.down {
            return Err(AppError::Cache("remote unavailable".to_string()));
        }
        self.data
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AppError::NotFound("ranking blob missing".to_string()))
    }
}

fn service(
    arts: Vec<ArticleView>,
    likes: HashMap<i64, i64>,
    remote: MemoryRemote,
    batch_size: i64,
    top_n: usize,
) -> (RankingService<MemoryRemote>, Arc<RankingStore<MemoryRemote>>) {
    let store = Arc::new(RankingStore::new(
        RankingLocalCache::new(Duration::from_secs(60)),
        remote,
    ));
    let svc = RankingService::new(
        Arc::new(FixedArticles { arts }),
        Arc::new(FixedEngagement { likes }),
        store.clone(),
        batch_size,
        top_n,
        7,
        default_score_fn(1.5),
    );
    (svc, store)
}

/// 100 articles where both likes and freshness decrease with the id: the
/// top ten must be ids 1..=10 in order.
#[tokio::test]
async fn top_ten_orders_by_score() {
    let now = Utc::now();
    let arts: Vec<ArticleView> = (1..=100)
        .map(|i| view(i, now - chrono::Duration::hours(i)))
        .collect();
    let likes: HashMap<i64, i64> = (1..=100).map(|i| (i, 1000 - 10 * i)).collect();

    let (svc, _) = service(arts, likes, MemoryRemote::up(), 10, 10);
    svc.rank_top_n().await.unwrap();

    let top = svc.get_top_n().await.unwrap();
    let ids: Vec<i64> = top.iter().map(|a| a.id).collect();
    assert_eq!(ids, (1..=10).collect::<Vec<i64>>());
}

/// Same input, same score function: the output is a pure function of both.
#[tokio::test]
async fn ranking_is_deterministic() {
    let now = Utc::now();
    let arts: Vec<ArticleView> = (1..=50)
        .map(|i| view(i, now - chrono::Duration::minutes(i * 7)))
        .collect();
    let likes: HashMap<i64, i64> = (1..=50).map(|i| (i, (i * 13) % 101)).collect();

    let (svc_a, _) = service(arts.clone(), likes.clone(), MemoryRemote::up(), 8, 20);
    let (svc_b, _) = service(arts, likes, MemoryRemote::up(), 8, 20);

    svc_a.rank_top_n().await.unwrap();
    svc_b.rank_top_n().await.unwrap();

    let a: Vec<i64> = svc_a.get_top_n().await.unwrap().iter().map(|x| x.id).collect();
    let b: Vec<i64> = svc_b.get_top_n().await.unwrap().iter().map(|x| x.id).collect();
    assert_eq!(a, b);
    assert!(!a.is_empty());
}

/// Articles the engagement snapshot does not know, or with zero likes,
/// never enter the list.
#[tokio::test]
async fn unliked_articles_are_skipped() {
    let now = Utc::now();
    let arts = vec![
        view(1, now - chrono::Duration::hours(1)),
        view(2, now - chrono::Duration::hours(2)),
        view(3, now - chrono::Duration::hours(3)),
    ];
    let likes = HashMap::from([(1, 5), (2, 0)]); // 3 missing entirely

    let (svc, _) = service(arts, likes, MemoryRemote::up(), 10, 10);
    svc.rank_top_n().await.unwrap();

    let ids: Vec<i64> = svc.get_top_n().await.unwrap().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1]);
}

/// The scan stops at the page whose tail crosses the seven-day horizon;
/// older pages are never fetched no matter how well they score.
#[tokio::test]
async fn scan_stops_at_the_horizon() {
    let now = Utc::now();
    let arts = vec![
        view(1, now - chrono::Duration::hours(1)),
        view(2, now - chrono::Duration::hours(2)),
        view(3, now - chrono::Duration::days(8)),
        view(4, now - chrono::Duration::days(9)),
        view(5, now - chrono::Duration::days(10)),
        view(6, now - chrono::Duration::days(11)),
    ];
    let likes: HashMap<i64, i64> = (1..=6).map(|i| (i, 10_000)).collect();

    let (svc, _) = service(arts, likes, MemoryRemote::up(), 3, 10);
    svc.rank_top_n().await.unwrap();

    let ids: Vec<i64> = svc.get_top_n().await.unwrap().iter().map(|a| a.id).collect();
    assert!(ids.contains(&1) && ids.contains(&2));
    assert!(!ids.contains(&4) && !ids.contains(&5) && !ids.contains(&6));
}

/// The stored remote blob carries no article bodies, while the local tier
/// keeps the full views.
#[tokio::test]
async fn remote_blob_is_content_stripped() {
    let now = Utc::now();
    let arts = vec![view(1, now - chrono::Duration::hours(1))];
    let likes = HashMap::from([(1, 50)]);

    let (remote, blob) = MemoryRemote::up_with_handle();
    let (svc, store) = service(arts, likes, remote, 10, 10);
    svc.rank_top_n().await.unwrap();

    let stored = blob.lock().unwrap().clone().expect("remote blob written");
    assert_eq!(stored.len(), 1);
    assert!(stored[0].content.is_empty());

    let local = store.get_top_n().await.unwrap();
    assert!(!local[0].content.is_empty());
}

/// Remote outage: computing still succeeds locally and reads keep serving
/// the last snapshot.
#[tokio::test]
async fn brown_out_serves_local_snapshot() {
    let now = Utc::now();
    let arts = vec![
        view(1, now - chrono::Duration::hours(1)),
        view(2, now - chrono::Duration::hours(2)),
    ];
    let likes = HashMap::from([(1, 9), (2, 5)]);

    let (svc, _) = service(arts, likes, MemoryRemote::down(), 10, 10);
    assert!(svc.rank_top_n().await.is_err());

    let ids: Vec<i64> = svc.get_top_n().await.unwrap().iter().map(|a| a.id).collect();
    assert_eq!(ids, vec![1, 2]);
}
