use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::cache::{RankingStore, RemoteTopList};
use crate::error::Result;
use crate::models::{ArticleView, Interactive};

/// Paged source of published articles, newest first. Implemented by the
/// article service; tests drive the engine with in-memory fixtures.
#[async_trait]
pub trait PublishedArticleSource: Send + Sync {
    async fn list_published(
        &self,
        before: DateTime<Utc>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<ArticleView>>;
}

/// Batched engagement snapshots keyed by entity id.
#[async_trait]
pub trait EngagementSource: Send + Sync {
    async fn get_by_ids(&self, biz: &str, ids: &[i64]) -> Result<HashMap<i64, Interactive>>;
}

/// Injectable scoring function: (like_cnt, utime, now) -> score.
pub type ScoreFn = Arc<dyn Fn(i64, DateTime<Utc>, DateTime<Utc>) -> f64 + Send + Sync>;

/// The default time-decayed score: likes divided by a power of the age.
pub fn default_score_fn(factor: f64) -> ScoreFn {
    Arc::new(move |like_cnt, utime, now| {
        let age_hours = (now - utime).num_seconds() as f64 / 3600.0;
        (like_cnt - 1) as f64 / (age_hours + 2.0).powf(factor)
    })
}

struct Scored {
    score: f64,
    article: ArticleView,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
    }
}

/// Batched top-N ranking over published articles.
///
/// Walks the published table in pages, joins each page with an engagement
/// snapshot, and keeps the N best scores in a bounded min-heap. The scan
/// stops at a short page or once a page's tail falls past the horizon.
pub struct RankingService<R: RemoteTopList> {
    articles: Arc<dyn PublishedArticleSource>,
    engagement: Arc<dyn EngagementSource>,
    store: Arc<RankingStore<R>>,
    batch_size: i64,
    top_n: usize,
    horizon: Duration,
    score: ScoreFn,
}

impl<R: RemoteTopList> RankingService<R> {
    pub fn new(
        articles: Arc<dyn PublishedArticleSource>,
        engagement: Arc<dyn EngagementSource>,
        store: Arc<RankingStore<R>>,
        batch_size: i64,
        top_n: usize,
        horizon_days: i64,
        score: ScoreFn,
    ) -> Self {
        Self {
            articles,
            engagement,
            store,
            batch_size,
            top_n,
            horizon: Duration::days(horizon_days),
            score,
        }
    }

    /// Compute the top-N list and publish it through the two-tier store.
    pub async fn rank_top_n(&self) -> Result<()> {
        let arts = self.compute_top_n().await?;
        info!(len = arts.len(), "ranking computed, replacing top list");
        self.store.replace_top_n(arts).await
    }

    pub async fn get_top_n(&self) -> Result<Vec<ArticleView>> {
        self.store.get_top_n().await
    }

    async fn compute_top_n(&self) -> Result<Vec<ArticleView>> {
        let now = Utc::now();
        let horizon = now - self.horizon;
        let mut offset = 0i64;
        let mut heap: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(self.top_n + 1);

        loop {
            let arts = self
                .articles
                .list_published(now, offset, self.batch_size)
                .await?;
            if arts.is_empty() {
                break;
            }

            let ids: Vec<i64> = arts.iter().map(|a| a.id).collect();
            let snapshots = self.engagement.get_by_ids("article", &ids).await?;
            debug!(
                batch = arts.len(),
                snapshots = snapshots.len(),
                offset,
                "ranking batch joined"
            );

            for art in &arts {
                let Some(intr) = snapshots.get(&art.id) else {
                    continue;
                };
                if intr.like_cnt <= 0 {
                    continue;
                }

                let score = (self.score)(intr.like_cnt, art.utime, now);
                push_bounded(
                    &mut heap,
                    self.top_n,
                    Scored {
                        score,
                        article: art.clone(),
                    },
                );
            }

            let page_len = arts.len() as i64;
            let tail_past_horizon = arts
                .last()
                .map(|a| a.utime < horizon)
                .unwrap_or(true);
            if page_len < self.batch_size || tail_past_horizon {
                break;
            }
            offset += page_len;
        }

        // Min-heap drains smallest-first; reverse into descending order.
        let mut out: Vec<ArticleView> = Vec::with_capacity(heap.len());
        while let Some(Reverse(entry)) = heap.pop() {
            out.push(entry.article);
        }
        out.reverse();
        Ok(out)
    }
}

/// Keep the heap bounded at `cap`: evict the current minimum only when the
/// incoming score is strictly larger.
fn push_bounded(heap: &mut BinaryHeap<Reverse<Scored>>, cap: usize, entry: Scored) {
    if cap == 0 {
        return;
    }
    if heap.len() < cap {
        heap.push(Reverse(entry));
        return;
    }
    if let Some(Reverse(min)) = heap.peek() {
        if entry.score > min.score {
            heap.pop();
            heap.push(Reverse(entry));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Author;
    use chrono::TimeZone;

    fn view(id: i64, utime: DateTime<Utc>) -> ArticleView {
        ArticleView {
            id,
            title: format!("article {}", id),
            content: String::new(),
            author: Author {
                id: 1,
                name: String::new(),
            },
            status: 2,
            ctime: utime,
            utime,
        }
    }

    #[test]
    fn default_score_decays_with_age() {
        let score = default_score_fn(1.5);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let fresh = score(100, now - Duration::hours(1), now);
        let old = score(100, now - Duration::hours(48), now);
        assert!(fresh > old);
    }

    #[test]
    fn default_score_is_monotone_in_likes() {
        let score = default_score_fn(1.5);
        let now = Utc::now();
        let utime = now - Duration::hours(5);
        assert!(score(200, utime, now) > score(100, utime, now));
    }

    #[test]
    fn default_score_matches_formula() {
        let score = default_score_fn(1.5);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let utime = now - Duration::hours(1);
        let expected = 99.0 / 3.0f64.powf(1.5);
        assert!((score(100, utime, now) - expected).abs() < 1e-9);
    }

    #[test]
    fn bounded_heap_keeps_the_largest_scores() {
        let now = Utc::now();
        let mut heap = BinaryHeap::new();
        for (id, s) in [(1, 5.0), (2, 1.0), (3, 9.0), (4, 3.0)] {
            push_bounded(
                &mut heap,
                2,
                Scored {
                    score: s,
                    article: view(id, now),
                },
            );
        }

        let mut ids: Vec<i64> = heap.into_iter().map(|Reverse(e)| e.article.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn bounded_heap_ignores_equal_scores_on_overflow() {
        let now = Utc::now();
        let mut heap = BinaryHeap::new();
        push_bounded(&mut heap, 1, Scored { score: 2.0, article: view(1, now) });
        push_bounded(&mut heap, 1, Scored { score: 2.0, article: view(2, now) });

        let ids: Vec<i64> = heap.into_iter().map(|Reverse(e)| e.article.id).collect();
        assert_eq!(ids, vec![1]);
    }
}
