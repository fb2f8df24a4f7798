/// Redis-backed caches: engagement counters, article pages/views, and the
/// two-tier ranking store.
pub mod article_cache;
pub mod interactive_cache;
pub mod ranking_cache;

pub use article_cache::ArticleCache;
pub use interactive_cache::InteractiveCache;
pub use ranking_cache::{RankingLocalCache, RankingRedisCache, RankingStore, RemoteTopList};
