/// Business logic layer.
pub mod articles;
pub mod cron_jobs;
pub mod interactive;
pub mod ranking;

pub use articles::ArticleService;
pub use cron_jobs::{CronJobService, LeasedJob};
pub use interactive::{InteractiveService, InteractiveStats};
pub use ranking::{
    default_score_fn, EngagementSource, PublishedArticleSource, RankingService, ScoreFn,
};
