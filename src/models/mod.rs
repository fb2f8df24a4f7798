/// Domain types shared across repositories, services, and handlers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a draft article. Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum ArticleStatus {
    Unknown = 0,
    Unpublished = 1,
    Published = 2,
    Private = 3,
}

impl ArticleStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl From<i16> for ArticleStatus {
    fn from(v: i16) -> Self {
        match v {
            1 => ArticleStatus::Unpublished,
            2 => ArticleStatus::Published,
            3 => ArticleStatus::Private,
            _ => ArticleStatus::Unknown,
        }
    }
}

/// Draft article row (`articles`). The published twin shares the shape.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub status: i16,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

impl Article {
    /// Short preview used by list endpoints instead of the full body.
    pub fn abstract_text(&self) -> String {
        const ABSTRACT_CHARS: usize = 128;
        self.content.chars().take(ABSTRACT_CHARS).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
}

/// Reader-facing article: author enriched, serializable for caches and the
/// ranking blob. `content` is cleared before the view enters the ranking
/// cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleView {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: Author,
    pub status: i16,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

/// Per-(biz, biz_id) engagement counters (`interactives`).
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct Interactive {
    pub id: i64,
    pub biz: String,
    pub biz_id: i64,
    pub read_cnt: i64,
    pub like_cnt: i64,
    pub collect_cnt: i64,
    #[serde(skip)]
    pub ctime: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub utime: Option<DateTime<Utc>>,
}

/// One logical like per (biz, biz_id, uid); status 0 soft-deletes it.
#[derive(Debug, Clone, FromRow)]
pub struct UserLikeBiz {
    pub id: i64,
    pub biz: String,
    pub biz_id: i64,
    pub uid: i64,
    pub status: i16,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

/// Collection membership, unique on (biz, biz_id, uid).
#[derive(Debug, Clone, FromRow)]
pub struct UserCollectionBiz {
    pub id: i64,
    pub cid: i64,
    pub biz: String,
    pub biz_id: i64,
    pub uid: i64,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

/// Scheduler job states. Stored as SMALLINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum JobStatus {
    /// Free to be preempted
    Waiting = 0,
    /// Leased by a scheduler replica
    Running = 1,
    /// Terminal; never scheduled again
    End = 2,
}

impl JobStatus {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// Named cron job row (`jobs`). `version` is the optimistic-lock token.
#[derive(Debug, Clone, FromRow)]
pub struct CronJob {
    pub id: i64,
    pub name: String,
    pub executor: String,
    pub cfg: String,
    pub expression: String,
    pub status: i16,
    pub next_time: DateTime<Utc>,
    pub version: i64,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

impl CronJob {
    /// Next fire time after `now`, or None when the expression yields no
    /// future occurrence (one-shot jobs that already ran).
    pub fn next_run(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        use std::str::FromStr;
        let schedule = cron::Schedule::from_str(&self.expression).ok()?;
        schedule.after(&now).next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn status_round_trip() {
        for s in [
            ArticleStatus::Unknown,
            ArticleStatus::Unpublished,
            ArticleStatus::Published,
            ArticleStatus::Private,
        ] {
            assert_eq!(ArticleStatus::from(s.as_i16()), s);
        }
        assert_eq!(ArticleStatus::from(99), ArticleStatus::Unknown);
    }

    #[test]
    fn abstract_truncates_long_content() {
        let art = Article {
            id: 1,
            title: "t".to_string(),
            content: "x".repeat(500),
            author_id: 1,
            status: ArticleStatus::Published.as_i16(),
            ctime: Utc::now(),
            utime: Utc::now(),
        };
        assert_eq!(art.abstract_text().chars().count(), 128);
    }

    #[test]
    fn abstract_keeps_short_content_whole() {
        let art = Article {
            id: 1,
            title: "t".to_string(),
            content: "short body".to_string(),
            author_id: 1,
            status: ArticleStatus::Unpublished.as_i16(),
            ctime: Utc::now(),
            utime: Utc::now(),
        };
        assert_eq!(art.abstract_text(), "short body");
    }

    #[test]
    fn next_run_follows_cron_expression() {
        let job = CronJob {
            id: 1,
            name: "ranking".to_string(),
            executor: "local".to_string(),
            cfg: String::new(),
            expression: "0 0 * * * *".to_string(),
            status: JobStatus::Waiting.as_i16(),
            next_time: Utc::now(),
            version: 0,
            ctime: Utc::now(),
            utime: Utc::now(),
        };
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap();
        let next = job.next_run(now).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn next_run_is_none_for_invalid_expression() {
        let job = CronJob {
            id: 1,
            name: "broken".to_string(),
            executor: "local".to_string(),
            cfg: String::new(),
            expression: "not a cron spec".to_string(),
            status: JobStatus::Waiting.as_i16(),
            next_time: Utc::now(),
            version: 0,
            ctime: Utc::now(),
            utime: Utc::now(),
        };
        assert!(job.next_run(Utc::now()).is_none());
    }
}
