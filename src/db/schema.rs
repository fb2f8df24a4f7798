use sqlx::PgPool;
use tracing::info;

use crate::error::Result;

/// Ensure all service tables exist.
///
/// Tables are lazily created at service startup to unblock environments
/// where no migration has been applied yet (fresh developer machines, CI
/// spins). Statements are idempotent.
pub async fn ensure_tables(pool: &PgPool) -> Result<()> {
    info!("Ensuring article-service tables exist");

    for ddl in [
        ARTICLES_TABLE,
        ARTICLES_AUTHOR_INDEX,
        PUBLISHED_ARTICLES_TABLE,
        PUBLISHED_ARTICLES_UTIME_INDEX,
        INTERACTIVES_TABLE,
        USER_LIKE_BIZ_TABLE,
        USER_COLLECTION_BIZ_TABLE,
        USER_COLLECTION_BIZ_CID_INDEX,
        JOBS_TABLE,
        JOBS_NEXT_TIME_INDEX,
        USERS_TABLE,
    ] {
        sqlx::query(ddl).execute(pool).await?;
    }

    Ok(())
}

const ARTICLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS articles (
    id        BIGSERIAL PRIMARY KEY,
    title     TEXT NOT NULL,
    content   TEXT NOT NULL,
    author_id BIGINT NOT NULL,
    status    SMALLINT NOT NULL,
    ctime     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    utime     TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const ARTICLES_AUTHOR_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_articles_author ON articles (author_id, utime DESC)";

const PUBLISHED_ARTICLES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS published_articles (
    id        BIGINT PRIMARY KEY,
    title     TEXT NOT NULL,
    content   TEXT NOT NULL,
    author_id BIGINT NOT NULL,
    status    SMALLINT NOT NULL,
    ctime     TIMESTAMPTZ NOT NULL,
    utime     TIMESTAMPTZ NOT NULL
)
"#;

const PUBLISHED_ARTICLES_UTIME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_published_articles_utime ON published_articles (utime DESC)";

const INTERACTIVES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS interactives (
    id          BIGSERIAL PRIMARY KEY,
    biz         VARCHAR(128) NOT NULL,
    biz_id      BIGINT NOT NULL,
    read_cnt    BIGINT NOT NULL DEFAULT 0,
    like_cnt    BIGINT NOT NULL DEFAULT 0,
    collect_cnt BIGINT NOT NULL DEFAULT 0,
    ctime       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    utime       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (biz, biz_id)
)
"#;

const USER_LIKE_BIZ_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_like_biz (
    id     BIGSERIAL PRIMARY KEY,
    biz    VARCHAR(128) NOT NULL,
    biz_id BIGINT NOT NULL,
    uid    BIGINT NOT NULL,
    status SMALLINT NOT NULL DEFAULT 1,
    ctime  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    utime  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (biz, biz_id, uid)
)
"#;

const USER_COLLECTION_BIZ_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user_collection_biz (
    id     BIGSERIAL PRIMARY KEY,
    cid    BIGINT NOT NULL,
    biz    VARCHAR(128) NOT NULL,
    biz_id BIGINT NOT NULL,
    uid    BIGINT NOT NULL,
    ctime  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    utime  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (biz, biz_id, uid)
)
"#;

const USER_COLLECTION_BIZ_CID_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_user_collection_biz_cid ON user_collection_biz (cid)";

const JOBS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS jobs (
    id         BIGSERIAL PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    executor   TEXT NOT NULL,
    cfg        TEXT NOT NULL DEFAULT '',
    expression TEXT NOT NULL,
    status     SMALLINT NOT NULL DEFAULT 0,
    next_time  TIMESTAMPTZ NOT NULL,
    version    BIGINT NOT NULL DEFAULT 0,
    ctime      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    utime      TIMESTAMPTZ NOT NULL DEFAULT NOW()
)
"#;

const JOBS_NEXT_TIME_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_jobs_next_time ON jobs (next_time)";

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id       BIGSERIAL PRIMARY KEY,
    nickname TEXT NOT NULL DEFAULT ''
)
"#;
