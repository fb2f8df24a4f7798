use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::{Article, ArticleStatus};

/// Insert a new draft. Returns the assigned id.
pub async fn create(pool: &PgPool, author_id: i64, title: &str, content: &str) -> Result<i64> {
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO articles (title, content, author_id, status, ctime, utime)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        RETURNING id
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(author_id)
    .bind(ArticleStatus::Unpublished.as_i16())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Full-replace update of a draft, guarded by the author predicate.
/// Zero rows affected means the row is missing or owned by someone else.
pub async fn update_by_id(
    pool: &PgPool,
    id: i64,
    author_id: i64,
    title: &str,
    content: &str,
    status: ArticleStatus,
) -> Result<()> {
    let res = sqlx::query(
        r#"
        UPDATE articles
        SET title = $1, content = $2, status = $3, utime = NOW()
        WHERE id = $4 AND author_id = $5
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(status.as_i16())
    .bind(id)
    .bind(author_id)
    .execute(pool)
    .await?;

    if res.rows_affected() != 1 {
        return Err(AppError::PossibleIncorrectAuthor);
    }
    Ok(())
}

/// Propagate a draft into its published twin inside one transaction.
///
/// A zero id inserts a fresh draft; otherwise the draft is updated under
/// the author predicate. The published row is then upserted *from the
/// draft row*, so `ctime` is written only on first publish and preserved
/// on every republish.
pub async fn sync(
    pool: &PgPool,
    id: i64,
    author_id: i64,
    title: &str,
    content: &str,
) -> Result<i64> {
    let mut tx = pool.begin().await?;
    let status = ArticleStatus::Published.as_i16();

    let id = if id == 0 {
        let (new_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO articles (title, content, author_id, status, ctime, utime)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING id
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(author_id)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;
        new_id
    } else {
        let res = sqlx::query(
            r#"
            UPDATE articles
            SET title = $1, content = $2, status = $3, utime = NOW()
            WHERE id = $4 AND author_id = $5
            "#,
        )
        .bind(title)
        .bind(content)
        .bind(status)
        .bind(id)
        .bind(author_id)
        .execute(&mut *tx)
        .await?;
        if res.rows_affected() != 1 {
            return Err(AppError::PossibleIncorrectAuthor);
        }
        id
    };

    sqlx::query(
        r#"
        INSERT INTO published_articles (id, title, content, author_id, status, ctime, utime)
        SELECT id, title, content, author_id, status, ctime, utime
        FROM articles
        WHERE id = $1
        ON CONFLICT (id) DO UPDATE
        SET title = EXCLUDED.title,
            content = EXCLUDED.content,
            status = EXCLUDED.status,
            utime = EXCLUDED.utime
        "#,
    )
    .bind(id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(id)
}

/// Flip the status on both tables in one transaction. Each update must hit
/// exactly one row, otherwise the whole transaction aborts.
pub async fn sync_status(
    pool: &PgPool,
    uid: i64,
    id: i64,
    status: ArticleStatus,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    for table in ["articles", "published_articles"] {
        let res = sqlx::query(&format!(
            "UPDATE {table} SET status = $1, utime = NOW() WHERE id = $2 AND author_id = $3"
        ))
        .bind(status.as_i16())
        .bind(id)
        .bind(uid)
        .execute(&mut *tx)
        .await?;

        if res.rows_affected() != 1 {
            return Err(AppError::PossibleIncorrectAuthor);
        }
    }

    tx.commit().await?;
    Ok(())
}

/// Page an author's drafts, newest first.
pub async fn find_by_author(
    pool: &PgPool,
    author_id: i64,
    offset: i64,
    limit: i64,
) -> Result<Vec<Article>> {
    let arts = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, content, author_id, status, ctime, utime
        FROM articles
        WHERE author_id = $1
        ORDER BY utime DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(author_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(arts)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Article>> {
    let art = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, content, author_id, status, ctime, utime
        FROM articles
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(art)
}

/// Reader-visible lookup. Withdrawn (Private) rows are filtered out.
pub async fn find_published_by_id(pool: &PgPool, id: i64) -> Result<Option<Article>> {
    let art = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, content, author_id, status, ctime, utime
        FROM published_articles
        WHERE id = $1 AND status = $2
        "#,
    )
    .bind(id)
    .bind(ArticleStatus::Published.as_i16())
    .fetch_optional(pool)
    .await?;

    Ok(art)
}

/// Page published articles with `utime` strictly before `before`, newest
/// first. The ranking engine walks this until the horizon.
pub async fn list_published_before(
    pool: &PgPool,
    before: DateTime<Utc>,
    offset: i64,
    limit: i64,
) -> Result<Vec<Article>> {
    let arts = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, content, author_id, status, ctime, utime
        FROM published_articles
        WHERE utime < $1 AND status = $2
        ORDER BY utime DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(before)
    .bind(ArticleStatus::Published.as_i16())
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(arts)
}
