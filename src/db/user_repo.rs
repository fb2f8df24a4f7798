use sqlx::{PgPool, Row};

use crate::error::Result;

/// Author-name lookup used to enrich published article views.
///
/// Profile management lives elsewhere; this repository deliberately exposes
/// nothing but the display name, and the dependency only ever points from
/// articles to users.
pub async fn find_nickname(pool: &PgPool, user_id: i64) -> Result<Option<String>> {
    let row = sqlx::query("SELECT nickname FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| r.get::<String, _>("nickname")))
}
