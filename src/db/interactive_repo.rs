use std::collections::HashMap;

use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::{Interactive, UserCollectionBiz, UserLikeBiz};

/// Upsert-style read counter bump for a single entity.
pub async fn incr_read_cnt(pool: &PgPool, biz: &str, biz_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO interactives (biz, biz_id, read_cnt, ctime, utime)
        VALUES ($1, $2, 1, NOW(), NOW())
        ON CONFLICT (biz, biz_id) DO UPDATE
        SET read_cnt = interactives.read_cnt + 1, utime = NOW()
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fold duplicate (biz, biz_id) pairs into per-pair deltas so the batch
/// collapses to one row per entity.
pub fn fold_read_counts(bizs: &[String], biz_ids: &[i64]) -> (Vec<String>, Vec<i64>, Vec<i64>) {
    let mut counts: HashMap<(&str, i64), i64> = HashMap::new();
    let mut order: Vec<(&str, i64)> = Vec::new();
    for (biz, id) in bizs.iter().zip(biz_ids.iter()) {
        let key = (biz.as_str(), *id);
        match counts.entry(key) {
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(1);
                order.push(key);
            }
            std::collections::hash_map::Entry::Occupied(mut e) => {
                *e.get_mut() += 1;
            }
        }
    }

    let mut out_bizs = Vec::with_capacity(order.len());
    let mut out_ids = Vec::with_capacity(order.len());
    let mut out_counts = Vec::with_capacity(order.len());
    for key in order {
        out_bizs.push(key.0.to_string());
        out_ids.push(key.1);
        out_counts.push(counts[&key]);
    }
    (out_bizs, out_ids, out_counts)
}

/// Apply a window of read events in a single round trip. Every occurrence
/// of a (biz, biz_id) pair in the input counts once.
pub async fn batch_incr_read_cnt(pool: &PgPool, bizs: &[String], biz_ids: &[i64]) -> Result<()> {
    if bizs.len() != biz_ids.len() {
        return Err(AppError::Validation(format!(
            "batch length mismatch: {} bizs vs {} ids",
            bizs.len(),
            biz_ids.len()
        )));
    }
    if bizs.is_empty() {
        return Ok(());
    }

    let (fb, fi, fc) = fold_read_counts(bizs, biz_ids);

    sqlx::query(
        r#"
        INSERT INTO interactives (biz, biz_id, read_cnt, ctime, utime)
        SELECT t.biz, t.biz_id, t.delta, NOW(), NOW()
        FROM UNNEST($1::text[], $2::bigint[], $3::bigint[]) AS t(biz, biz_id, delta)
        ON CONFLICT (biz, biz_id) DO UPDATE
        SET read_cnt = interactives.read_cnt + EXCLUDED.read_cnt, utime = NOW()
        "#,
    )
    .bind(&fb)
    .bind(&fi)
    .bind(&fc)
    .execute(pool)
    .await?;

    Ok(())
}

/// Record a like: the per-user row and the aggregate counter move in one
/// transaction. Re-liking a soft-deleted row resurrects it.
pub async fn insert_like(pool: &PgPool, biz: &str, biz_id: i64, uid: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO user_like_biz (biz, biz_id, uid, status, ctime, utime)
        VALUES ($1, $2, $3, 1, NOW(), NOW())
        ON CONFLICT (biz, biz_id, uid) DO UPDATE
        SET status = 1, utime = NOW()
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .bind(uid)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO interactives (biz, biz_id, like_cnt, ctime, utime)
        VALUES ($1, $2, 1, NOW(), NOW())
        ON CONFLICT (biz, biz_id) DO UPDATE
        SET like_cnt = interactives.like_cnt + 1, utime = NOW()
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Soft-delete a like. The decrement never inserts a counter row and is
/// clamped at zero, so a cancel without a prior like cannot go negative.
pub async fn delete_like(pool: &PgPool, biz: &str, biz_id: i64, uid: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        UPDATE user_like_biz
        SET status = 0, utime = NOW()
        WHERE biz = $1 AND biz_id = $2 AND uid = $3
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .bind(uid)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE interactives
        SET like_cnt = GREATEST(like_cnt - 1, 0), utime = NOW()
        WHERE biz = $1 AND biz_id = $2
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Add an entity to a collection folder and bump the aggregate counter.
pub async fn insert_collection(
    pool: &PgPool,
    biz: &str,
    biz_id: i64,
    cid: i64,
    uid: i64,
) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO user_collection_biz (cid, biz, biz_id, uid, ctime, utime)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        "#,
    )
    .bind(cid)
    .bind(biz)
    .bind(biz_id)
    .bind(uid)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO interactives (biz, biz_id, collect_cnt, ctime, utime)
        VALUES ($1, $2, 1, NOW(), NOW())
        ON CONFLICT (biz, biz_id) DO UPDATE
        SET collect_cnt = interactives.collect_cnt + 1, utime = NOW()
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get(pool: &PgPool, biz: &str, biz_id: i64) -> Result<Option<Interactive>> {
    let row = sqlx::query_as::<_, Interactive>(
        r#"
        SELECT id, biz, biz_id, read_cnt, like_cnt, collect_cnt, ctime, utime
        FROM interactives
        WHERE biz = $1 AND biz_id = $2
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Active like row for the triple, if any.
pub async fn get_like_info(
    pool: &PgPool,
    biz: &str,
    biz_id: i64,
    uid: i64,
) -> Result<Option<UserLikeBiz>> {
    let row = sqlx::query_as::<_, UserLikeBiz>(
        r#"
        SELECT id, biz, biz_id, uid, status, ctime, utime
        FROM user_like_biz
        WHERE biz = $1 AND biz_id = $2 AND uid = $3 AND status = 1
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn get_collection_info(
    pool: &PgPool,
    biz: &str,
    biz_id: i64,
    uid: i64,
) -> Result<Option<UserCollectionBiz>> {
    let row = sqlx::query_as::<_, UserCollectionBiz>(
        r#"
        SELECT id, cid, biz, biz_id, uid, ctime, utime
        FROM user_collection_biz
        WHERE biz = $1 AND biz_id = $2 AND uid = $3
        "#,
    )
    .bind(biz)
    .bind(biz_id)
    .bind(uid)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Batched snapshot fetch for the ranking join. Missing entities are simply
/// absent from the result.
pub async fn get_by_ids(pool: &PgPool, biz: &str, ids: &[i64]) -> Result<Vec<Interactive>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query_as::<_, Interactive>(
        r#"
        SELECT id, biz, biz_id, read_cnt, like_cnt, collect_cnt, ctime, utime
        FROM interactives
        WHERE biz = $1 AND biz_id = ANY($2)
        "#,
    )
    .bind(biz)
    .bind(ids)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fold_collapses_duplicate_pairs() {
        let bizs = vec![
            "article".to_string(),
            "article".to_string(),
            "comment".to_string(),
            "article".to_string(),
        ];
        let ids = vec![7, 7, 7, 9];
        let (fb, fi, fc) = fold_read_counts(&bizs, &ids);

        assert_eq!(fb, vec!["article", "comment", "article"]);
        assert_eq!(fi, vec![7, 7, 9]);
        assert_eq!(fc, vec![2, 1, 1]);
    }

    #[test]
    fn fold_preserves_totals() {
        let bizs: Vec<String> = std::iter::repeat("article".to_string()).take(250).collect();
        let ids = vec![7i64; 250];
        let (fb, fi, fc) = fold_read_counts(&bizs, &ids);

        assert_eq!(fb.len(), 1);
        assert_eq!(fi, vec![7]);
        assert_eq!(fc.iter().sum::<i64>(), 250);
    }

    #[test]
    fn fold_of_empty_input_is_empty() {
        let (fb, fi, fc) = fold_read_counts(&[], &[]);
        assert!(fb.is_empty() && fi.is_empty() && fc.is_empty());
    }
}
