/// Article endpoints: authoring, reading, and engagement actions.
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::RankingRedisCache;
use crate::handlers::{failure, ApiResponse};
use crate::middleware::UserId;
use crate::models::{Article, ArticleView};
use crate::services::{ArticleService, InteractiveService, InteractiveStats, RankingService};

const BIZ_ARTICLE: &str = "article";

#[derive(Debug, Deserialize)]
pub struct ArticleReq {
    #[serde(default)]
    pub id: i64,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct WithdrawReq {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ListReq {
    #[serde(default)]
    pub offset: i64,
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct LikeReq {
    pub id: i64,
    pub like: bool,
}

#[derive(Debug, Deserialize)]
pub struct CollectReq {
    pub id: i64,
    pub cid: i64,
}

/// List item: the body is trimmed to an abstract.
#[derive(Debug, Serialize)]
pub struct ArticleListItem {
    pub id: i64,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub status: i16,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
}

impl From<&Article> for ArticleListItem {
    fn from(art: &Article) -> Self {
        Self {
            id: art.id,
            title: art.title.clone(),
            abstract_text: art.abstract_text(),
            status: art.status,
            ctime: art.ctime,
            utime: art.utime,
        }
    }
}

/// Published detail merged with its engagement snapshot.
#[derive(Debug, Serialize)]
pub struct PubArticleResp {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author_id: i64,
    pub author_name: String,
    pub status: i16,
    pub ctime: DateTime<Utc>,
    pub utime: DateTime<Utc>,
    pub read_cnt: i64,
    pub like_cnt: i64,
    pub collect_cnt: i64,
    pub liked: bool,
    pub collected: bool,
}

/// Save a draft without publishing.
pub async fn edit(
    articles: web::Data<Arc<ArticleService>>,
    uid: UserId,
    req: web::Json<ArticleReq>,
) -> HttpResponse {
    match articles.save(uid.0, req.id, &req.title, &req.content).await {
        Ok(id) => HttpResponse::Ok().json(ApiResponse::ok(id)),
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// Publish (or republish) a draft to readers.
pub async fn publish(
    articles: web::Data<Arc<ArticleService>>,
    uid: UserId,
    req: web::Json<ArticleReq>,
) -> HttpResponse {
    match articles
        .publish(uid.0, req.id, &req.title, &req.content)
        .await
    {
        Ok(id) => HttpResponse::Ok().json(ApiResponse::ok(id)),
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// Hide a published article from readers.
pub async fn withdraw(
    articles: web::Data<Arc<ArticleService>>,
    uid: UserId,
    req: web::Json<WithdrawReq>,
) -> HttpResponse {
    match articles.withdraw(uid.0, req.id).await {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::ok_empty()),
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// The author's own article list, abstracts only.
pub async fn list(
    articles: web::Data<Arc<ArticleService>>,
    uid: UserId,
    req: web::Json<ListReq>,
) -> HttpResponse {
    match articles.list(uid.0, req.offset, req.limit).await {
        Ok(arts) => {
            let items: Vec<ArticleListItem> = arts.iter().map(ArticleListItem::from).collect();
            HttpResponse::Ok().json(ApiResponse::ok(items))
        }
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// The author's own draft, full content.
pub async fn detail(
    articles: web::Data<Arc<ArticleService>>,
    uid: UserId,
    path: web::Path<i64>,
) -> HttpResponse {
    match articles.detail(uid.0, *path).await {
        Ok(art) => HttpResponse::Ok().json(ApiResponse::ok(art)),
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// Reader-facing detail: article view and counters fetched concurrently;
/// the read event fires behind the response.
pub async fn pub_detail(
    articles: web::Data<Arc<ArticleService>>,
    interactive: web::Data<Arc<InteractiveService>>,
    uid: UserId,
    path: web::Path<i64>,
) -> HttpResponse {
    let id = *path;
    let joined = tokio::try_join!(
        articles.get_published_by_id(id, uid.0),
        interactive.get(BIZ_ARTICLE, id, uid.0),
    );

    match joined {
        Ok((view, stats)) => {
            let InteractiveStats {
                interactive: intr,
                liked,
                collected,
            } = stats;
            HttpResponse::Ok().json(ApiResponse::ok(PubArticleResp {
                id: view.id,
                title: view.title,
                content: view.content,
                author_id: view.author.id,
                author_name: view.author.name,
                status: view.status,
                ctime: view.ctime,
                utime: view.utime,
                read_cnt: intr.read_cnt,
                like_cnt: intr.like_cnt,
                collect_cnt: intr.collect_cnt,
                liked,
                collected,
            }))
        }
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// Like or cancel a like on a published article.
pub async fn like(
    interactive: web::Data<Arc<InteractiveService>>,
    uid: UserId,
    req: web::Json<LikeReq>,
) -> HttpResponse {
    let res = if req.like {
        interactive.like(BIZ_ARTICLE, req.id, uid.0).await
    } else {
        interactive.cancel_like(BIZ_ARTICLE, req.id, uid.0).await
    };

    match res {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::ok_empty()),
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// Ranked list item: the blob never carries bodies, so neither does the
/// response.
#[derive(Debug, Serialize)]
pub struct RankedArticle {
    pub id: i64,
    pub title: String,
    pub author_id: i64,
    pub author_name: String,
    pub status: i16,
    pub utime: DateTime<Utc>,
}

impl From<ArticleView> for RankedArticle {
    fn from(view: ArticleView) -> Self {
        Self {
            id: view.id,
            title: view.title,
            author_id: view.author.id,
            author_name: view.author.name,
            status: view.status,
            utime: view.utime,
        }
    }
}

/// The current top-N ranking list.
pub async fn ranking(
    ranking: web::Data<Arc<RankingService<RankingRedisCache>>>,
) -> HttpResponse {
    match ranking.get_top_n().await {
        Ok(arts) => {
            let items: Vec<RankedArticle> = arts.into_iter().map(RankedArticle::from).collect();
            HttpResponse::Ok().json(ApiResponse::ok(items))
        }
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}

/// Add a published article to one of the caller's collection folders.
pub async fn collect(
    interactive: web::Data<Arc<InteractiveService>>,
    uid: UserId,
    req: web::Json<CollectReq>,
) -> HttpResponse {
    match interactive
        .collect(BIZ_ARTICLE, req.id, req.cid, uid.0)
        .await
    {
        Ok(()) => HttpResponse::Ok().json(ApiResponse::ok_empty()),
        Err(e) => HttpResponse::Ok().json(failure(e)),
    }
}
