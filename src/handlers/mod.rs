/// HTTP handlers and the response envelope.
pub mod articles;

use actix_web::web;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::AppError;

/// Uniform response envelope: 0 OK, 4 client fault, 5 server fault.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            msg: "OK".to_string(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn ok_empty() -> Self {
        Self {
            code: 0,
            msg: "OK".to_string(),
            data: None,
        }
    }

    pub fn client_error(msg: impl Into<String>) -> Self {
        Self {
            code: 4,
            msg: msg.into(),
            data: None,
        }
    }

    pub fn system_error() -> Self {
        Self {
            code: 5,
            msg: "system error".to_string(),
            data: None,
        }
    }
}

/// Map a service failure into the envelope. Ownership violations get the
/// generic server-fault treatment on purpose.
pub fn failure(e: AppError) -> ApiResponse<()> {
    match e {
        AppError::NotFound(msg) => ApiResponse::client_error(msg),
        AppError::Validation(msg) => ApiResponse::client_error(msg),
        AppError::PossibleIncorrectAuthor => {
            warn!("ownership violation surfaced to handler");
            ApiResponse::system_error()
        }
        other => {
            error!("request failed: {}", other);
            ApiResponse::system_error()
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/articles")
            .route("/edit", web::post().to(articles::edit))
            .route("/publish", web::post().to(articles::publish))
            .route("/withdraw", web::post().to(articles::withdraw))
            .route("/list", web::post().to(articles::list))
            .route("/detail/{id}", web::get().to(articles::detail))
            .route("/pub/{id}", web::get().to(articles::pub_detail))
            .route("/pub/like", web::post().to(articles::like))
            .route("/pub/collect", web::post().to(articles::collect))
            .route("/ranking", web::get().to(articles::ranking)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_codes() {
        assert_eq!(ApiResponse::ok(1i64).code, 0);
        assert_eq!(ApiResponse::ok_empty().code, 0);
        assert_eq!(ApiResponse::client_error("bad input").code, 4);
        assert_eq!(ApiResponse::system_error().code, 5);
    }

    #[test]
    fn empty_data_is_omitted_from_json() {
        let json = serde_json::to_string(&ApiResponse::ok_empty()).unwrap();
        assert_eq!(json, r#"{"code":0,"msg":"OK"}"#);
    }

    #[test]
    fn ownership_violation_maps_to_code_5() {
        let resp = failure(AppError::PossibleIncorrectAuthor);
        assert_eq!(resp.code, 5);
        assert_eq!(resp.msg, "system error");
    }

    #[test]
    fn not_found_maps_to_code_4() {
        let resp = failure(AppError::NotFound("article 9".to_string()));
        assert_eq!(resp.code, 4);
    }
}
