/// Request identity for article-service.
///
/// JWT issuance and validation live in the gateway; by the time a request
/// reaches this service the gateway has stamped the authenticated user id
/// into the `X-User-Id` header. The extractor turns that into a typed
/// handler argument.
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpRequest};
use std::future::{ready, Ready};

const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller id.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub i64);

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let uid = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<i64>().ok());

        ready(match uid {
            Some(id) if id > 0 => Ok(UserId(id)),
            _ => Err(ErrorUnauthorized("missing or invalid user identity")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn extracts_user_id_from_header() {
        let req = TestRequest::default()
            .insert_header(("X-User-Id", "123"))
            .to_http_request();
        let uid = UserId::extract(&req).await.unwrap();
        assert_eq!(uid.0, 123);
    }

    #[actix_web::test]
    async fn rejects_missing_header() {
        let req = TestRequest::default().to_http_request();
        assert!(UserId::extract(&req).await.is_err());
    }

    #[actix_web::test]
    async fn rejects_non_numeric_header() {
        let req = TestRequest::default()
            .insert_header(("X-User-Id", "mallory"))
            .to_http_request();
        assert!(UserId::extract(&req).await.is_err());
    }
}
