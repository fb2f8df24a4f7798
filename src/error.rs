/// Error types for article-service
///
/// Errors are converted to appropriate HTTP responses for API clients.
/// Database failures surface; cache failures on write paths are logged at
/// the call site and never reach a client.
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

/// Result type for article-service operations
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Kafka error: {0}")]
    Kafka(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// A write predicated on ownership touched zero rows. The row either
    /// does not exist or belongs to another user; callers must not be able
    /// to tell which.
    #[error("operation touched a row owned by another user")]
    PossibleIncorrectAuthor,

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status: u16,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Ownership violations are deliberately reported as a generic
        // server fault so the response does not confirm the row exists.
        let message = match self {
            AppError::PossibleIncorrectAuthor => "system error".to_string(),
            other => other.to_string(),
        };

        HttpResponse::build(status).json(ErrorBody {
            error: message,
            status: status.as_u16(),
        })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("row not found".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<rdkafka::error::KafkaError> for AppError {
    fn from(err: rdkafka::error::KafkaError) -> Self {
        AppError::Kafka(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_mismatch_is_reported_as_generic_server_fault() {
        let err = AppError::PossibleIncorrectAuthor;
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::NotFound("article 1".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
