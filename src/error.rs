use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Seconds a client should wait before retrying after a dependency outage
pub const RETRY_AFTER_SECS: u64 = 30;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Dependency timed out: {0}")]
    DependencyTimeout(String),

    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Cache generation failed for {key}: {reason}")]
    CacheGeneration { key: String, reason: String },

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the failure came from a collaborator rather than from the caller
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            AppError::Database(_)
                | AppError::Cache(_)
                | AppError::HttpClient(_)
                | AppError::DependencyTimeout(_)
                | AppError::DependencyUnavailable(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(_)
            | AppError::DependencyTimeout(_)
            | AppError::DependencyUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::Cache(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::CacheGeneration { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(RETRY_AFTER_SECS),
            );
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_unavailable_maps_to_503_with_retry_after() {
        let response = AppError::DependencyUnavailable("catalog".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            &HeaderValue::from(RETRY_AFTER_SECS)
        );
    }

    #[test]
    fn test_validation_maps_to_400_without_retry_hint() {
        let response = AppError::Validation("bad adventure".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_generation_failure_is_not_a_dependency_failure() {
        let err = AppError::CacheGeneration {
            key: "insights:u1:comprehensive".to_string(),
            reason: "boom".to_string(),
        };
        assert!(!err.is_dependency_failure());
        assert!(AppError::DependencyTimeout("ml".to_string()).is_dependency_failure());
    }
}
