use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Target unreachable: {0}")]
    TargetUnreachable(String),

    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Conflict error: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

impl ApiError {
    /// Create a new validation error
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a new external service error
    pub fn external_service<T: Into<String>>(msg: T) -> Self {
        Self::ExternalService(msg.into())
    }

    /// Create a new target-unreachable error
    pub fn target_unreachable<T: Into<String>>(msg: T) -> Self {
        Self::TargetUnreachable(msg.into())
    }

    /// Create a new timeout error
    pub fn timeout<T: Into<String>>(msg: T) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a new conflict error
    pub fn conflict<T: Into<String>>(msg: T) -> Self {
        Self::Conflict(msg.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();

        let (status, error_message, error_code) = match self {
            ApiError::TargetUnreachable(ref msg) => {
                tracing::warn!(
                    error_id = %error_id,
                    error = %msg,
                    "scan target unreachable"
                );
                (StatusCode::BAD_GATEWAY, msg.as_str(), "TARGET_UNREACHABLE")
            }
            ApiError::ExternalService(ref msg) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %msg,
                    "external service error occurred"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    msg.as_str(),
                    "EXTERNAL_SERVICE_ERROR",
                )
            }
            ApiError::Validation(ref msg) => {
                tracing::warn!(
                    error_id = %error_id,
                    error = %msg,
                    "validation error occurred"
                );
                (StatusCode::BAD_REQUEST, msg.as_str(), "VALIDATION_ERROR")
            }
            ApiError::NotFound(ref msg) => {
                tracing::info!(
                    error_id = %error_id,
                    error = %msg,
                    "resource not found"
                );
                (StatusCode::NOT_FOUND, msg.as_str(), "NOT_FOUND")
            }
            ApiError::Config(ref err) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %err,
                    "configuration error occurred"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Configuration error",
                    "CONFIG_ERROR",
                )
            }
            ApiError::Configuration(ref msg) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %msg,
                    "configuration error occurred"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    msg.as_str(),
                    "CONFIG_ERROR",
                )
            }
            ApiError::Io(ref err) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %err,
                    "IO error occurred"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, "IO error", "IO_ERROR")
            }
            ApiError::Serialization(ref err) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %err,
                    "serialization error occurred"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Serialization error",
                    "SERIALIZATION_ERROR",
                )
            }
            ApiError::HttpClient(ref err) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %err,
                    "HTTP client error occurred"
                );
                (
                    StatusCode::BAD_GATEWAY,
                    "External service unavailable",
                    "HTTP_CLIENT_ERROR",
                )
            }
            ApiError::Timeout(ref msg) => {
                tracing::warn!(
                    error_id = %error_id,
                    error = %msg,
                    "timeout error occurred"
                );
                (StatusCode::REQUEST_TIMEOUT, msg.as_str(), "TIMEOUT_ERROR")
            }
            ApiError::Conflict(ref msg) => {
                tracing::warn!(
                    error_id = %error_id,
                    error = %msg,
                    "conflict error occurred"
                );
                (StatusCode::CONFLICT, msg.as_str(), "CONFLICT_ERROR")
            }
            ApiError::Internal(ref msg) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %msg,
                    "internal server error occurred"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    msg.as_str(),
                    "INTERNAL_ERROR",
                )
            }
            ApiError::Anyhow(ref err) => {
                tracing::error!(
                    error_id = %error_id,
                    error = %err,
                    "unexpected error occurred"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "code": error_code,
                "error_id": error_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<crate::config::ConfigError> for ApiError {
    fn from(err: crate::config::ConfigError) -> Self {
        match err {
            crate::config::ConfigError::Config(e) => ApiError::Config(e),
            crate::config::ConfigError::Validation(msg) => ApiError::Configuration(msg),
        }
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn validation_handler() -> Result<&'static str, ApiError> {
        Err(ApiError::validation("target must not be empty"))
    }

    async fn unreachable_handler() -> Result<&'static str, ApiError> {
        Err(ApiError::target_unreachable("no response on 443 or 80"))
    }

    async fn not_found_handler() -> Result<&'static str, ApiError> {
        Err(ApiError::not_found("scan not found"))
    }

    #[tokio::test]
    async fn validation_error_maps_to_bad_request() {
        let app = Router::new().route("/test", get(validation_handler));

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn target_unreachable_maps_to_bad_gateway() {
        let app = Router::new().route("/test", get(unreachable_handler));

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let app = Router::new().route("/test", get(not_found_handler));

        let request = Request::builder().uri("/test").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_constructors() {
        assert!(matches!(
            ApiError::validation("test"),
            ApiError::Validation(_)
        ));
        assert!(matches!(ApiError::not_found("test"), ApiError::NotFound(_)));
        assert!(matches!(ApiError::internal("test"), ApiError::Internal(_)));
        assert!(matches!(
            ApiError::external_service("test"),
            ApiError::ExternalService(_)
        ));
        assert!(matches!(
            ApiError::target_unreachable("test"),
            ApiError::TargetUnreachable(_)
        ));
        assert!(matches!(ApiError::timeout("test"), ApiError::Timeout(_)));
    }
}
