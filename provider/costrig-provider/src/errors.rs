use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Storage error: {0}")]
    Storage(#[from] costrig_storage::StorageError),

    #[error("Coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    #[error("Event source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum FireError {
    #[error("Disabled trigger {id}: {message}")]
    Disabled {
        id: String,
        status_code: u16,
        message: String,
    },

    #[error("Unable to reach server to fire trigger {0}")]
    RetriesExhausted(String),
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No usable credentials for trigger {0}")]
    MissingCredentials(String),

    #[error("Malformed api key for trigger {0}")]
    MalformedKey(String),

    #[error("Token request failed: {0}")]
    TokenRequest(#[from] reqwest::Error),

    #[error("Token issuer returned status {0}")]
    TokenRejected(reqwest::StatusCode),
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Event source rejected trigger {0}: {1}")]
    Rejected(String, String),

    #[error("Event source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Coordination store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    InternalServerError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::{Json, http::StatusCode};
        use serde_json::json;

        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::InternalServerError(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
