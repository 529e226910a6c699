//! Error taxonomy for the hybrid search core.

use thiserror::Error;

/// Result type alias using [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;

/// Error taxonomy from the service's error-handling design: each variant
/// maps to exactly one HTTP status at the server boundary.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("missing x-api-key")]
    AuthMissing,

    #[error("invalid api key")]
    AuthInvalid,

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("vector backend unavailable: {0}")]
    BackendVectorUnavailable(String),

    #[error("lexical backend unavailable: {0}")]
    BackendLexicalUnavailable(String),

    #[error("model error: {0}")]
    ModelError(String),

    #[error("request cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status code this error maps to at the API boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::AuthMissing => 401,
            Self::AuthInvalid => 403,
            Self::RateLimited => 429,
            Self::BadRequest(_) => 400,
            Self::BackendVectorUnavailable(_)
            | Self::BackendLexicalUnavailable(_)
            | Self::ModelError(_)
            | Self::Cancelled
            | Self::Internal(_) => 500,
        }
    }

    /// Stable machine-readable error code, independent of the display message.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthMissing => "auth_missing",
            Self::AuthInvalid => "auth_invalid",
            Self::RateLimited => "rate_limited",
            Self::BadRequest(_) => "bad_request",
            Self::BackendVectorUnavailable(_) => "backend_vector_unavailable",
            Self::BackendLexicalUnavailable(_) => "backend_lexical_unavailable",
            Self::ModelError(_) => "model_error",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_401_and_403() {
        assert_eq!(AppError::AuthMissing.status_code(), 401);
        assert_eq!(AppError::AuthInvalid.status_code(), 403);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(AppError::RateLimited.status_code(), 429);
    }

    #[test]
    fn backend_and_internal_errors_map_to_500() {
        for err in [
            AppError::BackendVectorUnavailable("x".to_string()),
            AppError::BackendLexicalUnavailable("x".to_string()),
            AppError::ModelError("x".to_string()),
            AppError::Cancelled,
            AppError::Internal("x".to_string()),
        ] {
            assert_eq!(err.status_code(), 500);
        }
    }

    #[test]
    fn code_is_stable_regardless_of_message_payload() {
        assert_eq!(
            AppError::BadRequest("anything".to_string()).code(),
            AppError::BadRequest("something else".to_string()).code()
        );
        assert_eq!(AppError::BadRequest("x".to_string()).code(), "bad_request");
    }

    #[test]
    fn io_error_converts_to_internal() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let app_err: AppError = io_err.into();
        assert_eq!(app_err.code(), "internal");
    }
}
