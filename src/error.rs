use actix_web::{http::StatusCode, HttpResponse, ResponseError};

use crate::models::GenerationEnvelope;

#[derive(Debug, thiserror::Error)]
pub enum StudioError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("Upstream quota exceeded: {0}")]
    UpstreamQuotaExceeded(String),
    #[error("Upstream invalid response: {0}")]
    UpstreamInvalidResponse(String),
    #[error("Filesystem error: {0}")]
    FilesystemError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl StudioError {
    /// Stable machine-readable code carried in the envelope.
    pub fn code(&self) -> &'static str {
        match self {
            StudioError::ValidationError(_) => "validation_error",
            StudioError::UnsupportedMediaType(_) => "unsupported_media_type",
            StudioError::ConfigurationError(_) => "configuration_error",
            StudioError::UpstreamUnavailable(_) => "upstream_unavailable",
            StudioError::UpstreamQuotaExceeded(_) => "upstream_quota_exceeded",
            StudioError::UpstreamInvalidResponse(_) => "upstream_invalid_response",
            StudioError::FilesystemError(_) => "filesystem_error",
            StudioError::NotFound(_) => "not_found",
        }
    }

    /// Message shown to API callers. Operator-facing details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            StudioError::ValidationError(msg) | StudioError::NotFound(msg) => msg.clone(),
            StudioError::UnsupportedMediaType(msg) => format!("Unsupported media type: {}", msg),
            StudioError::ConfigurationError(_) => {
                "The server is not configured correctly (missing or rejected Gemini API key)"
                    .to_string()
            }
            StudioError::UpstreamUnavailable(_) => {
                "The image generation service is unavailable, please retry later".to_string()
            }
            StudioError::UpstreamQuotaExceeded(_) => {
                "The image generation quota is exhausted, please retry later".to_string()
            }
            StudioError::UpstreamInvalidResponse(msg) => format!(
                "The image generation service returned an unusable response, please retry later ({})",
                msg
            ),
            StudioError::FilesystemError(_) => "Could not store the generated images".to_string(),
        }
    }

    pub fn is_operator_facing(&self) -> bool {
        matches!(
            self,
            StudioError::ConfigurationError(_) | StudioError::FilesystemError(_)
        )
    }
}

impl ResponseError for StudioError {
    fn status_code(&self) -> StatusCode {
        match self {
            StudioError::ValidationError(_) => StatusCode::BAD_REQUEST,
            StudioError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            StudioError::ConfigurationError(_) | StudioError::FilesystemError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            StudioError::UpstreamUnavailable(_) | StudioError::UpstreamInvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }
            StudioError::UpstreamQuotaExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
            StudioError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.is_operator_facing() {
            log::error!("❌ Request failed: {}", self);
        } else {
            log::warn!("⚠️  Request rejected: {}", self);
        }
        HttpResponse::build(self.status_code()).json(GenerationEnvelope::from_error(self))
    }
}

impl From<std::io::Error> for StudioError {
    fn from(e: std::io::Error) -> Self {
        StudioError::FilesystemError(e.to_string())
    }
}

impl From<serde_json::Error> for StudioError {
    fn from(e: serde_json::Error) -> Self {
        StudioError::UpstreamInvalidResponse(e.to_string())
    }
}

impl From<reqwest::Error> for StudioError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            StudioError::UpstreamInvalidResponse(e.to_string())
        } else {
            StudioError::UpstreamUnavailable(e.to_string())
        }
    }
}

impl From<actix_multipart::MultipartError> for StudioError {
    fn from(e: actix_multipart::MultipartError) -> Self {
        StudioError::ValidationError(format!("Malformed multipart body: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;
