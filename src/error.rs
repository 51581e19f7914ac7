use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("Insufficient credits: {required} required, {free_tests} free tests and {paid_credits} paid credits available")]
    InsufficientCredits {
        free_tests: u32,
        paid_credits: i64,
        required: u32,
    },

    #[error("Unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Export failed: {0}")]
    Export(String),

    #[error("{0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::InsufficientCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            ServiceError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => "VALIDATION_ERROR",
            ServiceError::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            ServiceError::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            ServiceError::NotFound(_) => "NOT_FOUND",
            ServiceError::Storage(_) | ServiceError::Export(_) | ServiceError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(format!("{err:#}"))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            ServiceError::InsufficientCredits {
                free_tests,
                paid_credits,
                required,
            } => serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
                "freeTests": free_tests,
                "paidCredits": paid_credits,
                "required": required,
            }),
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "Request failed");
                serde_json::json!({
                    "error": self.to_string(),
                    "code": self.code(),
                    "timestamp": Utc::now().to_rfc3339(),
                })
            }
            _ => serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
            }),
        };

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ServiceError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::InsufficientCredits {
                free_tests: 0,
                paid_credits: 0,
                required: 10
            }
            .status(),
            StatusCode::PAYMENT_REQUIRED
        );
        assert_eq!(
            ServiceError::UnsupportedFormat("docx".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("Job abc".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::Internal("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_anyhow_maps_to_internal() {
        let err: ServiceError = anyhow::anyhow!("disk on fire").into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(err.to_string().contains("disk on fire"));
    }
}
