//! Error handling

use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
    Json,
};
use serde_json::json;

use crate::grading::WeightError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub enum AppError {
    // Auth errors
    TokenInvalid,
    Unauthorized,
    Forbidden,

    // Resource errors
    NotFound(String),
    AlreadyExists(String),

    // Lifecycle errors
    NoOpenAttempt,

    // Validation errors
    InvalidConfig(String),
    ValidationError(String),

    // Database errors
    DatabaseError(String),

    // Generic errors
    InternalError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TokenInvalid | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::AlreadyExists(_) | AppError::NoOpenAttempt => StatusCode::CONFLICT,
            AppError::InvalidConfig(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::DatabaseError(_) | AppError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match &self {
            AppError::TokenInvalid => "Invalid token",
            AppError::Unauthorized => "Authentication required",
            AppError::Forbidden => "Access denied",
            AppError::NotFound(msg) => msg.as_str(),
            AppError::AlreadyExists(msg) => msg.as_str(),
            AppError::NoOpenAttempt => "No open attempt for this activity",
            AppError::InvalidConfig(msg) => msg.as_str(),
            AppError::ValidationError(msg) => msg.as_str(),
            AppError::DatabaseError(msg) => {
                tracing::error!("Database error: {}", msg);
                "Database error occurred"
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error"
            }
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        // Partial unique indexes guard the "one open session/attempt" rules
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return AppError::AlreadyExists("Conflicting open record".to_string());
            }
        }
        AppError::DatabaseError(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AppError::TokenInvalid
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<WeightError> for AppError {
    fn from(err: WeightError) -> Self {
        AppError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::NoOpenAttempt.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::InvalidConfig("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_weight_error_is_invalid_config() {
        let err: AppError = crate::grading::WeightConfig::new(50, 49).unwrap_err().into();
        assert!(matches!(err, AppError::InvalidConfig(ref m) if m.contains("100")));
    }

    #[tokio::test]
    async fn test_body_hides_database_details() {
        let resp = AppError::DatabaseError("relation \"secret\" does not exist".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "Database error occurred");
        assert_eq!(body["status"], 500);
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        assert!(matches!(AppError::from(sqlx::Error::RowNotFound), AppError::DatabaseError(_)));
    }
}
