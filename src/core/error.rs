use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::core::shared::models::RecordType;
use crate::core::shared::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum OrgError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Permission(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type OrgResult<T> = Result<T, OrgError>;

impl OrgError {
    pub fn not_found(record_type: RecordType, id: Uuid) -> Self {
        Self::NotFound(format!("{record_type} {id} not found"))
    }

    pub fn insufficient_permissions() -> Self {
        Self::Permission("Insufficient permissions".to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::InvalidTransition(_) => StatusCode::CONFLICT,
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Permission(_) => "permission_denied",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::Storage(_) => "storage_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

impl From<tokio::task::JoinError> for OrgError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<JsonRejection> for OrgError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for OrgError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for OrgError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl IntoResponse for OrgError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("Request failed ({}): {}", self.error_code(), self);
        }
        (status, Json(ApiResponse::<()>::failure(self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            OrgError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            OrgError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            OrgError::insufficient_permissions().status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            OrgError::InvalidTransition("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_not_found_message() {
        let id = Uuid::nil();
        let err = OrgError::not_found(RecordType::Employee, id);
        assert_eq!(err.to_string(), format!("Employee {id} not found"));
    }
}
