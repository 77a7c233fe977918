use crate::services::{
    admin::AuthError, catalog::CatalogError, object_store::StorageError,
    presign::SignatureError, workflow::WorkflowError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use handlebars::RenderError;
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }

    /// Map a failed upload: client errors keep their message, anything else
    /// becomes a generic "upload failed".
    pub fn upload(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(_)
            | WorkflowError::NotFound(_)
            | WorkflowError::NoThumbnail(_) => err.into(),
            other => {
                tracing::error!("upload failed: {}", other);
                AppError::internal("upload failed")
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("internal error: {:#}", err);
        AppError::internal("internal error")
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::Validation(msg) => AppError::bad_request(msg),
            WorkflowError::NotFound(id) => AppError::not_found(format!("video `{}` not found", id)),
            WorkflowError::NoThumbnail(id) => {
                AppError::not_found(format!("video `{}` has no thumbnail", id))
            }
            other => {
                tracing::error!("request failed: {}", other);
                AppError::internal("internal error")
            }
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotConfigured => AppError::not_found("admin login is not configured"),
            other => AppError::unauthorized(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound(key) => {
                AppError::not_found(format!("object `{}` not found", key))
            }
            StorageError::InvalidObjectKey => AppError::bad_request("invalid object key"),
            other => {
                tracing::error!("storage error: {}", other);
                AppError::internal("internal error")
            }
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        tracing::error!("catalog error: {}", err);
        AppError::internal("internal error")
    }
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        AppError::forbidden(err.to_string())
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        tracing::error!("template rendering failed: {}", err);
        AppError::internal("internal error")
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        tracing::error!("serialization failed: {}", err);
        AppError::internal("internal error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_statuses() {
        let bad: AppError = WorkflowError::Validation("level is required".into()).into();
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "level is required");

        let missing: AppError = WorkflowError::NotFound("abc".into()).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let broken: AppError =
            WorkflowError::Storage(StorageError::Io(std::io::Error::other("disk full"))).into();
        assert_eq!(broken.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(broken.message, "internal error");

        let no_thumb: AppError = WorkflowError::NoThumbnail("abc".into()).into();
        assert_eq!(no_thumb.status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn only_upload_failures_say_upload_failed() {
        let failed = AppError::upload(WorkflowError::Storage(StorageError::Io(
            std::io::Error::other("disk full"),
        )));
        assert_eq!(failed.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failed.message, "upload failed");

        let bad = AppError::upload(WorkflowError::Validation("level is required".into()));
        assert_eq!(bad.status, StatusCode::BAD_REQUEST);
        assert_eq!(bad.message, "level is required");
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let err: AppError = AuthError::MissingToken.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        let err: AppError = AuthError::InvalidCredentials.into();
        assert_eq!(err.message, "invalid email or password");
    }

    #[test]
    fn signature_errors_are_forbidden() {
        let err: AppError = SignatureError::Expired.into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }
}
