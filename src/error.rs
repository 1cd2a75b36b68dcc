use axum::{
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use thiserror::Error;

use crate::repositories::RepositoryError;
use crate::services::{
    activity_service::ActivityServiceError, prompt_service::PromptServiceError,
    upload_service::UploadError, user_service::UserServiceError,
};

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::Repository(e) => AppError::Repository(e),
            UserServiceError::UserNotFound => AppError::NotFound,
            UserServiceError::HashingError(msg) => AppError::Internal(msg),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<PromptServiceError> for AppError {
    fn from(err: PromptServiceError) -> Self {
        match err {
            PromptServiceError::Repository(e) => AppError::Repository(e),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ActivityServiceError> for AppError {
    fn from(err: ActivityServiceError) -> Self {
        match err {
            ActivityServiceError::Repository(e) => AppError::Repository(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Io(e) => AppError::Internal(e.to_string()),
            UploadError::Multipart(e) => AppError::Validation(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthenticated => return Redirect::to("/login").into_response(),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Database(_)
            | AppError::Repository(_)
            | AppError::Session(_)
            | AppError::Internal(_) => {
                tracing::error!("Request failed: {}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_errors_hide_details() {
        let response = AppError::Internal("disk on fire".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unauthenticated_redirects_to_login() {
        let response = AppError::Unauthenticated.into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()["location"], "/login");
    }

    #[test]
    fn user_validation_maps_to_bad_request() {
        let err: AppError = UserServiceError::InvalidPhone.into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
