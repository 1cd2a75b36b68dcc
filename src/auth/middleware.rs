use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use super::{SESSION_IS_ADMIN, SESSION_PHONE};
use crate::error::AppError;
use crate::models::User;
use crate::services::Viewer;
use crate::AppState;

pub async fn require_auth(session: Session, request: Request, next: Next) -> Response {
    if let Ok(Some(_phone)) = session.get::<String>(SESSION_PHONE).await {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}

pub async fn require_admin(session: Session, request: Request, next: Next) -> Response {
    match session.get::<bool>(SESSION_IS_ADMIN).await {
        Ok(Some(true)) => next.run(request).await,
        Ok(_) => (StatusCode::FORBIDDEN, "Admins only").into_response(),
        Err(e) => AppError::from(e).into_response(),
    }
}

/// The logged-in user, re-read from the database on every request so that
/// role changes and deletions take effect immediately.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: Session,
}

impl CurrentUser {
    pub fn phone(&self) -> &str {
        &self.user.phone
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin
    }

    pub fn viewer(&self) -> Viewer {
        Viewer {
            phone: self.user.phone.clone(),
            is_admin: self.user.is_admin,
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| AppError::Internal(msg.to_string()))?;

        let phone = session
            .get::<String>(SESSION_PHONE)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        let Some(user) = state.user_service.find_user(&phone).await? else {
            // The account was removed while this session was alive.
            session.flush().await?;
            return Err(AppError::Unauthenticated);
        };

        if session.get::<bool>(SESSION_IS_ADMIN).await? != Some(user.is_admin) {
            session.insert(SESSION_IS_ADMIN, user.is_admin).await?;
        }

        Ok(Self { user, session })
    }
}
