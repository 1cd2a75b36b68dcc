pub mod admin_handlers;
pub mod data_handlers;
pub mod meme_handlers;
pub mod play_handlers;
pub mod twister_handlers;
pub mod upload_form;

pub use admin_handlers::*;
pub use data_handlers::*;
pub use meme_handlers::*;
pub use play_handlers::*;
pub use twister_handlers::*;

use std::{path::Path, sync::Arc};

use axum::response::Redirect;
use serde::Deserialize;
use tower_sessions::Session;

use crate::auth::{CurrentUser, SESSION_ASSIGNED_PROMPT};
use crate::error::AppError;
use crate::middleware::csrf::get_or_create_csrf_token;
use crate::models::{AssignedPrompt, PromptKind};
use crate::services::Transcriber;

/// `?success=` / `?error=` carried across a post/redirect/get.
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

/// Sidebar and banner data shared by every logged-in page.
pub struct PageContext {
    pub name: String,
    pub phone: String,
    pub role: &'static str,
    pub is_admin: bool,
    pub csrf_token: String,
    pub success_message: String,
    pub error_message: String,
    pub active: &'static str,
}

impl PageContext {
    pub async fn new(
        current: &CurrentUser,
        flash: FlashQuery,
        active: &'static str,
    ) -> Result<Self, AppError> {
        let csrf_token = get_or_create_csrf_token(&current.session).await?;
        Ok(Self {
            name: current.user.name.clone(),
            phone: current.user.phone.clone(),
            role: current.user.role_label(),
            is_admin: current.user.is_admin,
            csrf_token,
            success_message: flash.success.unwrap_or_default(),
            error_message: flash.error.unwrap_or_default(),
            active,
        })
    }
}

/// Plain form carrying nothing but the CSRF token.
#[derive(Deserialize)]
pub struct CsrfForm {
    pub csrf_token: String,
}

pub fn redirect_success(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{}?success={}", path, urlencoding::encode(message)))
}

pub fn redirect_error(path: &str, message: &str) -> Redirect {
    Redirect::to(&format!("{}?error={}", path, urlencoding::encode(message)))
}

pub const INVALID_TOKEN_MESSAGE: &str = "Your form expired. Please try again.";

pub async fn assigned_prompt(session: &Session) -> Result<Option<AssignedPrompt>, AppError> {
    Ok(session.get::<AssignedPrompt>(SESSION_ASSIGNED_PROMPT).await?)
}

/// The assigned prompt text, but only when it is of `kind`.
pub async fn assigned_prompt_of(
    session: &Session,
    kind: PromptKind,
) -> Result<Option<String>, AppError> {
    Ok(assigned_prompt(session)
        .await?
        .filter(|assigned| assigned.kind == kind)
        .map(|assigned| assigned.text))
}

pub async fn assign_prompt(session: &Session, kind: PromptKind, text: String) -> Result<(), AppError> {
    session
        .insert(SESSION_ASSIGNED_PROMPT, AssignedPrompt { kind, text })
        .await?;
    Ok(())
}

pub async fn clear_assigned_prompt(session: &Session) -> Result<(), AppError> {
    session
        .remove::<AssignedPrompt>(SESSION_ASSIGNED_PROMPT)
        .await?;
    Ok(())
}

/// Runs the optional transcriber. Failures are logged and yield `None` so
/// that the upload itself is never lost.
pub async fn maybe_transcribe(
    transcriber: Option<&Arc<dyn Transcriber>>,
    path: &Path,
) -> Option<String> {
    let transcriber = transcriber?;
    match transcriber.transcribe(path).await {
        Ok(text) if text.trim().is_empty() => None,
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Transcription of {:?} failed: {}", path, e);
            None
        }
    }
}
