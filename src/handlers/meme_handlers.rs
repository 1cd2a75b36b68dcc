use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    response::{IntoResponse, Redirect, Response},
};

use super::upload_form::{read_upload_form, record_upload};
use super::{redirect_error, redirect_success, FlashQuery, PageContext};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::{ActivityType, NewActivity};
use crate::services::UploadPurpose;
use crate::AppState;

const MEMES_PATH: &str = "/memes";
pub const MEME_PROMPT: &str = "Meme upload";

#[derive(Template, WebTemplate)]
#[template(path = "memes.html")]
struct MemesTemplate {
    page: PageContext,
    accept: String,
    max_upload_mb: u64,
}

pub async fn memes_page(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Query(flash): Query<FlashQuery>,
) -> Result<Response, AppError> {
    let page = PageContext::new(&current, flash, "memes").await?;
    Ok(MemesTemplate {
        page,
        accept: UploadPurpose::Meme.accept_attribute(),
        max_upload_mb: app_state.upload_store.limit_mb(),
    }
    .into_response())
}

pub async fn upload_meme_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let submission = match read_upload_form(
        &current.session,
        &mut multipart,
        &app_state.upload_store,
        UploadPurpose::Meme,
    )
    .await
    {
        Ok(submission) => submission,
        Err(rejection) => return Ok(redirect_error(MEMES_PATH, &rejection.user_message())),
    };

    let activity = NewActivity {
        phone: current.phone().to_string(),
        activity_type: ActivityType::Meme,
        prompt: Some(MEME_PROMPT.to_string()),
        response_text: submission.caption,
        file_name: Some(submission.upload.file_name.clone()),
    };
    record_upload(&app_state.activity_service, activity, submission.upload).await?;

    Ok(redirect_success(MEMES_PATH, "Meme uploaded and saved!"))
}
