use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};

use super::play_handlers::assign_new_prompt;
use super::upload_form::{read_upload_form, record_upload};
use super::{
    assigned_prompt_of, clear_assigned_prompt, maybe_transcribe, redirect_error, redirect_success,
    CsrfForm, FlashQuery, PageContext,
};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::{ActivityType, NewActivity, PromptKind};
use crate::services::UploadPurpose;
use crate::AppState;

const TWISTER_PATH: &str = "/twister";

#[derive(Template, WebTemplate)]
#[template(path = "twister.html")]
struct TwisterTemplate {
    page: PageContext,
    twister: Option<String>,
    accept: String,
    max_upload_mb: u64,
}

pub async fn twister_page(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Query(flash): Query<FlashQuery>,
) -> Result<Response, AppError> {
    let page = PageContext::new(&current, flash, "twister").await?;
    let twister = assigned_prompt_of(&current.session, PromptKind::Twister).await?;

    Ok(TwisterTemplate {
        page,
        twister,
        accept: UploadPurpose::TwisterRecording.accept_attribute(),
        max_upload_mb: app_state.upload_store.limit_mb(),
    }
    .into_response())
}

pub async fn new_twister_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    assign_new_prompt(
        &app_state,
        &current,
        &form.csrf_token,
        PromptKind::Twister,
        TWISTER_PATH,
    )
    .await
}

pub async fn twister_recording_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let Some(prompt) = assigned_prompt_of(&current.session, PromptKind::Twister).await? else {
        return Ok(redirect_error(
            TWISTER_PATH,
            "Get a tongue twister before recording.",
        ));
    };

    let submission = match read_upload_form(
        &current.session,
        &mut multipart,
        &app_state.upload_store,
        UploadPurpose::TwisterRecording,
    )
    .await
    {
        Ok(submission) => submission,
        Err(rejection) => return Ok(redirect_error(TWISTER_PATH, &rejection.user_message())),
    };

    let upload = submission.upload;
    let transcript = maybe_transcribe(app_state.transcriber.as_ref(), &upload.path).await;

    let activity = NewActivity {
        phone: current.phone().to_string(),
        activity_type: ActivityType::TongueTwister,
        prompt: Some(prompt),
        response_text: transcript,
        file_name: Some(upload.file_name.clone()),
    };
    record_upload(&app_state.activity_service, activity, upload).await?;
    clear_assigned_prompt(&current.session).await?;

    Ok(redirect_success(TWISTER_PATH, "Recording saved!"))
}
