use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Multipart, Query, State},
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;

use super::upload_form::{read_upload_form, record_upload};
use super::{
    assign_prompt, assigned_prompt, assigned_prompt_of, clear_assigned_prompt, maybe_transcribe,
    redirect_error, redirect_success, CsrfForm, FlashQuery, PageContext, INVALID_TOKEN_MESSAGE,
};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::middleware::csrf::verify_csrf_token;
use crate::models::{ActivityType, NewActivity, PromptKind};
use crate::services::{ActivityServiceError, UploadPurpose};
use crate::AppState;

const PLAY_PATH: &str = "/play";

#[derive(Template, WebTemplate)]
#[template(path = "play.html")]
struct PlayTemplate {
    page: PageContext,
    truth_prompt: Option<String>,
    dare_prompt: Option<String>,
    proof_accept: String,
    max_upload_mb: u64,
}

#[derive(Deserialize)]
pub struct TruthAnswerForm {
    csrf_token: String,
    answer: String,
}

pub async fn play_page(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Query(flash): Query<FlashQuery>,
) -> Result<Response, AppError> {
    let page = PageContext::new(&current, flash, "play").await?;
    let assigned = assigned_prompt(&current.session).await?;

    let (truth_prompt, dare_prompt) = match assigned {
        Some(a) if a.kind == PromptKind::Truth => (Some(a.text), None),
        Some(a) if a.kind == PromptKind::Dare => (None, Some(a.text)),
        _ => (None, None),
    };

    Ok(PlayTemplate {
        page,
        truth_prompt,
        dare_prompt,
        proof_accept: UploadPurpose::DareProof.accept_attribute(),
        max_upload_mb: app_state.upload_store.limit_mb(),
    }
    .into_response())
}

/// Mints a fresh prompt of `kind` and makes it the session's assignment.
pub(super) async fn assign_new_prompt(
    app_state: &AppState,
    current: &CurrentUser,
    csrf_token: &str,
    kind: PromptKind,
    back_to: &str,
) -> Result<Redirect, AppError> {
    if !verify_csrf_token(&current.session, csrf_token).await {
        return Ok(redirect_error(back_to, INVALID_TOKEN_MESSAGE));
    }

    let prompt = app_state
        .prompt_service
        .generate_unique_prompt(current.phone(), kind)
        .await?;
    assign_prompt(&current.session, kind, prompt).await?;
    Ok(Redirect::to(back_to))
}

pub async fn new_truth_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    assign_new_prompt(&app_state, &current, &form.csrf_token, PromptKind::Truth, PLAY_PATH).await
}

pub async fn new_dare_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<CsrfForm>,
) -> Result<Redirect, AppError> {
    assign_new_prompt(&app_state, &current, &form.csrf_token, PromptKind::Dare, PLAY_PATH).await
}

pub async fn truth_answer_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<TruthAnswerForm>,
) -> Result<Redirect, AppError> {
    if !verify_csrf_token(&current.session, &form.csrf_token).await {
        return Ok(redirect_error(PLAY_PATH, INVALID_TOKEN_MESSAGE));
    }

    let Some(prompt) = assigned_prompt_of(&current.session, PromptKind::Truth).await? else {
        return Ok(redirect_error(PLAY_PATH, "Get a truth before answering."));
    };

    match app_state
        .activity_service
        .record_truth_answer(current.phone(), &prompt, &form.answer)
        .await
    {
        Ok(_) => {
            clear_assigned_prompt(&current.session).await?;
            Ok(redirect_success(PLAY_PATH, "Answer saved!"))
        }
        Err(ActivityServiceError::EmptyAnswer) => Ok(redirect_error(
            PLAY_PATH,
            &ActivityServiceError::EmptyAnswer.to_string(),
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn dare_proof_handler(
    State(app_state): State<AppState>,
    current: CurrentUser,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let Some(prompt) = assigned_prompt_of(&current.session, PromptKind::Dare).await? else {
        return Ok(redirect_error(PLAY_PATH, "Get a dare before uploading proof."));
    };

    let submission = match read_upload_form(
        &current.session,
        &mut multipart,
        &app_state.upload_store,
        UploadPurpose::DareProof,
    )
    .await
    {
        Ok(submission) => submission,
        Err(rejection) => return Ok(redirect_error(PLAY_PATH, &rejection.user_message())),
    };

    let upload = submission.upload;
    let transcript = if upload.media_kind.has_audio() {
        maybe_transcribe(app_state.transcriber.as_ref(), &upload.path).await
    } else {
        None
    };

    let activity = NewActivity {
        phone: current.phone().to_string(),
        activity_type: ActivityType::Dare,
        prompt: Some(prompt),
        response_text: transcript,
        file_name: Some(upload.file_name.clone()),
    };
    record_upload(&app_state.activity_service, activity, upload).await?;
    clear_assigned_prompt(&current.session).await?;

    Ok(redirect_success(PLAY_PATH, "Dare proof uploaded and saved!"))
}
