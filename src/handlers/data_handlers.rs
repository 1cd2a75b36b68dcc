use askama::Template;
use askama_web::WebTemplate;
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;

use super::{FlashQuery, PageContext};
use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::{content_type_for, ActivityView};
use crate::AppState;

#[derive(Template, WebTemplate)]
#[template(path = "data.html")]
struct DataTemplate {
    page: PageContext,
    activities: Vec<ActivityView>,
}

#[derive(Deserialize)]
pub struct FileQuery {
    download: Option<u8>,
}

pub async fn data_page(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Query(flash): Query<FlashQuery>,
) -> Result<Response, AppError> {
    let page = PageContext::new(&current, flash, "data").await?;
    let activities = app_state
        .activity_service
        .list_for(&current.viewer())
        .await?;

    Ok(DataTemplate { page, activities }.into_response())
}

/// Streams a stored upload. Unknown files and files owned by someone else
/// both answer 404 so that file names are not confirmed to strangers.
pub async fn serve_file(
    State(app_state): State<AppState>,
    current: CurrentUser,
    Path(file_name): Path<String>,
    Query(query): Query<FileQuery>,
) -> Result<Response, AppError> {
    let path = app_state
        .upload_store
        .resolve(&file_name)
        .ok_or(AppError::NotFound)?;

    if !app_state
        .activity_service
        .can_view_file(&current.viewer(), &file_name)
        .await?
    {
        tracing::warn!("{} asked for {} without access", current.phone(), file_name);
        return Err(AppError::NotFound);
    }

    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(e) => return Err(AppError::Internal(e.to_string())),
    };

    let disposition = if query.download.unwrap_or(0) == 1 {
        format!("attachment; filename=\"{}\"", file_name)
    } else {
        format!("inline; filename=\"{}\"", file_name)
    };

    Ok((
        [
            (header::CONTENT_TYPE, content_type_for(&file_name).to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}
