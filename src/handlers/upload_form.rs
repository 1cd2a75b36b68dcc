//! Reads the multipart upload forms.
//!
//! The hidden `csrf_token` field is rendered first in every upload form, so
//! it is checked before any file bytes reach the disk. Text fields may come
//! before or after the file.

use axum::extract::Multipart;
use tower_sessions::Session;

use crate::middleware::csrf::{verify_csrf_token, CSRF_FIELD};
use crate::models::NewActivity;
use crate::services::{
    ActivityService, ActivityServiceError, StoredUpload, UploadError, UploadPurpose, UploadStore,
};

pub const FILE_FIELD: &str = "file";
pub const CAPTION_FIELD: &str = "caption";

#[derive(Debug)]
pub enum FormRejection {
    InvalidToken,
    Upload(UploadError),
}

impl FormRejection {
    /// Text shown back to the user on the form page.
    pub fn user_message(&self) -> String {
        match self {
            FormRejection::InvalidToken => super::INVALID_TOKEN_MESSAGE.to_string(),
            FormRejection::Upload(UploadError::Io(e)) => {
                tracing::error!("Could not write upload: {}", e);
                "Could not save the upload. Please try again.".to_string()
            }
            FormRejection::Upload(e) => e.to_string(),
        }
    }
}

impl From<UploadError> for FormRejection {
    fn from(err: UploadError) -> Self {
        FormRejection::Upload(err)
    }
}

#[derive(Debug)]
pub struct UploadSubmission {
    pub upload: StoredUpload,
    pub caption: Option<String>,
}

/// Reads the whole form. On any rejection the stored file, if one was
/// written, is removed again.
pub async fn read_upload_form(
    session: &Session,
    multipart: &mut Multipart,
    store: &UploadStore,
    purpose: UploadPurpose,
) -> Result<UploadSubmission, FormRejection> {
    let mut upload: Option<StoredUpload> = None;
    match read_fields(session, multipart, store, purpose, &mut upload).await {
        Ok(caption) => match upload {
            Some(upload) => Ok(UploadSubmission { upload, caption }),
            None => Err(UploadError::NoFile.into()),
        },
        Err(rejection) => {
            discard(upload.take()).await;
            Err(rejection)
        }
    }
}

async fn read_fields(
    session: &Session,
    multipart: &mut Multipart,
    store: &UploadStore,
    purpose: UploadPurpose,
    upload: &mut Option<StoredUpload>,
) -> Result<Option<String>, FormRejection> {
    let mut token_ok = false;
    let mut caption = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| UploadError::Multipart(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            CSRF_FIELD => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.body_text()))?;
                // Tokens rotate on use, so a repeated field never verifies.
                if !verify_csrf_token(session, &value).await {
                    return Err(FormRejection::InvalidToken);
                }
                token_ok = true;
            }
            FILE_FIELD => {
                if !token_ok {
                    return Err(FormRejection::InvalidToken);
                }
                let original_name = field.file_name().unwrap_or_default().to_string();
                // Browsers send an empty part when nothing was chosen.
                if original_name.is_empty() || upload.is_some() {
                    continue;
                }
                *upload = Some(store.store(purpose, &original_name, &mut field).await?);
            }
            CAPTION_FIELD => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| UploadError::Multipart(e.body_text()))?;
                let text = text.trim();
                caption = (!text.is_empty()).then(|| text.to_string());
            }
            _ => {}
        }
    }

    if !token_ok {
        return Err(FormRejection::InvalidToken);
    }
    Ok(caption)
}

/// Saves the activity that owns `upload`. The file is removed when the row
/// cannot be written, so no upload outlives a failed save.
pub async fn record_upload(
    activity_service: &ActivityService,
    activity: NewActivity,
    upload: StoredUpload,
) -> Result<i64, ActivityServiceError> {
    match activity_service.record(activity).await {
        Ok(id) => Ok(id),
        Err(e) => {
            discard(Some(upload)).await;
            Err(e)
        }
    }
}

async fn discard(upload: Option<StoredUpload>) {
    if let Some(upload) = upload {
        if let Err(e) = tokio::fs::remove_file(&upload.path).await {
            tracing::warn!("Could not remove abandoned upload {:?}: {}", upload.path, e);
        }
    }
}
