//! Optional speech-to-text for dare proofs and tongue-twister recordings.
//!
//! Talks to the AssemblyAI REST API: upload the raw file, request a
//! transcript for the returned URL, then poll until the job completes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::{path::Path, time::Duration};
use tokio_util::io::ReaderStream;

pub const DEFAULT_MAX_POLLS: u32 = 30;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Could not read upload: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Upload failed ({0})")]
    UploadFailed(u16),
    #[error("Transcription request failed ({0})")]
    RequestFailed(u16),
    #[error("Response missing {0}")]
    MissingField(&'static str),
    #[error("Transcription failed: {0}")]
    Failed(String),
    #[error("Transcription timed out")]
    TimedOut,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, path: &Path) -> Result<String, TranscriptionError>;
}

#[derive(Deserialize)]
struct UploadResponse {
    upload_url: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptCreated {
    id: Option<String>,
}

#[derive(Deserialize)]
struct TranscriptStatus {
    status: Option<String>,
    text: Option<String>,
    error: Option<String>,
}

#[derive(Clone)]
pub struct AssemblyAiTranscriber {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    max_polls: u32,
    poll_interval: Duration,
}

impl AssemblyAiTranscriber {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            max_polls: DEFAULT_MAX_POLLS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_polling(mut self, max_polls: u32, poll_interval: Duration) -> Self {
        self.max_polls = max_polls;
        self.poll_interval = poll_interval;
        self
    }

    async fn upload(&self, path: &Path) -> Result<String, TranscriptionError> {
        // Streamed from disk; uploads can be as large as the upload limit.
        let file = tokio::fs::File::open(path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let response = self
            .client
            .post(format!("{}/v2/upload", self.base_url))
            .header("authorization", &self.api_key)
            .body(body)
            .send()
            .await?;

        if response.status().as_u16() != 200 {
            return Err(TranscriptionError::UploadFailed(response.status().as_u16()));
        }

        response
            .json::<UploadResponse>()
            .await?
            .upload_url
            .ok_or(TranscriptionError::MissingField("upload_url"))
    }

    async fn request_transcript(&self, audio_url: &str) -> Result<String, TranscriptionError> {
        let response = self
            .client
            .post(format!("{}/v2/transcript", self.base_url))
            .header("authorization", &self.api_key)
            .json(&json!({ "audio_url": audio_url }))
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            return Err(TranscriptionError::RequestFailed(status));
        }

        response
            .json::<TranscriptCreated>()
            .await?
            .id
            .ok_or(TranscriptionError::MissingField("id"))
    }

    async fn poll(&self, id: &str) -> Result<String, TranscriptionError> {
        let url = format!("{}/v2/transcript/{}", self.base_url, id);

        for _ in 0..self.max_polls {
            let response = self
                .client
                .get(&url)
                .header("authorization", &self.api_key)
                .send()
                .await?;

            if response.status().is_success() {
                let status = response.json::<TranscriptStatus>().await?;
                match status.status.as_deref() {
                    Some("completed") => return Ok(status.text.unwrap_or_default()),
                    Some("failed") => {
                        return Err(TranscriptionError::Failed(
                            status.error.unwrap_or_else(|| "unknown error".to_string()),
                        ))
                    }
                    _ => {}
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        Err(TranscriptionError::TimedOut)
    }
}

#[async_trait]
impl Transcriber for AssemblyAiTranscriber {
    async fn transcribe(&self, path: &Path) -> Result<String, TranscriptionError> {
        let upload_url = self.upload(path).await?;
        let id = self.request_transcript(&upload_url).await?;
        tracing::debug!("Transcript {} requested", id);
        self.poll(&id).await
    }
}
