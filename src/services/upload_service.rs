use crate::models::MediaKind;
use async_trait::async_trait;
use axum::body::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::{fs, io::AsyncWriteExt};

#[allow(clippy::unwrap_used)]
static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Please choose a file to upload.")]
    NoFile,
    #[error("Unsupported file type. Allowed: {allowed}.")]
    UnsupportedType { allowed: String },
    #[error("File size must be under {limit_mb} MB.")]
    TooLarge { limit_mb: u64 },
    #[error("The uploaded file is empty.")]
    Empty,
    #[error("Invalid upload: {0}")]
    Multipart(String),
    #[error("Upload storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// What an upload is for; each purpose accepts its own file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPurpose {
    DareProof,
    Meme,
    TwisterRecording,
}

impl UploadPurpose {
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            UploadPurpose::DareProof => &["mp4", "mov", "wav", "mp3", "png", "jpg", "jpeg"],
            UploadPurpose::Meme => &["png", "jpg", "jpeg", "mp4", "mov"],
            UploadPurpose::TwisterRecording => &["mp3", "wav"],
        }
    }

    /// Value for an `<input type="file" accept=...>` attribute.
    pub fn accept_attribute(&self) -> String {
        self.allowed_extensions()
            .iter()
            .map(|ext| format!(".{}", ext))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub media_kind: MediaKind,
}

/// Anything that yields a file body chunk by chunk.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError>;
}

#[async_trait]
impl<'a> ChunkSource for axum::extract::multipart::Field<'a> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        self.chunk()
            .await
            .map_err(|e| UploadError::Multipart(e.body_text()))
    }
}

#[async_trait]
impl ChunkSource for std::vec::IntoIter<Bytes> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UploadError> {
        Ok(self.next())
    }
}

/// Same mapping as the upload form: trim, spaces to `_`, anything outside
/// `[A-Za-z0-9._-]` to `_`.
pub fn safe_filename(name: &str) -> String {
    let spaced = name.trim().replace(' ', "_");
    UNSAFE_CHARS.replace_all(&spaced, "_").to_string()
}

fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Writes uploads into a single flat directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: u64,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub async fn ensure_dir(&self) -> Result<(), UploadError> {
        fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn limit_mb(&self) -> u64 {
        (self.max_bytes / (1024 * 1024)).max(1)
    }

    /// Checks the client file name against what `purpose` accepts.
    pub fn check_name(&self, purpose: UploadPurpose, original_name: &str) -> Result<(), UploadError> {
        if original_name.trim().is_empty() {
            return Err(UploadError::NoFile);
        }
        let allowed = purpose.allowed_extensions();
        match extension_of(original_name) {
            Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
            _ => Err(UploadError::UnsupportedType {
                allowed: allowed.join(", "),
            }),
        }
    }

    /// Streams `source` to disk under a fresh unique name. Nothing is left
    /// behind when the upload is rejected part-way.
    pub async fn store<S: ChunkSource + ?Sized>(
        &self,
        purpose: UploadPurpose,
        original_name: &str,
        source: &mut S,
    ) -> Result<StoredUpload, UploadError> {
        self.check_name(purpose, original_name)?;

        let file_name = format!(
            "{}_{}",
            uuid::Uuid::new_v4().simple(),
            safe_filename(original_name)
        );
        let path = self.dir.join(&file_name);

        match self.write_chunks(&path, source).await {
            Ok(size) => {
                tracing::info!("Stored upload {} ({} bytes)", file_name, size);
                Ok(StoredUpload {
                    media_kind: MediaKind::from_file_name(&file_name),
                    file_name,
                    path,
                    size,
                })
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!("Could not remove partial upload {:?}: {}", path, cleanup);
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_chunks<S: ChunkSource + ?Sized>(
        &self,
        path: &Path,
        source: &mut S,
    ) -> Result<u64, UploadError> {
        let mut file = fs::File::create(path).await?;
        let mut size: u64 = 0;

        while let Some(chunk) = source.next_chunk().await? {
            size += chunk.len() as u64;
            if size > self.max_bytes {
                return Err(UploadError::TooLarge {
                    limit_mb: self.limit_mb(),
                });
            }
            file.write_all(&chunk).await?;
        }

        if size == 0 {
            return Err(UploadError::Empty);
        }

        file.flush().await?;
        Ok(size)
    }

    /// Maps a stored name back to its path. Names that could escape the
    /// upload directory resolve to nothing.
    pub fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let valid = !file_name.is_empty()
            && !file_name.contains("..")
            && !file_name.contains('/')
            && !file_name.contains('\\');
        valid.then(|| self.dir.join(file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_filename_replaces_unsafe_characters() {
        assert_eq!(safe_filename("  my cat (1).jpg "), "my_cat__1_.jpg");
        assert_eq!(safe_filename("ok-name_2.mp3"), "ok-name_2.mp3");
        assert_eq!(safe_filename("../../etc/passwd"), ".._.._etc_passwd");
    }

    #[test]
    fn extensions_are_case_insensitive() {
        let store = UploadStore::new("unused", 10);
        assert!(store.check_name(UploadPurpose::Meme, "Cat.JPG").is_ok());
        assert!(matches!(
            store.check_name(UploadPurpose::TwisterRecording, "clip.mp4"),
            Err(UploadError::UnsupportedType { .. })
        ));
        assert!(matches!(
            store.check_name(UploadPurpose::Meme, "noextension"),
            Err(UploadError::UnsupportedType { .. })
        ));
        assert!(matches!(
            store.check_name(UploadPurpose::Meme, ""),
            Err(UploadError::NoFile)
        ));
    }

    #[test]
    fn resolve_refuses_traversal() {
        let store = UploadStore::new("/srv/uploads", 10);
        assert_eq!(
            store.resolve("abc_cat.png"),
            Some(PathBuf::from("/srv/uploads/abc_cat.png"))
        );
        assert!(store.resolve("../secret").is_none());
        assert!(store.resolve("a/b.png").is_none());
        assert!(store.resolve("").is_none());
    }

    #[test]
    fn accept_attribute_lists_extensions() {
        assert_eq!(UploadPurpose::TwisterRecording.accept_attribute(), ".mp3,.wav");
    }
}
