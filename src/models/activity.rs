use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityType {
    Truth,
    Dare,
    Meme,
    TongueTwister,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Truth => "Truth",
            ActivityType::Dare => "Dare",
            ActivityType::Meme => "Meme",
            ActivityType::TongueTwister => "TongueTwister",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Truth" => Ok(ActivityType::Truth),
            "Dare" => Ok(ActivityType::Dare),
            "Meme" => Ok(ActivityType::Meme),
            "TongueTwister" => Ok(ActivityType::TongueTwister),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Activity {
    pub id: i64,
    pub phone: String,
    pub activity_type: String,
    pub prompt: Option<String>,
    pub response_text: Option<String>,
    pub file_name: Option<String>,
    pub timestamp: String,
}

/// An activity joined with its owner's display name.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActivityView {
    pub id: i64,
    pub phone: String,
    pub user_name: String,
    pub activity_type: String,
    pub prompt: Option<String>,
    pub response_text: Option<String>,
    pub file_name: Option<String>,
    pub timestamp: String,
}

impl ActivityView {
    pub fn media_kind(&self) -> Option<MediaKind> {
        self.file_name.as_deref().map(MediaKind::from_file_name)
    }

    pub fn is_image(&self) -> bool {
        self.media_kind() == Some(MediaKind::Image)
    }

    pub fn is_video(&self) -> bool {
        self.media_kind() == Some(MediaKind::Video)
    }

    pub fn is_audio(&self) -> bool {
        self.media_kind() == Some(MediaKind::Audio)
    }
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub phone: String,
    pub activity_type: ActivityType,
    pub prompt: Option<String>,
    pub response_text: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Other,
}

impl MediaKind {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "png" | "jpg" | "jpeg" => MediaKind::Image,
            "mp4" | "mov" => MediaKind::Video,
            "mp3" | "wav" => MediaKind::Audio,
            _ => MediaKind::Other,
        }
    }

    pub fn from_file_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((_, ext)) => Self::from_extension(ext),
            None => MediaKind::Other,
        }
    }

    /// Speech-to-text only makes sense for things with a soundtrack.
    pub fn has_audio(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Audio)
    }
}

/// Content type served for a stored upload.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        _ => "application/octet-stream",
    }
}
