pub mod activity_service;
pub mod prompt_service;
pub mod transcription_service;
pub mod upload_service;
pub mod user_service;

pub use activity_service::{ActivityService, ActivityServiceError, Viewer};
pub use prompt_service::{PromptCatalog, PromptGenerator, PromptService, PromptServiceError};
pub use transcription_service::{AssemblyAiTranscriber, TranscriptionError, Transcriber};
pub use upload_service::{StoredUpload, UploadError, UploadPurpose, UploadStore};
pub use user_service::{AdminGate, LoginRequest, UserService, UserServiceError};
