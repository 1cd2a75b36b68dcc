pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod router;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use config::AppConfig;
use repositories::{SqliteActivityRepository, SqlitePromptHistoryRepository, SqliteUserRepository};
use services::{
    ActivityService, AdminGate, AssemblyAiTranscriber, PromptGenerator, PromptService,
    Transcriber, UploadStore, UserService, UserServiceError,
};

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub prompt_service: Arc<PromptService>,
    pub activity_service: Arc<ActivityService>,
    pub upload_store: Arc<UploadStore>,
    pub transcriber: Option<Arc<dyn Transcriber>>,
    pub pool: sqlx::SqlitePool,
}

impl AppState {
    /// Wires the SQLite repositories into the services. Transcription is
    /// switched on only when an AssemblyAI key is configured.
    pub fn build(pool: sqlx::SqlitePool, config: &AppConfig) -> Result<Self, UserServiceError> {
        let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
        let history_repository = Arc::new(SqlitePromptHistoryRepository::new(pool.clone()));
        let activity_repository = Arc::new(SqliteActivityRepository::new(pool.clone()));

        let admin_gate = AdminGate::from_secret(&config.admin)?;
        if !admin_gate.is_enabled() {
            tracing::info!("No admin passphrase configured; admin logins are disabled");
        }

        let transcriber = config.assemblyai_api_key.as_ref().map(|key| {
            tracing::info!("Transcription enabled via {}", config.assemblyai_base_url);
            Arc::new(AssemblyAiTranscriber::new(
                config.assemblyai_base_url.clone(),
                key.clone(),
            )) as Arc<dyn Transcriber>
        });

        Ok(Self {
            user_service: Arc::new(UserService::new(user_repository, admin_gate)),
            prompt_service: Arc::new(PromptService::new(
                history_repository,
                PromptGenerator::default(),
            )),
            activity_service: Arc::new(ActivityService::new(activity_repository)),
            upload_store: Arc::new(UploadStore::new(
                config.upload_dir.clone(),
                config.max_upload_bytes,
            )),
            transcriber,
            pool,
        })
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }
}
