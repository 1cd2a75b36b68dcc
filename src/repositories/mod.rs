pub mod activity_repository;
pub mod prompt_history_repository;
pub mod user_repository;

pub use activity_repository::{ActivityRepository, SqliteActivityRepository};
pub use prompt_history_repository::{PromptHistoryRepository, SqlitePromptHistoryRepository};
pub use user_repository::{SqliteUserRepository, UpsertUser, UserRepository};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Record not found")]
    NotFound,
    #[error("Record already exists")]
    AlreadyExists,
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
