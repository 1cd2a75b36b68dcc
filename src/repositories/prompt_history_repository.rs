use super::{is_unique_violation, RepositoryError, RepositoryResult};
use crate::models::PromptKind;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PromptHistoryRepository: Send + Sync {
    async fn used_prompts(&self, phone: &str, kind: PromptKind) -> RepositoryResult<HashSet<String>>;
    /// Fails with `AlreadyExists` if this user was already given `prompt`.
    async fn record(
        &self,
        phone: &str,
        kind: PromptKind,
        prompt: &str,
        assigned_at: &str,
    ) -> RepositoryResult<()>;
}

pub struct SqlitePromptHistoryRepository {
    pool: SqlitePool,
}

impl SqlitePromptHistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PromptHistoryRepository for SqlitePromptHistoryRepository {
    async fn used_prompts(&self, phone: &str, kind: PromptKind) -> RepositoryResult<HashSet<String>> {
        let rows = sqlx::query_scalar::<_, String>(
            "SELECT prompt FROM prompt_history WHERE phone = ? AND kind = ?",
        )
        .bind(phone)
        .bind(kind.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn record(
        &self,
        phone: &str,
        kind: PromptKind,
        prompt: &str,
        assigned_at: &str,
    ) -> RepositoryResult<()> {
        let result = sqlx::query(
            "INSERT INTO prompt_history (phone, kind, prompt, assigned_at) VALUES (?, ?, ?, ?)",
        )
        .bind(phone)
        .bind(kind.as_str())
        .bind(prompt)
        .bind(assigned_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(RepositoryError::AlreadyExists),
            Err(e) => Err(RepositoryError::Database(e)),
        }
    }
}
