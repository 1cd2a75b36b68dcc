use super::{RepositoryError, RepositoryResult};
use crate::models::{User, UserSummary};
use async_trait::async_trait;
use sqlx::SqlitePool;

/// Fields written on every login. `grant_admin` can only raise the stored
/// flag; demotion goes through `set_admin`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertUser {
    pub phone: String,
    pub name: String,
    pub age: i64,
    pub gender: String,
    pub grant_admin: bool,
    pub now: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn upsert_user(&self, user: &UpsertUser) -> RepositoryResult<User>;
    async fn find_by_phone(&self, phone: &str) -> RepositoryResult<Option<User>>;
    async fn list_users(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<UserSummary>>;
    async fn set_admin(&self, phone: &str, is_admin: bool) -> RepositoryResult<()>;
    async fn delete_user(&self, phone: &str) -> RepositoryResult<()>;
}

pub struct SqliteUserRepository {
    pool: SqlitePool,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn upsert_user(&self, user: &UpsertUser) -> RepositoryResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (phone, name, age, gender, is_admin, created_at, last_login_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(phone) DO UPDATE SET
                name = excluded.name,
                age = excluded.age,
                gender = excluded.gender,
                is_admin = users.is_admin OR excluded.is_admin,
                last_login_at = excluded.last_login_at
            "#,
        )
        .bind(&user.phone)
        .bind(&user.name)
        .bind(user.age)
        .bind(&user.gender)
        .bind(user.grant_admin)
        .bind(&user.now)
        .bind(&user.now)
        .execute(&self.pool)
        .await?;

        self.find_by_phone(&user.phone)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_phone(&self, phone: &str) -> RepositoryResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT phone, name, age, gender, is_admin, created_at, last_login_at
            FROM users
            WHERE phone = ?
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self, limit: i64, offset: i64) -> RepositoryResult<Vec<UserSummary>> {
        let users = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT
                u.phone,
                u.name,
                u.age,
                u.gender,
                u.is_admin,
                u.created_at,
                u.last_login_at,
                (SELECT COUNT(*) FROM activities a WHERE a.phone = u.phone) AS activity_count
            FROM users u
            ORDER BY u.created_at DESC, u.phone ASC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn set_admin(&self, phone: &str, is_admin: bool) -> RepositoryResult<()> {
        let result = sqlx::query("UPDATE users SET is_admin = ? WHERE phone = ?")
            .bind(is_admin)
            .bind(phone)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete_user(&self, phone: &str) -> RepositoryResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM activities WHERE phone = ?")
            .bind(phone)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM prompt_history WHERE phone = ?")
            .bind(phone)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM users WHERE phone = ?")
            .bind(phone)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        tx.commit().await?;
        Ok(())
    }
}
