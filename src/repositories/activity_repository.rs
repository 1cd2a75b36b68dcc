use super::RepositoryResult;
use crate::models::{Activity, ActivityView, NewActivity};
use async_trait::async_trait;
use sqlx::SqlitePool;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn insert(&self, activity: &NewActivity, timestamp: &str) -> RepositoryResult<i64>;
    /// `None` lists every user's activity.
    async fn list(&self, phone: Option<String>) -> RepositoryResult<Vec<ActivityView>>;
    async fn find_by_file_name(&self, file_name: &str) -> RepositoryResult<Option<Activity>>;
}

pub struct SqliteActivityRepository {
    pool: SqlitePool,
}

impl SqliteActivityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const VIEW_COLUMNS: &str = r#"
    SELECT
        a.id,
        a.phone,
        u.name AS user_name,
        a.activity_type,
        a.prompt,
        a.response_text,
        a.file_name,
        a.timestamp
    FROM activities a
    JOIN users u ON a.phone = u.phone
"#;

#[async_trait]
impl ActivityRepository for SqliteActivityRepository {
    async fn insert(&self, activity: &NewActivity, timestamp: &str) -> RepositoryResult<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO activities (phone, activity_type, prompt, response_text, file_name, timestamp)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&activity.phone)
        .bind(activity.activity_type.as_str())
        .bind(&activity.prompt)
        .bind(&activity.response_text)
        .bind(&activity.file_name)
        .bind(timestamp)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn list(&self, phone: Option<String>) -> RepositoryResult<Vec<ActivityView>> {
        let rows = match phone {
            Some(phone) => {
                let sql = format!(
                    "{} WHERE a.phone = ? ORDER BY a.timestamp DESC, a.id DESC",
                    VIEW_COLUMNS
                );
                sqlx::query_as::<_, ActivityView>(&sql)
                    .bind(phone)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!("{} ORDER BY a.timestamp DESC, a.id DESC", VIEW_COLUMNS);
                sqlx::query_as::<_, ActivityView>(&sql)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows)
    }

    async fn find_by_file_name(&self, file_name: &str) -> RepositoryResult<Option<Activity>> {
        let activity = sqlx::query_as::<_, Activity>(
            r#"
            SELECT id, phone, activity_type, prompt, response_text, file_name, timestamp
            FROM activities
            WHERE file_name = ?
            LIMIT 1
            "#,
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(activity)
    }
}
