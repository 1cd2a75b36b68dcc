pub mod test_helpers {
    use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
    use tempfile::NamedTempFile;

    /// Create a new in-memory SQLite database for testing
    pub async fn create_test_db() -> Result<SqlitePool, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(pool)
    }

    /// Create a temporary file-based SQLite database for testing.
    /// Needed when more than one connection must see the same data.
    pub async fn create_test_db_file() -> Result<(SqlitePool, NamedTempFile), sqlx::Error> {
        let temp_file = NamedTempFile::new().map_err(sqlx::Error::Io)?;
        let db_path = temp_file
            .path()
            .to_str()
            .ok_or_else(|| sqlx::Error::Configuration("Invalid database path".into()))?;

        let pool = crate::db::create_pool(&format!("sqlite://{}", db_path)).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok((pool, temp_file))
    }

    /// Insert a user row directly, bypassing login validation.
    pub async fn insert_test_user(
        pool: &SqlitePool,
        phone: &str,
        name: &str,
        is_admin: bool,
    ) -> Result<(), sqlx::Error> {
        let now = crate::db::now_timestamp();
        sqlx::query(
            "INSERT INTO users (phone, name, age, gender, is_admin, created_at, last_login_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(phone)
        .bind(name)
        .bind(25_i64)
        .bind("Other")
        .bind(is_admin)
        .bind(&now)
        .bind(&now)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert an activity row with an explicit timestamp.
    pub async fn insert_test_activity(
        pool: &SqlitePool,
        phone: &str,
        activity_type: &str,
        file_name: Option<&str>,
        timestamp: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO activities (phone, activity_type, prompt, response_text, file_name, timestamp)
             VALUES (?, ?, ?, NULL, ?, ?)",
        )
        .bind(phone)
        .bind(activity_type)
        .bind(format!("{} prompt", activity_type))
        .bind(file_name)
        .bind(timestamp)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }
}
