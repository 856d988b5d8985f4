use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use palaver_core::config::DatabaseConfig;
    use sqlx::Row;

    use super::run_pending;
    use crate::{connect, DbPool};

    async fn memory_pool() -> DbPool {
        let database = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 30,
        };
        connect(&database).await.expect("connect")
    }

    #[tokio::test]
    async fn migrations_create_chat_history_schema() {
        let pool = memory_pool().await;
        run_pending(&pool).await.expect("run migrations");

        let table_count = sqlx::query(
            "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'table' AND name = 'chat_history'",
        )
        .fetch_one(&pool)
        .await
        .expect("check chat_history table")
        .get::<i64, _>("count");
        assert_eq!(table_count, 1);

        for index in
            ["idx_chat_history_user_id", "idx_chat_history_timestamp", "idx_chat_history_session_id"]
        {
            let index_count = sqlx::query(
                "SELECT COUNT(*) AS count FROM sqlite_master WHERE type = 'index' AND name = ?1",
            )
            .bind(index)
            .fetch_one(&pool)
            .await
            .expect("check index")
            .get::<i64, _>("count");
            assert_eq!(index_count, 1, "missing index {index}");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = memory_pool().await;
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");
    }
}
