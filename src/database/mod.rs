pub mod connection;

pub use connection::{DbPool, create_pool, run_migrations};

#[cfg(test)]
pub mod test_support {
    use super::DbPool;
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::time::Duration;

    /// Throwaway file-backed database with the schema applied. File-backed
    /// rather than :memory: so every pooled connection sees the same data.
    pub async fn test_pool() -> DbPool {
        let path = std::env::temp_dir().join(format!("rifas-test-{}.db", uuid::Uuid::new_v4()));

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .expect("open test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("run migrations");

        pool
    }
}
