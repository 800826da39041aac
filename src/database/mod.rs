use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{migrate::MigrateDatabase, Pool, Sqlite};
use tracing::{error, info};

use crate::assets::{self, QcMigrations, SequenceMigrations};
use crate::config::defaults::DEFAULT_MAX_CONNECTIONS;
use crate::config::DatabaseConfig;
use crate::errors::{LoadError, LoadResult};

pub mod qc;
pub mod repeat;
pub mod script;
pub mod sequences;
pub mod stream;

pub use qc::{QcReportKind, QcReporter};
pub use repeat::{RepeatSequenceFile, RepeatSink};
pub use script::{ScriptSink, SqlScript};
pub use stream::{BatchWriteStream, SqlValue, SqliteBatchStream, Statement};

/// Which embedded schema a database carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Sequences,
    Qc,
}

impl Schema {
    fn migrations(&self) -> Vec<(String, String)> {
        match self {
            Schema::Sequences => assets::migrations::<SequenceMigrations>(),
            Schema::Qc => assets::migrations::<QcMigrations>(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Schema::Sequences => "sequences",
            Schema::Qc => "qc",
        }
    }
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
    schema: Schema,
}

impl Database {
    pub fn pool(&self) -> Pool<Sqlite> {
        self.pool.clone()
    }

    pub fn schema(&self) -> Schema {
        self.schema
    }

    pub async fn new(config: &DatabaseConfig, schema: Schema) -> LoadResult<Self> {
        let in_memory = config.url.contains(":memory:");

        // Create database if it doesn't exist (for SQLite)
        if !in_memory && !Sqlite::database_exists(&config.url).await? {
            Sqlite::create_database(&config.url).await?;
        }

        let mut options = SqlitePoolOptions::new()
            .max_connections(config.max_connections.unwrap_or(DEFAULT_MAX_CONNECTIONS));
        if in_memory {
            // every connection to :memory: is a separate database
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = options.connect(&config.url).await.map_err(|e| {
            error!("Failed to connect to {} database {}: {}", schema.as_str(), config.url, e);
            e
        })?;

        Ok(Self { pool, schema })
    }

    /// Open an in-memory database with its schema applied
    pub async fn in_memory(schema: Schema) -> LoadResult<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: Some(1),
        };
        let database = Self::new(&config, schema).await?;
        database.migrate().await?;
        Ok(database)
    }

    pub async fn migrate(&self) -> LoadResult<()> {
        self.run_embedded_migrations().await
    }

    async fn run_embedded_migrations(&self) -> LoadResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS _sqlx_migrations (
                version BIGINT PRIMARY KEY,
                description TEXT NOT NULL,
                installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                success BOOLEAN NOT NULL,
                checksum BLOB NOT NULL,
                execution_time BIGINT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for (name, content) in self.schema.migrations() {
            // "001_sequence_schema.sql" -> 1
            let version: i64 = name
                .split('_')
                .next()
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| {
                    LoadError::configuration(format!("Migration {} has no version prefix", name))
                })?;

            let existing = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _sqlx_migrations WHERE version = ? AND success = true",
            )
            .bind(version)
            .fetch_one(&self.pool)
            .await?;

            if existing > 0 {
                continue;
            }

            let start = std::time::Instant::now();
            let mut transaction = self.pool.begin().await?;

            for statement in content.split(';').map(str::trim).filter(|s| !s.is_empty()) {
                if let Err(e) = sqlx::query(statement).execute(&mut *transaction).await {
                    transaction.rollback().await?;
                    error!("Migration {} failed: {}", name, e);
                    return Err(LoadError::Database(e));
                }
            }

            let execution_time = start.elapsed().as_millis() as i64;
            sqlx::query(
                r#"
                INSERT INTO _sqlx_migrations (version, description, success, checksum, execution_time)
                VALUES (?, ?, true, ?, ?)
                "#,
            )
            .bind(version)
            .bind(&name)
            .bind(Self::calculate_checksum(&content))
            .bind(execution_time)
            .execute(&mut *transaction)
            .await?;

            transaction.commit().await?;
            info!(
                "Applied {} migration: {} ({}ms)",
                self.schema.as_str(),
                name,
                execution_time
            );
        }

        Ok(())
    }

    fn calculate_checksum(content: &str) -> Vec<u8> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};
        let mut hasher = DefaultHasher::new();
        content.hash(&mut hasher);
        hasher.finish().to_be_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        database.migrate().await.unwrap();

        let applied = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM _sqlx_migrations")
            .fetch_one(&database.pool())
            .await
            .unwrap();
        assert_eq!(applied, 1);

        let sequences = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sequences")
            .fetch_one(&database.pool())
            .await
            .unwrap();
        assert_eq!(sequences, 0);
    }

    #[tokio::test]
    async fn test_qc_schema() {
        let database = Database::in_memory(Schema::Qc).await.unwrap();
        let reports = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM qc_reports")
            .fetch_one(&database.pool())
            .await
            .unwrap();
        assert_eq!(reports, 0);
    }
}
