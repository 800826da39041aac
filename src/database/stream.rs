use async_trait::async_trait;
use serde::Serialize;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Pool, Sqlite};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::errors::{LoadError, LoadResult};

/// A bound parameter of a buffered statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Null,
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One data-mutating SQL statement with its parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new<S: Into<String>>(sql: S) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind<V: Into<SqlValue>>(mut self, value: V) -> Self {
        self.params.push(value.into());
        self
    }

    pub(crate) fn query(&self) -> Query<'_, Sqlite, SqliteArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for param in &self.params {
            query = match param {
                SqlValue::Text(value) => query.bind(value.clone()),
                SqlValue::Integer(value) => query.bind(*value),
                SqlValue::Null => query.bind(Option::<String>::None),
            };
        }
        query
    }
}

/// Apply `statements` in a single transaction
pub(crate) async fn apply_in_transaction(
    pool: &Pool<Sqlite>,
    statements: &[Statement],
) -> Result<(), sqlx::Error> {
    let mut transaction = pool.begin().await?;
    for statement in statements {
        if let Err(e) = statement.query().execute(&mut *transaction).await {
            error!("Statement failed: {} ({})", statement.sql, e);
            transaction.rollback().await?;
            return Err(e);
        }
    }
    transaction.commit().await
}

/// Buffered writer for data-mutating statements.
///
/// Nothing reaches the store before [`close`](BatchWriteStream::close),
/// which durably applies every buffered statement.
///
/// Implementations hold every written statement until `close`, so memory
/// grows linearly with the number of statements in a run. A full release
/// load keeps all of its inserts resident; size the host accordingly.
#[async_trait]
pub trait BatchWriteStream: Send + Sync {
    fn name(&self) -> &str;

    async fn write(&self, statement: Statement) -> LoadResult<()>;

    async fn pending(&self) -> usize;

    /// Flush all buffered statements; returns how many were applied
    async fn close(&self) -> LoadResult<usize>;
}

#[derive(Debug, Default)]
struct StreamState {
    statements: Vec<Statement>,
    closed: bool,
}

/// Batch stream over a SQLite pool; `close` runs everything in one
/// transaction
pub struct SqliteBatchStream {
    name: String,
    pool: Pool<Sqlite>,
    state: Mutex<StreamState>,
}

impl SqliteBatchStream {
    pub fn new<S: Into<String>>(name: S, pool: Pool<Sqlite>) -> Self {
        Self {
            name: name.into(),
            pool,
            state: Mutex::new(StreamState::default()),
        }
    }
}

#[async_trait]
impl BatchWriteStream for SqliteBatchStream {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, statement: Statement) -> LoadResult<()> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LoadError::stream(&self.name, "write after close"));
        }
        state.statements.push(statement);
        Ok(())
    }

    async fn pending(&self) -> usize {
        self.state.lock().await.statements.len()
    }

    async fn close(&self) -> LoadResult<usize> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(LoadError::stream(&self.name, "stream already closed"));
        }
        state.closed = true;

        let statements = std::mem::take(&mut state.statements);
        debug!(
            "Flushing {} statements from stream '{}'",
            statements.len(),
            self.name
        );

        apply_in_transaction(&self.pool, &statements)
            .await
            .map_err(|e| LoadError::stream(&self.name, e.to_string()))?;

        info!(
            "Stream '{}' closed, {} statements applied",
            self.name,
            statements.len()
        );
        Ok(statements.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, Schema};

    async fn qc_rows(database: &Database) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM qc_reports")
            .fetch_one(&database.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_nothing_applied_before_close() {
        let database = Database::in_memory(Schema::Qc).await.unwrap();
        let stream = SqliteBatchStream::new("qc", database.pool());

        stream
            .write(
                Statement::new(
                    "INSERT INTO qc_reports (run_id, kind, acc_id, message, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind("run")
                .bind("changed_organism")
                .bind("NM_000001")
                .bind("organism changed")
                .bind("2004-01-01T00:00:00Z"),
            )
            .await
            .unwrap();
        assert_eq!(stream.pending().await, 1);

        assert_eq!(qc_rows(&database).await, 0);

        assert_eq!(stream.close().await.unwrap(), 1);
        assert_eq!(qc_rows(&database).await, 1);
    }

    #[tokio::test]
    async fn test_buffer_holds_every_statement_until_close() {
        let database = Database::in_memory(Schema::Qc).await.unwrap();
        let stream = SqliteBatchStream::new("qc", database.pool());

        for i in 0..50 {
            stream
                .write(Statement::new("SELECT ?").bind(i as i64))
                .await
                .unwrap();
        }
        assert_eq!(stream.pending().await, 50);

        assert_eq!(stream.close().await.unwrap(), 50);
        assert_eq!(stream.pending().await, 0);
    }

    #[tokio::test]
    async fn test_write_after_close_fails() {
        let database = Database::in_memory(Schema::Qc).await.unwrap();
        let stream = SqliteBatchStream::new("qc", database.pool());
        stream.close().await.unwrap();

        let result = stream.write(Statement::new("SELECT 1")).await;
        assert!(matches!(result, Err(LoadError::Stream { .. })));
        assert!(stream.close().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_statement_rolls_back_batch() {
        let database = Database::in_memory(Schema::Qc).await.unwrap();
        let stream = SqliteBatchStream::new("qc", database.pool());

        stream
            .write(
                Statement::new(
                    "INSERT INTO qc_reports (run_id, kind, acc_id, message, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind("run")
                .bind("merge")
                .bind("NM_000001")
                .bind("merged")
                .bind("2004-01-01T00:00:00Z"),
            )
            .await
            .unwrap();
        stream
            .write(Statement::new("INSERT INTO missing_table VALUES (1)"))
            .await
            .unwrap();

        assert!(stream.close().await.is_err());
        assert_eq!(qc_rows(&database).await, 0);
    }

    #[test]
    fn test_option_binds_null() {
        let statement = Statement::new("UPDATE t SET a = ?").bind(Option::<String>::None);
        assert_eq!(statement.params, vec![SqlValue::Null]);
    }
}
