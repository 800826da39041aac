use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::info;

use super::stream::{apply_in_transaction, Statement};
use crate::errors::{LoadError, LoadResult};

/// Collects generated reconciliation statements for a later, separate
/// execution step
#[async_trait]
pub trait ScriptSink: Send {
    fn append(&mut self, statement: Statement);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run the collected statements; returns how many were executed
    async fn execute(&mut self) -> LoadResult<usize>;
}

/// A SQL script executed as one transaction against a SQLite pool
pub struct SqlScript {
    name: String,
    pool: Pool<Sqlite>,
    statements: Vec<Statement>,
}

impl SqlScript {
    pub fn new<S: Into<String>>(name: S, pool: Pool<Sqlite>) -> Self {
        Self {
            name: name.into(),
            pool,
            statements: Vec::new(),
        }
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

#[async_trait]
impl ScriptSink for SqlScript {
    fn append(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    fn len(&self) -> usize {
        self.statements.len()
    }

    async fn execute(&mut self) -> LoadResult<usize> {
        let statements = std::mem::take(&mut self.statements);
        if statements.is_empty() {
            info!("Script '{}' is empty, nothing to execute", self.name);
            return Ok(0);
        }

        apply_in_transaction(&self.pool, &statements)
            .await
            .map_err(|e| LoadError::script(format!("{}: {}", self.name, e)))?;

        info!(
            "Script '{}' executed, {} statements applied",
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

    #[tokio::test]
    async fn test_script_runs_on_execute() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        let mut script = SqlScript::new("merge_split", database.pool());

        script.append(
            Statement::new(
                "INSERT INTO merge_split_events (event_type, from_acc_id, to_acc_id) VALUES (?, ?, ?)",
            )
            .bind("merge")
            .bind("NM_000002")
            .bind("NM_000001"),
        );
        assert_eq!(script.len(), 1);

        assert_eq!(script.execute().await.unwrap(), 1);
        assert!(script.is_empty());

        let events = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM merge_split_events")
            .fetch_one(&database.pool())
            .await
            .unwrap();
        assert_eq!(events, 1);
    }

    #[tokio::test]
    async fn test_failing_script_is_script_error() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        let mut script = SqlScript::new("merge_split", database.pool());
        script.append(Statement::new("UPDATE nowhere SET a = 1"));

        assert!(matches!(
            script.execute().await,
            Err(LoadError::Script { .. })
        ));
    }
}
