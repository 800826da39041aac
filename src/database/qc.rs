use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::stream::{BatchWriteStream, Statement};
use crate::errors::LoadResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QcReportKind {
    ChangedOrganism,
    ChangedLibrary,
    Merge,
    Split,
}

impl QcReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QcReportKind::ChangedOrganism => "changed_organism",
            QcReportKind::ChangedLibrary => "changed_library",
            QcReportKind::Merge => "merge",
            QcReportKind::Split => "split",
        }
    }
}

/// Writes QC report rows to the QC stream. Cheap to clone; clones share the
/// stream, the run id and the counter.
#[derive(Clone)]
pub struct QcReporter {
    stream: Arc<dyn BatchWriteStream>,
    run_id: Uuid,
    reported: Arc<AtomicU64>,
}

impl QcReporter {
    pub fn new(stream: Arc<dyn BatchWriteStream>) -> Self {
        Self {
            stream,
            run_id: Uuid::new_v4(),
            reported: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn reported(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    pub async fn report<M: Into<String>>(
        &self,
        kind: QcReportKind,
        acc_id: &str,
        message: M,
    ) -> LoadResult<()> {
        let message = message.into();
        debug!("QC {} for {}: {}", kind.as_str(), acc_id, message);

        self.stream
            .write(
                Statement::new(
                    "INSERT INTO qc_reports (run_id, kind, acc_id, message, created_at) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(self.run_id.to_string())
                .bind(kind.as_str())
                .bind(acc_id)
                .bind(message)
                .bind(Utc::now().to_rfc3339()),
            )
            .await?;

        self.reported.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Database, Schema, SqliteBatchStream};
    use sqlx::Row;

    #[tokio::test]
    async fn test_reports_reach_qc_store_on_close() {
        let database = Database::in_memory(Schema::Qc).await.unwrap();
        let stream = Arc::new(SqliteBatchStream::new("qc", database.pool()));
        let reporter = QcReporter::new(stream.clone());

        reporter
            .report(QcReportKind::ChangedLibrary, "NM_000001", "library changed")
            .await
            .unwrap();
        assert_eq!(reporter.reported(), 1);
        stream.close().await.unwrap();

        let row = sqlx::query("SELECT run_id, kind, acc_id FROM qc_reports")
            .fetch_one(&database.pool())
            .await
            .unwrap();
        assert_eq!(row.get::<String, _>("run_id"), reporter.run_id().to_string());
        assert_eq!(row.get::<String, _>("kind"), "changed_library");
        assert_eq!(row.get::<String, _>("acc_id"), "NM_000001");
    }
}
