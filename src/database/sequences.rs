use sqlx::Row;
use tracing::error;

use super::stream::Statement;
use super::Database;
use crate::errors::LoadResult;
use crate::models::{
    StoredSequence, SEQUENCE_STATUS_ACTIVE, SEQUENCE_STATUS_MERGED, SEQUENCE_STATUS_SPLIT,
};
use crate::processors::resolver::ResolvedSequence;

impl Database {
    pub async fn find_sequence(&self, acc_id: &str) -> LoadResult<Option<StoredSequence>> {
        let sequence = sqlx::query_as::<_, StoredSequence>(
            "SELECT acc_id, version, logical_db, organism_key, clone_library, quality, status
             FROM sequences WHERE acc_id = ?",
        )
        .bind(acc_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to look up sequence {}: {}", acc_id, e);
            e
        })?;
        Ok(sequence)
    }

    pub async fn is_active_sequence(&self, acc_id: &str) -> LoadResult<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sequences WHERE acc_id = ? AND status = ?",
        )
        .bind(acc_id)
        .bind(SEQUENCE_STATUS_ACTIVE)
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    pub async fn count_sequences(&self, logical_db: &str) -> LoadResult<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sequences WHERE logical_db = ?")
                .bind(logical_db)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Primary accessions that list `acc_id` as a secondary accession
    pub async fn sequences_with_secondary(&self, acc_id: &str) -> LoadResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT sequence_acc_id FROM secondary_accessions WHERE acc_id = ? ORDER BY sequence_acc_id",
        )
        .bind(acc_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("sequence_acc_id")).collect())
    }
}

/// Statements adding a new sequence with its accessions and references
pub fn insert_sequence(resolved: &ResolvedSequence) -> Vec<Statement> {
    let seq = &resolved.sequence;
    let source = &resolved.source;

    let mut statements = vec![Statement::new(
        "INSERT INTO sequences (acc_id, version, logical_db, logical_db_key, length, molecule_type,
             molecule_type_key, quality, description, division, sequence_date, organism_key,
             clone_library, strain, tissue, cell_line, sex, dev_stage, status)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(seq.acc_id.as_str())
    .bind(seq.version.as_str())
    .bind(resolved.accessions.logical_db.as_str())
    .bind(resolved.accessions.logical_db_key)
    .bind(seq.length)
    .bind(seq.molecule_type.as_str())
    .bind(seq.molecule_type_key)
    .bind(seq.quality.as_str())
    .bind(seq.description.as_str())
    .bind(seq.division.clone())
    .bind(seq.sequence_date.to_string())
    .bind(source.organism_key)
    .bind(source.clone_library.clone())
    .bind(source.strain.clone())
    .bind(source.tissue.clone())
    .bind(source.cell_line.clone())
    .bind(source.sex.clone())
    .bind(source.dev_stage.clone())
    .bind(SEQUENCE_STATUS_ACTIVE)];

    statements.extend(associations(resolved));
    statements
}

/// Statements bringing an existing sequence up to a new version
pub fn update_sequence(resolved: &ResolvedSequence) -> Vec<Statement> {
    let seq = &resolved.sequence;
    let source = &resolved.source;

    let mut statements = vec![
        Statement::new(
            "UPDATE sequences SET version = ?, length = ?, molecule_type = ?, molecule_type_key = ?,
                 quality = ?, description = ?, division = ?, sequence_date = ?, strain = ?,
                 tissue = ?, cell_line = ?, sex = ?, dev_stage = ?, updated_at = CURRENT_TIMESTAMP
             WHERE acc_id = ?",
        )
        .bind(seq.version.as_str())
        .bind(seq.length)
        .bind(seq.molecule_type.as_str())
        .bind(seq.molecule_type_key)
        .bind(seq.quality.as_str())
        .bind(seq.description.as_str())
        .bind(seq.division.clone())
        .bind(seq.sequence_date.to_string())
        .bind(source.strain.clone())
        .bind(source.tissue.clone())
        .bind(source.cell_line.clone())
        .bind(source.sex.clone())
        .bind(source.dev_stage.clone())
        .bind(seq.acc_id.as_str()),
        Statement::new("DELETE FROM reference_associations WHERE sequence_acc_id = ?")
            .bind(seq.acc_id.as_str()),
    ];

    statements.extend(associations(resolved));
    statements
}

fn associations(resolved: &ResolvedSequence) -> Vec<Statement> {
    let acc_id = resolved.acc_id();
    let secondary = resolved.accessions.secondary.iter().map(|secondary| {
        Statement::new(
            "INSERT OR IGNORE INTO secondary_accessions (acc_id, sequence_acc_id) VALUES (?, ?)",
        )
        .bind(secondary.as_str())
        .bind(acc_id)
    });
    let references = resolved.references.iter().map(|reference| {
        Statement::new(
            "INSERT OR IGNORE INTO reference_associations (sequence_acc_id, namespace, namespace_key, reference_id)
             VALUES (?, ?, ?, ?)",
        )
        .bind(acc_id)
        .bind(reference.namespace.as_str())
        .bind(reference.namespace_key)
        .bind(reference.id.as_str())
    });
    secondary.chain(references).collect()
}

/// Statements removing every sequence of a namespace
pub fn delete_logical_db(logical_db: &str) -> Vec<Statement> {
    vec![
        Statement::new(
            "DELETE FROM secondary_accessions WHERE sequence_acc_id IN
             (SELECT acc_id FROM sequences WHERE logical_db = ?)",
        )
        .bind(logical_db),
        Statement::new(
            "DELETE FROM reference_associations WHERE sequence_acc_id IN
             (SELECT acc_id FROM sequences WHERE logical_db = ?)",
        )
        .bind(logical_db),
        Statement::new("DELETE FROM sequences WHERE logical_db = ?").bind(logical_db),
    ]
}

pub fn merge_sequence(from_acc_id: &str, to_acc_id: &str) -> Vec<Statement> {
    vec![
        Statement::new(
            "UPDATE sequences SET status = ?, merged_into = ?, updated_at = CURRENT_TIMESTAMP
             WHERE acc_id = ?",
        )
        .bind(SEQUENCE_STATUS_MERGED)
        .bind(to_acc_id)
        .bind(from_acc_id),
        merge_split_event("merge", from_acc_id, to_acc_id),
    ]
}

pub fn split_sequence(from_acc_id: &str, to_acc_ids: &[String]) -> Vec<Statement> {
    let mut statements = vec![Statement::new(
        "UPDATE sequences SET status = ?, updated_at = CURRENT_TIMESTAMP WHERE acc_id = ?",
    )
    .bind(SEQUENCE_STATUS_SPLIT)
    .bind(from_acc_id)];
    statements.extend(
        to_acc_ids
            .iter()
            .map(|to| merge_split_event("split", from_acc_id, to)),
    );
    statements
}

fn merge_split_event(event_type: &str, from_acc_id: &str, to_acc_id: &str) -> Statement {
    Statement::new(
        "INSERT INTO merge_split_events (event_type, from_acc_id, to_acc_id) VALUES (?, ?, ?)",
    )
    .bind(event_type)
    .bind(from_acc_id)
    .bind(to_acc_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{BatchWriteStream, Schema, SqliteBatchStream};
    use crate::processors::resolver::tests::sample_input;
    use crate::processors::{AttributeResolver, TimingSummary};

    fn resolved(acc: &str, secondary: &[&str]) -> ResolvedSequence {
        let mut resolved = AttributeResolver::new("RefSeq")
            .resolve(&sample_input(acc), &mut TimingSummary::default())
            .unwrap();
        resolved.accessions.secondary = secondary.iter().map(|s| s.to_string()).collect();
        resolved
    }

    async fn apply(database: &Database, statements: Vec<Statement>) {
        let stream = SqliteBatchStream::new("test", database.pool());
        for statement in statements {
            stream.write(statement).await.unwrap();
        }
        stream.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        apply(&database, insert_sequence(&resolved("NM_000001", &["XM_000009"]))).await;

        let stored = database.find_sequence("NM_000001").await.unwrap().unwrap();
        assert_eq!(stored.version, "1");
        assert_eq!(stored.logical_db, "RefSeq");
        assert_eq!(stored.quality, "High");
        assert!(database.is_active_sequence("NM_000001").await.unwrap());
        assert!(!database.is_active_sequence("NM_000002").await.unwrap());
        assert_eq!(
            database.sequences_with_secondary("XM_000009").await.unwrap(),
            vec!["NM_000001".to_string()]
        );
    }

    #[tokio::test]
    async fn test_update_replaces_references() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        apply(&database, insert_sequence(&resolved("NM_000001", &[]))).await;

        let mut newer = resolved("NM_000001", &[]);
        newer.sequence.version = "2".to_string();
        apply(&database, update_sequence(&newer)).await;

        let stored = database.find_sequence("NM_000001").await.unwrap().unwrap();
        assert_eq!(stored.version, "2");
        let references = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM reference_associations WHERE sequence_acc_id = 'NM_000001'",
        )
        .fetch_one(&database.pool())
        .await
        .unwrap();
        assert_eq!(references, 1);
    }

    #[tokio::test]
    async fn test_split_records_one_event_per_target() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        apply(&database, insert_sequence(&resolved("XM_000001", &[]))).await;

        let targets = vec!["NM_000002".to_string(), "NM_000003".to_string()];
        apply(&database, split_sequence("XM_000001", &targets)).await;

        assert!(!database.is_active_sequence("XM_000001").await.unwrap());
        let events = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM merge_split_events WHERE event_type = 'split'",
        )
        .fetch_one(&database.pool())
        .await
        .unwrap();
        assert_eq!(events, 2);
    }
}
