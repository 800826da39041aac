//! Deferred merge/split reconciliation
//!
//! Runs after the primary stream has been flushed. A secondary accession of
//! an input record that is itself an active, loaded sequence means the
//! sequence was merged into (one referencing record) or split across
//! (several referencing records) the referencing sequences.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::database::sequences::{merge_sequence, split_sequence};
use crate::database::{Database, QcReportKind, QcReporter, ScriptSink};
use crate::errors::LoadResult;
use crate::models::MergeSplitCandidate;

#[async_trait]
pub trait MergeSplitReconciler: Send {
    fn register(&mut self, candidates: Vec<MergeSplitCandidate>);

    /// Reconcile the registered candidates against committed state and
    /// append the resulting statements to `script`
    async fn process(&mut self, script: &mut dyn ScriptSink) -> LoadResult<MergeSplitSummary>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeSplitSummary {
    pub candidates: u64,
    pub merges: u64,
    pub splits: u64,
    pub ignored: u64,
}

impl MergeSplitSummary {
    pub fn report_lines(&self) -> Vec<String> {
        vec![
            format!("Total MergeSplit candidates examined: {}", self.candidates),
            format!("Total Merge events: {}", self.merges),
            format!("Total Split events: {}", self.splits),
            format!("Total candidates ignored: {}", self.ignored),
        ]
    }
}

pub struct MergeSplitProcessor {
    database: Database,
    qc: QcReporter,
    /// secondary accession -> referencing primary accessions
    candidates: BTreeMap<String, BTreeSet<String>>,
}

impl MergeSplitProcessor {
    pub fn new(database: Database, qc: QcReporter) -> Self {
        Self {
            database,
            qc,
            candidates: BTreeMap::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.candidates.len()
    }
}

#[async_trait]
impl MergeSplitReconciler for MergeSplitProcessor {
    fn register(&mut self, candidates: Vec<MergeSplitCandidate>) {
        for candidate in candidates {
            if candidate.secondary_acc == candidate.target_acc {
                continue;
            }
            self.candidates
                .entry(candidate.secondary_acc)
                .or_default()
                .insert(candidate.target_acc);
        }
    }

    async fn process(&mut self, script: &mut dyn ScriptSink) -> LoadResult<MergeSplitSummary> {
        let candidates = std::mem::take(&mut self.candidates);
        let mut summary = MergeSplitSummary::default();
        info!("Processing {} merge/split candidates", candidates.len());

        for (secondary, targets) in candidates {
            summary.candidates += 1;

            if !self.database.is_active_sequence(&secondary).await? {
                summary.ignored += 1;
                continue;
            }

            let mut active_targets = Vec::with_capacity(targets.len());
            for target in targets {
                if self.database.is_active_sequence(&target).await? {
                    active_targets.push(target);
                }
            }

            match active_targets.as_slice() {
                [] => summary.ignored += 1,
                [target] => {
                    debug!("Merge {} -> {}", secondary, target);
                    for statement in merge_sequence(&secondary, target) {
                        script.append(statement);
                    }
                    self.qc
                        .report(
                            QcReportKind::Merge,
                            &secondary,
                            format!("{} merged into {}", secondary, target),
                        )
                        .await?;
                    summary.merges += 1;
                }
                targets => {
                    debug!("Split {} -> {}", secondary, targets.join(", "));
                    for statement in split_sequence(&secondary, targets) {
                        script.append(statement);
                    }
                    self.qc
                        .report(
                            QcReportKind::Split,
                            &secondary,
                            format!("{} split into {}", secondary, targets.join(", ")),
                        )
                        .await?;
                    summary.splits += 1;
                }
            }
        }

        info!(
            "Merge/split processing found {} merges and {} splits",
            summary.merges, summary.splits
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::sequences::insert_sequence;
    use crate::database::{BatchWriteStream, Schema, SqlScript, SqliteBatchStream};
    use crate::models::{SEQUENCE_STATUS_MERGED, SEQUENCE_STATUS_SPLIT};
    use crate::processors::resolver::tests::sample_input;
    use crate::processors::{AttributeResolver, TimingSummary};
    use std::sync::Arc;

    async fn seed(database: &Database, accs: &[&str]) {
        let stream = SqliteBatchStream::new("seed", database.pool());
        let resolver = AttributeResolver::new("RefSeq");
        for acc in accs {
            let resolved = resolver
                .resolve(&sample_input(acc), &mut TimingSummary::default())
                .unwrap();
            for statement in insert_sequence(&resolved) {
                stream.write(statement).await.unwrap();
            }
        }
        stream.close().await.unwrap();
    }

    fn candidate(secondary: &str, target: &str) -> MergeSplitCandidate {
        MergeSplitCandidate {
            secondary_acc: secondary.to_string(),
            target_acc: target.to_string(),
        }
    }

    #[tokio::test]
    async fn test_merge_split_and_ignore() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        let qc_database = Database::in_memory(Schema::Qc).await.unwrap();
        seed(
            &database,
            &["XM_000001", "NM_000001", "XM_000002", "NM_000002", "NM_000003"],
        )
        .await;

        let qc_stream = Arc::new(SqliteBatchStream::new("qc", qc_database.pool()));
        let mut reconciler =
            MergeSplitProcessor::new(database.clone(), QcReporter::new(qc_stream.clone()));
        reconciler.register(vec![
            candidate("XM_000001", "NM_000001"),
            candidate("XM_000002", "NM_000002"),
            candidate("XM_000002", "NM_000003"),
            candidate("XM_999999", "NM_000001"),
        ]);
        assert_eq!(reconciler.pending(), 3);

        let mut script = SqlScript::new("merge_split", database.pool());
        let summary = reconciler.process(&mut script).await.unwrap();
        assert_eq!(
            summary,
            MergeSplitSummary {
                candidates: 3,
                merges: 1,
                splits: 1,
                ignored: 1,
            }
        );
        assert_eq!(qc_stream.pending().await, 2);

        // nothing changes before the script runs
        let merged = database.find_sequence("XM_000001").await.unwrap().unwrap();
        assert_eq!(merged.status, "active");

        script.execute().await.unwrap();
        let merged = database.find_sequence("XM_000001").await.unwrap().unwrap();
        assert_eq!(merged.status, SEQUENCE_STATUS_MERGED);
        let split = database.find_sequence("XM_000002").await.unwrap().unwrap();
        assert_eq!(split.status, SEQUENCE_STATUS_SPLIT);
    }

    #[tokio::test]
    async fn test_self_reference_is_not_a_candidate() {
        let database = Database::in_memory(Schema::Sequences).await.unwrap();
        let qc_database = Database::in_memory(Schema::Qc).await.unwrap();
        let qc_stream = Arc::new(SqliteBatchStream::new("qc", qc_database.pool()));
        let mut reconciler = MergeSplitProcessor::new(database, QcReporter::new(qc_stream));

        reconciler.register(vec![candidate("NM_000001", "NM_000001")]);
        assert_eq!(reconciler.pending(), 0);
    }
}
