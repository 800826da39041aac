//! Sequence processors
//!
//! Exactly one processor is active per run, selected by the load mode. A
//! processor resolves each input record, decides which load event it
//! represents and buffers the resulting statements on the primary stream.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::errors::{ProcessError, RecoverableFailure};
use crate::models::{MergeSplitCandidate, SequenceInput};

pub mod delete_reload;
pub mod incremental;
pub mod initial;
pub mod merge_split;
pub mod resolver;

pub use delete_reload::DeleteReloadProcessor;
pub use incremental::IncrementalProcessor;
pub use initial::InitialLoadProcessor;
pub use merge_split::{MergeSplitProcessor, MergeSplitReconciler, MergeSplitSummary};
pub use resolver::{AttributeResolver, ResolvedSequence};

#[async_trait]
pub trait SequenceProcessor: Send {
    async fn process(&mut self, input: &SequenceInput) -> Result<(), ProcessError>;

    fn timings(&self) -> ProcessorTimings;

    /// End-of-run event counts as report lines
    fn event_report(&self) -> Vec<String>;

    /// Hand over the merge/split candidates gathered so far
    fn take_merge_split_candidates(&mut self) -> Vec<MergeSplitCandidate> {
        Vec::new()
    }
}

/// Count, total, minimum and maximum of a series of durations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TimingSummary {
    pub count: u64,
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl TimingSummary {
    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.total += elapsed;
        self.min = Some(self.min.map_or(elapsed, |min| min.min(elapsed)));
        self.max = Some(self.max.map_or(elapsed, |max| max.max(elapsed)));
    }

    pub fn average(&self) -> Option<Duration> {
        if self.count == 0 {
            return None;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

/// Timing of the store lookups and molecular source resolution of a
/// processor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProcessorTimings {
    pub lookup: TimingSummary,
    pub source: TimingSummary,
}

/// Load event counters shared by the processors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub adds: u64,
    pub updates: u64,
    pub non_events: u64,
    pub merge_split_candidates: u64,
    pub deletes: u64,
}

impl EventCounts {
    pub fn report_lines(&self) -> Vec<String> {
        vec![
            format!("Total Add events: {}", self.adds),
            format!("Total Update events: {}", self.updates),
            format!("Total Non events: {}", self.non_events),
            format!("Total MergeSplit candidates: {}", self.merge_split_candidates),
            "Note: one input record may be counted in more than one event category".to_string(),
        ]
    }
}

/// Remembers which primary accessions were already seen in this input.
/// Holds one `String` per accession loaded, for the lifetime of the run.
#[derive(Debug, Default)]
pub struct RepeatTracker {
    seen: HashSet<String>,
}

impl RepeatTracker {
    pub fn check(&self, input: &SequenceInput) -> Result<(), RecoverableFailure> {
        if self.seen.contains(input.acc_id()) {
            return Err(RecoverableFailure::RepeatSequence {
                acc_id: input.acc_id().to_string(),
                version: input.sequence.version.clone(),
            });
        }
        Ok(())
    }

    /// Mark a record as loaded; only successfully processed records count
    pub fn remember(&mut self, input: &SequenceInput) {
        self.seen.insert(input.acc_id().to_string());
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureKind;
    use crate::processors::resolver::tests::sample_input;

    #[test]
    fn test_timing_summary() {
        let mut summary = TimingSummary::default();
        assert_eq!(summary.average(), None);

        summary.record(Duration::from_millis(30));
        summary.record(Duration::from_millis(10));
        summary.record(Duration::from_millis(20));

        assert_eq!(summary.count, 3);
        assert_eq!(summary.min, Some(Duration::from_millis(10)));
        assert_eq!(summary.max, Some(Duration::from_millis(30)));
        assert_eq!(summary.average(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn test_repeat_tracker() {
        let mut tracker = RepeatTracker::default();
        let input = sample_input("NM_000001");

        assert!(tracker.check(&input).is_ok());
        assert!(tracker.check(&input).is_ok());
        tracker.remember(&input);
        let failure = tracker.check(&input).unwrap_err();
        assert_eq!(failure.kind(), FailureKind::RepeatSequence);
        assert_eq!(tracker.len(), 1);
    }
}
