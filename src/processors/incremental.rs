use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

use super::resolver::organism_name;
use super::{
    AttributeResolver, EventCounts, ProcessorTimings, RepeatTracker, SequenceProcessor,
};
use crate::database::sequences::{insert_sequence, update_sequence};
use crate::database::{BatchWriteStream, Database, QcReportKind, QcReporter};
use crate::errors::{ProcessError, RecoverableFailure};
use crate::models::{MergeSplitCandidate, SequenceInput, StoredSequence};

/// What an input record means relative to the committed store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadEvent {
    Add,
    Update,
    NonEvent,
}

/// Reconciles the input against the store: adds new sequences, updates
/// sequences whose version changed and collects merge/split candidates
/// from secondary accessions
pub struct IncrementalProcessor {
    database: Database,
    stream: Arc<dyn BatchWriteStream>,
    qc: QcReporter,
    resolver: AttributeResolver,
    repeats: RepeatTracker,
    events: EventCounts,
    timings: ProcessorTimings,
    candidates: Vec<MergeSplitCandidate>,
}

impl IncrementalProcessor {
    pub fn new(
        database: Database,
        stream: Arc<dyn BatchWriteStream>,
        qc: QcReporter,
        resolver: AttributeResolver,
    ) -> Self {
        Self {
            database,
            stream,
            qc,
            resolver,
            repeats: RepeatTracker::default(),
            events: EventCounts::default(),
            timings: ProcessorTimings::default(),
            candidates: Vec::new(),
        }
    }

    pub fn events(&self) -> EventCounts {
        self.events
    }

    fn detect_event(stored: Option<&StoredSequence>, version: &str) -> LoadEvent {
        match stored {
            None => LoadEvent::Add,
            Some(stored) if stored.version != version => LoadEvent::Update,
            Some(_) => LoadEvent::NonEvent,
        }
    }
}

#[async_trait]
impl SequenceProcessor for IncrementalProcessor {
    async fn process(&mut self, input: &SequenceInput) -> Result<(), ProcessError> {
        self.repeats.check(input)?;

        let started = Instant::now();
        let stored = self.database.find_sequence(input.acc_id()).await?;
        self.timings.lookup.record(started.elapsed());

        let resolved = self.resolver.resolve(input, &mut self.timings.source)?;

        let event = Self::detect_event(stored.as_ref(), &resolved.sequence.version);
        let statements = match (event, stored.as_ref()) {
            (LoadEvent::Update, Some(stored)) => {
                if stored.organism_key != resolved.source.organism_key {
                    let previous = organism_name(stored.organism_key)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("organism key {}", stored.organism_key));
                    let failure = RecoverableFailure::ChangedOrganism {
                        previous,
                        current: resolved.source.organism.clone(),
                    };
                    self.qc
                        .report(QcReportKind::ChangedOrganism, input.acc_id(), failure.to_string())
                        .await?;
                    return Err(failure.into());
                }
                if stored.clone_library != resolved.source.clone_library {
                    let failure = RecoverableFailure::ChangedLibrary {
                        previous: stored.clone_library.clone().unwrap_or_default(),
                        current: resolved.source.clone_library.clone().unwrap_or_default(),
                    };
                    self.qc
                        .report(QcReportKind::ChangedLibrary, input.acc_id(), failure.to_string())
                        .await?;
                    return Err(failure.into());
                }
                self.events.updates += 1;
                update_sequence(&resolved)
            }
            (LoadEvent::NonEvent, _) => {
                self.events.non_events += 1;
                Vec::new()
            }
            _ => {
                self.events.adds += 1;
                insert_sequence(&resolved)
            }
        };

        trace!("{:?} event for {}", event, input.acc_id());
        for statement in statements {
            self.stream.write(statement).await?;
        }

        for secondary in &resolved.accessions.secondary {
            self.candidates.push(MergeSplitCandidate {
                secondary_acc: secondary.clone(),
                target_acc: resolved.acc_id().to_string(),
            });
            self.events.merge_split_candidates += 1;
        }

        self.repeats.remember(input);
        Ok(())
    }

    fn timings(&self) -> ProcessorTimings {
        self.timings
    }

    fn event_report(&self) -> Vec<String> {
        self.events.report_lines()
    }

    fn take_merge_split_candidates(&mut self) -> Vec<MergeSplitCandidate> {
        debug!("Handing over {} merge/split candidates", self.candidates.len());
        std::mem::take(&mut self.candidates)
    }
}
