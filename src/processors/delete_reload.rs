use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::{
    AttributeResolver, EventCounts, ProcessorTimings, RepeatTracker, SequenceProcessor,
};
use crate::database::sequences::{delete_logical_db, insert_sequence};
use crate::database::BatchWriteStream;
use crate::errors::{LoadResult, ProcessError};
use crate::models::SequenceInput;

/// Drops every sequence of the configured namespace, then adds the whole
/// input again
pub struct DeleteReloadProcessor {
    stream: Arc<dyn BatchWriteStream>,
    resolver: AttributeResolver,
    repeats: RepeatTracker,
    events: EventCounts,
    timings: ProcessorTimings,
}

impl DeleteReloadProcessor {
    /// Queues the namespace delete on `stream` before any add statement
    pub async fn new(
        stream: Arc<dyn BatchWriteStream>,
        resolver: AttributeResolver,
    ) -> LoadResult<Self> {
        let deletes = delete_logical_db(resolver.logical_db());
        info!(
            "Queueing delete of all '{}' sequences ({} statements)",
            resolver.logical_db(),
            deletes.len()
        );
        for statement in deletes {
            stream.write(statement).await?;
        }

        Ok(Self {
            stream,
            resolver,
            repeats: RepeatTracker::default(),
            events: EventCounts {
                deletes: 1,
                ..EventCounts::default()
            },
            timings: ProcessorTimings::default(),
        })
    }

    pub fn events(&self) -> EventCounts {
        self.events
    }
}

#[async_trait]
impl SequenceProcessor for DeleteReloadProcessor {
    async fn process(&mut self, input: &SequenceInput) -> Result<(), ProcessError> {
        self.repeats.check(input)?;
        let resolved = self.resolver.resolve(input, &mut self.timings.source)?;

        for statement in insert_sequence(&resolved) {
            self.stream.write(statement).await?;
        }
        self.repeats.remember(input);
        self.events.adds += 1;
        Ok(())
    }

    fn timings(&self) -> ProcessorTimings {
        self.timings
    }

    fn event_report(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Deleted all '{}' sequences before reload",
            self.resolver.logical_db()
        )];
        lines.extend(self.events.report_lines());
        lines
    }
}
