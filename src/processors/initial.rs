use async_trait::async_trait;
use std::sync::Arc;
use tracing::trace;

use super::{
    AttributeResolver, EventCounts, ProcessorTimings, RepeatTracker, SequenceProcessor,
};
use crate::database::sequences::insert_sequence;
use crate::database::BatchWriteStream;
use crate::errors::ProcessError;
use crate::models::SequenceInput;

/// First load into an empty store: every record becomes an add event
pub struct InitialLoadProcessor {
    stream: Arc<dyn BatchWriteStream>,
    resolver: AttributeResolver,
    repeats: RepeatTracker,
    events: EventCounts,
    timings: ProcessorTimings,
}

impl InitialLoadProcessor {
    pub fn new(stream: Arc<dyn BatchWriteStream>, resolver: AttributeResolver) -> Self {
        Self {
            stream,
            resolver,
            repeats: RepeatTracker::default(),
            events: EventCounts::default(),
            timings: ProcessorTimings::default(),
        }
    }

    pub fn events(&self) -> EventCounts {
        self.events
    }
}

#[async_trait]
impl SequenceProcessor for InitialLoadProcessor {
    async fn process(&mut self, input: &SequenceInput) -> Result<(), ProcessError> {
        self.repeats.check(input)?;
        let resolved = self.resolver.resolve(input, &mut self.timings.source)?;

        for statement in insert_sequence(&resolved) {
            self.stream.write(statement).await?;
        }
        self.repeats.remember(input);
        self.events.adds += 1;
        trace!("Add event for {}", input.acc_id());
        Ok(())
    }

    fn timings(&self) -> ProcessorTimings {
        self.timings
    }

    fn event_report(&self) -> Vec<String> {
        self.events.report_lines()
    }
}
