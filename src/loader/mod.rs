//! Load controller
//!
//! Drives one run: pulls records from the source, dispatches them to the
//! processor selected by the load mode, contains per-record failures and
//! finalizes the output streams in a fixed order once the input is
//! exhausted.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub mod report;
pub mod statistics;

pub use report::{MemoryReportSink, ReportSink, RunReport, TracingReportSink};
pub use statistics::{MemorySampler, RunStatistics, StatisticsSnapshot};

use crate::config::Config;
use crate::database::{
    BatchWriteStream, Database, QcReporter, RepeatSequenceFile, RepeatSink, Schema, ScriptSink,
    SqlScript, SqliteBatchStream,
};
use crate::deciders::{GenBankOrganismChecker, PrefixDeciderEngine};
use crate::errors::{
    FailureCategory, InputError, LoadError, LoadResult, ProcessError, RecoverableFailure,
};
use crate::ingestor::{GenBankParser, GenBankRecordReader, RecordSource, RefSeqInterpreter};
use crate::models::{LoadMode, SequenceInput};
use crate::processors::{
    AttributeResolver, DeleteReloadProcessor, IncrementalProcessor, InitialLoadProcessor,
    MergeSplitProcessor, MergeSplitReconciler, MergeSplitSummary, SequenceProcessor,
};

/// Lifecycle of a run. Phases only ever move forward, one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadPhase {
    Idle,
    Initializing,
    Running,
    Finalizing,
    Done,
}

impl LoadPhase {
    fn next(self) -> Option<LoadPhase> {
        match self {
            LoadPhase::Idle => Some(LoadPhase::Initializing),
            LoadPhase::Initializing => Some(LoadPhase::Running),
            LoadPhase::Running => Some(LoadPhase::Finalizing),
            LoadPhase::Finalizing => Some(LoadPhase::Done),
            LoadPhase::Done => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadPhase::Idle => "idle",
            LoadPhase::Initializing => "initializing",
            LoadPhase::Running => "running",
            LoadPhase::Finalizing => "finalizing",
            LoadPhase::Done => "done",
        }
    }
}

impl fmt::Display for LoadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of dispatching one record to the processor
#[derive(Debug)]
pub enum RecordOutcome {
    Passed,
    Recoverable(RecoverableFailure),
    Fatal(LoadError),
}

impl From<Result<(), ProcessError>> for RecordOutcome {
    fn from(result: Result<(), ProcessError>) -> Self {
        match result {
            Ok(()) => RecordOutcome::Passed,
            Err(ProcessError::Recoverable(failure)) => RecordOutcome::Recoverable(failure),
            Err(ProcessError::Fatal(e)) => RecordOutcome::Fatal(e),
        }
    }
}

/// Deferred reconciliation collaborators, present only in modes that
/// reconcile merges and splits
pub struct MergeSplitStage {
    pub reconciler: Box<dyn MergeSplitReconciler>,
    pub script: Box<dyn ScriptSink>,
    pub repeats: Box<dyn RepeatSink>,
}

/// Collaborators of a run, acquired during initialization
pub struct LoadResources {
    pub mode: LoadMode,
    pub source: Box<dyn RecordSource>,
    pub processor: Box<dyn SequenceProcessor>,
    pub primary_stream: Arc<dyn BatchWriteStream>,
    pub qc_stream: Arc<dyn BatchWriteStream>,
    pub merge_split: Option<MergeSplitStage>,
    pub report_sink: Box<dyn ReportSink>,
    pub progress_interval: usize,
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub mode: LoadMode,
    pub statistics: StatisticsSnapshot,
    pub merge_split: Option<MergeSplitSummary>,
    pub report: Vec<String>,
}

pub struct LoadController {
    phase: LoadPhase,
    mode: LoadMode,
    source: Box<dyn RecordSource>,
    processor: Box<dyn SequenceProcessor>,
    primary_stream: Arc<dyn BatchWriteStream>,
    qc_stream: Arc<dyn BatchWriteStream>,
    merge_split: Option<MergeSplitStage>,
    report_sink: Box<dyn ReportSink>,
    progress_interval: usize,
    statistics: RunStatistics,
    memory: MemorySampler,
}

impl LoadController {
    /// Build a controller around already acquired collaborators
    pub fn from_resources(resources: LoadResources) -> LoadResult<Self> {
        let mut controller = Self {
            phase: LoadPhase::Idle,
            mode: resources.mode,
            source: resources.source,
            processor: resources.processor,
            primary_stream: resources.primary_stream,
            qc_stream: resources.qc_stream,
            merge_split: resources.merge_split,
            report_sink: resources.report_sink,
            progress_interval: resources.progress_interval.max(1),
            statistics: RunStatistics::new(),
            memory: MemorySampler::new(),
        };
        controller.advance(LoadPhase::Initializing)?;
        Ok(controller)
    }

    /// Acquire every collaborator the configured mode needs. Any failure
    /// here aborts the run before a single record is read.
    pub async fn initialize(config: &Config, report_sink: Box<dyn ReportSink>) -> LoadResult<Self> {
        config.validate()?;
        let mode = config.load.mode;
        info!(
            "Initializing {} load into '{}' from {}",
            mode,
            config.load.logical_db,
            config.input.path.display()
        );

        let prefix_engine = PrefixDeciderEngine::new(&config.prefixes)?;
        let organism_checker = GenBankOrganismChecker::new(&config.organisms)?;
        let interpreter = RefSeqInterpreter::new(
            Box::new(organism_checker),
            prefix_engine,
            Box::new(GenBankParser::new()),
        );
        let source = GenBankRecordReader::open(&config.input.path, interpreter)?;

        let database = Database::new(&config.database, Schema::Sequences).await?;
        database.migrate().await?;
        let qc_database = Database::new(&config.qc_database, Schema::Qc).await?;
        qc_database.migrate().await?;

        let primary_stream: Arc<dyn BatchWriteStream> =
            Arc::new(SqliteBatchStream::new("sequences", database.pool()));
        let qc_stream: Arc<dyn BatchWriteStream> =
            Arc::new(SqliteBatchStream::new("qc", qc_database.pool()));
        let qc = QcReporter::new(qc_stream.clone());
        let resolver = AttributeResolver::new(config.load.logical_db.clone());

        let processor: Box<dyn SequenceProcessor> = match mode {
            LoadMode::IncrementalInitial => {
                Box::new(InitialLoadProcessor::new(primary_stream.clone(), resolver))
            }
            LoadMode::Incremental => Box::new(IncrementalProcessor::new(
                database.clone(),
                primary_stream.clone(),
                qc.clone(),
                resolver,
            )),
            LoadMode::DeleteReload => {
                Box::new(DeleteReloadProcessor::new(primary_stream.clone(), resolver).await?)
            }
        };

        let merge_split = if mode.performs_merge_split() {
            Some(MergeSplitStage {
                reconciler: Box::new(MergeSplitProcessor::new(database.clone(), qc)),
                script: Box::new(SqlScript::new("merge_split", database.pool())),
                repeats: Box::new(RepeatSequenceFile::create(&config.load.repeat_file)?),
            })
        } else {
            None
        };

        Self::from_resources(LoadResources {
            mode,
            source: Box::new(source),
            processor,
            primary_stream,
            qc_stream,
            merge_split,
            report_sink,
            progress_interval: config.input.progress_interval,
        })
    }

    pub fn phase(&self) -> LoadPhase {
        self.phase
    }

    pub fn mode(&self) -> LoadMode {
        self.mode
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    fn advance(&mut self, to: LoadPhase) -> LoadResult<()> {
        if self.phase.next() != Some(to) {
            return Err(LoadError::InvalidState {
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }
        debug!("Load phase {} -> {}", self.phase, to);
        self.phase = to;
        Ok(())
    }

    /// Process the whole input, then finalize. A fatal error returns
    /// immediately and skips finalization.
    pub async fn run(&mut self) -> LoadResult<LoadSummary> {
        self.advance(LoadPhase::Running)?;
        let started = Instant::now();

        loop {
            let record_started = Instant::now();
            let Some(next) = self.source.next_record() else {
                break;
            };
            self.statistics.record_seen();

            let input = match next {
                Ok(input) => input,
                Err(InputError::Format(e)) => {
                    let failure = RecoverableFailure::RecordFormat(e);
                    error!(
                        "Skipping record {}: {}",
                        self.statistics.seen(),
                        failure
                    );
                    self.statistics.record_failure(failure.kind());
                    self.log_progress();
                    continue;
                }
                Err(InputError::Io(e)) => {
                    error!("Failed reading input: {}", e);
                    return Err(LoadError::Io(e));
                }
            };

            match self.dispatch(&input).await {
                RecordOutcome::Passed => {
                    self.statistics.record_passed(record_started.elapsed());
                    let available = self.memory.sample();
                    self.statistics.record_available_memory(available);
                }
                RecordOutcome::Recoverable(failure) => self.on_recoverable(&input, failure)?,
                RecordOutcome::Fatal(e) => {
                    error!("Fatal error processing {}: {}", input.acc_id(), e);
                    return Err(e);
                }
            }
            self.log_progress();
        }

        self.statistics.set_elapsed(started.elapsed());
        self.finalize().await
    }

    async fn dispatch(&mut self, input: &SequenceInput) -> RecordOutcome {
        self.processor.process(input).await.into()
    }

    fn on_recoverable(
        &mut self,
        input: &SequenceInput,
        failure: RecoverableFailure,
    ) -> LoadResult<()> {
        match failure.category() {
            FailureCategory::Structural | FailureCategory::Resolution => {
                error!("{}: {}", input.acc_id(), failure)
            }
            FailureCategory::Policy => info!("{}: {}", input.acc_id(), failure),
        }

        if let RecoverableFailure::RepeatSequence { acc_id, version } = &failure {
            if let Some(stage) = self.merge_split.as_mut() {
                stage.repeats.record(acc_id, version)?;
            }
        }

        self.statistics.record_failure(failure.kind());
        Ok(())
    }

    fn log_progress(&self) {
        let seen = self.statistics.seen();
        if seen % self.progress_interval as u64 == 0 {
            info!(
                "Processed {} records ({} passed, {} errored)",
                seen,
                self.statistics.passed(),
                self.statistics.errored()
            );
        }
    }

    async fn finalize(&mut self) -> LoadResult<LoadSummary> {
        self.advance(LoadPhase::Finalizing)?;

        let applied = self.primary_stream.close().await.map_err(|e| {
            error!("Failed to close primary stream: {}", e);
            e
        })?;
        debug!("Primary stream applied {} statements", applied);

        let mut merge_split = None;
        if let Some(stage) = self.merge_split.as_mut() {
            stage
                .reconciler
                .register(self.processor.take_merge_split_candidates());
            let summary = stage.reconciler.process(stage.script.as_mut()).await?;
            stage.script.execute().await?;
            stage.repeats.close().map_err(|e| {
                error!("Failed to close repeat sequence file: {}", e);
                e
            })?;
            merge_split = Some(summary);
        }

        self.qc_stream.close().await.map_err(|e| {
            error!("Failed to close QC stream: {}", e);
            e
        })?;

        let statistics = self.statistics.snapshot();
        if statistics.total_seen != statistics.passed + statistics.errored {
            warn!(
                "Record totals do not balance: {} seen, {} passed, {} errored",
                statistics.total_seen, statistics.passed, statistics.errored
            );
        }

        let deciders = self.source.decider_report();
        let events = self.processor.event_report();
        let report = RunReport {
            statistics: &statistics,
            timings: self.processor.timings(),
            deciders: &deciders,
            events: &events,
            merge_split: merge_split.as_ref(),
        }
        .lines();
        for line in &report {
            self.report_sink.emit(line);
        }

        self.advance(LoadPhase::Done)?;
        info!(
            "{} load finished: {} passed, {} errored",
            self.mode, statistics.passed, statistics.errored
        );

        Ok(LoadSummary {
            mode: self.mode,
            statistics,
            merge_split,
            report,
        })
    }
}
