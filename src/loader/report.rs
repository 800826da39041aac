//! End-of-run report lines and the sinks they are emitted to

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

use super::statistics::StatisticsSnapshot;
use crate::deciders::DeciderReport;
use crate::errors::FailureKind;
use crate::processors::{MergeSplitSummary, ProcessorTimings, TimingSummary};

/// Receives the report of a finished run, one line at a time
pub trait ReportSink: Send {
    fn emit(&mut self, line: &str);
}

/// Logs every report line at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReportSink;

impl ReportSink for TracingReportSink {
    fn emit(&mut self, line: &str) {
        info!("{}", line);
    }
}

/// Keeps the report in memory; clones share the same buffer
#[derive(Debug, Default, Clone)]
pub struct MemoryReportSink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.clone())
            .unwrap_or_default()
    }
}

impl ReportSink for MemoryReportSink {
    fn emit(&mut self, line: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(line.to_string());
        }
    }
}

fn format_duration(duration: Option<Duration>) -> String {
    match duration {
        Some(duration) => format!("{:.3} ms", duration.as_secs_f64() * 1000.0),
        None => "n/a".to_string(),
    }
}

fn timing_line(label: &str, timing: &TimingSummary) -> String {
    format!(
        "{} timing over {} samples: avg {}, min {}, max {}",
        label,
        timing.count,
        format_duration(timing.average()),
        format_duration(timing.min),
        format_duration(timing.max)
    )
}

/// Everything that goes into the end-of-run report
pub struct RunReport<'a> {
    pub statistics: &'a StatisticsSnapshot,
    pub timings: ProcessorTimings,
    pub deciders: &'a DeciderReport,
    pub events: &'a [String],
    pub merge_split: Option<&'a MergeSplitSummary>,
}

impl RunReport<'_> {
    pub fn lines(&self) -> Vec<String> {
        let stats = self.statistics;
        let mut lines = vec![
            format!("Total records seen: {}", stats.total_seen),
            format!("Total records passed: {}", stats.passed),
            format!("Total records errored: {}", stats.errored),
        ];

        for kind in FailureKind::ALL {
            let count = stats.failures.get(&kind).copied().unwrap_or(0);
            if count > 0 {
                lines.push(format!("  {} errors: {}", kind, count));
            }
        }

        lines.push(timing_line("Record", &stats.record_timing));
        lines.push(match stats.average_available_memory {
            Some(bytes) => format!(
                "Average free memory: {:.1} MB",
                bytes as f64 / (1024.0 * 1024.0)
            ),
            None => "Average free memory: n/a".to_string(),
        });
        lines.push(format!("Elapsed: {:.3} s", stats.elapsed.as_secs_f64()));
        lines.push(timing_line("Sequence lookup", &self.timings.lookup));
        lines.push(timing_line("Molecular source", &self.timings.source));

        lines.push("Organism Decider Counts:".to_string());
        lines.extend(self.deciders.organism.iter().map(ToString::to_string));
        lines.push("Prefix Decider Counts:".to_string());
        lines.extend(self.deciders.prefix.iter().map(ToString::to_string));
        lines.extend(self.events.iter().cloned());
        if let Some(summary) = self.merge_split {
            lines.extend(summary.report_lines());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deciders::DeciderCount;
    use crate::loader::statistics::RunStatistics;

    #[test]
    fn test_report_lines() {
        let mut stats = RunStatistics::new();
        stats.record_seen();
        stats.record_seen();
        stats.record_passed(Duration::from_millis(1));
        stats.record_failure(FailureKind::RepeatSequence);
        let snapshot = stats.snapshot();

        let deciders = DeciderReport {
            organism: vec![DeciderCount::new("Total mouse records processed", 2)],
            prefix: vec![DeciderCount::new("Total NM records processed", 2)],
        };
        let events = vec!["Total Add events: 1".to_string()];
        let report = RunReport {
            statistics: &snapshot,
            timings: ProcessorTimings::default(),
            deciders: &deciders,
            events: &events,
            merge_split: None,
        };

        let lines = report.lines();
        assert_eq!(lines[0], "Total records seen: 2");
        assert!(lines.contains(&"  repeat_sequence errors: 1".to_string()));
        assert!(lines.contains(&"Total NM records processed: 2".to_string()));

        let organism = lines
            .iter()
            .position(|l| l == "Organism Decider Counts:")
            .unwrap();
        let prefix = lines
            .iter()
            .position(|l| l == "Prefix Decider Counts:")
            .unwrap();
        assert_eq!(lines[organism + 1], "Total mouse records processed: 2");
        assert_eq!(lines[prefix + 1], "Total NM records processed: 2");
        assert!(organism < prefix);
        assert_eq!(lines.last().unwrap(), "Total Add events: 1");
        assert!(!lines.iter().any(|l| l.contains("record_format")));
    }

    #[test]
    fn test_memory_sink_clones_share_lines() {
        let sink = MemoryReportSink::new();
        let mut writer = sink.clone();
        writer.emit("one");
        writer.emit("two");
        assert_eq!(sink.lines(), vec!["one", "two"]);
    }
}
