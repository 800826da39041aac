//! Run statistics owned by the load controller

use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use sysinfo::System;

use crate::errors::FailureKind;
use crate::processors::TimingSummary;

/// Running counters of one load run
#[derive(Debug, Default)]
pub struct RunStatistics {
    seen: u64,
    passed: u64,
    errored: u64,
    failures: BTreeMap<FailureKind, u64>,
    record_timing: TimingSummary,
    memory_samples: u64,
    memory_total: u128,
    elapsed: Duration,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_seen(&mut self) {
        self.seen += 1;
    }

    pub fn record_passed(&mut self, elapsed: Duration) {
        self.passed += 1;
        self.record_timing.record(elapsed);
    }

    pub fn record_failure(&mut self, kind: FailureKind) {
        self.errored += 1;
        *self.failures.entry(kind).or_insert(0) += 1;
    }

    pub fn record_available_memory(&mut self, bytes: u64) {
        self.memory_samples += 1;
        self.memory_total += u128::from(bytes);
    }

    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }

    pub fn passed(&self) -> u64 {
        self.passed
    }

    pub fn errored(&self) -> u64 {
        self.errored
    }

    pub fn failures(&self, kind: FailureKind) -> u64 {
        self.failures.get(&kind).copied().unwrap_or(0)
    }

    pub fn average_available_memory(&self) -> Option<u64> {
        if self.memory_samples == 0 {
            return None;
        }
        let average = self.memory_total / u128::from(self.memory_samples);
        Some(u64::try_from(average).unwrap_or(u64::MAX))
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        StatisticsSnapshot {
            total_seen: self.seen,
            passed: self.passed,
            errored: self.errored,
            failures: FailureKind::ALL
                .iter()
                .map(|kind| (*kind, self.failures(*kind)))
                .collect(),
            record_timing: self.record_timing,
            average_available_memory: self.average_available_memory(),
            elapsed: self.elapsed,
        }
    }
}

/// Point-in-time copy of the run statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_seen: u64,
    pub passed: u64,
    pub errored: u64,
    pub failures: BTreeMap<FailureKind, u64>,
    pub record_timing: TimingSummary,
    pub average_available_memory: Option<u64>,
    pub elapsed: Duration,
}

/// Samples the free memory of the host
pub struct MemorySampler {
    system: System,
}

impl MemorySampler {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }

    /// Available memory in bytes
    pub fn sample(&mut self) -> u64 {
        self.system.refresh_memory();
        self.system.available_memory()
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}
