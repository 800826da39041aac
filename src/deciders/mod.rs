//! Record deciders
//!
//! Deciders are cheap predicates evaluated against a raw GenBank record
//! before any parsing happens. Each keeps usage counters that are reported
//! at the end of a run.

pub mod organism;
pub mod prefix;

pub use organism::{GenBankOrganismChecker, Organism, OrganismChecker};
pub use prefix::{Decider, PrefixDeciderEngine, PrefixFamily};

use serde::Serialize;

/// One labelled counter line of a decider summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeciderCount {
    pub label: String,
    pub count: u64,
}

impl DeciderCount {
    pub fn new<S: Into<String>>(label: S, count: u64) -> Self {
        Self {
            label: label.into(),
            count,
        }
    }
}

impl std::fmt::Display for DeciderCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.label, self.count)
    }
}

/// Organism and prefix summaries gathered by a record source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeciderReport {
    pub organism: Vec<DeciderCount>,
    pub prefix: Vec<DeciderCount>,
}
