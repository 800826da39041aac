//! RefSeq accession prefix deciders
//!
//! A record is accepted by the engine when the text of its ACCESSION line
//! contains the literal of one of the enabled prefix families (`NM_`, `XR_`,
//! ...). The families form a fixed vocabulary; configuration only decides
//! which of them are active.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use super::DeciderCount;
use crate::config::PrefixFamiliesConfig;
use crate::errors::{LoadError, LoadResult};

const ACCESSION_PATTERN: &str = r"ACCESSION([^\n]*)\n";

/// The known RefSeq accession prefix families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrefixFamily {
    NM,
    NR,
    NP,
    NC,
    NG,
    NT,
    NW,
    NZ,
    ZP,
    XM,
    XR,
    XP,
}

impl PrefixFamily {
    /// Vocabulary order, which is also the evaluation order of the engine
    pub const ALL: [PrefixFamily; 12] = [
        PrefixFamily::NM,
        PrefixFamily::NR,
        PrefixFamily::NP,
        PrefixFamily::NC,
        PrefixFamily::NG,
        PrefixFamily::NT,
        PrefixFamily::NW,
        PrefixFamily::NZ,
        PrefixFamily::ZP,
        PrefixFamily::XM,
        PrefixFamily::XR,
        PrefixFamily::XP,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            PrefixFamily::NM => "NM",
            PrefixFamily::NR => "NR",
            PrefixFamily::NP => "NP",
            PrefixFamily::NC => "NC",
            PrefixFamily::NG => "NG",
            PrefixFamily::NT => "NT",
            PrefixFamily::NW => "NW",
            PrefixFamily::NZ => "NZ",
            PrefixFamily::ZP => "ZP",
            PrefixFamily::XM => "XM",
            PrefixFamily::XR => "XR",
            PrefixFamily::XP => "XP",
        }
    }

    /// The literal searched for in the accession text: code followed by `_`
    pub fn literal(&self) -> &'static str {
        match self {
            PrefixFamily::NM => "NM_",
            PrefixFamily::NR => "NR_",
            PrefixFamily::NP => "NP_",
            PrefixFamily::NC => "NC_",
            PrefixFamily::NG => "NG_",
            PrefixFamily::NT => "NT_",
            PrefixFamily::NW => "NW_",
            PrefixFamily::NZ => "NZ_",
            PrefixFamily::ZP => "ZP_",
            PrefixFamily::XM => "XM_",
            PrefixFamily::XR => "XR_",
            PrefixFamily::XP => "XP_",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|family| family.code() == code)
    }
}

impl fmt::Display for PrefixFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for PrefixFamily {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s).ok_or_else(|| {
            LoadError::configuration(format!("Unsupported prefix decider family: {}", s))
        })
    }
}

/// A named prefix predicate with its usage counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decider {
    family: PrefixFamily,
    true_count: u64,
}

impl Decider {
    fn new(family: PrefixFamily) -> Self {
        Self {
            family,
            true_count: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.family.code()
    }

    pub fn literal(&self) -> &'static str {
        self.family.literal()
    }

    pub fn family(&self) -> PrefixFamily {
        self.family
    }

    pub fn true_count(&self) -> u64 {
        self.true_count
    }

    fn matches(&self, accession_text: &str) -> bool {
        accession_text.contains(self.literal())
    }
}

/// Evaluates raw records against the enabled prefix families
#[derive(Debug)]
pub struct PrefixDeciderEngine {
    deciders: Vec<Decider>,
    accession_pattern: Regex,
    looked_at: u64,
    processed: u64,
}

impl PrefixDeciderEngine {
    /// Build one decider per family switched on in `config`
    pub fn new(config: &PrefixFamiliesConfig) -> LoadResult<Self> {
        Self::with_families(config.enabled_families())
    }

    /// Build the engine from an explicit family list. Families are always
    /// evaluated in vocabulary order and listed at most once.
    pub fn with_families<I>(families: I) -> LoadResult<Self>
    where
        I: IntoIterator<Item = PrefixFamily>,
    {
        let requested: Vec<PrefixFamily> = families.into_iter().collect();
        let deciders: Vec<Decider> = PrefixFamily::ALL
            .iter()
            .filter(|family| requested.contains(family))
            .map(|family| Decider::new(*family))
            .collect();

        let accession_pattern = Regex::new(ACCESSION_PATTERN).map_err(|e| {
            LoadError::configuration(format!("Invalid accession pattern: {}", e))
        })?;

        debug!(
            "Prefix decider engine created with families: {}",
            deciders
                .iter()
                .map(|d| d.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            deciders,
            accession_pattern,
            looked_at: 0,
            processed: 0,
        })
    }

    /// Decide whether `record` belongs to one of the enabled families.
    ///
    /// Every call counts as a record looked at. Only the first matching
    /// decider is credited.
    pub fn evaluate(&mut self, record: &str) -> bool {
        self.looked_at += 1;

        let accession_text = match self.accession_pattern.captures(record) {
            Some(captures) => match captures.get(1) {
                Some(text) => text.as_str(),
                None => return false,
            },
            None => return false,
        };

        for decider in self.deciders.iter_mut() {
            if decider.matches(accession_text) {
                decider.true_count += 1;
                self.processed += 1;
                return true;
            }
        }

        false
    }

    /// Test `seqid` against a family by code, whether or not it is enabled.
    /// Unknown codes never match.
    pub fn matches_family(&self, seqid: &str, family_name: &str) -> bool {
        match PrefixFamily::from_code(family_name) {
            Some(family) => seqid.contains(family.literal()),
            None => false,
        }
    }

    pub fn summary(&self) -> Vec<DeciderCount> {
        let mut lines = Vec::with_capacity(self.deciders.len() + 2);
        lines.push(DeciderCount::new("Total records looked at", self.looked_at));
        lines.push(DeciderCount::new("Total records processed", self.processed));
        for decider in &self.deciders {
            lines.push(DeciderCount::new(
                format!("Total {} records processed", decider.name()),
                decider.true_count,
            ));
        }
        lines
    }

    pub fn looked_at(&self) -> u64 {
        self.looked_at
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Counter of an active decider, `None` when the family is not enabled
    pub fn true_count(&self, name: &str) -> Option<u64> {
        self.deciders
            .iter()
            .find(|d| d.name() == name)
            .map(|d| d.true_count)
    }

    pub fn active_families(&self) -> Vec<PrefixFamily> {
        self.deciders.iter().map(|d| d.family).collect()
    }

    pub fn deciders(&self) -> &[Decider] {
        &self.deciders
    }
}
