use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::DeciderCount;
use crate::config::OrganismsConfig;
use crate::errors::{LoadError, LoadResult};

const ORGANISM_PATTERN: &str = r"ORGANISM([^\n]*)\n";

/// Decides whether a raw record comes from an organism the load wants
pub trait OrganismChecker: Send {
    fn is_in_scope(&mut self, record: &str) -> bool;

    fn summary(&self) -> Vec<DeciderCount>;
}

/// Organisms the loader knows how to select
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Organism {
    Mouse,
    Rat,
    Human,
}

impl Organism {
    pub const ALL: [Organism; 3] = [Organism::Mouse, Organism::Rat, Organism::Human];

    pub fn name(&self) -> &'static str {
        match self {
            Organism::Mouse => "mouse",
            Organism::Rat => "rat",
            Organism::Human => "human",
        }
    }

    pub fn scientific_name(&self) -> &'static str {
        match self {
            Organism::Mouse => "Mus musculus",
            Organism::Rat => "Rattus norvegicus",
            Organism::Human => "Homo sapiens",
        }
    }
}

#[derive(Debug)]
struct OrganismDecider {
    organism: Organism,
    true_count: u64,
}

/// Organism checker reading the ORGANISM line of a GenBank record
#[derive(Debug)]
pub struct GenBankOrganismChecker {
    deciders: Vec<OrganismDecider>,
    organism_pattern: Regex,
    looked_at: u64,
    processed: u64,
}

impl GenBankOrganismChecker {
    pub fn new(config: &OrganismsConfig) -> LoadResult<Self> {
        Self::with_organisms(config.enabled_organisms())
    }

    pub fn with_organisms<I>(organisms: I) -> LoadResult<Self>
    where
        I: IntoIterator<Item = Organism>,
    {
        let requested: Vec<Organism> = organisms.into_iter().collect();
        let deciders = Organism::ALL
            .iter()
            .filter(|o| requested.contains(o))
            .map(|o| OrganismDecider {
                organism: *o,
                true_count: 0,
            })
            .collect::<Vec<_>>();

        let organism_pattern = Regex::new(ORGANISM_PATTERN).map_err(|e| {
            LoadError::configuration(format!("Invalid organism pattern: {}", e))
        })?;

        debug!(
            "Organism checker created for: {}",
            deciders
                .iter()
                .map(|d| d.organism.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            deciders,
            organism_pattern,
            looked_at: 0,
            processed: 0,
        })
    }

    pub fn looked_at(&self) -> u64 {
        self.looked_at
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }
}

impl OrganismChecker for GenBankOrganismChecker {
    fn is_in_scope(&mut self, record: &str) -> bool {
        self.looked_at += 1;

        let organism_line = match self
            .organism_pattern
            .captures(record)
            .and_then(|c| c.get(1))
        {
            Some(m) => m.as_str(),
            None => return false,
        };

        for decider in self.deciders.iter_mut() {
            if organism_line.contains(decider.organism.scientific_name()) {
                decider.true_count += 1;
                self.processed += 1;
                return true;
            }
        }
        false
    }

    fn summary(&self) -> Vec<DeciderCount> {
        let mut lines = vec![
            DeciderCount::new("Total records looked at", self.looked_at),
            DeciderCount::new("Total records processed", self.processed),
        ];
        lines.extend(self.deciders.iter().map(|d| {
            DeciderCount::new(
                format!("Total {} records processed", d.organism.name()),
                d.true_count,
            )
        }));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOUSE_RECORD: &str = "LOCUS       NM_000001\nSOURCE      Mus musculus (house mouse)\n  ORGANISM  Mus musculus\n            Eukaryota; Metazoa.\n//\n";
    const FLY_RECORD: &str = "LOCUS       NM_000002\n  ORGANISM  Drosophila melanogaster\n            Eukaryota.\n//\n";

    #[test]
    fn test_in_scope_organism() {
        let mut checker =
            GenBankOrganismChecker::with_organisms([Organism::Mouse, Organism::Human]).unwrap();

        assert!(checker.is_in_scope(MOUSE_RECORD));
        assert!(!checker.is_in_scope(FLY_RECORD));
        assert!(!checker.is_in_scope("LOCUS  NO_ORGANISM\n//\n"));

        let summary = checker.summary();
        assert_eq!(summary[0], DeciderCount::new("Total records looked at", 3));
        assert_eq!(summary[1], DeciderCount::new("Total records processed", 1));
        assert_eq!(summary[2], DeciderCount::new("Total mouse records processed", 1));
        assert_eq!(summary[3], DeciderCount::new("Total human records processed", 0));
    }

    #[test]
    fn test_disabled_organism_is_out_of_scope() {
        let mut checker = GenBankOrganismChecker::with_organisms([Organism::Rat]).unwrap();
        assert!(!checker.is_in_scope(MOUSE_RECORD));
        assert_eq!(checker.processed(), 0);
    }
}
