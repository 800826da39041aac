//! Resolution of parsed sequence attributes to controlled identifiers

use chrono::NaiveDate;
use serde::Serialize;
use std::time::Instant;

use super::TimingSummary;
use crate::deciders::Organism;
use crate::errors::{LoadError, ProcessError, RecoverableFailure};
use crate::ingestor::genbank::{MEDLINE_NAMESPACE, PUBMED_NAMESPACE};
use crate::models::{SequenceInput, SequenceQuality};

/// Molecule type vocabulary: `(raw GenBank type, controlled term, key)`
const MOLECULE_TYPES: &[(&str, &str, i64)] = &[
    ("DNA", "DNA", 1),
    ("ss-DNA", "DNA", 1),
    ("ds-DNA", "DNA", 1),
    ("genomic DNA", "DNA", 1),
    ("RNA", "RNA", 2),
    ("ss-RNA", "RNA", 2),
    ("ds-RNA", "RNA", 2),
    ("mRNA", "RNA", 2),
    ("tRNA", "RNA", 2),
    ("rRNA", "RNA", 2),
    ("snRNA", "RNA", 2),
    ("scRNA", "RNA", 2),
    ("snoRNA", "RNA", 2),
    ("ncRNA", "RNA", 2),
    ("cRNA", "RNA", 2),
    ("precursor_RNA", "RNA", 2),
    ("AA", "Polypeptide", 3),
    ("PROTEIN", "Polypeptide", 3),
];

/// Accession namespaces a load can target: `(logical_db, key)`
const LOGICAL_DBS: &[(&str, i64)] = &[
    ("GenBank", 9),
    ("SWISS-PROT", 13),
    ("RefSeq", 27),
    ("TrEMBL", 41),
];

const REFERENCE_NAMESPACES: &[(&str, i64)] = &[(MEDLINE_NAMESPACE, 7), (PUBMED_NAMESPACE, 29)];

/// Organism keys of the controlled organism vocabulary
fn organism_key(organism: Organism) -> i64 {
    match organism {
        Organism::Mouse => 1,
        Organism::Rat => 2,
        Organism::Human => 40,
    }
}

/// Scientific name behind an organism key
pub fn organism_name(key: i64) -> Option<&'static str> {
    Organism::ALL
        .iter()
        .find(|organism| organism_key(**organism) == key)
        .map(|organism| organism.scientific_name())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSequenceAttributes {
    pub acc_id: String,
    pub version: String,
    pub length: i64,
    pub molecule_type: String,
    pub molecule_type_key: i64,
    pub quality: SequenceQuality,
    pub description: String,
    pub division: Option<String>,
    pub sequence_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSource {
    pub organism: String,
    pub organism_key: i64,
    pub clone_library: Option<String>,
    pub strain: Option<String>,
    pub tissue: Option<String>,
    pub cell_line: Option<String>,
    pub sex: Option<String>,
    pub dev_stage: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedReference {
    pub namespace: String,
    pub namespace_key: i64,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedAccessions {
    pub logical_db: String,
    pub logical_db_key: i64,
    pub secondary: Vec<String>,
}

/// Everything a processor needs to write one sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedSequence {
    pub sequence: ResolvedSequenceAttributes,
    pub source: ResolvedSource,
    pub accessions: ResolvedAccessions,
    pub references: Vec<ResolvedReference>,
}

impl ResolvedSequence {
    pub fn acc_id(&self) -> &str {
        &self.sequence.acc_id
    }
}

/// Maps raw parsed attributes to controlled identifiers.
///
/// Sequence and source attributes that cannot be mapped fail the record.
/// An unknown accession or reference namespace fails the run.
#[derive(Debug, Clone)]
pub struct AttributeResolver {
    logical_db: String,
}

impl AttributeResolver {
    pub fn new<S: Into<String>>(logical_db: S) -> Self {
        Self {
            logical_db: logical_db.into(),
        }
    }

    pub fn logical_db(&self) -> &str {
        &self.logical_db
    }

    pub fn resolve_sequence(
        &self,
        input: &SequenceInput,
    ) -> Result<ResolvedSequenceAttributes, RecoverableFailure> {
        let raw = input.sequence.raw_molecule_type.as_str();
        let (_, term, key) = MOLECULE_TYPES
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(raw))
            .ok_or_else(|| RecoverableFailure::sequence_resolution("molecule_type", raw))?;

        let quality = input
            .quality()
            .ok_or_else(|| RecoverableFailure::sequence_resolution("quality", "unassigned"))?;

        Ok(ResolvedSequenceAttributes {
            acc_id: input.acc_id().to_string(),
            version: input.sequence.version.clone(),
            length: i64::from(input.sequence.length),
            molecule_type: term.to_string(),
            molecule_type_key: *key,
            quality,
            description: input.sequence.description.clone(),
            division: input.sequence.division.clone(),
            sequence_date: input.sequence.sequence_date,
        })
    }

    pub fn resolve_source(&self, input: &SequenceInput) -> Result<ResolvedSource, RecoverableFailure> {
        let organism = input
            .source
            .organism
            .as_deref()
            .unwrap_or(input.sequence.organism.as_str())
            .trim();
        if organism.is_empty() {
            return Err(RecoverableFailure::source_resolution("no organism given"));
        }

        let known = Organism::ALL
            .iter()
            .find(|o| o.scientific_name().eq_ignore_ascii_case(organism))
            .ok_or_else(|| {
                RecoverableFailure::source_resolution(format!("unknown organism '{}'", organism))
            })?;

        Ok(ResolvedSource {
            organism: known.scientific_name().to_string(),
            organism_key: organism_key(*known),
            clone_library: input.source.clone_library.clone(),
            strain: input.source.strain.clone(),
            tissue: input.source.tissue.clone(),
            cell_line: input.source.cell_line.clone(),
            sex: input.source.sex.clone(),
            dev_stage: input.source.dev_stage.clone(),
        })
    }

    pub fn resolve_accessions(&self, input: &SequenceInput) -> Result<ResolvedAccessions, LoadError> {
        let (logical_db, key) = LOGICAL_DBS
            .iter()
            .find(|(name, _)| *name == self.logical_db)
            .ok_or_else(|| LoadError::namespace(&self.logical_db))?;

        Ok(ResolvedAccessions {
            logical_db: logical_db.to_string(),
            logical_db_key: *key,
            secondary: input
                .secondary_accs
                .iter()
                .map(|acc| acc.acc_id.clone())
                .collect(),
        })
    }

    pub fn resolve_references(
        &self,
        input: &SequenceInput,
    ) -> Result<Vec<ResolvedReference>, LoadError> {
        input
            .references
            .iter()
            .map(|reference| {
                let (namespace, key) = REFERENCE_NAMESPACES
                    .iter()
                    .find(|(name, _)| *name == reference.namespace)
                    .ok_or_else(|| LoadError::ReferenceNamespace {
                        namespace: reference.namespace.clone(),
                    })?;
                Ok(ResolvedReference {
                    namespace: namespace.to_string(),
                    namespace_key: *key,
                    id: reference.id.clone(),
                })
            })
            .collect()
    }

    /// Resolve a whole record, timing the molecular source step into
    /// `source_timing`. Fatal namespace errors are checked first so a
    /// misconfigured run stops on its first record.
    pub fn resolve(
        &self,
        input: &SequenceInput,
        source_timing: &mut TimingSummary,
    ) -> Result<ResolvedSequence, ProcessError> {
        let accessions = self.resolve_accessions(input)?;
        let references = self.resolve_references(input)?;
        let sequence = self.resolve_sequence(input)?;

        let started = Instant::now();
        let source = self.resolve_source(input);
        source_timing.record(started.elapsed());
        let source = source?;

        Ok(ResolvedSequence {
            sequence,
            source,
            accessions,
            references,
        })
    }
}
