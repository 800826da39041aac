use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

/// Which sequence processor is active for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// First load into an empty store: every record is an add event
    IncrementalInitial,
    /// Reconcile against the store: add, update and merge/split detection
    Incremental,
    /// Delete every sequence of the namespace, then add everything again
    DeleteReload,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::IncrementalInitial => "incremental_initial",
            LoadMode::Incremental => "incremental",
            LoadMode::DeleteReload => "delete_reload",
        }
    }

    /// Only the incremental mode runs merge/split reconciliation and keeps a
    /// repeat sequence side file.
    pub fn performs_merge_split(&self) -> bool {
        matches!(self, LoadMode::Incremental)
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "incremental_initial" | "increm_initial" => Ok(LoadMode::IncrementalInitial),
            "incremental" | "increm" => Ok(LoadMode::Incremental),
            "delete_reload" | "dr" => Ok(LoadMode::DeleteReload),
            other => Err(format!("Unknown load mode: {}", other)),
        }
    }
}

/// Coarse confidence tier assigned from the RefSeq accession prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceQuality {
    High,
    Medium,
    Low,
}

impl SequenceQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceQuality::High => "High",
            SequenceQuality::Medium => "Medium",
            SequenceQuality::Low => "Low",
        }
    }
}

impl fmt::Display for SequenceQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessionAttributes {
    pub acc_id: String,
    pub is_primary: bool,
}

impl AccessionAttributes {
    pub fn primary<S: Into<String>>(acc_id: S) -> Self {
        Self {
            acc_id: acc_id.into(),
            is_primary: true,
        }
    }

    pub fn secondary<S: Into<String>>(acc_id: S) -> Self {
        Self {
            acc_id: acc_id.into(),
            is_primary: false,
        }
    }
}

/// Raw sequence attributes as parsed from the LOCUS/DEFINITION/VERSION sections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceAttributes {
    /// Sequence version number from the VERSION line (`NM_000001.2` -> `2`)
    pub version: String,
    pub length: u32,
    pub raw_molecule_type: String,
    pub topology: Option<String>,
    pub division: Option<String>,
    pub description: String,
    pub sequence_date: NaiveDate,
    pub organism: String,
    pub quality: Option<SequenceQuality>,
}

/// Qualifiers of the `source` feature
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MolecularSourceAttributes {
    pub organism: Option<String>,
    pub strain: Option<String>,
    pub tissue: Option<String>,
    pub cell_line: Option<String>,
    pub clone_library: Option<String>,
    pub sex: Option<String>,
    pub dev_stage: Option<String>,
}

/// A publication associated with the sequence, e.g. `PUBMED 12477932`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAssociation {
    pub namespace: String,
    pub id: String,
}

/// Structured representation of one accepted input record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceInput {
    pub primary_acc: AccessionAttributes,
    pub secondary_accs: Vec<AccessionAttributes>,
    pub sequence: SequenceAttributes,
    pub source: MolecularSourceAttributes,
    pub references: Vec<ReferenceAssociation>,
}

impl SequenceInput {
    pub fn acc_id(&self) -> &str {
        &self.primary_acc.acc_id
    }

    pub fn quality(&self) -> Option<SequenceQuality> {
        self.sequence.quality
    }

    pub fn set_quality(&mut self, quality: SequenceQuality) {
        self.sequence.quality = Some(quality);
    }
}

/// A secondary accession of an input record that may reference an already
/// loaded sequence; resolved into a merge or a split after the load commits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MergeSplitCandidate {
    pub secondary_acc: String,
    pub target_acc: String,
}

/// A sequence row as persisted in the primary store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct StoredSequence {
    pub acc_id: String,
    pub version: String,
    pub logical_db: String,
    pub organism_key: i64,
    pub clone_library: Option<String>,
    pub quality: String,
    pub status: String,
}

pub const SEQUENCE_STATUS_ACTIVE: &str = "active";
pub const SEQUENCE_STATUS_MERGED: &str = "merged";
pub const SEQUENCE_STATUS_SPLIT: &str = "split";
