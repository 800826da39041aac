//! Error type definitions for the sequence loader
//!
//! This module defines all error types used throughout the loader. The split
//! between [`RecoverableFailure`] (skip the record, keep going) and
//! [`LoadError`] (abort the run) is what the load controller keys on.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fatal loader error
///
/// Anything in here terminates the run. It is never caught inside the
/// per-record loop; it unwinds to the entry point which reports it and exits
/// with a non-success status.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The configured accession namespace has no known mapping
    #[error("Unresolvable accession namespace: {logical_db}")]
    Namespace { logical_db: String },

    /// A reference association uses a namespace other than PubMed/MEDLINE
    #[error("Unresolvable reference namespace: {namespace}")]
    ReferenceNamespace { namespace: String },

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Generic I/O errors (input file, config file)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure writing or closing the repeat sequence side file
    #[error("Repeat sequence file error ({path}): {source}")]
    RepeatFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failure flushing a batch write stream
    #[error("Batch stream '{stream}' failed: {message}")]
    Stream { stream: String, message: String },

    /// Failure executing a generated reconciliation script
    #[error("Script execution failed: {message}")]
    Script { message: String },

    /// Load controller asked to move backwards or skip a phase
    #[error("Invalid load phase transition: {from} -> {to}")]
    InvalidState { from: String, to: String },
}

impl LoadError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a namespace error for an unknown logical database
    pub fn namespace<S: Into<String>>(logical_db: S) -> Self {
        Self::Namespace {
            logical_db: logical_db.into(),
        }
    }

    /// Create a stream error
    pub fn stream<S: Into<String>, M: Into<String>>(stream: S, message: M) -> Self {
        Self::Stream {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a script error
    pub fn script<S: Into<String>>(message: S) -> Self {
        Self::Script {
            message: message.into(),
        }
    }
}

/// Structural problems found while parsing a single record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordFormatError {
    /// A required section keyword is absent
    #[error("Missing {section} section")]
    MissingSection { section: &'static str },

    /// A section is present but its content cannot be parsed
    #[error("Malformed {section} section: {message}")]
    Malformed {
        section: &'static str,
        message: String,
    },
}

impl RecordFormatError {
    pub fn missing(section: &'static str) -> Self {
        Self::MissingSection { section }
    }

    pub fn malformed<M: Into<String>>(section: &'static str, message: M) -> Self {
        Self::Malformed {
            section,
            message: message.into(),
        }
    }
}

/// Error returned by a record source when pulling the next record
#[derive(Error, Debug)]
pub enum InputError {
    /// The record was malformed; recoverable
    #[error(transparent)]
    Format(#[from] RecordFormatError),

    /// The underlying input could not be read; fatal
    #[error("Input read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used for logging and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    Structural,
    Resolution,
    Policy,
}

/// The fixed set of per-record failure kinds the loader recovers from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    RecordFormat,
    SequenceResolution,
    SourceResolution,
    RepeatSequence,
    ChangedOrganism,
    ChangedLibrary,
}

impl FailureKind {
    pub const ALL: [FailureKind; 6] = [
        FailureKind::RecordFormat,
        FailureKind::SequenceResolution,
        FailureKind::SourceResolution,
        FailureKind::RepeatSequence,
        FailureKind::ChangedOrganism,
        FailureKind::ChangedLibrary,
    ];

    pub fn category(&self) -> FailureCategory {
        match self {
            FailureKind::RecordFormat => FailureCategory::Structural,
            FailureKind::SequenceResolution | FailureKind::SourceResolution => {
                FailureCategory::Resolution
            }
            FailureKind::RepeatSequence
            | FailureKind::ChangedOrganism
            | FailureKind::ChangedLibrary => FailureCategory::Policy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RecordFormat => "record_format",
            FailureKind::SequenceResolution => "sequence_resolution",
            FailureKind::SourceResolution => "source_resolution",
            FailureKind::RepeatSequence => "repeat_sequence",
            FailureKind::ChangedOrganism => "changed_organism",
            FailureKind::ChangedLibrary => "changed_library",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A per-record failure that the load controller skips and counts
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecoverableFailure {
    #[error("Record format error: {0}")]
    RecordFormat(RecordFormatError),

    #[error("Unable to resolve sequence attribute {attribute} = '{value}'")]
    SequenceResolution { attribute: String, value: String },

    #[error("Unable to resolve molecular source: {message}")]
    SourceResolution { message: String },

    #[error("Repeated sequence in input: {acc_id}")]
    RepeatSequence { acc_id: String, version: String },

    #[error("Organism changed since last load: was '{previous}', now '{current}'")]
    ChangedOrganism { previous: String, current: String },

    #[error("Clone library changed since last load: was '{previous}', now '{current}'")]
    ChangedLibrary { previous: String, current: String },
}

impl RecoverableFailure {
    pub fn kind(&self) -> FailureKind {
        match self {
            RecoverableFailure::RecordFormat(_) => FailureKind::RecordFormat,
            RecoverableFailure::SequenceResolution { .. } => FailureKind::SequenceResolution,
            RecoverableFailure::SourceResolution { .. } => FailureKind::SourceResolution,
            RecoverableFailure::RepeatSequence { .. } => FailureKind::RepeatSequence,
            RecoverableFailure::ChangedOrganism { .. } => FailureKind::ChangedOrganism,
            RecoverableFailure::ChangedLibrary { .. } => FailureKind::ChangedLibrary,
        }
    }

    pub fn category(&self) -> FailureCategory {
        self.kind().category()
    }

    pub fn sequence_resolution<A: Into<String>, V: Into<String>>(attribute: A, value: V) -> Self {
        Self::SequenceResolution {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn source_resolution<M: Into<String>>(message: M) -> Self {
        Self::SourceResolution {
            message: message.into(),
        }
    }
}

/// Error returned by a sequence processor for one record
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error(transparent)]
    Recoverable(#[from] RecoverableFailure),

    #[error(transparent)]
    Fatal(#[from] LoadError),
}

impl From<sqlx::Error> for ProcessError {
    fn from(error: sqlx::Error) -> Self {
        ProcessError::Fatal(LoadError::Database(error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_categories() {
        assert_eq!(FailureKind::RecordFormat.category(), FailureCategory::Structural);
        assert_eq!(
            FailureKind::SequenceResolution.category(),
            FailureCategory::Resolution
        );
        assert_eq!(
            FailureKind::SourceResolution.category(),
            FailureCategory::Resolution
        );
        assert_eq!(FailureKind::RepeatSequence.category(), FailureCategory::Policy);
        assert_eq!(FailureKind::ChangedOrganism.category(), FailureCategory::Policy);
        assert_eq!(FailureKind::ChangedLibrary.category(), FailureCategory::Policy);
    }

    #[test]
    fn test_recoverable_failure_kind() {
        let failure = RecoverableFailure::sequence_resolution("molecule_type", "cRNA-ish");
        assert_eq!(failure.kind(), FailureKind::SequenceResolution);
        assert!(failure.to_string().contains("cRNA-ish"));

        let failure = RecoverableFailure::RecordFormat(RecordFormatError::missing("LOCUS"));
        assert_eq!(failure.kind(), FailureKind::RecordFormat);
        assert_eq!(failure.to_string(), "Record format error: Missing LOCUS section");
    }

    #[test]
    fn test_process_error_conversions() {
        let recoverable: ProcessError = RecoverableFailure::source_resolution("no organism").into();
        assert!(matches!(recoverable, ProcessError::Recoverable(_)));

        let fatal: ProcessError = LoadError::namespace("Bogus").into();
        assert!(matches!(fatal, ProcessError::Fatal(LoadError::Namespace { .. })));
    }
}
