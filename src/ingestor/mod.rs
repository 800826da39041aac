use crate::deciders::DeciderReport;
use crate::errors::{InputError, RecordFormatError};
use crate::models::SequenceInput;

pub mod genbank;
pub mod interpreter;
pub mod reader;

pub use genbank::GenBankParser;
pub use interpreter::RefSeqInterpreter;
pub use reader::GenBankRecordReader;

/// Turns the text of one raw record into a [`SequenceInput`]
pub trait RecordParser: Send {
    fn parse(&self, record: &str) -> Result<SequenceInput, RecordFormatError>;
}

/// Iterator over interpreted input records.
///
/// `None` means the input is exhausted. A malformed record is reported as
/// `InputError::Format` and the source stays usable for the next call.
pub trait RecordSource: Send {
    fn next_record(&mut self) -> Option<Result<SequenceInput, InputError>>;

    fn decider_report(&self) -> DeciderReport;
}
