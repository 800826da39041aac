use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, error, info};

use super::{RecordSource, RefSeqInterpreter};
use crate::deciders::DeciderReport;
use crate::errors::{InputError, LoadResult, RecordFormatError};
use crate::models::SequenceInput;

const RECORD_TERMINATOR: &str = "//";

/// Splits a GenBank flat file into records and yields the interpretation of
/// every record the interpreter accepts
pub struct GenBankRecordReader<R: BufRead> {
    reader: R,
    interpreter: RefSeqInterpreter,
    raw_records: u64,
    exhausted: bool,
}

impl GenBankRecordReader<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, interpreter: RefSeqInterpreter) -> LoadResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            error!("Failed to open input file {}: {}", path.display(), e);
            e
        })?;
        info!("Reading GenBank records from {}", path.display());
        Ok(Self::new(BufReader::new(file), interpreter))
    }
}

impl<R: BufRead> GenBankRecordReader<R> {
    pub fn new(reader: R, interpreter: RefSeqInterpreter) -> Self {
        Self {
            reader,
            interpreter,
            raw_records: 0,
            exhausted: false,
        }
    }

    /// Number of raw records split off the input so far, valid or not
    pub fn raw_records(&self) -> u64 {
        self.raw_records
    }

    /// Read up to and including the next terminator line as raw bytes.
    /// Encoding is checked per record by the caller.
    fn read_raw_record(&mut self) -> std::io::Result<Option<Vec<u8>>> {
        let mut record = Vec::new();
        let mut line = Vec::new();

        loop {
            line.clear();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                self.exhausted = true;
                // a final record without terminator is still a record
                return Ok(if record.iter().all(u8::is_ascii_whitespace) {
                    None
                } else {
                    Some(record)
                });
            }
            record.extend_from_slice(&line);
            if String::from_utf8_lossy(&line)
                .trim_end()
                .starts_with(RECORD_TERMINATOR)
            {
                return Ok(Some(record));
            }
        }
    }
}

impl<R: BufRead + Send> RecordSource for GenBankRecordReader<R> {
    fn next_record(&mut self) -> Option<Result<SequenceInput, InputError>> {
        while !self.exhausted {
            let bytes = match self.read_raw_record() {
                Ok(Some(bytes)) => bytes,
                Ok(None) => return None,
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(InputError::Io(e)));
                }
            };
            let (raw, valid_utf8) = match String::from_utf8(bytes) {
                Ok(raw) => (raw, true),
                Err(e) => (String::from_utf8_lossy(e.as_bytes()).into_owned(), false),
            };

            let body = raw.trim();
            if body.is_empty() || body == RECORD_TERMINATOR {
                continue;
            }
            self.raw_records += 1;

            if !self.interpreter.is_valid(&raw) {
                continue;
            }
            if !valid_utf8 {
                debug!("Record {} is not valid UTF-8", self.raw_records);
                return Some(Err(
                    RecordFormatError::malformed("record", "invalid UTF-8").into()
                ));
            }

            let result = self.interpreter.interpret(&raw).map_err(InputError::from);
            if let Err(e) = &result {
                debug!("Record {} could not be interpreted: {}", self.raw_records, e);
            }
            return Some(result);
        }
        None
    }

    fn decider_report(&self) -> DeciderReport {
        self.interpreter.decider_report()
    }
}
