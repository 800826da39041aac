use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::errors::{LoadError, LoadResult};

/// Append-only sink for sequences that appeared more than once in the input
pub trait RepeatSink: Send {
    fn record(&mut self, acc_id: &str, version: &str) -> LoadResult<()>;

    /// Flush and release the sink. Called once, at the end of the run.
    fn close(&mut self) -> LoadResult<()>;
}

/// Tab separated `accession<TAB>version` lines in a plain text file
pub struct RepeatSequenceFile {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    written: u64,
}

impl RepeatSequenceFile {
    pub fn create<P: AsRef<Path>>(path: P) -> LoadResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| repeat_error(&path, e))?;
        }
        let file = File::create(&path).map_err(|e| {
            error!("Failed to create repeat file {}: {}", path.display(), e);
            repeat_error(&path, e)
        })?;
        info!("Writing repeated sequences to {}", path.display());

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

fn repeat_error(path: &Path, source: std::io::Error) -> LoadError {
    LoadError::RepeatFile {
        path: path.display().to_string(),
        source,
    }
}

impl RepeatSink for RepeatSequenceFile {
    fn record(&mut self, acc_id: &str, version: &str) -> LoadResult<()> {
        let writer = self.writer.as_mut().ok_or_else(|| {
            repeat_error(
                &self.path,
                std::io::Error::new(std::io::ErrorKind::Other, "repeat file already closed"),
            )
        })?;
        writeln!(writer, "{}\t{}", acc_id, version).map_err(|e| repeat_error(&self.path, e))?;
        self.written += 1;
        Ok(())
    }

    fn close(&mut self) -> LoadResult<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| repeat_error(&self.path, e))?;
            info!(
                "Closed repeat file {} ({} repeated sequences)",
                self.path.display(),
                self.written
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_file_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("repeats.txt");

        let mut sink = RepeatSequenceFile::create(&path).unwrap();
        sink.record("NM_000001", "2").unwrap();
        sink.record("XM_000002", "1").unwrap();
        sink.close().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "NM_000001\t2\nXM_000002\t1\n");
        assert_eq!(sink.written(), 2);
    }

    #[test]
    fn test_record_after_close_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = RepeatSequenceFile::create(dir.path().join("repeats.txt")).unwrap();
        sink.close().unwrap();

        assert!(matches!(
            sink.record("NM_000001", "1"),
            Err(LoadError::RepeatFile { .. })
        ));
    }

    #[test]
    fn test_unwritable_path_is_repeat_file_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory cannot be opened as the repeat file
        let result = RepeatSequenceFile::create(dir.path());
        assert!(matches!(result, Err(LoadError::RepeatFile { .. })));
    }
}
