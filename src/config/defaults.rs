/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
// Input defaults
pub const DEFAULT_INPUT_PATH: &str = "./data/input/refseq.gbff";
pub const DEFAULT_PROGRESS_INTERVAL: usize = 1000;

// Load defaults
pub const DEFAULT_LOGICAL_DB: &str = "RefSeq";
pub const DEFAULT_REPEAT_FILE: &str = "./data/output/repeats.txt";

// Database defaults
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./refseq.db";
pub const DEFAULT_QC_DATABASE_URL: &str = "sqlite://./refseq_qc.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub fn default_progress_interval() -> usize {
    DEFAULT_PROGRESS_INTERVAL
}

pub fn default_logical_db() -> String {
    DEFAULT_LOGICAL_DB.to_string()
}

pub fn default_repeat_file() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_REPEAT_FILE)
}
