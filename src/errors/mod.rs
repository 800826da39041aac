//! Centralized error handling for the sequence loader
//!
//! Errors fall into two groups that are handled very differently by the
//! load controller:
//!
//! # Error Categories
//!
//! - **Recoverable** ([`RecoverableFailure`]): a single input record could
//!   not be loaded. The record is skipped, logged and counted, and the run
//!   continues with the next record.
//!   - *Structural*: the record is malformed ([`RecordFormatError`])
//!   - *Resolution*: sequence or source attributes cannot be mapped
//!   - *Policy*: repeated record, organism or library changed since the last load
//! - **Fatal** ([`LoadError`]): configuration defects, unresolvable
//!   namespaces, storage and I/O failures. These unwind to `main`, which
//!   reports them and exits with a non-zero status.
//!
//! # Usage
//!
//! ```rust
//! use refseq_loader::errors::{LoadError, LoadResult};
//!
//! fn check_mode(mode: &str) -> LoadResult<()> {
//!     if mode.is_empty() {
//!         return Err(LoadError::configuration("load mode must not be empty"));
//!     }
//!     Ok(())
//! }
//! # assert!(check_mode("incremental").is_ok());
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using LoadError
pub type LoadResult<T> = Result<T, LoadError>;
