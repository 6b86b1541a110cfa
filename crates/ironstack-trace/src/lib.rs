//! ---
//! ironstack_section: "03-trace-journal"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Append-only side-effect journals and their readers."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Side-effect journals.
//!
//! Every host mutation performed during install (directories, files, symlinks,
//! packages, downloads, setup runs) and every application started is appended
//! to a per-component journal so a later, independent run can undo exactly
//! what was done.

use std::path::PathBuf;

/// Result alias used throughout the trace crate.
pub type Result<T> = std::result::Result<T, TraceError>;

/// Error type for journal access.
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// Wrapper for IO errors encountered while reading/writing journals.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Wrapper for JSON serialization issues.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// The journal was never created.
    #[error("no trace found at {0}")]
    NoTrace(PathBuf),
    /// An exclusive writer found a prior non-empty journal.
    #[error("trace {0} already exists")]
    AlreadyExists(PathBuf),
    /// A journal line could not be decoded.
    #[error("corrupt trace {path} at line {line}: {source}")]
    Corrupt {
        /// Journal path.
        path: PathBuf,
        /// 1-based line number, the header being line 1.
        line: usize,
        /// Decoder error.
        source: serde_json::Error,
    },
}

impl TraceError {
    /// Whether this is the "journal never created" condition.
    pub fn is_no_trace(&self) -> bool {
        matches!(self, TraceError::NoTrace(_))
    }
}

pub mod reader;
pub mod record;
pub mod writer;

pub use reader::{
    AppStartRecord, DownloadRecord, PySetupRecord, StopFailureRecord, TraceContents, TraceReader,
};
pub use record::{TraceBucket, TraceFields, TraceHeader, TraceKind, TraceRecord, TRACE_VERSION};
pub use writer::{remove, trace_filename, OpenMode, TraceWriter};
