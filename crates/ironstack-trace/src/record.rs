//! ---
//! ironstack_section: "03-trace-journal"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Journal record, header, kind and bucket types."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Current on-disk journal format version.
pub const TRACE_VERSION: u16 = 1;

/// Ordered record payload.
pub type TraceFields = IndexMap<String, String>;

/// Kind of side effect a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceKind {
    /// A directory was created.
    DirMade,
    /// A file was written.
    FileTouched,
    /// A symlink was created.
    SymlinkMade,
    /// A source download was started.
    DownloadHappened,
    /// A package was installed.
    PackageInstalled,
    /// A language-runtime setup unit was installed.
    PySetupInstalled,
    /// An application was started.
    AppStarted,
    /// An application could not be stopped.
    AppStopFailed,
}

impl TraceKind {
    /// Stable name as written on disk.
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceKind::DirMade => "DIR_MADE",
            TraceKind::FileTouched => "FILE_TOUCHED",
            TraceKind::SymlinkMade => "SYMLINK_MADE",
            TraceKind::DownloadHappened => "DOWNLOAD_HAPPENED",
            TraceKind::PackageInstalled => "PACKAGE_INSTALLED",
            TraceKind::PySetupInstalled => "PY_SETUP_INSTALLED",
            TraceKind::AppStarted => "APP_STARTED",
            TraceKind::AppStopFailed => "APP_STOP_FAILED",
        }
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which independent journal of a component a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceBucket {
    /// Install-time side effects.
    Created,
    /// Applications started by the process supervisor.
    Start,
}

impl TraceBucket {
    /// Bucket name used in file names and headers.
    pub fn as_str(&self) -> &'static str {
        match self {
            TraceBucket::Created => "created",
            TraceBucket::Start => "start",
        }
    }

    /// Journal file name for this bucket.
    pub fn file_name(&self) -> String {
        format!("{}.trace", self.as_str())
    }
}

impl fmt::Display for TraceBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First line of every journal file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceHeader {
    /// Format version.
    pub version: u16,
    /// When the journal file was created.
    pub created_at: DateTime<Utc>,
    /// Owning component.
    pub component: String,
    /// Bucket name.
    pub bucket: String,
}

impl TraceHeader {
    /// Build a header stamped with the current time.
    pub fn new(component: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            version: TRACE_VERSION,
            created_at: Utc::now(),
            component: component.into(),
            bucket: bucket.into(),
        }
    }
}

/// One immutable journal entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Per-file sequence number, starting at 1.
    pub sequence: u64,
    /// When the record was appended.
    pub timestamp: DateTime<Utc>,
    /// Record kind.
    pub kind: TraceKind,
    /// Ordered payload.
    #[serde(default)]
    pub fields: TraceFields,
}

impl TraceRecord {
    /// Construct an unsequenced record.
    pub fn new(kind: TraceKind, fields: TraceFields) -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
            kind,
            fields,
        }
    }

    /// Construct a record from `(key, value)` pairs.
    pub fn from_pairs<K, V>(kind: TraceKind, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(
            kind,
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    /// Field value by key.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }
}
