//! ---
//! ironstack_section: "03-trace-journal"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Append-only journal writer."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use ironstack_common::ExecutionContext;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::reader::TraceReader;
use crate::record::{TraceBucket, TraceFields, TraceHeader, TraceKind, TraceRecord};
use crate::{Result, TraceError};

/// How an existing journal is treated when a writer is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Keep appending to a prior journal across repeated attempts.
    Append,
    /// Refuse to open when a prior non-empty journal exists.
    Exclusive,
}

/// Journal path for a component's bucket: `<trace_dir>/<component>/<bucket>.trace`.
pub fn trace_filename(trace_dir: &Path, component: &str, bucket: TraceBucket) -> PathBuf {
    trace_dir.join(component).join(bucket.file_name())
}

/// Delete a journal. Returns whether a file was removed.
pub fn remove(path: &Path, ctx: ExecutionContext) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    if ctx.is_dry_run() {
        debug!(path = %path.display(), "dry-run: would remove trace");
        return Ok(true);
    }
    fs::remove_file(path)?;
    debug!(path = %path.display(), "removed trace");
    Ok(true)
}

/// Append-only writer for one journal file.
///
/// The file and its header are created on the first append. Every append is
/// flushed before returning; a failed append is an error for the caller.
#[derive(Debug)]
pub struct TraceWriter {
    path: PathBuf,
    ctx: ExecutionContext,
    last_sequence: Mutex<u64>,
}

impl TraceWriter {
    /// Open a journal for appending.
    ///
    /// A torn final line left by an interrupted append is cut off so new
    /// records start on a fresh line.
    pub fn open(path: impl Into<PathBuf>, mode: OpenMode, ctx: ExecutionContext) -> Result<Self> {
        let path = path.into();
        let existing = fs::metadata(&path).map(|meta| meta.len() > 0).unwrap_or(false);
        if existing && mode == OpenMode::Exclusive {
            return Err(TraceError::AlreadyExists(path));
        }
        let last_sequence = if existing {
            let reader = TraceReader::open(&path);
            let last = reader
                .read()?
                .records()
                .last()
                .map(|record| record.sequence)
                .unwrap_or(0);
            if let Some(keep) = reader.torn_tail_offset()? {
                if ctx.is_dry_run() {
                    debug!(path = %path.display(), "dry-run: torn trace tail left in place");
                } else {
                    OpenOptions::new().write(true).open(&path)?.set_len(keep)?;
                    warn!(path = %path.display(), kept_bytes = keep, "truncated torn trace tail before appending");
                }
            }
            last
        } else {
            0
        };
        Ok(Self {
            path,
            ctx,
            last_sequence: Mutex::new(last_sequence),
        })
    }

    /// Path of the journal on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record, assigning its sequence number.
    pub fn append(&self, mut record: TraceRecord) -> Result<u64> {
        let mut last_sequence = self.last_sequence.lock();
        record.sequence = *last_sequence + 1;

        if self.ctx.is_dry_run() {
            debug!(path = %self.path.display(), kind = %record.kind, fields = ?record.fields, "dry-run: trace record not written");
            *last_sequence = record.sequence;
            return Ok(record.sequence);
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut buffer = String::new();
        if file.metadata()?.len() == 0 {
            buffer.push_str(&serde_json::to_string(&self.header())?);
            buffer.push('\n');
        }
        buffer.push_str(&serde_json::to_string(&record)?);
        buffer.push('\n');
        file.write_all(buffer.as_bytes())?;
        file.flush()?;

        *last_sequence = record.sequence;
        debug!(path = %self.path.display(), kind = %record.kind, sequence = record.sequence, "trace record appended");
        Ok(record.sequence)
    }

    fn header(&self) -> TraceHeader {
        let component = self
            .path
            .parent()
            .and_then(Path::file_name)
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bucket = self
            .path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        TraceHeader::new(component, bucket)
    }

    fn append_pairs<const N: usize>(&self, kind: TraceKind, pairs: [(&str, String); N]) -> Result<u64> {
        self.append(TraceRecord::from_pairs(kind, pairs))
    }

    /// Record a created directory.
    pub fn dir_made(&self, path: &Path) -> Result<u64> {
        self.append_pairs(TraceKind::DirMade, [("path", path.display().to_string())])
    }

    /// Record a written file.
    pub fn file_touched(&self, path: &Path) -> Result<u64> {
        self.append_pairs(TraceKind::FileTouched, [("path", path.display().to_string())])
    }

    /// Record a created symlink.
    pub fn symlink_made(&self, link: &Path) -> Result<u64> {
        self.append_pairs(TraceKind::SymlinkMade, [("path", link.display().to_string())])
    }

    /// Record a download into `target` from `uri`.
    pub fn download_happened(&self, target: &Path, uri: &str) -> Result<u64> {
        self.append_pairs(
            TraceKind::DownloadHappened,
            [("where", target.display().to_string()), ("from", uri.to_owned())],
        )
    }

    /// Record an installed package with its descriptive fields.
    pub fn package_installed(&self, package: &TraceFields) -> Result<u64> {
        self.append(TraceRecord::new(TraceKind::PackageInstalled, package.clone()))
    }

    /// Record a language-runtime setup unit installed in `location`.
    pub fn py_installed(&self, name: &str, location: &Path) -> Result<u64> {
        self.append_pairs(
            TraceKind::PySetupInstalled,
            [("name", name.to_owned()), ("where", location.display().to_string())],
        )
    }

    /// Record a started application.
    pub fn app_started(&self, name: &str, detail: &str, starter_id: &str) -> Result<u64> {
        self.append_pairs(
            TraceKind::AppStarted,
            [
                ("name", name.to_owned()),
                ("detail", detail.to_owned()),
                ("starter", starter_id.to_owned()),
            ],
        )
    }

    /// Record an application that could not be stopped.
    pub fn app_stop_failed(&self, name: &str, reason: &str) -> Result<u64> {
        self.append_pairs(
            TraceKind::AppStopFailed,
            [("name", name.to_owned()), ("reason", reason.to_owned())],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_is_created_lazily_with_header() {
        let dir = tempdir().unwrap();
        let path = trace_filename(dir.path(), "nova", TraceBucket::Created);
        let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live()).unwrap();
        assert!(!path.exists());

        writer.dir_made(Path::new("/opt/nova")).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        let header: TraceHeader = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(header.component, "nova");
        assert_eq!(header.bucket, "created");
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn append_mode_continues_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c/created.trace");
        let first = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live()).unwrap();
        assert_eq!(first.file_touched(Path::new("/a")).unwrap(), 1);
        assert_eq!(first.file_touched(Path::new("/b")).unwrap(), 2);

        let second = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live()).unwrap();
        assert_eq!(second.symlink_made(Path::new("/c")).unwrap(), 3);
    }

    #[test]
    fn exclusive_mode_rejects_existing_journal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c/start.trace");
        let writer = TraceWriter::open(&path, OpenMode::Exclusive, ExecutionContext::live()).unwrap();
        writer.app_started("api", "/tmp/api.fork.json", "fork").unwrap();

        let err = TraceWriter::open(&path, OpenMode::Exclusive, ExecutionContext::live()).unwrap_err();
        assert!(matches!(err, TraceError::AlreadyExists(p) if p == path));
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c/created.trace");
        let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::dry_run()).unwrap();
        assert_eq!(writer.dir_made(Path::new("/x")).unwrap(), 1);
        assert!(!path.exists());
        assert!(!dir.path().join("c").exists());
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("c/start.trace");
        assert!(!remove(&path, ExecutionContext::live()).unwrap());
        let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live()).unwrap();
        writer.app_stop_failed("api", "still running").unwrap();
        assert!(remove(&path, ExecutionContext::dry_run()).unwrap());
        assert!(path.exists());
        assert!(remove(&path, ExecutionContext::live()).unwrap());
        assert!(!path.exists());
    }
}
