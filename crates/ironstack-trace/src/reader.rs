//! ---
//! ironstack_section: "03-trace-journal"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Journal replay and typed record views."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use tracing::warn;

use crate::record::{TraceFields, TraceHeader, TraceKind, TraceRecord};
use crate::{Result, TraceError};

/// Records of one journal in append order, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct TraceContents {
    header: Option<TraceHeader>,
    records: Vec<TraceRecord>,
    by_kind: IndexMap<TraceKind, Vec<TraceRecord>>,
}

impl TraceContents {
    fn push(&mut self, record: TraceRecord) {
        self.by_kind
            .entry(record.kind)
            .or_default()
            .push(record.clone());
        self.records.push(record);
    }

    /// Journal header, absent only for an empty file.
    pub fn header(&self) -> Option<&TraceHeader> {
        self.header.as_ref()
    }

    /// Every record in append order.
    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    /// Records of one kind in append order.
    pub fn of(&self, kind: TraceKind) -> &[TraceRecord] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the journal holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// A downloaded source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRecord {
    /// Target directory.
    pub target: PathBuf,
    /// Source URI.
    pub uri: String,
}

/// An installed language-runtime setup unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PySetupRecord {
    /// Setup unit name.
    pub name: String,
    /// Directory the setup ran in.
    pub location: PathBuf,
}

/// A started application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStartRecord {
    /// Application name.
    pub name: String,
    /// Opaque handle returned by the starter.
    pub detail: String,
    /// Id of the starter strategy that launched it.
    pub starter_id: String,
}

/// An application that could not be stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopFailureRecord {
    /// Application name.
    pub name: String,
    /// Why the stop failed.
    pub reason: String,
}

/// Read side of a journal.
///
/// Reading never deduplicates: each typed view returns every matching record
/// ever appended, in order.
#[derive(Debug, Clone)]
pub struct TraceReader {
    path: PathBuf,
}

impl TraceReader {
    /// Bind a reader to a journal path. The file is read on demand.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the journal on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the journal file exists.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Replay the journal. A missing file yields [`TraceError::NoTrace`].
    ///
    /// A final line without its newline is a torn append: it is dropped with a
    /// warning when it does not decode. Undecodable lines anywhere else are
    /// [`TraceError::Corrupt`].
    pub fn read(&self) -> Result<TraceContents> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(TraceError::NoTrace(self.path.clone()))
            }
            Err(err) => return Err(err.into()),
        };

        let mut contents = TraceContents::default();
        for (index, raw) in text.split_inclusive('\n').enumerate() {
            let line = raw.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            let decoded = if contents.header.is_none() {
                serde_json::from_str(line).map(|header| contents.header = Some(header))
            } else {
                serde_json::from_str(line).map(|record| contents.push(record))
            };
            match decoded {
                Ok(()) => {}
                Err(source) if !raw.ends_with('\n') => {
                    warn!(path = %self.path.display(), line = index + 1, error = %source, "dropping torn trailing trace record");
                }
                Err(source) => {
                    return Err(TraceError::Corrupt {
                        path: self.path.clone(),
                        line: index + 1,
                        source,
                    })
                }
            }
        }
        Ok(contents)
    }

    /// Byte length of the journal up to its last complete line, when the file
    /// ends in a torn line.
    pub(crate) fn torn_tail_offset(&self) -> Result<Option<u64>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        if bytes.is_empty() || bytes.ends_with(b"\n") {
            return Ok(None);
        }
        let keep = bytes
            .iter()
            .rposition(|byte| *byte == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);
        Ok(Some(keep as u64))
    }

    fn field_values(&self, kind: TraceKind, key: &str) -> Result<Vec<String>> {
        Ok(self
            .read()?
            .of(kind)
            .iter()
            .filter_map(|record| record.field(key).map(str::to_owned))
            .collect())
    }

    /// Directories created, in creation order.
    pub fn dirs_made(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .field_values(TraceKind::DirMade, "path")?
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    /// Files written, in write order.
    pub fn files_touched(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .field_values(TraceKind::FileTouched, "path")?
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    /// Symlinks created, in creation order.
    pub fn symlinks_made(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .field_values(TraceKind::SymlinkMade, "path")?
            .into_iter()
            .map(PathBuf::from)
            .collect())
    }

    /// Downloads performed.
    pub fn downloads(&self) -> Result<Vec<DownloadRecord>> {
        Ok(self
            .read()?
            .of(TraceKind::DownloadHappened)
            .iter()
            .map(|record| DownloadRecord {
                target: PathBuf::from(record.field("where").unwrap_or_default()),
                uri: record.field("from").unwrap_or_default().to_owned(),
            })
            .collect())
    }

    /// Descriptive fields of every installed package.
    pub fn packages_installed(&self) -> Result<Vec<TraceFields>> {
        Ok(self
            .read()?
            .of(TraceKind::PackageInstalled)
            .iter()
            .map(|record| record.fields.clone())
            .collect())
    }

    /// Language-runtime setup units installed.
    pub fn py_listing(&self) -> Result<Vec<PySetupRecord>> {
        Ok(self
            .read()?
            .of(TraceKind::PySetupInstalled)
            .iter()
            .map(|record| PySetupRecord {
                name: record.field("name").unwrap_or_default().to_owned(),
                location: PathBuf::from(record.field("where").unwrap_or_default()),
            })
            .collect())
    }

    /// Applications started.
    pub fn apps_started(&self) -> Result<Vec<AppStartRecord>> {
        Ok(self
            .read()?
            .of(TraceKind::AppStarted)
            .iter()
            .map(|record| AppStartRecord {
                name: record.field("name").unwrap_or_default().to_owned(),
                detail: record.field("detail").unwrap_or_default().to_owned(),
                starter_id: record.field("starter").unwrap_or_default().to_owned(),
            })
            .collect())
    }

    /// Applications that failed to stop.
    pub fn stop_failures(&self) -> Result<Vec<StopFailureRecord>> {
        Ok(self
            .read()?
            .of(TraceKind::AppStopFailed)
            .iter()
            .map(|record| StopFailureRecord {
                name: record.field("name").unwrap_or_default().to_owned(),
                reason: record.field("reason").unwrap_or_default().to_owned(),
            })
            .collect())
    }
}
