//! ---
//! ironstack_section: "15-testing"
//! ironstack_subsection: "integration-tests"
//! ironstack_type: "test"
//! ironstack_scope: "code"
//! ironstack_description: "Journal replay behaviour across writers."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use ironstack_common::ExecutionContext;
use ironstack_trace::{
    trace_filename, OpenMode, TraceBucket, TraceError, TraceKind, TraceReader, TraceWriter,
};
use tempfile::tempdir;

#[test]
fn replay_returns_every_append_grouped_by_kind() -> Result<()> {
    let dir = tempdir()?;
    let path = trace_filename(dir.path(), "glance", TraceBucket::Created);
    let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live())?;

    writer.dir_made(Path::new("/a"))?;
    writer.file_touched(Path::new("/a/f"))?;
    writer.dir_made(Path::new("/a/b"))?;
    writer.dir_made(Path::new("/a"))?;
    let mut package = IndexMap::new();
    package.insert("name".to_owned(), "python-glance".to_owned());
    writer.package_installed(&package)?;

    let contents = TraceReader::open(&path).read()?;
    assert_eq!(contents.len(), 5);
    let sequences: Vec<u64> = contents.records().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4, 5]);
    assert_eq!(contents.of(TraceKind::DirMade).len(), 3);

    let reader = TraceReader::open(&path);
    assert_eq!(
        reader.dirs_made()?,
        vec![PathBuf::from("/a"), PathBuf::from("/a/b"), PathBuf::from("/a")]
    );
    assert_eq!(reader.packages_installed()?[0]["name"], "python-glance");
    Ok(())
}

#[test]
fn install_and_start_journals_are_independent() -> Result<()> {
    let dir = tempdir()?;
    let created = trace_filename(dir.path(), "nova", TraceBucket::Created);
    let start = trace_filename(dir.path(), "nova", TraceBucket::Start);
    assert_eq!(created.parent(), start.parent());

    TraceWriter::open(&created, OpenMode::Append, ExecutionContext::live())?
        .dir_made(Path::new("/opt/nova"))?;
    assert!(TraceReader::open(&start).read().unwrap_err().is_no_trace());

    TraceWriter::open(&start, OpenMode::Exclusive, ExecutionContext::live())?
        .app_started("nova-api", "detail", "fork")?;
    assert!(TraceReader::open(&created).apps_started()?.is_empty());
    assert_eq!(TraceReader::open(&start).apps_started()?.len(), 1);
    Ok(())
}

#[test]
fn torn_trailing_record_is_dropped_and_appends_continue() -> Result<()> {
    let dir = tempdir()?;
    let path = trace_filename(dir.path(), "keystone", TraceBucket::Created);
    let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live())?;
    writer.symlink_made(Path::new("/etc/keystone"))?;
    writer.file_touched(Path::new("/etc/keystone/keystone.conf"))?;
    drop(writer);

    let mut file = OpenOptions::new().append(true).open(&path)?;
    file.write_all(br#"{"sequence":3,"timesta"#)?;
    drop(file);

    let reader = TraceReader::open(&path);
    assert_eq!(reader.symlinks_made()?, vec![PathBuf::from("/etc/keystone")]);
    assert_eq!(reader.read()?.len(), 2);

    let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live())?;
    assert_eq!(writer.dir_made(Path::new("/var/lib/keystone"))?, 3);

    let contents = reader.read()?;
    let sequences: Vec<u64> = contents.records().iter().map(|r| r.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert!(std::fs::read_to_string(&path)?.ends_with('\n'));
    Ok(())
}

#[test]
fn undecodable_line_inside_the_journal_is_corrupt() -> Result<()> {
    let dir = tempdir()?;
    let path = trace_filename(dir.path(), "swift", TraceBucket::Created);
    let writer = TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live())?;
    writer.dir_made(Path::new("/srv/swift"))?;
    drop(writer);

    let mut file = OpenOptions::new().append(true).open(&path)?;
    file.write_all(b"{\"sequence\":2,\"timesta\n")?;
    drop(file);

    let err = TraceReader::open(&path).read().unwrap_err();
    assert!(matches!(err, TraceError::Corrupt { line: 3, .. }));
    assert!(TraceWriter::open(&path, OpenMode::Append, ExecutionContext::live()).is_err());
    Ok(())
}
