//! ---
//! ironstack_section: "04-host-shell"
//! ironstack_subsection: "module"
//! ironstack_type: "source"
//! ironstack_scope: "code"
//! ironstack_description: "Journaled filesystem mutations."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use ironstack_common::ExecutionContext;
use ironstack_trace::TraceWriter;
use tracing::debug;

use crate::{Result, ShellError};

/// Extension appended to the pristine copy kept by [`write_file_and_backup`].
pub const BACKUP_EXTENSION: &str = "org";

/// Every ancestor of `path` from the root down, including `path` itself.
pub fn explode_path(path: &Path) -> Vec<PathBuf> {
    let mut parts: Vec<PathBuf> = path
        .ancestors()
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();
    parts.reverse();
    parts
}

/// Create `path` and any missing ancestors, one level at a time.
///
/// Only directories that did not exist are created and journaled, so calling
/// this twice for the same tree journals each directory at most once.
pub fn mkdirslist(
    ctx: ExecutionContext,
    path: &Path,
    tracer: Option<&TraceWriter>,
) -> Result<Vec<PathBuf>> {
    let mut made = Vec::new();
    for dir in explode_path(path) {
        if dir.is_dir() {
            continue;
        }
        debug!(path = %dir.display(), dry_run = ctx.is_dry_run(), "creating directory");
        if !ctx.is_dry_run() {
            fs::create_dir(&dir).map_err(ShellError::io("create directory", &dir))?;
        }
        if let Some(tracer) = tracer {
            tracer.dir_made(&dir)?;
        }
        made.push(dir);
    }
    Ok(made)
}

/// Write `contents` to `path`, creating missing parents first (journaled).
pub fn write_file(
    ctx: ExecutionContext,
    path: &Path,
    contents: &str,
    tracer: Option<&TraceWriter>,
) -> Result<()> {
    debug!(path = %path.display(), bytes = contents.len(), dry_run = ctx.is_dry_run(), "writing file");
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            mkdirslist(ctx, parent, tracer)?;
        }
    }
    if !ctx.is_dry_run() {
        fs::write(path, contents).map_err(ShellError::io("write", path))?;
    }
    if let Some(tracer) = tracer {
        tracer.file_touched(path)?;
    }
    Ok(())
}

pub fn load_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(ShellError::io("read", path))
}

/// Write `contents`, first moving an existing original aside to `<path>.org`.
///
/// An existing backup is never overwritten, so the first original survives
/// repeated runs. Permissions of the replaced file are preserved. Returns the
/// backup path when one exists.
pub fn write_file_and_backup(
    ctx: ExecutionContext,
    path: &Path,
    contents: &str,
) -> Result<Option<PathBuf>> {
    let mut backup = None;
    let mut permissions = None;
    if path.is_file() {
        permissions = Some(
            fs::metadata(path)
                .map_err(ShellError::io("stat", path))?
                .permissions(),
        );
        let backup_path = PathBuf::from(format!("{}.{}", path.display(), BACKUP_EXTENSION));
        if backup_path.is_file() {
            debug!(path = %path.display(), backup = %backup_path.display(), "leaving original backup");
        } else {
            debug!(path = %path.display(), backup = %backup_path.display(), "backing up original");
            if !ctx.is_dry_run() {
                fs::rename(path, &backup_path).map_err(ShellError::io("back up", path))?;
            }
        }
        backup = Some(backup_path);
    }
    write_file(ctx, path, contents, None)?;
    if let (Some(permissions), false) = (permissions, ctx.is_dry_run()) {
        fs::set_permissions(path, permissions).map_err(ShellError::io("chmod", path))?;
    }
    Ok(backup)
}

/// Create `link` pointing at `source`, creating the link's parents (journaled).
///
/// With `force`, an existing symlink at `link` is replaced.
pub fn symlink(
    ctx: ExecutionContext,
    source: &Path,
    link: &Path,
    force: bool,
    tracer: Option<&TraceWriter>,
) -> Result<()> {
    debug!(link = %link.display(), source = %source.display(), dry_run = ctx.is_dry_run(), "creating symlink");
    if let Some(parent) = link.parent() {
        if !parent.as_os_str().is_empty() {
            mkdirslist(ctx, parent, tracer)?;
        }
    }
    if ctx.is_dry_run() {
        return Ok(());
    }
    if force && link.is_symlink() {
        unlink(ctx, link, true)?;
    }
    std::os::unix::fs::symlink(source, link).map_err(ShellError::io("symlink", link))?;
    if let Some(tracer) = tracer {
        tracer.symlink_made(link)?;
    }
    Ok(())
}

/// Remove a file or symlink. Returns whether something was removed.
pub fn unlink(ctx: ExecutionContext, path: &Path, ignore_errors: bool) -> Result<bool> {
    debug!(path = %path.display(), dry_run = ctx.is_dry_run(), "unlinking");
    if ctx.is_dry_run() {
        return Ok(false);
    }
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(_) if ignore_errors => Ok(false),
        Err(err) => Err(ShellError::Io {
            action: "unlink",
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

/// Recursively delete a directory tree if it exists.
pub fn deldir(ctx: ExecutionContext, path: &Path) -> Result<bool> {
    if !path.is_dir() {
        return Ok(false);
    }
    debug!(path = %path.display(), dry_run = ctx.is_dry_run(), "recursively deleting directory");
    if !ctx.is_dry_run() {
        fs::remove_dir_all(path).map_err(ShellError::io("delete", path))?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironstack_trace::{OpenMode, TraceReader};
    use tempfile::tempdir;

    #[test]
    fn explode_path_lists_ancestors_root_first() {
        assert_eq!(
            explode_path(Path::new("/a/b/c")),
            vec![
                PathBuf::from("/"),
                PathBuf::from("/a"),
                PathBuf::from("/a/b"),
                PathBuf::from("/a/b/c"),
            ]
        );
    }

    #[test]
    fn mkdirslist_journals_each_directory_once() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace/created.trace");
        let tracer = TraceWriter::open(&trace, OpenMode::Append, ExecutionContext::live()).unwrap();
        let target = dir.path().join("x/y/z");

        let made = mkdirslist(ExecutionContext::live(), &target, Some(&tracer)).unwrap();
        assert_eq!(made.len(), 3);
        assert!(target.is_dir());
        let again = mkdirslist(ExecutionContext::live(), &target, Some(&tracer)).unwrap();
        assert!(again.is_empty());

        let journaled = TraceReader::open(&trace).dirs_made().unwrap();
        assert_eq!(journaled, made);
    }

    #[test]
    fn write_file_creates_parents_and_journals() {
        let dir = tempdir().unwrap();
        let trace = dir.path().join("trace/created.trace");
        let tracer = TraceWriter::open(&trace, OpenMode::Append, ExecutionContext::live()).unwrap();
        let target = dir.path().join("etc/app/app.conf");

        write_file(ExecutionContext::live(), &target, "a=1\n", Some(&tracer)).unwrap();
        assert_eq!(load_file(&target).unwrap(), "a=1\n");
        let reader = TraceReader::open(&trace);
        assert_eq!(reader.files_touched().unwrap(), vec![target]);
        assert_eq!(reader.dirs_made().unwrap().len(), 2);
    }

    #[test]
    fn dry_run_leaves_filesystem_untouched() {
        let dir = tempdir().unwrap();
        let ctx = ExecutionContext::dry_run();
        let target = dir.path().join("nested/file");
        write_file(ctx, &target, "x", None).unwrap();
        symlink(ctx, &target, &dir.path().join("link"), true, None).unwrap();
        assert!(!dir.path().join("nested").exists());
        assert!(!dir.path().join("link").exists());
    }

    #[test]
    fn symlink_force_replaces_existing_link() {
        let dir = tempdir().unwrap();
        let ctx = ExecutionContext::live();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let link = dir.path().join("links/current");
        symlink(ctx, &first, &link, true, None).unwrap();
        symlink(ctx, &second, &link, true, None).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), second);
    }

    #[test]
    fn backup_is_written_once() {
        let dir = tempdir().unwrap();
        let ctx = ExecutionContext::live();
        let path = dir.path().join("pip-requires");
        fs::write(&path, "original").unwrap();

        let backup = write_file_and_backup(ctx, &path, "cleaned-1").unwrap().unwrap();
        write_file_and_backup(ctx, &path, "cleaned-2").unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "original");
        assert_eq!(fs::read_to_string(&path).unwrap(), "cleaned-2");
    }

    #[test]
    fn unlink_and_deldir() {
        let dir = tempdir().unwrap();
        let ctx = ExecutionContext::live();
        let file = dir.path().join("tree/file");
        write_file(ctx, &file, "x", None).unwrap();
        assert!(unlink(ctx, &file, false).unwrap());
        assert!(!unlink(ctx, &file, true).unwrap());
        assert!(unlink(ctx, &file, false).is_err());
        assert!(deldir(ctx, &dir.path().join("tree")).unwrap());
        assert!(!deldir(ctx, &dir.path().join("tree")).unwrap());
    }
}
