//! ---
//! ironstack_section: "15-testing"
//! ironstack_subsection: "integration-tests"
//! ironstack_type: "test"
//! ironstack_scope: "code"
//! ironstack_description: "Journaled host effects and their reversal."
//! ironstack_version: "v0.0.0-prealpha"
//! ironstack_owner: "tbd"
//! ---
use anyhow::Result;
use ironstack_common::ExecutionContext;
use ironstack_shell::{deldir, mkdirslist, symlink, unlink, write_file};
use ironstack_trace::{trace_filename, OpenMode, TraceBucket, TraceReader, TraceWriter};
use tempfile::tempdir;

#[test]
fn journal_replay_undoes_every_effect() -> Result<()> {
    let root = tempdir()?;
    let ctx = ExecutionContext::live();
    let trace = trace_filename(&root.path().join("traces"), "app", TraceBucket::Created);
    let tracer = TraceWriter::open(&trace, OpenMode::Append, ctx)?;

    let data = root.path().join("var/lib/app/etc");
    mkdirslist(ctx, &data, Some(&tracer))?;
    write_file(ctx, &data.join("app.conf"), "listen=127.0.0.1\n", Some(&tracer))?;
    symlink(ctx, &data, &root.path().join("etc/app"), true, Some(&tracer))?;

    let reader = TraceReader::open(&trace);
    for link in reader.symlinks_made()? {
        unlink(ctx, &link, true)?;
    }
    for file in reader.files_touched()? {
        unlink(ctx, &file, true)?;
    }
    for dir in reader.dirs_made()?.into_iter().rev() {
        deldir(ctx, &dir)?;
    }

    assert!(!root.path().join("etc/app").exists());
    assert!(!root.path().join("var").exists());
    assert!(!root.path().join("etc").exists());
    Ok(())
}
