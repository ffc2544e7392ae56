//! `qn delete`: remove a note from the store and both indexes.

use crate::output::{OutputMode, render};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Note ID. Supports partial IDs.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct DeleteReport {
    id: String,
    deleted: bool,
    fragments_removed: usize,
}

/// Execute `qn delete`.
///
/// # Errors
///
/// Returns an error if the note does not exist or the store write fails.
pub fn run_delete(args: &DeleteArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let note_id = project.resolve_note(&args.id, output)?;
    let engine = project.engine(output)?;

    let deleted = project.store().delete(&note_id)?;
    let fragments_removed = engine.delete_note(&note_id);

    let report = DeleteReport {
        id: note_id,
        deleted,
        fragments_removed,
    };
    render(output, &report, |report, w| {
        writeln!(
            w,
            "✓ Deleted {} ({} fragments dropped)",
            report.id, report.fragments_removed
        )
    })
}
