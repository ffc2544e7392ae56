//! `qn add`: store a note and index it.

use crate::output::{OutputMode, fail_with, pretty_kv, render};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Note title.
    #[arg(long)]
    pub title: String,

    /// Note body. Split into fragments for retrieval.
    #[arg(long)]
    pub content: String,
}

#[derive(Debug, Serialize)]
struct AddReport {
    id: String,
    title: String,
    fragments: usize,
}

/// Execute `qn add`.
///
/// # Errors
///
/// Returns an error if the project cannot be opened, the note cannot be
/// stored, or indexing fails.
pub fn run_add(args: &AddArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let engine = project.engine(output)?;

    let note = project.store().create(&args.title, &args.content)?;
    let indexed = engine
        .index_note(&note.id, &note.content)
        .map_err(|err| fail_with(output, err))?;

    let report = AddReport {
        id: note.id,
        title: note.title,
        fragments: indexed.fragments,
    };
    render(output, &report, |report, w| {
        writeln!(w, "✓ Added {}", report.id)?;
        pretty_kv(w, "title", &report.title)?;
        pretty_kv(w, "fragments", report.fragments.to_string())
    })
}
