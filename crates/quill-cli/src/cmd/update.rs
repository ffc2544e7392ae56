//! `qn update`: change a note and reindex it.

use crate::output::{OutputMode, fail_with, pretty_kv, render};
use crate::project::Project;
use anyhow::{Result, anyhow};
use clap::{ArgGroup, Args};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("changes").required(true).multiple(true).args(["title", "content"])))]
pub struct UpdateArgs {
    /// Note ID. Supports partial IDs: "1a2b" → "qn-1a2b…".
    pub id: String,

    /// New title.
    #[arg(long)]
    pub title: Option<String>,

    /// New body. The note is re-chunked and reindexed.
    #[arg(long)]
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
struct UpdateReport {
    id: String,
    title: String,
    fragments: usize,
    replaced: usize,
}

/// Execute `qn update`.
///
/// # Errors
///
/// Returns an error if the note does not exist or reindexing fails.
pub fn run_update(args: &UpdateArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let note_id = project.resolve_note(&args.id, output)?;
    let engine = project.engine(output)?;

    let note = project
        .store()
        .update(&note_id, args.title.as_deref(), args.content.as_deref())?
        .ok_or_else(|| anyhow!("note {note_id} disappeared during update"))?;
    let indexed = engine
        .index_note(&note.id, &note.content)
        .map_err(|err| fail_with(output, err))?;

    let report = UpdateReport {
        id: note.id,
        title: note.title,
        fragments: indexed.fragments,
        replaced: indexed.replaced,
    };
    render(output, &report, |report, w| {
        writeln!(w, "✓ Updated {}", report.id)?;
        pretty_kv(w, "title", &report.title)?;
        pretty_kv(
            w,
            "fragments",
            format!("{} (replaced {})", report.fragments, report.replaced),
        )
    })
}
