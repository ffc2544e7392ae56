//! `qn show`: display a single note.
//!
//! Supports partial ID resolution: "1a2b" → "qn-1a2b…".

use crate::output::{OutputMode, pretty_kv, pretty_rule, render};
use crate::project::Project;
use anyhow::Result;
use chrono::{DateTime, Local};
use clap::Args;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Note ID to display.
    pub id: String,
}

/// Format an RFC 3339 timestamp in the local timezone, or echo it back.
pub fn local_time(rfc3339: &str) -> String {
    DateTime::parse_from_rfc3339(rfc3339)
        .map(|ts| {
            ts.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|_| rfc3339.to_string())
}

/// Execute `qn show`.
///
/// # Errors
///
/// Returns an error if the note cannot be resolved.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let note_id = project.resolve_note(&args.id, output)?;
    let Some(note) = project.store().get(&note_id)? else {
        anyhow::bail!("note {note_id} disappeared while reading");
    };

    render(output, &note, |note, w| {
        pretty_kv(w, "id", &note.id)?;
        pretty_kv(w, "title", &note.title)?;
        pretty_kv(w, "created", local_time(&note.created_at.to_rfc3339()))?;
        pretty_kv(w, "updated", local_time(&note.updated_at.to_rfc3339()))?;
        pretty_rule(w)?;
        writeln!(w, "{}", note.content)
    })
}
