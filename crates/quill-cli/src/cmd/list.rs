//! `qn list`: every stored note, oldest first.

use crate::cmd::show::local_time;
use crate::output::{OutputMode, pretty_section, render, snippet};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Show at most this many notes.
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ListItem {
    id: String,
    title: String,
    updated_at: String,
}

/// Execute `qn list`.
///
/// # Errors
///
/// Returns an error if the project cannot be opened or the store query fails.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let notes = project.store().list()?;

    let items: Vec<ListItem> = notes
        .into_iter()
        .take(args.limit.unwrap_or(usize::MAX))
        .map(|note| ListItem {
            id: note.id,
            title: note.title,
            updated_at: note.updated_at.to_rfc3339(),
        })
        .collect();

    render(output, &items, |items, w| {
        if items.is_empty() {
            return writeln!(w, "No notes yet. Add one with `qn add`.");
        }
        pretty_section(w, &format!("Notes ({})", items.len()))?;
        for item in items {
            writeln!(
                w,
                "{:<12} {:<19}  {}",
                item.id,
                local_time(&item.updated_at),
                snippet(&item.title, 40)
            )?;
        }
        Ok(())
    })
}
