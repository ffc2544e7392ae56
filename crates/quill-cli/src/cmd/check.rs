//! `qn check`: rebuild the indexes and verify they agree.

use crate::output::{OutputMode, fail_with, pretty_kv, render};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use quill_search::EngineStats;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct CheckArgs {}

#[derive(Debug, Serialize)]
struct CheckReport {
    consistent: bool,
    stored_notes: u64,
    #[serde(flatten)]
    stats: EngineStats,
}

/// Execute `qn check`.
///
/// # Errors
///
/// Returns an error if the indexes disagree.
pub fn run_check(_args: &CheckArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let engine = project.engine(output)?;
    engine
        .check_consistency()
        .map_err(|err| fail_with(output, err))?;

    let report = CheckReport {
        consistent: true,
        stored_notes: project.store().count()?,
        stats: engine.stats(),
    };
    render(output, &report, |report, w| {
        writeln!(w, "✓ Lexical and semantic indexes agree.")?;
        pretty_kv(w, "notes", report.stats.notes.to_string())?;
        pretty_kv(w, "stored", report.stored_notes.to_string())?;
        pretty_kv(w, "fragments", report.stats.fragments.to_string())?;
        pretty_kv(w, "vocabulary", report.stats.vocabulary.to_string())?;
        pretty_kv(w, "dimension", report.stats.embedding_dim.to_string())?;
        pretty_kv(w, "fusion", format!("{:?}", report.stats.fusion).to_lowercase())
    })
}
