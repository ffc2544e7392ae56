//! `qn search`: hybrid retrieval with citations.

use crate::output::{OutputMode, fail_with, pretty_section, render, snippet};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use quill_search::CitedFragment;
use std::io::{self, Write};
use std::path::Path;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Natural-language query.
    pub query: String,

    /// Number of fragments to return (defaults to `top_k` from config).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

fn rank_label(rank: Option<usize>) -> String {
    rank.map_or_else(|| "-".to_string(), |rank| rank.to_string())
}

/// Write one cited fragment as two lines: header then snippet.
pub fn write_hit(w: &mut dyn Write, hit: &CitedFragment) -> io::Result<()> {
    writeln!(
        w,
        "{:>2}. {} [{}#{}]  score {:.4}  lex {} sem {}",
        hit.rank,
        hit.title,
        hit.note_id,
        hit.seq,
        hit.score,
        rank_label(hit.lexical_rank),
        rank_label(hit.semantic_rank),
    )?;
    writeln!(w, "    {}", snippet(&hit.text, 100))
}

/// Execute `qn search`.
///
/// # Errors
///
/// Returns an error if the engine cannot be built or the query fails.
pub fn run_search(args: &SearchArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let engine = project.engine(output)?;
    let hits = engine
        .search(&args.query, args.limit.unwrap_or(0))
        .map_err(|err| fail_with(output, err))?;

    render(output, &hits, |hits, w| {
        if hits.is_empty() {
            return writeln!(w, "No matching fragments.");
        }
        pretty_section(w, &format!("Results for \"{}\"", args.query))?;
        for hit in hits {
            write_hit(w, hit)?;
        }
        Ok(())
    })
}
