//! `qn context`: the cited context an answer generator would receive.

use crate::cmd::search::write_hit;
use crate::output::{OutputMode, fail_with, pretty_section, render};
use crate::project::Project;
use anyhow::Result;
use clap::Args;
use quill_search::AnswerContext;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Question to gather context for.
    pub query: String,

    /// Number of fragments to retrieve before filtering.
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ContextReport {
    #[serde(flatten)]
    context: AnswerContext,
    /// Fixed reply when nothing qualifies, otherwise absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompt: Option<String>,
}

/// Execute `qn context`.
///
/// # Errors
///
/// Returns an error if the engine cannot be built or retrieval fails.
pub fn run_context(args: &ContextArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::open(project_root, output)?;
    let engine = project.engine(output)?;
    let context = engine
        .context(&args.query, args.limit.unwrap_or(0))
        .map_err(|err| fail_with(output, err))?;

    let message = match &context {
        AnswerContext::Empty { reason } => Some(reason.message()),
        AnswerContext::Cited { .. } => None,
    };
    let report = ContextReport {
        prompt: context.render_prompt(),
        message,
        context,
    };

    render(output, &report, |report, w| {
        if let Some(message) = report.message {
            return writeln!(w, "{message}");
        }
        pretty_section(w, "Sources")?;
        for source in report.context.sources() {
            write_hit(w, source)?;
        }
        writeln!(w)?;
        pretty_section(w, "Prompt")?;
        writeln!(w, "{}", report.prompt.as_deref().unwrap_or_default())
    })
}
