//! `qn init`: create the `.quill/` project skeleton.

use crate::output::{CliError, OutputMode, render, render_error};
use crate::project::{CONFIG_FILE, DB_FILE, QUILL_DIR};
use anyhow::{Context as _, Result};
use clap::Args;
use quill_core::db::NoteStore;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite the default config even if `.quill/` already exists.
    #[arg(long)]
    pub force: bool,
}

const CONFIG_TOML: &str = "[retrieval]\n\
    chunk_size = 500\n\
    chunk_overlap = 50\n\
    fusion = \"rrf\"\n\
    rrf_k = 60.0\n\
    lexical_weight = 0.3\n\
    semantic_weight = 0.7\n\
    top_k = 4\n\
    pool_multiplier = 4\n\
    embed_timeout_ms = 5000\n\
    bm25_k1 = 1.2\n\
    bm25_b = 0.75\n\
    min_score = 0.001\n\
    embedding_dim = 384\n";

#[derive(Debug, Serialize)]
struct InitReport {
    root: String,
    config: String,
    database: String,
}

/// Execute `qn init`:
///
/// ```text
/// .quill/
///   config.toml   (default retrieval config)
///   notes.db      (SQLite note store)
/// ```
///
/// # Errors
///
/// Returns an error if `.quill/` already exists and `--force` is not set,
/// or if any filesystem operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let quill_dir = project_root.join(QUILL_DIR);

    if quill_dir.exists() && !args.force {
        render_error(
            output,
            &CliError::with_details(
                ".quill/ already exists",
                "use `qn init --force` to rewrite the default config",
                "already_initialized",
            ),
        )?;
        anyhow::bail!(".quill/ already exists in {}", project_root.display());
    }

    std::fs::create_dir_all(&quill_dir)
        .with_context(|| format!("Failed to create {}", quill_dir.display()))?;

    let config_path = quill_dir.join(CONFIG_FILE);
    std::fs::write(&config_path, CONFIG_TOML)
        .with_context(|| format!("Failed to write config: {}", config_path.display()))?;

    let db_path = quill_dir.join(DB_FILE);
    NoteStore::open(&db_path)?;
    tracing::info!(root = %project_root.display(), "initialized quill project");

    let report = InitReport {
        root: project_root.display().to_string(),
        config: config_path.display().to_string(),
        database: db_path.display().to_string(),
    };
    render(output, &report, |_, w| {
        writeln!(w, "✓ Initialized .quill/ project structure.")?;
        writeln!(w)?;
        writeln!(w, "  Config:   .quill/{CONFIG_FILE}")?;
        writeln!(w, "  Notes:    .quill/{DB_FILE}")?;
        writeln!(w)?;
        writeln!(w, "Next steps:")?;
        writeln!(w, "  qn add --title \"First note\" --content \"...\"")?;
        writeln!(w, "  qn search \"...\"")
    })
}
