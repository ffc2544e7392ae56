//! Locating a quill project and wiring the store to a retrieval engine.

use crate::output::{CliError, OutputMode, fail_with, render_error};
use anyhow::{Context as _, Result, bail};
use quill_core::config::{RetrievalConfig, resolve_config};
use quill_core::db::NoteStore;
use quill_search::{HashEmbedder, RetrievalEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub const QUILL_DIR: &str = ".quill";
pub const DB_FILE: &str = "notes.db";
pub const CONFIG_FILE: &str = "config.toml";

/// An opened `.quill/` project.
pub struct Project {
    store: Arc<NoteStore>,
    config: RetrievalConfig,
}

impl Project {
    /// Open the project rooted at `root`, rendering a hint if it does not
    /// exist yet.
    pub fn open(root: &Path, output: OutputMode) -> Result<Self> {
        let quill_dir = root.join(QUILL_DIR);
        if !quill_dir.is_dir() {
            render_error(
                output,
                &CliError::with_details(
                    format!("no quill project at {}", root.display()),
                    "run `qn init` first",
                    "not_initialized",
                ),
            )?;
            bail!("{QUILL_DIR}/ not found under {}", root.display());
        }

        let config = resolve_config(root)?.retrieval;
        let store = NoteStore::open(&quill_dir.join(DB_FILE))
            .with_context(|| format!("open note store in {}", quill_dir.display()))?;

        Ok(Self {
            store: Arc::new(store),
            config,
        })
    }

    pub fn store(&self) -> &NoteStore {
        &self.store
    }

    /// Build an engine and index every stored note into it.
    pub fn engine(&self, output: OutputMode) -> Result<RetrievalEngine> {
        let embedder = Arc::new(HashEmbedder::new(self.config.embedding_dim));
        let engine = RetrievalEngine::new(self.config.clone(), embedder, self.store.clone())
            .map_err(|err| fail_with(output, err))?;

        let notes = self.store.list()?;
        let summary = engine.reindex_all(
            notes
                .iter()
                .map(|note| (note.id.as_str(), note.content.as_str())),
        );
        if let Some((note_id, error)) = summary.failed.first() {
            tracing::warn!(
                failed = summary.failed.len(),
                first = %note_id,
                error = %error,
                "some notes could not be indexed"
            );
        }
        debug!(notes = summary.notes, fragments = summary.fragments, "engine ready");
        Ok(engine)
    }

    /// Resolve a possibly partial note id, rendering not-found and
    /// ambiguous-prefix errors.
    pub fn resolve_note(&self, input: &str, output: OutputMode) -> Result<String> {
        match self.store.resolve_id(input) {
            Ok(Some(id)) => Ok(id),
            Ok(None) => Err(fail_with(
                output,
                quill_core::QuillError::NoteNotFound(input.to_owned()),
            )),
            Err(err) => match err.downcast::<quill_core::QuillError>() {
                Ok(quill_err) => Err(fail_with(output, quill_err)),
                Err(other) => Err(other),
            },
        }
    }
}
