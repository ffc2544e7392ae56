use crate::error::QuillError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides of the `[retrieval]` table.
pub const ENV_PREFIX: &str = "QUILL_RETRIEVAL__";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// How lexical and semantic rankings are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionPolicy {
    /// Reciprocal Rank Fusion over list positions.
    #[default]
    Rrf,
    /// Weighted sum of per-list min-max normalized scores.
    Weighted,
}

impl FusionPolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "rrf" => Some(Self::Rrf),
            "weighted" | "weighted_average" => Some(Self::Weighted),
            _ => None,
        }
    }
}

/// Immutable retrieval engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default)]
    pub fusion: FusionPolicy,
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_pool_multiplier")]
    pub pool_multiplier: usize,
    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,
    #[serde(default = "default_bm25_k1")]
    pub bm25_k1: f32,
    #[serde(default = "default_bm25_b")]
    pub bm25_b: f32,
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            fusion: FusionPolicy::default(),
            rrf_k: default_rrf_k(),
            lexical_weight: default_lexical_weight(),
            semantic_weight: default_semantic_weight(),
            top_k: default_top_k(),
            pool_multiplier: default_pool_multiplier(),
            embed_timeout_ms: default_embed_timeout_ms(),
            bm25_k1: default_bm25_k1(),
            bm25_b: default_bm25_b(),
            min_score: default_min_score(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

impl RetrievalConfig {
    /// Deadline for a single embedding call.
    #[must_use]
    pub const fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    /// Size of the candidate pool requested from each index for a query of `k`.
    #[must_use]
    pub fn candidate_pool(&self, k: usize) -> usize {
        k.saturating_mul(self.pool_multiplier).max(20)
    }

    /// Check every option for a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::InvalidConfig`] naming the first bad option.
    pub fn validate(&self) -> Result<(), QuillError> {
        if self.chunk_size == 0 {
            return Err(invalid("chunk_size must be greater than 0"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(invalid(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(self.rrf_k.is_finite() && self.rrf_k > 0.0) {
            return Err(invalid("rrf_k must be a positive number"));
        }
        for (name, weight) in [
            ("lexical_weight", self.lexical_weight),
            ("semantic_weight", self.semantic_weight),
        ] {
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(invalid(format!("{name} must be a non-negative number")));
            }
        }
        if self.fusion == FusionPolicy::Weighted
            && self.lexical_weight + self.semantic_weight <= 0.0
        {
            return Err(invalid(
                "at least one weight must be greater than 0 for weighted fusion",
            ));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k must be at least 1"));
        }
        if self.pool_multiplier == 0 {
            return Err(invalid("pool_multiplier must be at least 1"));
        }
        if self.embed_timeout_ms == 0 {
            return Err(invalid("embed_timeout_ms must be greater than 0"));
        }
        if !(self.bm25_k1.is_finite() && self.bm25_k1 >= 0.0) {
            return Err(invalid("bm25_k1 must be a non-negative number"));
        }
        if !(0.0..=1.0).contains(&self.bm25_b) {
            return Err(invalid("bm25_b must be within [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(invalid("min_score must be within [0, 1]"));
        }
        if self.embedding_dim == 0 {
            return Err(invalid("embedding_dim must be greater than 0"));
        }
        Ok(())
    }

    /// Apply `QUILL_RETRIEVAL__<FIELD>` overrides from `vars`.
    ///
    /// Unknown fields are ignored; unparsable values are rejected.
    ///
    /// # Errors
    ///
    /// Returns [`QuillError::InvalidConfig`] when a recognized variable holds
    /// a value of the wrong type.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<(), QuillError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let Some(field) = key.as_ref().strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let field = field.to_ascii_lowercase();
            let value = value.as_ref().trim();
            match field.as_str() {
                "chunk_size" => self.chunk_size = parse_field(&field, value)?,
                "chunk_overlap" => self.chunk_overlap = parse_field(&field, value)?,
                "fusion" | "combination_method" => {
                    self.fusion = FusionPolicy::parse(value).ok_or_else(|| {
                        invalid(format!("{field}: expected `rrf` or `weighted`, got `{value}`"))
                    })?;
                }
                "rrf_k" => self.rrf_k = parse_field(&field, value)?,
                "lexical_weight" | "bm25_weight" => {
                    self.lexical_weight = parse_field(&field, value)?;
                }
                "semantic_weight" | "vector_weight" => {
                    self.semantic_weight = parse_field(&field, value)?;
                }
                "top_k" => self.top_k = parse_field(&field, value)?,
                "pool_multiplier" => self.pool_multiplier = parse_field(&field, value)?,
                "embed_timeout_ms" => self.embed_timeout_ms = parse_field(&field, value)?,
                "bm25_k1" => self.bm25_k1 = parse_field(&field, value)?,
                "bm25_b" => self.bm25_b = parse_field(&field, value)?,
                "min_score" | "min_score_threshold" => {
                    self.min_score = parse_field(&field, value)?;
                }
                "embedding_dim" => self.embedding_dim = parse_field(&field, value)?,
                other => tracing::debug!("ignoring unknown retrieval override `{other}`"),
            }
        }
        Ok(())
    }
}

/// Load `.quill/config.toml` under `project_root`, falling back to defaults.
///
/// The returned configuration has not been validated; callers hand it to the
/// engine, which rejects bad values at construction.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(".quill/config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load the project config and layer process environment overrides on top.
///
/// # Errors
///
/// Returns an error if the file cannot be parsed or an override is malformed.
pub fn resolve_config(project_root: &Path) -> Result<ProjectConfig> {
    let mut config = load_project_config(project_root)?;
    config
        .retrieval
        .apply_overrides(std::env::vars())
        .context("Failed to apply QUILL_RETRIEVAL__* overrides")?;
    Ok(config)
}

fn parse_field<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, QuillError> {
    value
        .parse::<T>()
        .map_err(|_| invalid(format!("{field}: cannot parse `{value}`")))
}

fn invalid(message: impl Into<String>) -> QuillError {
    QuillError::InvalidConfig(message.into())
}

const fn default_chunk_size() -> usize {
    500
}

const fn default_chunk_overlap() -> usize {
    50
}

const fn default_rrf_k() -> f32 {
    60.0
}

const fn default_lexical_weight() -> f32 {
    0.3
}

const fn default_semantic_weight() -> f32 {
    0.7
}

const fn default_top_k() -> usize {
    4
}

const fn default_pool_multiplier() -> usize {
    4
}

const fn default_embed_timeout_ms() -> u64 {
    5_000
}

const fn default_bm25_k1() -> f32 {
    1.2
}

const fn default_bm25_b() -> f32 {
    0.75
}

const fn default_min_score() -> f32 {
    0.001
}

const fn default_embedding_dim() -> usize {
    384
}
