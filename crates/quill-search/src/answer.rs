//! Turning retrieved fragments into context for an answer generator.

use crate::engine::CitedFragment;
use anyhow::{Context, Result};
use serde::Serialize;

const PROMPT_PREAMBLE: &str = "Based on the following contexts, answer the query. \
If the contexts don't contain relevant information, answer to the best of your \
ability but tell the user that you couldn't find relevant information.";

const PROMPT_CLOSING: &str = "Please provide a clear and concise response using the \
information from the given contexts.";

/// Why no context could be assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    /// Retrieval returned nothing.
    NoMatches,
    /// Every hit scored below the configured minimum.
    BelowThreshold,
}

impl EmptyReason {
    /// Fixed reply used instead of calling the generator.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::NoMatches => "I couldn't find any relevant information to answer your query.",
            Self::BelowThreshold => {
                "I couldn't find any sufficiently relevant information to answer your query."
            }
        }
    }
}

/// Retrieved material for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerContext {
    Empty { reason: EmptyReason },
    Cited {
        query: String,
        sources: Vec<CitedFragment>,
    },
}

impl AnswerContext {
    /// Keep the hits scoring at least `min_score`, in their ranked order.
    #[must_use]
    pub fn build(query: &str, hits: Vec<CitedFragment>, min_score: f32) -> Self {
        if hits.is_empty() {
            return Self::Empty {
                reason: EmptyReason::NoMatches,
            };
        }

        let sources: Vec<CitedFragment> = hits
            .into_iter()
            .filter(|hit| hit.score >= min_score)
            .collect();
        if sources.is_empty() {
            return Self::Empty {
                reason: EmptyReason::BelowThreshold,
            };
        }

        Self::Cited {
            query: query.to_owned(),
            sources,
        }
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    #[must_use]
    pub fn sources(&self) -> &[CitedFragment] {
        match self {
            Self::Empty { .. } => &[],
            Self::Cited { sources, .. } => sources,
        }
    }

    /// The prompt handed to a [`Generator`], or `None` when there is nothing
    /// to cite.
    #[must_use]
    pub fn render_prompt(&self) -> Option<String> {
        match self {
            Self::Empty { .. } => None,
            Self::Cited { query, sources } => Some(render(query, sources)),
        }
    }
}

fn render(query: &str, sources: &[CitedFragment]) -> String {
    let contexts: Vec<String> = sources
        .iter()
        .map(|source| format!("- {}", source.text))
        .collect();
    format!(
        "{PROMPT_PREAMBLE}\n\nContexts:\n{}\n\nQuery: {query}\n\n{PROMPT_CLOSING}",
        contexts.join("\n")
    )
}

/// Produces an answer from a query and its rendered context prompt.
pub trait Generator: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the generation backend fails.
    fn answer(&self, query: &str, prompt: &str) -> Result<String>;
}

/// A generated (or fixed) response plus the fragments it was based on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub response: String,
    pub sources: Vec<CitedFragment>,
}

/// Answer from `context`, calling `generator` only when there is something
/// to cite.
///
/// # Errors
///
/// Returns the generator's error, with context.
pub fn respond(context: AnswerContext, generator: &dyn Generator) -> Result<Answer> {
    match context {
        AnswerContext::Empty { reason } => Ok(Answer {
            response: reason.message().to_owned(),
            sources: Vec::new(),
        }),
        AnswerContext::Cited { query, sources } => {
            let prompt = render(&query, &sources);
            let response = generator
                .answer(&query, &prompt)
                .context("answer generation failed")?;
            Ok(Answer { response, sources })
        }
    }
}
