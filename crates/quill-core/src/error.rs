use std::fmt;
use std::time::Duration;

/// Machine-readable error codes for caller-side decision making.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidConfig,
    ConfigParseError,
    NoteNotFound,
    AmbiguousNoteId,
    DimensionMismatch,
    EmbeddingFailed,
    RetrievalTimeout,
    IndexInconsistency,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidConfig => "E1001",
            Self::ConfigParseError => "E1002",
            Self::NoteNotFound => "E2001",
            Self::AmbiguousNoteId => "E2002",
            Self::DimensionMismatch => "E3001",
            Self::EmbeddingFailed => "E3002",
            Self::RetrievalTimeout => "E4001",
            Self::IndexInconsistency => "E5001",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidConfig => "Invalid retrieval configuration",
            Self::ConfigParseError => "Config file parse error",
            Self::NoteNotFound => "Note not found",
            Self::AmbiguousNoteId => "Note ID prefix matches several notes",
            Self::DimensionMismatch => "Embedding dimension mismatch",
            Self::EmbeddingFailed => "Embedding generation failed",
            Self::RetrievalTimeout => "Retrieval timed out",
            Self::IndexInconsistency => "Lexical and semantic indexes disagree",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidConfig => {
                Some("Fix the [retrieval] table in .quill/config.toml (chunk_overlap < chunk_size).")
            }
            Self::ConfigParseError => Some("Fix syntax in .quill/config.toml and retry."),
            Self::NoteNotFound => Some("Run `qn list` to see existing note IDs."),
            Self::AmbiguousNoteId => Some("Use more characters of the ID, or the full ID."),
            Self::DimensionMismatch => {
                Some("The embedder and index disagree on vector size; check embedding_dim.")
            }
            Self::EmbeddingFailed => Some("Verify the embedding backend is reachable and retry."),
            Self::RetrievalTimeout => {
                Some("Retry shortly, or raise embed_timeout_ms if the backend is slow.")
            }
            Self::IndexInconsistency => Some("Reindex the affected note, or run `qn check`."),
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the retrieval engine and its configuration.
#[derive(Debug, thiserror::Error)]
pub enum QuillError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{operation} timed out after {waited:?}")]
    RetrievalTimeout {
        operation: &'static str,
        waited: Duration,
    },

    #[error("index inconsistency for note {note_id}: {detail}")]
    IndexInconsistency { note_id: String, detail: String },

    #[error("embedding failed: {0}")]
    EmbeddingFailed(String),

    #[error("note not found: {0}")]
    NoteNotFound(String),

    #[error("ambiguous note ID prefix '{input}'; matches: {}", matches.join(", "))]
    AmbiguousNoteId { input: String, matches: Vec<String> },
}

impl QuillError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidConfig(_) => ErrorCode::InvalidConfig,
            Self::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            Self::RetrievalTimeout { .. } => ErrorCode::RetrievalTimeout,
            Self::IndexInconsistency { .. } => ErrorCode::IndexInconsistency,
            Self::EmbeddingFailed(_) => ErrorCode::EmbeddingFailed,
            Self::NoteNotFound(_) => ErrorCode::NoteNotFound,
            Self::AmbiguousNoteId { .. } => ErrorCode::AmbiguousNoteId,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }

    /// Whether a caller may retry the failed operation with backoff.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::RetrievalTimeout { .. })
    }
}

/// Result alias for engine operations.
pub type Result<T, E = QuillError> = std::result::Result<T, E>;
