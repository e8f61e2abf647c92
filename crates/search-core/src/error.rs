use std::fmt;

use common::SourceTag;

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

/// Pipeline step at which a failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Embed,
    Fetch,
    DegradedFetch,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Embed => "embed",
            Self::Fetch => "fetch",
            Self::DegradedFetch => "degraded_fetch",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SearchError {
    #[error("embedding service unavailable: {message}")]
    EmbeddingUnavailable { message: String },
    #[error("{tag} index unavailable during {stage}: {message}")]
    IndexUnavailable {
        tag: SourceTag,
        stage: Stage,
        message: String,
    },
    #[error("{tag} source timed out after {after_ms}ms during {stage}")]
    SourceTimeout {
        tag: SourceTag,
        stage: Stage,
        after_ms: u64,
    },
    #[error("weights must be finite, non-negative and not both zero (vector={vector}, keyword={keyword})")]
    InvalidWeights { vector: f32, keyword: f32 },
    #[error("top_k must be greater than zero")]
    InvalidTopK,
    #[error("no sources were supplied")]
    NoSources,
    #[error("{0} source supplied more than once")]
    DuplicateSource(SourceTag),
    #[error("invalid search configuration: {message}")]
    InvalidConfig { message: String },
    #[error("every source failed: {}", join_errors(.0))]
    AllSourcesUnavailable(Vec<SearchError>),
}

impl SearchError {
    pub const fn source_tag(&self) -> Option<SourceTag> {
        match self {
            Self::IndexUnavailable { tag, .. } | Self::SourceTimeout { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    pub const fn stage(&self) -> Option<Stage> {
        match self {
            Self::EmbeddingUnavailable { .. } => Some(Stage::Embed),
            Self::IndexUnavailable { stage, .. } | Self::SourceTimeout { stage, .. } => {
                Some(*stage)
            }
            _ => None,
        }
    }

    /// Whether the same request may succeed if issued again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EmbeddingUnavailable { .. }
            | Self::IndexUnavailable { .. }
            | Self::SourceTimeout { .. } => true,
            Self::AllSourcesUnavailable(errors) => errors.iter().any(Self::is_retryable),
            Self::InvalidWeights { .. }
            | Self::InvalidTopK
            | Self::NoSources
            | Self::DuplicateSource(_)
            | Self::InvalidConfig { .. } => false,
        }
    }
}

fn join_errors(errors: &[SearchError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
