use common::{
    InsuranceRecord, ScoredItem, SearchParams, SearchResponse, Searchable, SourceState,
    SourceStatus, SourceTag, config::SearchConfig,
};

use crate::error::SearchError;

/// A record plus its raw similarity signal from one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<R> {
    pub record: R,
    pub raw_distance: f32,
    pub source: SourceTag,
}

/// A candidate after keyword scoring, normalization and fusion.
///
/// `normalized_distance` and `hybrid_score` both follow the lower-is-better
/// convention; `keyword_score` is the fraction of query terms found.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<R> {
    pub record: R,
    pub raw_distance: f32,
    pub source: SourceTag,
    pub keyword_score: f32,
    pub normalized_distance: f32,
    pub hybrid_score: f32,
}

impl<R> ScoredCandidate<R> {
    /// `1 - hybrid_score`, the value compared against a relevance floor.
    pub fn relevance(&self) -> f32 {
        1.0 - self.hybrid_score
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub top_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, top_k: usize) -> Self {
        Self {
            query: query.into(),
            top_k,
            vector_weight: 0.6,
            keyword_weight: 0.4,
        }
    }

    /// Request using the configured default `top_k` and weights.
    pub fn from_config(query: impl Into<String>, config: &SearchConfig) -> Self {
        Self {
            query: query.into(),
            top_k: config.default_top_k,
            vector_weight: config.vector_weight,
            keyword_weight: config.keyword_weight,
        }
    }

    pub fn from_params(params: &SearchParams) -> Self {
        Self::new(params.query.clone(), params.top_k)
            .with_weights(params.vector_weight, params.keyword_weight)
    }

    #[must_use]
    pub const fn with_weights(mut self, vector_weight: f32, keyword_weight: f32) -> Self {
        self.vector_weight = vector_weight;
        self.keyword_weight = keyword_weight;
        self
    }
}

#[derive(Debug, Clone)]
pub enum SourceOutcome {
    /// The primary index answered.
    Ok { candidates: usize },
    /// The primary failed and the degraded path answered with vector-only
    /// scoring.
    Degraded {
        candidates: usize,
        cause: SearchError,
    },
    /// Neither path answered; the source contributed nothing.
    Failed(SearchError),
}

#[derive(Debug, Clone)]
pub struct SourceReport {
    pub source: SourceTag,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub const fn is_failed(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed(_))
    }

    pub fn status(&self) -> SourceStatus {
        let (state, candidates, error) = match &self.outcome {
            SourceOutcome::Ok { candidates } => (SourceState::Ok, *candidates, None),
            SourceOutcome::Degraded { candidates, cause } => {
                (SourceState::Degraded, *candidates, Some(cause.to_string()))
            }
            SourceOutcome::Failed(err) => (SourceState::Failed, 0, Some(err.to_string())),
        };
        SourceStatus {
            source: self.source,
            state,
            candidates,
            error,
        }
    }
}

/// The results that landed in one source after global selection, in
/// ranked order.
#[derive(Debug)]
pub struct SourceBucket<'a, R> {
    pub source: SourceTag,
    pub items: Vec<&'a ScoredCandidate<R>>,
}

/// Globally ranked results (ascending `hybrid_score`, at most `top_k`)
/// together with what happened at each source.
#[derive(Debug, Clone)]
pub struct SearchResult<R> {
    pub ranked: Vec<ScoredCandidate<R>>,
    pub sources: Vec<SourceReport>,
}

impl<R> SearchResult<R> {
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    pub fn for_source(&self, source: SourceTag) -> impl Iterator<Item = &ScoredCandidate<R>> {
        self.ranked.iter().filter(move |c| c.source == source)
    }

    /// Redistributes the ranked list into one bucket per queried source,
    /// preserving relative order. Sources that won no slot get an empty
    /// bucket.
    pub fn buckets(&self) -> Vec<SourceBucket<'_, R>> {
        let tags = self.sources.iter().map(|r| r.source).collect::<Vec<_>>();
        crate::merge::partition(&self.ranked, &tags)
    }

    pub fn report(&self, source: SourceTag) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.source == source)
    }
}

impl SearchResult<InsuranceRecord> {
    /// Wire form: results split per collection, each keeping its global
    /// relative order.
    pub fn into_response(self) -> SearchResponse {
        let mut response = SearchResponse {
            sources: self.sources.iter().map(SourceReport::status).collect(),
            ..SearchResponse::default()
        };
        for candidate in self.ranked {
            response.push(ScoredItem {
                id: candidate.record.id().to_string(),
                source: candidate.source,
                raw_distance: candidate.raw_distance,
                normalized_distance: candidate.normalized_distance,
                keyword_score: candidate.keyword_score,
                hybrid_score: candidate.hybrid_score,
                record: candidate.record,
            });
        }
        response
    }
}
