use common::Searchable;

use crate::{
    error::SearchError,
    lexical::QueryTerms,
    normalize::DistanceRange,
    types::{Candidate, ScoredCandidate},
};

/// Fusion weights rescaled to sum to one, so only their ratio matters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    vector: f32,
    keyword: f32,
}

impl FusionWeights {
    pub const VECTOR_ONLY: Self = Self {
        vector: 1.0,
        keyword: 0.0,
    };

    pub fn new(vector: f32, keyword: f32) -> Result<Self, SearchError> {
        let invalid = || SearchError::InvalidWeights { vector, keyword };
        if !vector.is_finite() || !keyword.is_finite() || vector < 0.0 || keyword < 0.0 {
            return Err(invalid());
        }
        let total = vector + keyword;
        if total <= 0.0 {
            return Err(invalid());
        }
        Ok(Self {
            vector: vector / total,
            keyword: keyword / total,
        })
    }

    pub const fn vector(&self) -> f32 {
        self.vector
    }

    pub const fn keyword(&self) -> f32 {
        self.keyword
    }

    /// Lower is better. The keyword score is inverted so both terms share
    /// the distance convention.
    pub fn hybrid_score(&self, normalized_distance: f32, keyword_score: f32) -> f32 {
        self.vector * normalized_distance + self.keyword * (1.0 - keyword_score)
    }
}

/// Keyword-scores and fuses a pool against `range`.
pub fn score_candidates<R: Searchable>(
    candidates: Vec<Candidate<R>>,
    terms: &QueryTerms,
    range: Option<DistanceRange>,
    weights: FusionWeights,
) -> Vec<ScoredCandidate<R>> {
    candidates
        .into_iter()
        .map(|candidate| {
            let keyword_score = terms.score(&candidate.record);
            let normalized_distance = range.map_or(0.0, |r| r.normalize(candidate.raw_distance));
            ScoredCandidate {
                hybrid_score: weights.hybrid_score(normalized_distance, keyword_score),
                record: candidate.record,
                raw_distance: candidate.raw_distance,
                source: candidate.source,
                keyword_score,
                normalized_distance,
            }
        })
        .collect()
}

/// Recomputes normalization and hybrid scores against a new reference set,
/// keeping the keyword scores already computed.
pub fn rescore<R>(scored: &mut [ScoredCandidate<R>], range: DistanceRange, weights: FusionWeights) {
    for candidate in scored {
        candidate.normalized_distance = range.normalize(candidate.raw_distance);
        candidate.hybrid_score =
            weights.hybrid_score(candidate.normalized_distance, candidate.keyword_score);
    }
}

/// Ascending by hybrid score. Stable, so equal scores keep arrival order.
pub fn rank<R>(scored: &mut [ScoredCandidate<R>]) {
    scored.sort_by(|a, b| a.hybrid_score.total_cmp(&b.hybrid_score));
}

/// Drops candidates whose relevance (`1 - hybrid_score`) is below `floor`.
pub fn apply_relevance_floor<R>(scored: &mut Vec<ScoredCandidate<R>>, floor: Option<f32>) {
    if let Some(floor) = floor {
        scored.retain(|c| c.relevance() >= floor);
    }
}
