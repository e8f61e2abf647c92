//! What to do when a signal is missing: a source whose index fails is
//! retried once over its degraded path with vector-only scoring, and a
//! source that still fails is either reported as absent (best effort) or
//! aborts the request (strict).

use common::{SourceTag, config::FailureMode};

use crate::{
    error::{SearchError, Stage},
    fetch::CandidateFetcher,
    fusion::FusionWeights,
    source::{SourceFilter, SourceHandle},
    types::{Candidate, SourceOutcome, SourceReport},
};

/// Candidates obtained for one source and the weights they must be fused
/// with.
#[derive(Debug)]
pub struct SourceFetch<R> {
    pub source: SourceTag,
    pub candidates: Vec<Candidate<R>>,
    pub weights: FusionWeights,
    pub degraded_by: Option<SearchError>,
}

impl<R> SourceFetch<R> {
    pub fn report(&self, kept: usize) -> SourceReport {
        let outcome = match &self.degraded_by {
            None => SourceOutcome::Ok { candidates: kept },
            Some(cause) => SourceOutcome::Degraded {
                candidates: kept,
                cause: cause.clone(),
            },
        };
        SourceReport {
            source: self.source,
            outcome,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FallbackController {
    mode: FailureMode,
}

impl FallbackController {
    pub const fn new(mode: FailureMode) -> Self {
        Self { mode }
    }

    pub const fn mode(&self) -> FailureMode {
        self.mode
    }

    /// Fetches from the primary index; on failure tries the degraded path
    /// exactly once. The primary error is returned when both fail.
    pub async fn fetch<R>(
        &self,
        fetcher: &CandidateFetcher,
        handle: &SourceHandle<R>,
        embedding: &[f32],
        count: usize,
        weights: FusionWeights,
        filter: &SourceFilter<'_, R>,
    ) -> Result<SourceFetch<R>, SearchError> {
        let tag = handle.tag();
        let cause = match fetcher
            .fetch(handle.primary(), tag, Stage::Fetch, embedding, count, filter)
            .await
        {
            Ok(candidates) => {
                return Ok(SourceFetch {
                    source: tag,
                    candidates,
                    weights,
                    degraded_by: None,
                });
            }
            Err(err) => err,
        };

        let Some(degraded) = handle.degraded() else {
            tracing::warn!(source = %tag, error = %cause, "source fetch failed, no degraded path");
            return Err(cause);
        };

        tracing::warn!(
            source = %tag,
            error = %cause,
            "source fetch failed, retrying once over degraded path with vector-only scoring"
        );
        match fetcher
            .fetch(degraded, tag, Stage::DegradedFetch, embedding, count, filter)
            .await
        {
            Ok(candidates) => Ok(SourceFetch {
                source: tag,
                candidates,
                weights: FusionWeights::VECTOR_ONLY,
                degraded_by: Some(cause),
            }),
            Err(retry_err) => {
                tracing::warn!(source = %tag, error = %retry_err, "degraded path failed");
                Err(cause)
            }
        }
    }

    /// Applies the failure mode to per-source fetch results. Returns the
    /// usable fetches in input order plus a report for every failed
    /// source.
    pub fn resolve<R>(
        &self,
        results: Vec<(SourceTag, Result<SourceFetch<R>, SearchError>)>,
    ) -> Result<(Vec<SourceFetch<R>>, Vec<SourceReport>), SearchError> {
        let mut fetched = Vec::with_capacity(results.len());
        let mut failed = Vec::new();
        let mut errors = Vec::new();
        for (source, result) in results {
            match result {
                Ok(fetch) => fetched.push(fetch),
                Err(err) if self.mode == FailureMode::Strict => return Err(err),
                Err(err) => {
                    errors.push(err.clone());
                    failed.push(SourceReport {
                        source,
                        outcome: SourceOutcome::Failed(err),
                    });
                }
            }
        }
        if fetched.is_empty() && !errors.is_empty() {
            return Err(SearchError::AllSourcesUnavailable(errors));
        }
        Ok((fetched, failed))
    }
}

/// Maps a collaborator failure while embedding the query. Both sources need
/// the same embedding, so this always aborts the request.
pub fn embedding_failure(err: &anyhow::Error) -> SearchError {
    SearchError::EmbeddingUnavailable {
        message: format!("{err:#}"),
    }
}
