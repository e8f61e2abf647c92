use std::time::Duration;

use common::SourceTag;

use crate::{
    error::{SearchError, Stage},
    source::{SourceFilter, SourceQuery},
    types::Candidate,
};

/// Pulls an over-fetched candidate pool from one source's index under a
/// bounded timeout.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFetcher {
    timeout: Duration,
}

impl CandidateFetcher {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns at most `count` candidates in the order the index produced
    /// them, with `filter` applied by the index. Candidates with a non-finite
    /// distance are dropped. A failing or slow index is an error, never an
    /// empty pool.
    pub async fn fetch<R>(
        &self,
        query: &dyn SourceQuery<R>,
        tag: SourceTag,
        stage: Stage,
        embedding: &[f32],
        count: usize,
        filter: &SourceFilter<'_, R>,
    ) -> Result<Vec<Candidate<R>>, SearchError> {
        let lookup = query.nearest_neighbors(embedding, count, filter);
        let neighbors = match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(neighbors)) => neighbors,
            Ok(Err(err)) => {
                return Err(SearchError::IndexUnavailable {
                    tag,
                    stage,
                    message: format!("{err:#}"),
                });
            }
            Err(_) => {
                return Err(SearchError::SourceTimeout {
                    tag,
                    stage,
                    after_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                });
            }
        };

        let returned = neighbors.len();
        let candidates = neighbors
            .into_iter()
            .filter(|n| n.raw_distance.is_finite())
            .take(count)
            .map(|n| Candidate {
                record: n.record,
                raw_distance: n.raw_distance,
                source: tag,
            })
            .collect::<Vec<_>>();
        if candidates.len() < returned.min(count) {
            tracing::warn!(
                source = %tag,
                stage = %stage,
                dropped = returned.min(count) - candidates.len(),
                "dropped candidates with non-finite distance"
            );
        }
        tracing::debug!(
            source = %tag,
            stage = %stage,
            requested = count,
            fetched = candidates.len(),
            "fetched candidates"
        );
        Ok(candidates)
    }
}
