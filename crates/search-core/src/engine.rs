//! Request-scoped orchestration: embed once, fetch every source
//! concurrently, score each pool locally, then merge.

use common::{Searchable, SourceTag, config::SearchConfig};
use futures::future::join_all;

use crate::{
    error::{Result, SearchError},
    fallback::{self, FallbackController, SourceFetch},
    fetch::CandidateFetcher,
    filter::{AcceptAll, RecordPredicate},
    fusion::{self, FusionWeights},
    lexical::QueryTerms,
    merge::{self, SourcePool},
    normalize::DistanceRange,
    retrieval::RetrievalPlan,
    router::{QueryRouter, Route},
    source::{Embedder, SourceFilter, SourceHandle},
    types::{ScoredCandidate, SearchRequest, SearchResult, SourceReport},
};

/// Stateless between requests; holds only the embedding collaborator.
#[derive(Debug, Clone)]
pub struct HybridSearchEngine<E> {
    embedder: E,
}

impl<E: Embedder> HybridSearchEngine<E> {
    pub const fn new(embedder: E) -> Self {
        Self { embedder }
    }

    pub const fn embedder(&self) -> &E {
        &self.embedder
    }

    /// Cross-source search with no attribute filter.
    pub async fn search<R>(
        &self,
        request: &SearchRequest,
        sources: &[SourceHandle<R>],
        config: &SearchConfig,
    ) -> Result<SearchResult<R>>
    where
        R: Searchable + Send + Sync,
    {
        self.search_filtered(request, sources, &AcceptAll, config)
            .await
    }

    /// Searches every source in `sources` and returns one globally ranked
    /// list of at most `top_k` candidates. Sources are fetched concurrently
    /// and the query is embedded once for all of them.
    pub async fn search_filtered<R, F>(
        &self,
        request: &SearchRequest,
        sources: &[SourceHandle<R>],
        filter: &F,
        config: &SearchConfig,
    ) -> Result<SearchResult<R>>
    where
        R: Searchable + Send + Sync,
        F: RecordPredicate<R>,
    {
        let weights = validate(request, config)?;
        if sources.is_empty() {
            return Err(SearchError::NoSources);
        }
        if let Some(tag) = duplicate_tag(sources) {
            return Err(SearchError::DuplicateSource(tag));
        }
        let terms = QueryTerms::parse(&request.query);
        let embedding = self.embed(&request.query).await?;
        let plan = RetrievalPlan::cross_source(request.top_k, config, !filter.is_any());
        let fetcher = CandidateFetcher::new(config.source_timeout());
        let controller = FallbackController::new(config.mode);
        tracing::debug!(
            sources = sources.len(),
            fetch_count = plan.fetch_count,
            pool_size = plan.pool_size,
            "starting cross-source search"
        );

        let fetch_count = plan.fetch_count;
        let results = join_all(sources.iter().map(|handle| {
            let embedding = embedding.as_slice();
            let source_filter = SourceFilter::new(filter, handle.tag());
            async move {
                let fetched = controller
                    .fetch(&fetcher, handle, embedding, fetch_count, weights, &source_filter)
                    .await;
                (handle.tag(), fetched)
            }
        }))
        .await;
        let (fetched, failed) = controller.resolve(results)?;

        let mut pools = Vec::with_capacity(fetched.len());
        let mut reports = failed;
        for fetch in fetched {
            let (pool, report) = local_pool(fetch, &terms, filter, None, plan.pool_size);
            pools.push(pool);
            reports.push(report);
        }
        let reports = in_source_order(reports, sources);

        let ranked = merge::select(pools, request.top_k, config.min_relevance);
        tracing::debug!(returned = ranked.len(), "cross-source search complete");
        Ok(SearchResult {
            ranked,
            sources: reports,
        })
    }

    pub async fn search_single_source<R>(
        &self,
        request: &SearchRequest,
        source: &SourceHandle<R>,
        config: &SearchConfig,
    ) -> Result<SearchResult<R>>
    where
        R: Searchable + Send + Sync,
    {
        self.search_single_source_filtered(request, source, &AcceptAll, config)
            .await
    }

    /// Ranks one source against its own pool. A source that fails after the
    /// degraded retry fails the request, whatever the failure mode.
    pub async fn search_single_source_filtered<R, F>(
        &self,
        request: &SearchRequest,
        source: &SourceHandle<R>,
        filter: &F,
        config: &SearchConfig,
    ) -> Result<SearchResult<R>>
    where
        R: Searchable + Send + Sync,
        F: RecordPredicate<R>,
    {
        let weights = validate(request, config)?;
        let terms = QueryTerms::parse(&request.query);
        let embedding = self.embed(&request.query).await?;
        let plan = RetrievalPlan::single_source(request.top_k, config, !filter.is_any());
        let fetcher = CandidateFetcher::new(config.source_timeout());
        let source_filter = SourceFilter::new(filter, source.tag());
        let fetch = FallbackController::new(config.mode)
            .fetch(
                &fetcher,
                source,
                &embedding,
                plan.fetch_count,
                weights,
                &source_filter,
            )
            .await?;

        let (pool, report) =
            local_pool(fetch, &terms, filter, config.min_relevance, request.top_k);
        tracing::debug!(
            source = %source.tag(),
            returned = pool.ranked.len(),
            "single-source search complete"
        );
        Ok(SearchResult {
            ranked: pool.ranked,
            sources: vec![report],
        })
    }

    /// Lets `router` pick between one collection and all of them. A single
    /// route whose source is not among `sources` falls back to searching
    /// everything supplied.
    pub async fn routed_search<R>(
        &self,
        request: &SearchRequest,
        sources: &[SourceHandle<R>],
        router: &QueryRouter,
        config: &SearchConfig,
    ) -> Result<(Route, SearchResult<R>)>
    where
        R: Searchable + Send + Sync,
    {
        let route = router.route(&request.query);
        if let Route::Single(tag) = route {
            if let Some(handle) = sources.iter().find(|h| h.tag() == tag) {
                let result = self.search_single_source(request, handle, config).await?;
                return Ok((route, result));
            }
            tracing::debug!(source = %tag, "routed source not supplied, searching all sources");
        }
        let result = self.search(request, sources, config).await?;
        Ok((Route::Unified, result))
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        let embedding = self.embedder.embed(query).await.map_err(|err| {
            tracing::warn!(stage = "embed", error = %err, "query embedding failed");
            fallback::embedding_failure(&err)
        })?;
        if embedding.is_empty() {
            return Err(SearchError::EmbeddingUnavailable {
                message: "embedding service returned an empty vector".to_string(),
            });
        }
        Ok(embedding)
    }
}

fn validate(request: &SearchRequest, config: &SearchConfig) -> Result<FusionWeights> {
    config
        .validate()
        .map_err(|err| SearchError::InvalidConfig {
            message: format!("{err:#}"),
        })?;
    if request.top_k == 0 {
        return Err(SearchError::InvalidTopK);
    }
    FusionWeights::new(request.vector_weight, request.keyword_weight)
}

fn duplicate_tag<R>(sources: &[SourceHandle<R>]) -> Option<SourceTag> {
    sources.iter().enumerate().find_map(|(i, handle)| {
        sources[..i]
            .iter()
            .any(|earlier| earlier.tag() == handle.tag())
            .then_some(handle.tag())
    })
}

/// Re-checks the filter, keyword-scores, normalizes against the pool
/// itself, fuses and ranks one source's candidates, keeping the best `keep`.
fn local_pool<R, F>(
    mut fetch: SourceFetch<R>,
    terms: &QueryTerms,
    filter: &F,
    relevance_floor: Option<f32>,
    keep: usize,
) -> (SourcePool<R>, SourceReport)
where
    R: Searchable,
    F: RecordPredicate<R>,
{
    let mut candidates = std::mem::take(&mut fetch.candidates);
    let fetched = candidates.len();
    if !filter.is_any() {
        candidates.retain(|c| filter.accepts(&c.record));
        tracing::debug!(
            source = %fetch.source,
            fetched,
            kept = candidates.len(),
            "applied record filter"
        );
    }
    let range = DistanceRange::local(&candidates);
    let mut ranked: Vec<ScoredCandidate<R>> =
        fusion::score_candidates(candidates, terms, range, fetch.weights);
    fusion::rank(&mut ranked);
    fusion::apply_relevance_floor(&mut ranked, relevance_floor);
    ranked.truncate(keep);

    let report = fetch.report(ranked.len());
    (
        SourcePool {
            source: fetch.source,
            weights: fetch.weights,
            ranked,
        },
        report,
    )
}

fn in_source_order<R>(
    mut reports: Vec<SourceReport>,
    sources: &[SourceHandle<R>],
) -> Vec<SourceReport> {
    let position = |tag: SourceTag| sources.iter().position(|h| h.tag() == tag);
    reports.sort_by_key(|r| position(r.source));
    reports
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::{PolicyFilter, PolicyRecord, SourceTag, config::SearchConfig};

    use super::HybridSearchEngine;
    use crate::{
        error::SearchError,
        memory::InMemorySource,
        source::{Embedder, Neighbor, SourceFilter, SourceHandle, SourceQuery},
        types::SearchRequest,
    };

    struct FixedEmbedder;

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct EmptyEmbedder;

    #[async_trait]
    impl Embedder for EmptyEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    struct Policies(Vec<(&'static str, f32)>);

    #[async_trait]
    impl SourceQuery<PolicyRecord> for Policies {
        async fn nearest_neighbors(
            &self,
            _embedding: &[f32],
            limit: usize,
            _filter: &SourceFilter<'_, PolicyRecord>,
        ) -> anyhow::Result<Vec<Neighbor<PolicyRecord>>> {
            Ok(self
                .0
                .iter()
                .take(limit)
                .map(|(id, d)| {
                    Neighbor::new(
                        PolicyRecord {
                            policy_id: (*id).to_string(),
                            ..PolicyRecord::default()
                        },
                        *d,
                    )
                })
                .collect())
        }
    }

    fn handle() -> SourceHandle<PolicyRecord> {
        SourceHandle::new(
            SourceTag::Policy,
            Policies(vec![("a", 0.1), ("b", 0.2), ("c", 0.3)]),
        )
    }

    #[tokio::test]
    async fn rejects_zero_top_k_and_bad_weights() {
        let engine = HybridSearchEngine::new(FixedEmbedder);
        let config = SearchConfig::default();
        let err = engine
            .search(&SearchRequest::new("q", 0), &[handle()], &config)
            .await
            .expect_err("top_k");
        assert!(matches!(err, SearchError::InvalidTopK));
        let err = engine
            .search(
                &SearchRequest::new("q", 3).with_weights(-1.0, 1.0),
                &[handle()],
                &config,
            )
            .await
            .expect_err("weights");
        assert!(matches!(err, SearchError::InvalidWeights { .. }));
    }

    #[tokio::test]
    async fn no_sources_is_an_error() {
        let engine = HybridSearchEngine::new(Arc::new(FixedEmbedder));
        let err = engine
            .search::<PolicyRecord>(&SearchRequest::new("q", 3), &[], &SearchConfig::default())
            .await
            .expect_err("no sources");
        assert!(matches!(err, SearchError::NoSources));
    }

    #[tokio::test]
    async fn empty_embedding_aborts() {
        let engine = HybridSearchEngine::new(EmptyEmbedder);
        let err = engine
            .search(&SearchRequest::new("q", 3), &[handle()], &SearchConfig::default())
            .await
            .expect_err("empty embedding");
        assert!(matches!(err, SearchError::EmbeddingUnavailable { .. }));
    }

    #[tokio::test]
    async fn single_source_truncates_to_top_k() {
        let engine = HybridSearchEngine::new(FixedEmbedder);
        let result = engine
            .search_single_source(&SearchRequest::new("", 2), &handle(), &SearchConfig::default())
            .await
            .expect("search");
        let ids = result
            .ranked
            .iter()
            .map(|c| c.record.policy_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(result.sources.len(), 1);
    }

    #[tokio::test]
    async fn unusable_config_is_rejected_before_searching() {
        let engine = HybridSearchEngine::new(FixedEmbedder);
        let request = SearchRequest::new("q", 3);
        for config in [
            SearchConfig {
                merge_multiplier: 0,
                ..SearchConfig::default()
            },
            SearchConfig {
                candidate_cap: 0,
                ..SearchConfig::default()
            },
        ] {
            let err = engine
                .search(&request, &[handle()], &config)
                .await
                .expect_err("cross-source");
            assert!(matches!(err, SearchError::InvalidConfig { .. }));
            let err = engine
                .search_single_source(&request, &handle(), &config)
                .await
                .expect_err("single source");
            assert!(matches!(err, SearchError::InvalidConfig { .. }));
        }
    }

    #[tokio::test]
    async fn the_same_source_twice_is_rejected() {
        let engine = HybridSearchEngine::new(FixedEmbedder);
        let err = engine
            .search(
                &SearchRequest::new("q", 3),
                &[handle(), handle()],
                &SearchConfig::default(),
            )
            .await
            .expect_err("duplicate");
        assert!(matches!(err, SearchError::DuplicateSource(SourceTag::Policy)));
    }

    #[tokio::test]
    async fn filtered_match_beyond_the_fetch_window_is_found() {
        let policy = |id: String, status: &str| PolicyRecord {
            policy_id: id,
            status: status.to_string(),
            ..PolicyRecord::default()
        };
        let mut source = (0..40)
            .map(|i| (policy(format!("L-{i}"), "Lapsed"), vec![1.0, 0.001 * i as f32]))
            .collect::<InMemorySource<PolicyRecord>>();
        source.push(policy("A-1".to_string(), "Active"), vec![-1.0, 0.0]);
        let handle = SourceHandle::new(SourceTag::Policy, source);
        let active = PolicyFilter {
            status: Some("active".to_string()),
            ..PolicyFilter::default()
        };

        let engine = HybridSearchEngine::new(FixedEmbedder);
        let result = engine
            .search_single_source_filtered(
                &SearchRequest::new("", 1),
                &handle,
                &active,
                &SearchConfig::default(),
            )
            .await
            .expect("filtered search");
        assert_eq!(result.ranked.len(), 1);
        assert_eq!(result.ranked[0].record.policy_id, "A-1");
    }
}
