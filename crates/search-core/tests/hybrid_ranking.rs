use std::{
    fs,
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use common::{
    CustomerRecord, InsuranceRecord, PolicyFilter, PolicyRecord, RecordFilter, Searchable,
    SourceTag,
    config::{FailureMode, SearchConfig},
};
use proptest::prelude::*;
use search_core::{
    HybridSearchEngine, Neighbor, QueryRouter, Route, ScoredCandidate, SearchError,
    SearchRequest, SourceFilter, SourceHandle, SourceOutcome, SourceQuery, Stage,
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Fixture {
    customers: Vec<Entry<CustomerRecord>>,
    policies: Vec<Entry<PolicyRecord>>,
}

#[derive(Debug, Deserialize)]
struct Entry<T> {
    distance: f32,
    record: T,
}

fn fixture() -> Fixture {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("insurance.json");
    let raw = fs::read_to_string(path).expect("fixture");
    serde_json::from_str(&raw).expect("parse fixture")
}

/// Answers from a fixed pool in ascending distance order.
#[derive(Clone)]
struct FixtureSource(Vec<(InsuranceRecord, f32)>);

impl FixtureSource {
    fn customers() -> Self {
        Self(
            fixture()
                .customers
                .into_iter()
                .map(|e| (e.record.into(), e.distance))
                .collect(),
        )
    }

    fn policies() -> Self {
        Self(
            fixture()
                .policies
                .into_iter()
                .map(|e| (e.record.into(), e.distance))
                .collect(),
        )
    }
}

#[async_trait]
impl SourceQuery<InsuranceRecord> for FixtureSource {
    async fn nearest_neighbors(
        &self,
        _embedding: &[f32],
        limit: usize,
        filter: &SourceFilter<'_, InsuranceRecord>,
    ) -> anyhow::Result<Vec<Neighbor<InsuranceRecord>>> {
        let mut pool = self.0.clone();
        pool.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(pool
            .into_iter()
            .filter(|(record, _)| filter.accepts(record))
            .take(limit)
            .map(|(record, distance)| Neighbor::new(record, distance))
            .collect())
    }
}

struct Down;

#[async_trait]
impl SourceQuery<InsuranceRecord> for Down {
    async fn nearest_neighbors(
        &self,
        _embedding: &[f32],
        _limit: usize,
        _filter: &SourceFilter<'_, InsuranceRecord>,
    ) -> anyhow::Result<Vec<Neighbor<InsuranceRecord>>> {
        anyhow::bail!("connection refused")
    }
}

struct Stalled;

#[async_trait]
impl SourceQuery<InsuranceRecord> for Stalled {
    async fn nearest_neighbors(
        &self,
        _embedding: &[f32],
        _limit: usize,
        _filter: &SourceFilter<'_, InsuranceRecord>,
    ) -> anyhow::Result<Vec<Neighbor<InsuranceRecord>>> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(Vec::new())
    }
}

/// Answers like `FixtureSource` after a fixed delay.
struct Slow(FixtureSource, Duration);

#[async_trait]
impl SourceQuery<InsuranceRecord> for Slow {
    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SourceFilter<'_, InsuranceRecord>,
    ) -> anyhow::Result<Vec<Neighbor<InsuranceRecord>>> {
        tokio::time::sleep(self.1).await;
        self.0.nearest_neighbors(embedding, limit, filter).await
    }
}

struct StaticEmbedder;

#[async_trait]
impl search_core::Embedder for StaticEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.5, 0.5, 0.0])
    }
}

fn engine() -> HybridSearchEngine<StaticEmbedder> {
    HybridSearchEngine::new(StaticEmbedder)
}

fn both_sources() -> Vec<SourceHandle<InsuranceRecord>> {
    vec![
        SourceHandle::new(SourceTag::Customer, FixtureSource::customers()),
        SourceHandle::new(SourceTag::Policy, FixtureSource::policies()),
    ]
}

fn ids(ranked: &[ScoredCandidate<InsuranceRecord>]) -> Vec<&str> {
    ranked.iter().map(|c| c.record.id()).collect()
}

#[tokio::test]
async fn partial_keyword_match_outranks_worse_distance() {
    let policies = SourceHandle::new(SourceTag::Policy, FixtureSource::policies());
    let result = engine()
        .search_single_source(
            &SearchRequest::new("active auto insurance", 3),
            &policies,
            &SearchConfig::default(),
        )
        .await
        .expect("search");

    assert_eq!(ids(&result.ranked), vec!["P-1", "P-4", "P-2"]);
    let top = &result.ranked[0];
    assert!((top.keyword_score - 2.0 / 3.0).abs() < 1e-6);
    assert_eq!(top.normalized_distance, 0.0);
    assert!(
        result
            .ranked
            .windows(2)
            .all(|w| w[0].hybrid_score <= w[1].hybrid_score)
    );
}

#[tokio::test]
async fn empty_query_reduces_to_distance_order() {
    let policies = SourceHandle::new(SourceTag::Policy, FixtureSource::policies());
    let result = engine()
        .search_single_source(&SearchRequest::new("", 6), &policies, &SearchConfig::default())
        .await
        .expect("search");

    assert_eq!(ids(&result.ranked), vec!["P-1", "P-2", "P-4", "P-6", "P-3", "P-5"]);
    assert!(result.ranked.iter().all(|c| c.keyword_score == 0.0));
}

#[tokio::test]
async fn cross_source_results_are_globally_ordered() {
    let result = engine()
        .search(
            &SearchRequest::new("active auto insurance", 4),
            &both_sources(),
            &SearchConfig::default(),
        )
        .await
        .expect("search");

    let rendered = result
        .ranked
        .iter()
        .map(|c| {
            format!(
                "{} {} hybrid={:.3} keyword={:.3}",
                c.source,
                c.record.id(),
                c.hybrid_score,
                c.keyword_score
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    insta::assert_snapshot!(rendered, @r"
    policy P-1 hybrid=0.133 keyword=0.667
    customer C-1 hybrid=0.496 keyword=0.000
    policy P-4 hybrid=0.567 keyword=0.333
    customer C-2 hybrid=0.580 keyword=0.000
    ");

    let buckets = result.buckets();
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].source, SourceTag::Customer);
    assert_eq!(buckets[0].items.len(), 2);
    assert_eq!(buckets[1].items.len(), 2);
}

#[tokio::test]
async fn empty_source_leaves_the_other_source_in_local_order() {
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, FixtureSource(Vec::new())),
        SourceHandle::new(SourceTag::Policy, FixtureSource::policies()),
    ];
    let result = engine()
        .search(
            &SearchRequest::new("active auto insurance", 5),
            &sources,
            &SearchConfig::default(),
        )
        .await
        .expect("search");

    let buckets = result.buckets();
    assert!(buckets[0].items.is_empty());
    let policy_ids = buckets[1]
        .items
        .iter()
        .map(|c| c.record.id())
        .collect::<Vec<_>>();
    assert_eq!(policy_ids, vec!["P-1", "P-4", "P-2", "P-6", "P-3"]);
    assert!(matches!(
        result.report(SourceTag::Customer).map(|r| &r.outcome),
        Some(SourceOutcome::Ok { candidates: 0 })
    ));
}

#[tokio::test]
async fn sources_are_fetched_concurrently() {
    let delay = Duration::from_millis(200);
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, Slow(FixtureSource::customers(), delay)),
        SourceHandle::new(SourceTag::Policy, Slow(FixtureSource::policies(), delay)),
    ];
    let started = Instant::now();
    let result = engine()
        .search(
            &SearchRequest::new("auto", 4),
            &sources,
            &SearchConfig::default(),
        )
        .await
        .expect("search");
    let elapsed = started.elapsed();

    assert_eq!(result.ranked.len(), 4);
    assert!(elapsed >= delay);
    assert!(elapsed < delay * 2 - Duration::from_millis(50), "took {elapsed:?}");
}

#[tokio::test]
async fn best_effort_keeps_the_surviving_source() {
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, Down),
        SourceHandle::new(SourceTag::Policy, FixtureSource::policies()),
    ];
    let result = engine()
        .search(
            &SearchRequest::new("active auto insurance", 3),
            &sources,
            &SearchConfig::default(),
        )
        .await
        .expect("best effort");

    assert_eq!(ids(&result.ranked), vec!["P-1", "P-4", "P-2"]);
    let report = result.report(SourceTag::Customer).expect("customer report");
    match &report.outcome {
        SourceOutcome::Failed(err) => {
            assert_eq!(err.source_tag(), Some(SourceTag::Customer));
            assert_eq!(err.stage(), Some(Stage::Fetch));
            assert!(err.is_retryable());
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(result.sources[0].source, SourceTag::Customer);
}

#[tokio::test]
async fn strict_mode_aborts_on_source_failure() {
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, Down),
        SourceHandle::new(SourceTag::Policy, FixtureSource::policies()),
    ];
    let config = SearchConfig {
        mode: FailureMode::Strict,
        ..SearchConfig::default()
    };
    let err = engine()
        .search(&SearchRequest::new("active auto insurance", 3), &sources, &config)
        .await
        .expect_err("strict");
    assert!(matches!(
        err,
        SearchError::IndexUnavailable {
            tag: SourceTag::Customer,
            stage: Stage::Fetch,
            ..
        }
    ));
}

#[tokio::test]
async fn every_source_down_is_reported_with_each_cause() {
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, Down),
        SourceHandle::new(SourceTag::Policy, Down),
    ];
    let err = engine()
        .search(&SearchRequest::new("q", 3), &sources, &SearchConfig::default())
        .await
        .expect_err("all down");
    match err {
        SearchError::AllSourcesUnavailable(errors) => {
            let tags = errors.iter().filter_map(SearchError::source_tag).collect::<Vec<_>>();
            assert_eq!(tags, vec![SourceTag::Customer, SourceTag::Policy]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn degraded_path_scores_by_vector_only() {
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, Down).with_degraded(FixtureSource::customers()),
        SourceHandle::new(SourceTag::Policy, FixtureSource::policies()),
    ];
    let result = engine()
        .search(
            &SearchRequest::new("engineer", 8),
            &sources,
            &SearchConfig::default(),
        )
        .await
        .expect("degraded search");

    assert!(matches!(
        result.report(SourceTag::Customer).map(|r| &r.outcome),
        Some(SourceOutcome::Degraded { candidates: 4, .. })
    ));
    let customers = result.for_source(SourceTag::Customer).collect::<Vec<_>>();
    assert!(!customers.is_empty());
    for candidate in customers {
        assert!((candidate.hybrid_score - candidate.normalized_distance).abs() < 1e-6);
    }
}

#[tokio::test]
async fn stalled_source_times_out_as_a_fetch_failure() {
    let sources = vec![
        SourceHandle::new(SourceTag::Customer, Stalled),
        SourceHandle::new(SourceTag::Policy, FixtureSource::policies()),
    ];
    let config = SearchConfig {
        source_timeout_ms: 50,
        ..SearchConfig::default()
    };
    let result = engine()
        .search(&SearchRequest::new("active", 3), &sources, &config)
        .await
        .expect("timeout is not fatal");

    assert!(matches!(
        result.report(SourceTag::Customer).map(|r| &r.outcome),
        Some(SourceOutcome::Failed(SearchError::SourceTimeout { after_ms: 50, .. }))
    ));
    assert_eq!(result.len(), 3);
}

#[tokio::test]
async fn record_filter_only_narrows_its_own_collection() {
    let filter = RecordFilter::Policy(PolicyFilter {
        status: Some("active".to_string()),
        ..PolicyFilter::default()
    });
    let result = engine()
        .search_filtered(
            &SearchRequest::new("active auto insurance", 10),
            &both_sources(),
            &filter,
            &SearchConfig::default(),
        )
        .await
        .expect("filtered search");

    let policies = result
        .for_source(SourceTag::Policy)
        .map(|c| c.record.id())
        .collect::<Vec<_>>();
    assert_eq!(policies, vec!["P-1", "P-6"]);
    assert_eq!(result.for_source(SourceTag::Customer).count(), 4);
}

#[tokio::test]
async fn relevance_floor_drops_weak_matches() {
    let config = SearchConfig {
        min_relevance: Some(0.5),
        ..SearchConfig::default()
    };
    let result = engine()
        .search(
            &SearchRequest::new("active auto insurance", 5),
            &both_sources(),
            &config,
        )
        .await
        .expect("search");
    assert_eq!(ids(&result.ranked), vec!["P-1", "C-1"]);
}

#[tokio::test]
async fn routed_search_narrows_to_policies() {
    let (route, result) = engine()
        .routed_search(
            &SearchRequest::new("active auto insurance", 3),
            &both_sources(),
            &QueryRouter::default(),
            &SearchConfig::default(),
        )
        .await
        .expect("routed search");
    assert_eq!(route, Route::Single(SourceTag::Policy));
    assert_eq!(ids(&result.ranked), vec!["P-1", "P-4", "P-2"]);
    assert_eq!(result.sources.len(), 1);
}

#[tokio::test]
async fn repeated_requests_return_identical_rankings() {
    let request = SearchRequest::new("engineer active", 5);
    let config = SearchConfig::default();
    let sources = both_sources();
    let first = engine().search(&request, &sources, &config).await.expect("first");
    let second = engine().search(&request, &sources, &config).await.expect("second");
    assert_eq!(first.ranked, second.ranked);
}

proptest! {
    #[test]
    fn scores_stay_in_range_for_any_weights(
        vector_weight in 0.0f32..4.0,
        keyword_weight in 0.0f32..4.0,
        top_k in 1usize..12,
    ) {
        prop_assume!(vector_weight + keyword_weight > 0.0);
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        let request = SearchRequest::new("active engineer auto", top_k)
            .with_weights(vector_weight, keyword_weight);
        let result = runtime
            .block_on(engine().search(&request, &both_sources(), &SearchConfig::default()))
            .expect("search");

        prop_assert_eq!(result.len(), top_k.min(10));
        for candidate in &result.ranked {
            prop_assert!((0.0..=1.0).contains(&candidate.keyword_score));
            prop_assert!((0.0..=1.0).contains(&candidate.normalized_distance));
            prop_assert!((-1e-6..=1.0 + 1e-6).contains(&candidate.hybrid_score));
        }
        prop_assert!(result.ranked.windows(2).all(|w| w[0].hybrid_score <= w[1].hybrid_score));
    }
}
