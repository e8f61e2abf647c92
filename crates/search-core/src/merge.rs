//! Cross-source selection: one globally ordered top-K list out of several
//! locally ranked pools, then redistribution into per-source buckets.

use ahash::AHashMap;
use common::SourceTag;

use crate::{
    fusion::{self, FusionWeights},
    normalize::DistanceRange,
    types::{ScoredCandidate, SourceBucket},
};

/// A source's locally ranked candidates and the weights they were fused
/// with.
#[derive(Debug, Clone)]
pub struct SourcePool<R> {
    pub source: SourceTag,
    pub weights: FusionWeights,
    pub ranked: Vec<ScoredCandidate<R>>,
}

/// Selects at most `top_k` candidates across `pools`.
///
/// With a single non-empty pool its local ranking is kept as is. With two or
/// more, every candidate is renormalized against the union of all pools,
/// re-fused with its pool's weights and the union is re-sorted before
/// truncation. Pools are concatenated in the order given, so ties resolve
/// by source order and then by fetch order.
///
/// A pool fused with `FusionWeights::VECTOR_ONLY` after a degraded fetch
/// keeps those weights here. Its candidates carry no keyword term, so
/// against a healthy pool they compete on distance alone and are not
/// charged for missing query terms.
pub fn select<R>(
    pools: Vec<SourcePool<R>>,
    top_k: usize,
    relevance_floor: Option<f32>,
) -> Vec<ScoredCandidate<R>> {
    let mut pools = pools
        .into_iter()
        .filter(|p| !p.ranked.is_empty())
        .collect::<Vec<_>>();

    let mut selected = match pools.len() {
        0 => return Vec::new(),
        1 => pools.pop().map(|p| p.ranked).unwrap_or_default(),
        _ => {
            let range = DistanceRange::global(pools.iter().map(|p| p.ranked.as_slice()));
            tracing::debug!(
                pools = pools.len(),
                min = range.map(|r| r.min()),
                max = range.map(|r| r.max()),
                "normalizing distances across sources"
            );
            let mut union = Vec::with_capacity(pools.iter().map(|p| p.ranked.len()).sum());
            for mut pool in pools {
                if let Some(range) = range {
                    fusion::rescore(&mut pool.ranked, range, pool.weights);
                }
                union.extend(pool.ranked);
            }
            fusion::rank(&mut union);
            union
        }
    };

    fusion::apply_relevance_floor(&mut selected, relevance_floor);
    selected.truncate(top_k);
    selected
}

/// Splits a ranked list into one bucket per distinct tag in `tags`, in
/// first-seen order, preserving the relative order inside each bucket.
/// Candidates whose source is not listed are left out.
pub fn partition<'a, R>(
    ranked: &'a [ScoredCandidate<R>],
    tags: &[SourceTag],
) -> Vec<SourceBucket<'a, R>> {
    let mut index = AHashMap::with_capacity(tags.len());
    let mut buckets = Vec::with_capacity(tags.len());
    for tag in tags {
        index.entry(*tag).or_insert_with(|| {
            buckets.push(SourceBucket {
                source: *tag,
                items: Vec::new(),
            });
            buckets.len() - 1
        });
    }

    for candidate in ranked {
        if let Some(&i) = index.get(&candidate.source) {
            buckets[i].items.push(candidate);
        }
    }
    buckets
}
