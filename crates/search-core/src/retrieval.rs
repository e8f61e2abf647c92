use common::config::SearchConfig;

/// How many candidates to pull from a source and how many of them to keep
/// after local ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalPlan {
    pub fetch_count: usize,
    pub pool_size: usize,
}

impl RetrievalPlan {
    /// Single-source search: over-fetch `top_k` by the configured factor
    /// (larger when a filter will discard candidates), keep `top_k`.
    pub fn single_source(top_k: usize, config: &SearchConfig, filtered: bool) -> Self {
        let factor = if filtered {
            config.filtered_overfetch
        } else {
            config.single_source_overfetch
        };
        Self {
            fetch_count: candidate_count(top_k, factor, config.candidate_cap),
            pool_size: top_k,
        }
    }

    /// Per-source plan ahead of a cross-source merge. Each source ranks a
    /// pool inflated by `merge_multiplier` so that global selection does
    /// not starve a source.
    pub fn cross_source(top_k: usize, config: &SearchConfig, filtered: bool) -> Self {
        let pool_size = top_k.saturating_mul(config.merge_multiplier);
        Self {
            pool_size,
            ..Self::single_source(pool_size, config, filtered)
        }
    }
}

pub fn candidate_count(top_k: usize, overfetch: usize, cap: usize) -> usize {
    top_k.saturating_mul(overfetch).min(cap)
}
