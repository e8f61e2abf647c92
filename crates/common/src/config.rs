use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// A failed source is reported and the remaining sources still rank.
    #[default]
    BestEffort,
    /// Any source failure aborts the whole request.
    Strict,
}

/// Tuning for one ranking request. Passed explicitly into every engine call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchConfig {
    pub default_top_k: usize,
    pub vector_weight: f32,
    pub keyword_weight: f32,
    pub single_source_overfetch: usize,
    pub merge_multiplier: usize,
    pub filtered_overfetch: usize,
    pub candidate_cap: usize,
    pub source_timeout_ms: u64,
    pub mode: FailureMode,
    pub min_relevance: Option<f32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            vector_weight: 0.6,
            keyword_weight: 0.4,
            single_source_overfetch: 3,
            merge_multiplier: 2,
            filtered_overfetch: 5,
            candidate_cap: 100,
            source_timeout_ms: 5_000,
            mode: FailureMode::BestEffort,
            min_relevance: None,
        }
    }
}

impl SearchConfig {
    pub const fn source_timeout(&self) -> Duration {
        Duration::from_millis(self.source_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, weight) in [
            ("vector_weight", self.vector_weight),
            ("keyword_weight", self.keyword_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                anyhow::bail!("{name} must be a finite non-negative number, got {weight}");
            }
        }
        if self.default_top_k == 0 {
            anyhow::bail!("default_top_k must be greater than zero");
        }
        if self.single_source_overfetch == 0
            || self.merge_multiplier == 0
            || self.filtered_overfetch == 0
        {
            anyhow::bail!("over-fetch factors must be greater than zero");
        }
        if self.candidate_cap == 0 {
            anyhow::bail!("candidate_cap must be greater than zero");
        }
        if let Some(floor) = self.min_relevance
            && !(0.0..=1.0).contains(&floor)
        {
            anyhow::bail!("min_relevance must lie in [0, 1], got {floor}");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub qdrant_url: String,
    pub customer_collection: String,
    pub policy_collection: String,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_deployment: String,
    /// Must equal the dimension of the deployment and of both collections.
    pub embedding_dim: usize,
    pub embedding_timeout_ms: u64,
    /// Cached query embeddings; 0 disables the cache.
    pub embedding_cache_capacity: usize,
    pub search: SearchConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            qdrant_url: "http://localhost:6334".to_string(),
            customer_collection: "customers".to_string(),
            policy_collection: "policies".to_string(),
            embedding_endpoint: None,
            embedding_api_key: None,
            embedding_deployment: "text-embedding-3-large".to_string(),
            embedding_dim: 3072,
            embedding_timeout_ms: 10_000,
            embedding_cache_capacity: 256,
            search: SearchConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "config file missing, using defaults");
            Self::default()
        };

        if let Ok(url) = std::env::var("COVERWISE_QDRANT_URL") {
            cfg.qdrant_url = url;
        }
        if let Ok(name) = std::env::var("COVERWISE_CUSTOMER_COLLECTION") {
            cfg.customer_collection = name;
        }
        if let Ok(name) = std::env::var("COVERWISE_POLICY_COLLECTION") {
            cfg.policy_collection = name;
        }
        if let Ok(endpoint) = std::env::var("COVERWISE_EMBEDDING_ENDPOINT") {
            cfg.embedding_endpoint = Some(endpoint).filter(|e| !e.trim().is_empty());
        }
        if let Ok(key) = std::env::var("COVERWISE_EMBEDDING_API_KEY") {
            cfg.embedding_api_key = Some(key);
        }
        if let Ok(dim) = std::env::var("COVERWISE_EMBEDDING_DIM") {
            cfg.embedding_dim = dim.parse().unwrap_or(cfg.embedding_dim);
        }
        if let Ok(top_k) = std::env::var("COVERWISE_DEFAULT_TOP_K") {
            cfg.search.default_top_k = top_k.parse().unwrap_or(cfg.search.default_top_k);
        }
        if let Ok(strict) = std::env::var("COVERWISE_STRICT")
            && strict.eq_ignore_ascii_case("true")
        {
            cfg.search.mode = FailureMode::Strict;
        }

        if cfg.embedding_dim == 0 || cfg.embedding_timeout_ms == 0 {
            anyhow::bail!(
                "embedding_dim and embedding_timeout_ms must be greater than zero in {}",
                path.display()
            );
        }
        cfg.search
            .validate()
            .with_context(|| format!("invalid [search] section in {}", path.display()))?;
        Ok(cfg)
    }
}
