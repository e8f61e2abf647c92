use common::config::AppConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingConfig {
    /// Base URL of an Azure OpenAI resource, or a full OpenAI-compatible
    /// `/embeddings` URL.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub vector_dim: usize,
    pub timeout_ms: u64,
    pub cache_capacity: usize,
    pub allow_pseudo_fallback: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: "text-embedding-3-large".to_string(),
            api_version: "2024-02-01".to_string(),
            vector_dim: 3072,
            timeout_ms: 10_000,
            cache_capacity: 256,
            allow_pseudo_fallback: std::env::var("COVERWISE_ALLOW_PSEUDO_EMBED")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(cfg!(test)),
        }
    }
}

impl EmbeddingConfig {
    pub fn from_app(app: &AppConfig) -> Self {
        Self {
            endpoint: app.embedding_endpoint.clone(),
            api_key: app.embedding_api_key.clone(),
            deployment: app.embedding_deployment.clone(),
            vector_dim: app.embedding_dim,
            timeout_ms: app.embedding_timeout_ms,
            cache_capacity: app.embedding_cache_capacity,
            ..Self::default()
        }
    }

    /// Azure resources get the deployment path and `api-version` query;
    /// anything already ending in `/embeddings` is used as is.
    pub fn request_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?.trim_end_matches('/');
        if endpoint.is_empty() {
            return None;
        }
        if endpoint.ends_with("/embeddings") {
            return Some(endpoint.to_string());
        }
        Some(format!(
            "{endpoint}/openai/deployments/{}/embeddings?api-version={}",
            self.deployment, self.api_version
        ))
    }
}
