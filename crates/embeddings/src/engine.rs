use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::EmbeddingConfig;

pub struct EmbeddingEngine {
    config: EmbeddingConfig,
    backend: EmbeddingBackend,
}

enum EmbeddingBackend {
    Http(HttpBackend),
    Pseudo,
    Unavailable(String),
}

struct HttpBackend {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl EmbeddingEngine {
    pub fn new(config: EmbeddingConfig) -> Self {
        let backend = match build_backend(&config) {
            Ok(backend) => backend,
            Err(err) => EmbeddingBackend::Unavailable(format!("{err:#}")),
        };
        Self { config, backend }
    }

    pub const fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    pub const fn backend_name(&self) -> &'static str {
        match self.backend {
            EmbeddingBackend::Http(_) => "http",
            EmbeddingBackend::Pseudo => "pseudo",
            EmbeddingBackend::Unavailable(_) => "unavailable",
        }
    }

    pub async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        match &self.backend {
            EmbeddingBackend::Http(backend) => {
                let vectors = backend.embed_batch(inputs, &self.config).await?;
                if vectors.len() != inputs.len() {
                    return Err(anyhow!(
                        "embedding service returned {} vectors for {} inputs",
                        vectors.len(),
                        inputs.len()
                    ));
                }
                check_vector_dim(&vectors, self.config.vector_dim)?;
                Ok(vectors)
            }
            EmbeddingBackend::Pseudo => Ok(inputs
                .iter()
                .map(|input| pseudo_embed(input, self.config.vector_dim))
                .collect()),
            EmbeddingBackend::Unavailable(msg) => Err(anyhow!(
                "embedding unavailable: {msg}. set COVERWISE_ALLOW_PSEUDO_EMBED=true only for offline runs"
            )),
        }
    }
}

#[async_trait]
impl search_core::Embedder for EmbeddingEngine {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| anyhow!("embedding service returned no vector"))
    }
}

impl HttpBackend {
    async fn embed_batch(&self, inputs: &[String], cfg: &EmbeddingConfig) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "input": inputs,
            "model": cfg.deployment,
        });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key).bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("embedding request to {} failed", self.url))?;
        let json: Value = response
            .error_for_status()
            .context("embedding service rejected the request")?
            .json()
            .await
            .context("embedding response is not JSON")?;
        parse_embedding_response(&json)
    }
}

fn build_backend(config: &EmbeddingConfig) -> Result<EmbeddingBackend> {
    let Some(url) = config.request_url() else {
        if config.allow_pseudo_fallback {
            tracing::warn!(
                stage = "embed",
                "no embedding endpoint configured, using pseudo embeddings"
            );
            return Ok(EmbeddingBackend::Pseudo);
        }
        return Err(anyhow!("no embedding endpoint configured"));
    };
    let client = Client::builder()
        .timeout(Duration::from_millis(config.timeout_ms))
        .build()
        .context("failed to build embedding http client")?;
    Ok(EmbeddingBackend::Http(HttpBackend {
        client,
        url,
        api_key: config.api_key.clone(),
    }))
}

/// Reads `data[].embedding`, ordered by each item's `index`.
fn parse_embedding_response(json: &Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow!("embedding response is missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (fallback_index, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(fallback_index);
        let embedding = item
            .get("embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("embedding item {index} has no embedding array"))?;
        let vector = embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|n| n as f32)
                    .ok_or_else(|| anyhow!("embedding values must be numeric"))
            })
            .collect::<Result<Vec<_>>>()?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Vectors of another dimension cannot be compared with the collections,
/// so a deployment that disagrees with `vector_dim` is an error.
fn check_vector_dim(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if let Some(vector) = vectors.iter().find(|v| v.len() != expected) {
        return Err(anyhow!(
            "embedding service returned {}-dimensional vectors, expected {expected}",
            vector.len()
        ));
    }
    Ok(())
}

/// Deterministic byte-folding vector. Only meaningful against collections
/// indexed with the same function.
fn pseudo_embed(input: &str, dim: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dim.max(1)];
    let n = out.len();
    for (idx, b) in input.to_lowercase().as_bytes().iter().enumerate() {
        out[idx % n] += f32::from(*b) / 255.0;
    }
    out
}
