use std::num::NonZeroUsize;

use anyhow::Result;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use search_core::Embedder;

/// Remembers the embeddings of recent queries. Surrounding whitespace is
/// trimmed before both the lookup and the inner call. Failures are never
/// cached.
pub struct CachedEmbedder<E> {
    inner: E,
    cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl<E: Embedder> CachedEmbedder<E> {
    pub fn new(inner: E, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub const fn inner(&self) -> &E {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.cache.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.lock().is_empty()
    }
}

fn cache_key(text: &str) -> String {
    text.trim().to_string()
}

#[async_trait]
impl<E: Embedder> Embedder for CachedEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key(text);
        let cached = self.cache.lock().get(&key).cloned();
        if let Some(hit) = cached {
            tracing::debug!(stage = "embed", "query embedding cache hit");
            return Ok(hit);
        }
        let vector = self.inner.embed(&key).await?;
        self.cache.lock().put(key, vector.clone());
        Ok(vector)
    }
}
