use async_trait::async_trait;

use crate::source::{Neighbor, SourceFilter, SourceQuery};

/// Brute-force cosine scan over records held in memory. Serves as the
/// degraded path when a collection's vector index is unreachable.
#[derive(Debug, Clone)]
pub struct InMemorySource<R> {
    entries: Vec<(R, Vec<f32>)>,
}

impl<R> InMemorySource<R> {
    pub const fn new(entries: Vec<(R, Vec<f32>)>) -> Self {
        Self { entries }
    }

    pub fn push(&mut self, record: R, embedding: Vec<f32>) {
        self.entries.push((record, embedding));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<R> FromIterator<(R, Vec<f32>)> for InMemorySource<R> {
    fn from_iter<I: IntoIterator<Item = (R, Vec<f32>)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[async_trait]
impl<R: Clone + Send + Sync> SourceQuery<R> for InMemorySource<R> {
    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SourceFilter<'_, R>,
    ) -> anyhow::Result<Vec<Neighbor<R>>> {
        if let Some((_, stored)) = self
            .entries
            .iter()
            .find(|(_, stored)| stored.len() != embedding.len())
        {
            anyhow::bail!(
                "embedding dimension mismatch: query has {}, stored vector has {}",
                embedding.len(),
                stored.len()
            );
        }
        let mut scored = self
            .entries
            .iter()
            .filter(|(record, _)| filter.accepts(record))
            .map(|(record, stored)| (cosine_distance(embedding, stored), record))
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(distance, record)| Neighbor::new(record.clone(), distance))
            .collect())
    }
}

/// `1 - cosine similarity`, in `[0, 2]`. A zero vector is treated as
/// orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 1.0;
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (av, bv) in a.iter().zip(b) {
        dot += av * bv;
        na += av * av;
        nb += bv * bv;
    }
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na.sqrt() * nb.sqrt())
}
