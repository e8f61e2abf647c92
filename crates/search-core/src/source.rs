//! Collaborator contracts the engine ranks against: the embedding service
//! and one nearest-neighbor query interface per collection.

use std::{fmt, sync::Arc};

use async_trait::async_trait;
use common::{IndexCondition, SourceTag};

use crate::filter::{AcceptAll, RecordPredicate};

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Arc<E> {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        (**self).embed(text).await
    }
}

/// A record returned by a nearest-neighbor query. Lower distance is more
/// similar; the scale is source dependent.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<R> {
    pub record: R,
    pub raw_distance: f32,
}

impl<R> Neighbor<R> {
    pub const fn new(record: R, raw_distance: f32) -> Self {
        Self {
            record,
            raw_distance,
        }
    }
}

/// Record filter as handed to one source: the predicate itself and the
/// subset of it that the source's index can evaluate while searching.
pub struct SourceFilter<'a, R> {
    predicate: &'a dyn RecordPredicate<R>,
    conditions: Vec<IndexCondition>,
}

impl<'a, R> SourceFilter<'a, R> {
    pub fn new(predicate: &'a dyn RecordPredicate<R>, source: SourceTag) -> Self {
        let conditions = if predicate.is_any() {
            Vec::new()
        } else {
            predicate.index_conditions(source)
        };
        Self {
            predicate,
            conditions,
        }
    }

    pub fn unfiltered() -> Self {
        Self {
            predicate: &AcceptAll,
            conditions: Vec::new(),
        }
    }

    pub fn accepts(&self, record: &R) -> bool {
        self.predicate.accepts(record)
    }

    pub fn is_any(&self) -> bool {
        self.predicate.is_any()
    }

    pub fn conditions(&self) -> &[IndexCondition] {
        &self.conditions
    }
}

impl<R> fmt::Debug for SourceFilter<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFilter")
            .field("is_any", &self.is_any())
            .field("conditions", &self.conditions)
            .finish()
    }
}

/// Nearest-neighbor lookup over one collection. Results are ordered by
/// ascending distance and, when `filter` is not `is_any`, contain only
/// records it accepts; `limit` counts accepted records.
#[async_trait]
pub trait SourceQuery<R>: Send + Sync {
    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SourceFilter<'_, R>,
    ) -> anyhow::Result<Vec<Neighbor<R>>>;
}

/// One collection as seen by the engine: its tag, the primary index and an
/// optional degraded path tried once when the primary fails.
pub struct SourceHandle<R> {
    tag: SourceTag,
    primary: Arc<dyn SourceQuery<R>>,
    degraded: Option<Arc<dyn SourceQuery<R>>>,
}

impl<R> SourceHandle<R> {
    pub fn new(tag: SourceTag, primary: impl SourceQuery<R> + 'static) -> Self {
        Self::from_arc(tag, Arc::new(primary))
    }

    pub fn from_arc(tag: SourceTag, primary: Arc<dyn SourceQuery<R>>) -> Self {
        Self {
            tag,
            primary,
            degraded: None,
        }
    }

    #[must_use]
    pub fn with_degraded(mut self, degraded: impl SourceQuery<R> + 'static) -> Self {
        self.degraded = Some(Arc::new(degraded));
        self
    }

    pub const fn tag(&self) -> SourceTag {
        self.tag
    }

    pub fn primary(&self) -> &dyn SourceQuery<R> {
        self.primary.as_ref()
    }

    pub fn degraded(&self) -> Option<&dyn SourceQuery<R>> {
        self.degraded.as_deref()
    }
}

impl<R> Clone for SourceHandle<R> {
    fn clone(&self) -> Self {
        Self {
            tag: self.tag,
            primary: Arc::clone(&self.primary),
            degraded: self.degraded.clone(),
        }
    }
}

impl<R> fmt::Debug for SourceHandle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceHandle")
            .field("tag", &self.tag)
            .field("degraded", &self.degraded.is_some())
            .finish_non_exhaustive()
    }
}
