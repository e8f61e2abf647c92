//! Min-max rescaling of raw distances into `[0, 1]`, `0` being the best
//! distance observed in the reference set.
//!
//! A single-source search uses its own pool as the reference set. Before
//! candidates from different sources are compared, the reference set must
//! be the union of every pool being merged, since the collections do not
//! share a distance scale.

use crate::types::{Candidate, ScoredCandidate};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceRange {
    min: f32,
    max: f32,
}

impl DistanceRange {
    /// Range over the finite values of `distances`; `None` when there are
    /// none.
    pub fn from_distances(distances: impl IntoIterator<Item = f32>) -> Option<Self> {
        distances
            .into_iter()
            .filter(|d| d.is_finite())
            .fold(None, |range, d| match range {
                None => Some(Self { min: d, max: d }),
                Some(Self { min, max }) => Some(Self {
                    min: min.min(d),
                    max: max.max(d),
                }),
            })
    }

    /// Reference set made of one source's pool.
    pub fn local<R>(candidates: &[Candidate<R>]) -> Option<Self> {
        Self::from_distances(candidates.iter().map(|c| c.raw_distance))
    }

    /// Reference set made of every pool taking part in a merge.
    pub fn global<'a, R: 'a>(
        pools: impl IntoIterator<Item = &'a [ScoredCandidate<R>]>,
    ) -> Option<Self> {
        Self::from_distances(
            pools
                .into_iter()
                .flat_map(|pool| pool.iter().map(|c| c.raw_distance)),
        )
    }

    pub const fn min(&self) -> f32 {
        self.min
    }

    pub const fn max(&self) -> f32 {
        self.max
    }

    pub fn is_degenerate(&self) -> bool {
        self.max <= self.min
    }

    /// Maps `raw` into `[0, 1]`. When every reference distance is equal the
    /// result is `0` for all.
    pub fn normalize(&self, raw: f32) -> f32 {
        if self.is_degenerate() {
            return 0.0;
        }
        ((raw - self.min) / (self.max - self.min)).clamp(0.0, 1.0)
    }
}
