use std::{collections::HashMap, sync::Arc};

use anyhow::{Context, Result};
use async_trait::async_trait;
use common::{CustomerRecord, IndexCondition, InsuranceRecord, PolicyRecord};
use qdrant_client::{
    Qdrant,
    qdrant::{Condition, Distance, Filter, QueryPointsBuilder, Range, Value, value::Kind},
};
use serde::de::DeserializeOwned;

use crate::source::{Neighbor, SourceFilter, SourceQuery};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorSearchConfig {
    pub collection: String,
    pub distance: Distance,
    pub vector_dim: usize,
}

impl Default for VectorSearchConfig {
    fn default() -> Self {
        Self {
            collection: "customers".to_string(),
            distance: Distance::Cosine,
            vector_dim: 3072,
        }
    }
}

impl VectorSearchConfig {
    pub fn new(collection: impl Into<String>, vector_dim: usize) -> Self {
        Self {
            collection: collection.into(),
            vector_dim,
            ..Self::default()
        }
    }

    /// Qdrant reports similarity for Cosine and Dot (higher is closer) and
    /// distance for Euclid and Manhattan. Everything leaving this adapter is
    /// a distance.
    pub fn score_to_distance(&self, score: f32) -> f32 {
        match self.distance {
            Distance::Euclid | Distance::Manhattan => score,
            Distance::Cosine | Distance::Dot | Distance::UnknownDistance => 1.0 - score,
        }
    }
}

pub type PayloadDecoder<R> = fn(serde_json::Value) -> Result<R>;

/// Nearest-neighbor queries against one Qdrant collection, decoding each
/// point's payload into a record.
pub struct QdrantSource<R> {
    client: Arc<Qdrant>,
    config: VectorSearchConfig,
    decode: PayloadDecoder<R>,
}

impl<R> QdrantSource<R> {
    pub fn new(client: Arc<Qdrant>, config: VectorSearchConfig, decode: PayloadDecoder<R>) -> Self {
        Self {
            client,
            config,
            decode,
        }
    }

    pub const fn config(&self) -> &VectorSearchConfig {
        &self.config
    }
}

impl QdrantSource<InsuranceRecord> {
    pub fn customers(client: Arc<Qdrant>, config: VectorSearchConfig) -> Self {
        Self::new(client, config, decode_as::<CustomerRecord, InsuranceRecord>)
    }

    pub fn policies(client: Arc<Qdrant>, config: VectorSearchConfig) -> Self {
        Self::new(client, config, decode_as::<PolicyRecord, InsuranceRecord>)
    }
}

#[async_trait]
impl<R: Send + Sync> SourceQuery<R> for QdrantSource<R> {
    async fn nearest_neighbors(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: &SourceFilter<'_, R>,
    ) -> Result<Vec<Neighbor<R>>> {
        anyhow::ensure!(
            embedding.len() == self.config.vector_dim,
            "collection {} expects {}-dimensional vectors, query has {}",
            self.config.collection,
            self.config.vector_dim,
            embedding.len()
        );
        let mut query = QueryPointsBuilder::new(self.config.collection.clone())
            .query(embedding.to_vec())
            .limit(limit as u64)
            .with_payload(true);
        if let Some(payload_filter) = index_filter(filter.conditions()) {
            query = query.filter(payload_filter);
        }
        let response = self
            .client
            .query(query)
            .await
            .with_context(|| format!("qdrant query on {} failed", self.config.collection))?;

        response
            .result
            .into_iter()
            .map(|point| {
                let record = (self.decode)(payload_to_json(point.payload))
                    .with_context(|| format!("undecodable payload in {}", self.config.collection))?;
                Ok(Neighbor::new(record, self.config.score_to_distance(point.score)))
            })
            .collect()
    }
}

/// Payload filter evaluated by Qdrant during the search, or `None` when
/// there is nothing to push down.
pub fn index_filter(conditions: &[IndexCondition]) -> Option<Filter> {
    if conditions.is_empty() {
        return None;
    }
    Some(Filter::all(conditions.iter().map(|condition| match condition {
        IndexCondition::OneOf { field, values } => Condition::matches(*field, values.clone()),
        IndexCondition::Range { field, min, max } => Condition::range(
            *field,
            Range {
                gte: *min,
                lte: *max,
                ..Range::default()
            },
        ),
    })))
}

/// Deserializes a payload as `T` and lifts it into the record type `R`.
pub fn decode_as<T, R>(payload: serde_json::Value) -> Result<R>
where
    T: DeserializeOwned + Into<R>,
{
    Ok(serde_json::from_value::<T>(payload)?.into())
}

fn payload_to_json(payload: HashMap<String, Value>) -> serde_json::Value {
    serde_json::Value::Object(
        payload
            .into_iter()
            .map(|(key, value)| (key, value_to_json(value)))
            .collect(),
    )
}

fn value_to_json(value: Value) -> serde_json::Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => serde_json::Value::Null,
        Some(Kind::BoolValue(v)) => serde_json::Value::Bool(v),
        Some(Kind::IntegerValue(v)) => v.into(),
        Some(Kind::DoubleValue(v)) => serde_json::Number::from_f64(v)
            .map_or(serde_json::Value::Null, serde_json::Value::Number),
        Some(Kind::StringValue(v)) => serde_json::Value::String(v),
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(object)) => payload_to_json(object.fields),
    }
}
