pub mod config;
pub mod filter;
pub mod records;

use std::{borrow::Cow, fmt};

use schemars::JsonSchema;
use schemars::Schema;
use serde::{Deserialize, Serialize};

pub use filter::{CustomerFilter, IndexCondition, PolicyFilter, RecordFilter};
pub use records::{Address, CustomerMetadata, CustomerRecord, InsuranceRecord, PolicyRecord};

/// Identifies the independently indexed collection a record came from.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    Customer,
    Policy,
}

impl SourceTag {
    pub const ALL: [Self; 2] = [Self::Customer, Self::Policy];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Policy => "policy",
        }
    }

    /// Plural key used when results are redistributed per source.
    pub const fn bucket_name(self) -> &'static str {
        match self {
            Self::Customer => "customers",
            Self::Policy => "policies",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability shared by every record type the ranking engine can score.
pub trait Searchable {
    fn id(&self) -> &str;

    fn source_tag(&self) -> SourceTag;

    /// Fields concatenated into the keyword haystack, in a stable order.
    fn searchable_fields(&self) -> Vec<Cow<'_, str>>;
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_top_k", alias = "topK")]
    pub top_k: usize,
    #[serde(default = "default_vector_weight", alias = "vectorWeight")]
    pub vector_weight: f32,
    #[serde(default = "default_keyword_weight", alias = "keywordWeight")]
    pub keyword_weight: f32,
    #[serde(default)]
    pub strict: bool,
}

fn default_top_k() -> usize {
    5
}

const fn default_vector_weight() -> f32 {
    0.6
}

const fn default_keyword_weight() -> f32 {
    0.4
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ScoredItem {
    pub id: String,
    pub source: SourceTag,
    pub raw_distance: f32,
    pub normalized_distance: f32,
    pub keyword_score: f32,
    pub hybrid_score: f32,
    pub record: InsuranceRecord,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    Ok,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct SourceStatus {
    pub source: SourceTag,
    pub state: SourceState,
    pub candidates: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SearchResponse {
    pub customers: Vec<ScoredItem>,
    pub policies: Vec<ScoredItem>,
    pub sources: Vec<SourceStatus>,
}

impl SearchResponse {
    pub fn push(&mut self, item: ScoredItem) {
        match item.source {
            SourceTag::Customer => self.customers.push(item),
            SourceTag::Policy => self.policies.push(item),
        }
    }

    pub fn len(&self) -> usize {
        self.customers.len() + self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RouteResponse {
    pub query: String,
    pub route: String,
    pub sources: Vec<SourceTag>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct SchemaBundle {
    pub search_params: Schema,
    pub search_response: Schema,
    pub route_response: Schema,
}

pub fn schema_bundle() -> SchemaBundle {
    SchemaBundle {
        search_params: schemars::schema_for!(SearchParams),
        search_response: schemars::schema_for!(SearchResponse),
        route_response: schemars::schema_for!(RouteResponse),
    }
}
