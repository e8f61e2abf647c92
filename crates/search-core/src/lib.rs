pub mod engine;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod filter;
pub mod fusion;
pub mod lexical;
pub mod memory;
pub mod merge;
pub mod normalize;
pub mod retrieval;
pub mod router;
pub mod source;
pub mod types;
pub mod vector;

pub use engine::HybridSearchEngine;
pub use error::{SearchError, Stage};
pub use fallback::FallbackController;
pub use fetch::CandidateFetcher;
pub use filter::{AcceptAll, RecordPredicate};
pub use fusion::FusionWeights;
pub use lexical::{QueryTerms, keyword_score};
pub use memory::InMemorySource;
pub use merge::SourcePool;
pub use normalize::DistanceRange;
pub use retrieval::RetrievalPlan;
pub use router::{QueryRouter, Route};
pub use source::{Embedder, Neighbor, SourceFilter, SourceHandle, SourceQuery};
pub use types::{
    Candidate, ScoredCandidate, SearchRequest, SearchResult, SourceBucket, SourceOutcome,
    SourceReport,
};
pub use vector::{QdrantSource, VectorSearchConfig, index_filter};
