pub mod cache;
pub mod config;
pub mod engine;

pub use cache::CachedEmbedder;
pub use config::EmbeddingConfig;
pub use engine::EmbeddingEngine;
