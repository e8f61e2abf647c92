use std::{num::NonZeroUsize, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::{
    CustomerFilter, InsuranceRecord, PolicyFilter, RecordFilter, RouteResponse, SearchParams,
    SourceTag,
    config::{AppConfig, FailureMode},
};
use embeddings::{CachedEmbedder, EmbeddingConfig, EmbeddingEngine};
use qdrant_client::Qdrant;
use search_core::{
    Embedder, HybridSearchEngine, QdrantSource, QueryRouter, SearchRequest, SourceHandle,
    VectorSearchConfig,
};

#[derive(Debug, Parser)]
#[command(name = "coverwise-search")]
#[command(about = "Hybrid semantic and keyword search over customers and policies")]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, global = true, default_value = "coverwise.toml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Rank customers and policies together.
    Search(QueryArgs),
    /// Rank the customer collection only.
    Customers(QueryArgs),
    /// Rank the policy collection only.
    Policies(QueryArgs),
    /// Print which collections a query would be routed to.
    Route {
        #[arg(long, short)]
        query: String,
    },
    /// Print JSON schemas of the request and response documents.
    Schema,
}

#[derive(Debug, Args)]
struct QueryArgs {
    #[arg(long, short)]
    query: String,
    #[arg(long)]
    top_k: Option<usize>,
    #[arg(long)]
    vector_weight: Option<f32>,
    #[arg(long)]
    keyword_weight: Option<f32>,
    /// Fail the whole request when any collection fails.
    #[arg(long)]
    strict: bool,
    /// Attribute filter as JSON, e.g. `{"status":"active"}` for policies.
    #[arg(long)]
    filter: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Route { query } => route(&query),
        Commands::Schema => print_json(&common::schema_bundle()),
        Commands::Search(args) => search(&cli.config, args, None).await,
        Commands::Customers(args) => search(&cli.config, args, Some(SourceTag::Customer)).await,
        Commands::Policies(args) => search(&cli.config, args, Some(SourceTag::Policy)).await,
    }
}

fn route(query: &str) -> anyhow::Result<()> {
    let route = QueryRouter::default().route(query);
    print_json(&RouteResponse {
        query: query.to_string(),
        route: route.label().to_string(),
        sources: route.sources(),
    })
}

async fn search(
    config_path: &std::path::Path,
    args: QueryArgs,
    only: Option<SourceTag>,
) -> anyhow::Result<()> {
    let mut app = AppConfig::load(config_path)?;
    let params = query_params(&app, &args);
    if params.strict {
        app.search.mode = FailureMode::Strict;
    }
    let filter = parse_filter(args.filter.as_deref(), only)?;
    let request = SearchRequest::from_params(&params);

    let embedding_config = EmbeddingConfig::from_app(&app);
    let vector_dim = embedding_config.vector_dim;
    let engine = HybridSearchEngine::new(build_embedder(embedding_config));

    let client = Arc::new(
        Qdrant::from_url(&app.qdrant_url)
            .build()
            .with_context(|| format!("invalid qdrant url {}", app.qdrant_url))?,
    );
    let customers = SourceHandle::new(
        SourceTag::Customer,
        QdrantSource::customers(
            Arc::clone(&client),
            VectorSearchConfig::new(&app.customer_collection, vector_dim),
        ),
    );
    let policies = SourceHandle::new(
        SourceTag::Policy,
        QdrantSource::policies(
            client,
            VectorSearchConfig::new(&app.policy_collection, vector_dim),
        ),
    );

    let result = match only {
        None => {
            engine
                .search_filtered(&request, &[customers, policies], &filter, &app.search)
                .await
        }
        Some(SourceTag::Customer) => {
            engine
                .search_single_source_filtered(&request, &customers, &filter, &app.search)
                .await
        }
        Some(SourceTag::Policy) => {
            engine
                .search_single_source_filtered(&request, &policies, &filter, &app.search)
                .await
        }
    }
    .context("search failed")?;

    print_json(&result.into_response())
}

fn query_params(app: &AppConfig, args: &QueryArgs) -> SearchParams {
    SearchParams {
        query: args.query.clone(),
        top_k: args.top_k.unwrap_or(app.search.default_top_k),
        vector_weight: args.vector_weight.unwrap_or(app.search.vector_weight),
        keyword_weight: args.keyword_weight.unwrap_or(app.search.keyword_weight),
        strict: args.strict || app.search.mode == FailureMode::Strict,
    }
}

/// Single-collection commands take that collection's filter fields
/// directly; `search` takes a tagged `RecordFilter`.
fn parse_filter(raw: Option<&str>, only: Option<SourceTag>) -> anyhow::Result<RecordFilter> {
    let Some(raw) = raw else {
        return Ok(RecordFilter::Any);
    };
    let filter = match only {
        None => serde_json::from_str::<RecordFilter>(raw)?,
        Some(SourceTag::Customer) => {
            RecordFilter::Customer(serde_json::from_str::<CustomerFilter>(raw)?)
        }
        Some(SourceTag::Policy) => RecordFilter::Policy(serde_json::from_str::<PolicyFilter>(raw)?),
    };
    Ok(filter)
}

fn build_embedder(config: EmbeddingConfig) -> Arc<dyn Embedder> {
    let capacity = NonZeroUsize::new(config.cache_capacity);
    let engine = EmbeddingEngine::new(config);
    tracing::debug!(backend = engine.backend_name(), "embedding backend selected");
    match capacity {
        Some(capacity) => Arc::new(CachedEmbedder::new(engine, capacity)),
        None => Arc::new(engine),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
