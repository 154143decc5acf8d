mod applications;
mod config;
mod db;
mod errors;
mod jobs;
mod llm_client;
mod messaging;
mod models;
mod notifications;
mod realtime;
mod resume;
mod routes;
mod state;
mod users;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::GeminiClient;
use crate::realtime::RealtimeHub;
use crate::resume::cache::MatchCache;
use crate::resume::extraction::ExtractionPipeline;
use crate::resume::matching::{GeminiMatchScorer, KeywordMatchScorer, MatchScorer};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Job Nexus API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (match report cache)
    let redis = redis::Client::open(config.redis_url.clone())?;
    let match_cache = MatchCache::new(redis, config.match_cache_ttl_secs);
    info!("Redis client initialized");

    // Initialize S3 / MinIO
    let s3 = build_s3_client(&config).await;
    info!("S3 client initialized");

    // Initialize LLM client
    let llm = GeminiClient::new(config.gemini_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Match scorer: Gemini with keyword fallback, or keyword-only
    let match_scorer: Arc<dyn MatchScorer> = if config.enable_llm_match_scoring {
        Arc::new(GeminiMatchScorer::new(llm.clone()))
    } else {
        Arc::new(KeywordMatchScorer)
    };
    info!("Match scorer: {}", match_scorer.backend());

    // Extraction pipeline: native, then whichever hosted stages have keys
    let extraction = Arc::new(ExtractionPipeline::from_config(&config)?);

    // Build app state
    let state = AppState {
        db,
        s3,
        llm,
        config: config.clone(),
        match_scorer,
        match_cache,
        extraction,
        realtime: RealtimeHub::default(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(config: &Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &config.aws_access_key_id,
        &config.aws_secret_access_key,
        None,
        None,
        "jobnexus-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&config.s3_endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
