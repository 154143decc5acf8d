use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::GeminiClient;
use crate::realtime::RealtimeHub;
use crate::resume::cache::MatchCache;
use crate::resume::extraction::ExtractionPipeline;
use crate::resume::matching::MatchScorer;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub llm: GeminiClient,
    pub config: Config,
    /// Pluggable match scorer. Gemini by default; keyword-only when ENABLE_LLM_MATCH_SCORING=false.
    pub match_scorer: Arc<dyn MatchScorer>,
    /// Match report cache on the Redis client.
    pub match_cache: MatchCache,
    /// Native → LlamaParse → Vision, depending on which keys are configured.
    pub extraction: Arc<ExtractionPipeline>,
    pub realtime: RealtimeHub,
}
