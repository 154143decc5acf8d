use anyhow::{Context, Result};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MATCH_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub s3_bucket: String,
    pub s3_endpoint: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: String,
    pub gemini_api_key: String,
    /// OCR stage of the extraction pipeline is skipped when unset.
    pub vision_api_key: Option<String>,
    /// LlamaParse stage of the extraction pipeline is skipped when unset.
    pub llama_cloud_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub max_upload_bytes: usize,
    pub match_cache_ttl_secs: u64,
    pub enable_llm_match_scoring: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            s3_bucket: require_env("S3_BUCKET")?,
            s3_endpoint: require_env("S3_ENDPOINT")?,
            aws_access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
            aws_secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            gemini_api_key: require_env("GEMINI_API_KEY")?,
            vision_api_key: optional_env("GOOGLE_VISION_API_KEY"),
            llama_cloud_api_key: optional_env("LLAMA_CLOUD_API_KEY"),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            max_upload_bytes: match optional_env("MAX_UPLOAD_BYTES") {
                Some(v) => v
                    .parse::<usize>()
                    .context("MAX_UPLOAD_BYTES must be a byte count")?,
                None => DEFAULT_MAX_UPLOAD_BYTES,
            },
            match_cache_ttl_secs: match optional_env("MATCH_CACHE_TTL_SECS") {
                Some(v) => v
                    .parse::<u64>()
                    .context("MATCH_CACHE_TTL_SECS must be a number of seconds")?,
                None => DEFAULT_MATCH_CACHE_TTL_SECS,
            },
            enable_llm_match_scoring: optional_env("ENABLE_LLM_MATCH_SCORING")
                .map(|v| parse_flag(&v))
                .unwrap_or(true),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Treats empty values the same as unset ones.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "0" | "false" | "no" | "off"
    )
}

#[cfg(test)]
impl Config {
    /// Config for tests: every external endpoint points nowhere useful.
    pub fn for_tests() -> Self {
        Config {
            database_url: "postgres://localhost/jobnexus_test".to_string(),
            redis_url: "redis://127.0.0.1:6379".to_string(),
            s3_bucket: "test-bucket".to_string(),
            s3_endpoint: "http://127.0.0.1:9000".to_string(),
            aws_access_key_id: "test".to_string(),
            aws_secret_access_key: "test".to_string(),
            gemini_api_key: "test-key".to_string(),
            vision_api_key: None,
            llama_cloud_api_key: None,
            port: 0,
            rust_log: "info".to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            match_cache_ttl_secs: DEFAULT_MATCH_CACHE_TTL_SECS,
            enable_llm_match_scoring: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag_false_values() {
        for v in ["0", "false", "FALSE", " no ", "off"] {
            assert!(!parse_flag(v), "{v} should be false");
        }
    }

    #[test]
    fn test_parse_flag_true_values() {
        for v in ["1", "true", "yes", "on"] {
            assert!(parse_flag(v), "{v} should be true");
        }
    }
}
