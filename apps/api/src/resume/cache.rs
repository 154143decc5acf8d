//! Redis cache for match reports, keyed by a content hash of the inputs.
//! Cache failures are logged and treated as misses; scoring never fails because of Redis.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, ErrorKind, RedisError, RedisResult};
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::resume::matching::MatchReport;

const KEY_PREFIX: &str = "match:v1:";
const REDIS_TIMEOUT: Duration = Duration::from_secs(2);

/// Clones share one lazily opened, auto-reconnecting connection.
#[derive(Clone)]
pub struct MatchCache {
    client: redis::Client,
    conn: Arc<OnceCell<ConnectionManager>>,
    ttl_secs: u64,
}

async fn bounded<T>(op: impl Future<Output = RedisResult<T>>) -> RedisResult<T> {
    tokio::time::timeout(REDIS_TIMEOUT, op)
        .await
        .unwrap_or_else(|_| Err(RedisError::from((ErrorKind::IoError, "redis operation timed out"))))
}

impl MatchCache {
    pub fn new(client: redis::Client, ttl_secs: u64) -> Self {
        Self {
            client,
            conn: Arc::new(OnceCell::new()),
            ttl_secs,
        }
    }

    /// Shared connection, opened on first use. A failed open is retried on the next call.
    async fn connection(&self) -> RedisResult<ConnectionManager> {
        let conn = self
            .conn
            .get_or_try_init(|| async {
                let conn = bounded(ConnectionManager::new(self.client.clone())).await?;
                info!("Redis connection established");
                Ok::<_, RedisError>(conn)
            })
            .await?;
        Ok(conn.clone())
    }

    /// `match:v1:<sha256(backend, resume_text, job_description)>`.
    pub fn key(backend: &str, resume_text: &str, job_description: &str) -> String {
        let mut hasher = Sha256::new();
        for part in [backend, resume_text, job_description] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        format!("{KEY_PREFIX}{hex}")
    }

    /// Cached report for `key`. Any failure is logged and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<MatchReport> {
        match self.read(key).await {
            Ok(Some(json)) => match serde_json::from_str(&json) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("Discarding undecodable cached match report: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Match cache read failed: {e}");
                None
            }
        }
    }

    /// Stores `report` under `key` with the configured TTL. Failures are logged.
    pub async fn put(&self, key: &str, report: &MatchReport) {
        let json = match serde_json::to_string(report) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not encode match report for cache: {e}");
                return;
            }
        };
        if let Err(e) = self.write(key, json).await {
            warn!("Match cache write failed: {e}");
        }
    }

    async fn read(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.connection().await?;
        Ok(bounded(conn.get(key)).await?)
    }

    async fn write(&self, key: &str, json: String) -> Result<(), AppError> {
        let mut conn = self.connection().await?;
        bounded(conn.set_ex::<_, _, ()>(key, json, self.ttl_secs)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_stable_and_prefixed() {
        let a = MatchCache::key("keyword", "resume", "jd");
        let b = MatchCache::key("keyword", "resume", "jd");
        assert_eq!(a, b);
        assert!(a.starts_with("match:v1:"));
        assert_eq!(a.len(), KEY_PREFIX.len() + 64);
    }

    #[test]
    fn test_key_separates_inputs() {
        assert_ne!(
            MatchCache::key("keyword", "ab", "c"),
            MatchCache::key("keyword", "a", "bc")
        );
        assert_ne!(
            MatchCache::key("keyword", "r", "j"),
            MatchCache::key("gemini", "r", "j")
        );
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_a_miss() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let cache = MatchCache::new(client, 60);
        assert!(cache.get("match:v1:missing").await.is_none());
        assert!(cache.conn.get().is_none());
        // A failed open leaves the slot empty, so the next call tries again.
        assert!(cache.get("match:v1:missing").await.is_none());
    }

    #[test]
    fn test_clones_share_connection_slot() {
        let client = redis::Client::open("redis://127.0.0.1:1/").unwrap();
        let cache = MatchCache::new(client, 60);
        let clone = cache.clone();
        assert!(Arc::ptr_eq(&cache.conn, &clone.conn));
    }

    #[tokio::test]
    async fn test_bounded_times_out_hung_operations() {
        tokio::time::pause();
        let hung = bounded(std::future::pending::<RedisResult<()>>());
        let err = hung.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IoError);
    }
}
