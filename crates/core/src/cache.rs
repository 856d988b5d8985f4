use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::Expiry;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::domain::intent::Intent;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
}

/// A cached reply keyed by fingerprint. TTL-bound; served only while fresh.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub response: String,
    pub intent: Intent,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
    pub hit_count: u64,
}

/// Deterministic cache key: SHA-256 over the normalized text and the intent
/// bucket, so identical text under different intents never collides. Pure
/// function of its inputs, stable across process restarts.
pub fn fingerprint(normalized_text: &str, bucket: Intent) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized_text.as_bytes());
    hasher.update([0x1f]);
    hasher.update(bucket.as_str().as_bytes());

    let digest = hasher.finalize();
    let mut encoded = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(encoded, "{byte:02x}");
    }
    encoded
}

/// Read-through response cache capability. Any implementation honoring the
/// get/put contract is interchangeable; backend failures surface as errors so
/// the engine can degrade to a miss.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    /// Miss when absent or expired; a hit increments `hit_count` atomically.
    async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Insert or overwrite, restarting the TTL clock.
    async fn put(
        &self,
        fingerprint: &str,
        response: &str,
        intent: Intent,
        confidence: f64,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

#[derive(Debug)]
struct StoredEntry {
    response: String,
    intent: Intent,
    confidence: f64,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    hits: AtomicU64,
}

/// Hands moka each entry's remaining lifetime so its maintenance reclaims
/// expired entries even when they are never read again.
struct EntryTtl;

impl Expiry<String, Arc<StoredEntry>> for EntryTtl {
    fn expire_after_create(
        &self,
        _fingerprint: &String,
        entry: &Arc<StoredEntry>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some((entry.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    fn expire_after_update(
        &self,
        _fingerprint: &String,
        entry: &Arc<StoredEntry>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some((entry.expires_at - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }
}

/// In-memory response cache on a concurrent `moka` map. Reads and writes for
/// one fingerprint appear atomic (hit counts never lose updates) and distinct
/// fingerprints never contend on a shared lock. Each entry carries its own
/// TTL; moka reclaims expired entries in the background and the read path
/// double-checks freshness so a hit is never stale. An optional capacity
/// bound delegates eviction to moka.
pub struct InMemoryResponseCache {
    inner: moka::future::Cache<String, Arc<StoredEntry>>,
}

impl Default for InMemoryResponseCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl InMemoryResponseCache {
    pub fn new(max_capacity: Option<u64>) -> Self {
        let mut builder = moka::future::Cache::builder().expire_after(EntryTtl);
        if let Some(capacity) = max_capacity {
            builder = builder.max_capacity(capacity);
        }
        Self { inner: builder.build() }
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, fingerprint: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(stored) = self.inner.get(fingerprint).await else {
            return Ok(None);
        };

        if stored.expires_at <= Utc::now() {
            self.inner.invalidate(fingerprint).await;
            return Ok(None);
        }

        let hit_count = stored.hits.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Some(CacheEntry {
            fingerprint: fingerprint.to_string(),
            response: stored.response.clone(),
            intent: stored.intent,
            confidence: stored.confidence,
            created_at: stored.created_at,
            hit_count,
        }))
    }

    async fn put(
        &self,
        fingerprint: &str,
        response: &str,
        intent: Intent,
        confidence: f64,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let created_at = Utc::now();
        let expires_at = created_at
            + chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::hours(1));
        let stored = Arc::new(StoredEntry {
            response: response.to_string(),
            intent,
            confidence,
            created_at,
            expires_at,
            hits: AtomicU64::new(0),
        });
        self.inner.insert(fingerprint.to_string(), stored).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{fingerprint, InMemoryResponseCache, ResponseCache};
    use crate::domain::intent::Intent;

    #[test]
    fn fingerprint_is_deterministic_and_bucket_sensitive() {
        let first = fingerprint("where is my order", Intent::OrderInquiry);
        let second = fingerprint("where is my order", Intent::OrderInquiry);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);

        let other_bucket = fingerprint("where is my order", Intent::Billing);
        assert_ne!(first, other_bucket, "same text under another intent must not collide");

        let other_text = fingerprint("where is my package", Intent::OrderInquiry);
        assert_ne!(first, other_text);
    }

    #[tokio::test]
    async fn second_read_within_ttl_returns_same_response_and_bumps_hits() {
        let cache = InMemoryResponseCache::default();
        let key = fingerprint("how do refunds work", Intent::Billing);

        cache
            .put(&key, "Refunds take 3-5 business days.", Intent::Billing, 0.9, Duration::from_secs(60))
            .await
            .expect("put");

        let first = cache.get(&key).await.expect("get").expect("hit");
        let second = cache.get(&key).await.expect("get").expect("hit");

        assert_eq!(first.response, second.response);
        assert_eq!(first.hit_count, 1);
        assert_eq!(second.hit_count, 2);
    }

    #[tokio::test]
    async fn expired_entry_reads_as_miss_and_is_removed() {
        let cache = InMemoryResponseCache::default();
        let key = fingerprint("stale question", Intent::General);

        cache
            .put(&key, "stale answer", Intent::General, 0.8, Duration::from_millis(10))
            .await
            .expect("put");
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(cache.get(&key).await.expect("get").is_none());
        // Still a miss on the follow-up read after lazy removal.
        assert!(cache.get(&key).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_reclaimed_without_a_follow_up_read() {
        let cache = InMemoryResponseCache::default();
        let key = fingerprint("forgotten question", Intent::General);

        cache
            .put(&key, "forgotten answer", Intent::General, 0.8, Duration::from_millis(10))
            .await
            .expect("put");
        tokio::time::sleep(Duration::from_millis(40)).await;

        cache.inner.run_pending_tasks().await;
        assert_eq!(cache.inner.entry_count(), 0, "maintenance reclaims expired entries");
    }

    #[tokio::test]
    async fn parallel_reads_never_lose_hit_count_increments() {
        let cache = Arc::new(InMemoryResponseCache::default());
        let key = fingerprint("popular question", Intent::ProductInfo);

        cache
            .put(&key, "popular answer", Intent::ProductInfo, 0.9, Duration::from_secs(60))
            .await
            .expect("put");

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            tasks.spawn(async move {
                cache.get(&key).await.expect("get").expect("hit");
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("task");
        }

        let entry = cache.get(&key).await.expect("get").expect("hit");
        assert_eq!(entry.hit_count, 17, "every parallel read must be counted");
    }

    #[tokio::test]
    async fn put_overwrites_and_resets_hit_count() {
        let cache = InMemoryResponseCache::default();
        let key = fingerprint("overwrite me", Intent::General);

        cache.put(&key, "v1", Intent::General, 0.8, Duration::from_secs(60)).await.expect("put");
        let _ = cache.get(&key).await.expect("get");

        cache.put(&key, "v2", Intent::General, 0.9, Duration::from_secs(60)).await.expect("put");
        let entry = cache.get(&key).await.expect("get").expect("hit");
        assert_eq!(entry.response, "v2");
        assert_eq!(entry.hit_count, 1);
    }
}
