//! Short-lived in-memory credential cache keyed by user id.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;

use super::{Credential, CredentialError, CredentialResolver};

/// Cached entries are only served while the token stays valid this long.
const MIN_REMAINING_VALIDITY_SECS: i64 = 60;

/// Wraps a resolver with a TTL cache. Failures are never cached.
pub struct CachedCredentialResolver<R> {
    inner: R,
    cache: Cache<String, Credential>,
}

impl<R: CredentialResolver> CachedCredentialResolver<R> {
    pub fn new(inner: R, ttl: Duration) -> Self {
        let cache = Cache::builder().max_capacity(10_000).time_to_live(ttl).build();
        Self { inner, cache }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait]
impl<R: CredentialResolver> CredentialResolver for CachedCredentialResolver<R> {
    async fn resolve(&self, user_id: &str) -> Result<Credential, CredentialError> {
        let margin = chrono::Duration::seconds(MIN_REMAINING_VALIDITY_SECS);
        if let Some(hit) = self.cache.get(user_id).await {
            if hit.is_valid_for(margin) {
                return Ok(hit);
            }
            self.cache.invalidate(user_id).await;
        }

        let credential = self.inner.resolve(user_id).await?;
        self.cache.insert(user_id.to_string(), credential.clone()).await;
        Ok(credential)
    }

    async fn invalidate(&self, user_id: &str) {
        self.cache.invalidate(user_id).await;
        self.inner.invalidate(user_id).await;
    }
}
