//! Cache-aware call dispatcher
//!
//! Decides, for each request, whether a captured response can be served or a
//! network call has to be made, and captures successful reads.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{Classification, RequestDescriptor, Transport, TransportError};
use crate::cache::{key_for, CacheEntry, CacheStore, Envelope};

/// Routes requests through the cache and the transport
///
/// Only GET requests touch the cache. Other methods go straight to the
/// transport and never invalidate anything; callers that need a fresh read
/// after a write invalidate explicitly.
///
/// Concurrent reads of the same uncached resource are not coalesced: each
/// one misses and each one reaches the transport.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    store: Arc<CacheStore>,
}

impl Dispatcher {
    /// Creates a dispatcher backed by the process-wide store
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_store(transport, CacheStore::global())
    }

    /// Creates a dispatcher backed by a specific store
    pub fn with_store(transport: Arc<dyn Transport>, store: Arc<CacheStore>) -> Self {
        Self { transport, store }
    }

    /// The store this dispatcher reads from and writes to
    pub fn store(&self) -> &Arc<CacheStore> {
        &self.store
    }

    /// Performs a request, serving it from cache when possible
    ///
    /// # Behavior
    /// - GET without bypass: served from cache on a hit, no network call
    /// - GET on a miss or with bypass: sent, and a success is stored under
    ///   the classification id or the URL-derived key
    /// - any other method: sent, the cache is left alone
    /// - transport failures are returned unchanged and nothing is stored
    pub async fn dispatch(
        &self,
        request: &RequestDescriptor,
        classification: Option<&Classification>,
    ) -> Result<Envelope, TransportError> {
        let unclassified = Classification::default();
        let classification = classification.unwrap_or(&unclassified);

        let key = request
            .is_idempotent_read()
            .then(|| key_for(request.resolved_url().as_str(), classification.id.as_deref()));

        if let Some(key) = key.as_deref() {
            if classification.bypass_cache {
                debug!(key, "bypassing cache");
            } else if let Some(cached) = self.store.get(key) {
                debug!(key, "cache hit");
                return Ok(cached);
            } else {
                debug!(key, "cache miss");
            }
        }

        let response = self.transport.send(request).await.map_err(|err| {
            warn!(method = %request.method, url = %request.url, error = %err, "request failed");
            err
        })?;

        if let Some(key) = key.as_deref() {
            let entry = CacheEntry::new(
                response.data.clone(),
                response.status,
                classification.cache_lifetime,
            )
            .tagged(
                classification.group.as_deref(),
                classification.action.as_deref(),
            );
            self.store.put(key, entry);
        }

        Ok(Envelope::fresh(response.data, response.status))
    }

    /// Removes cached entries by group and action, see [`CacheStore::invalidate`]
    pub fn invalidate(&self, group: Option<&str>, action: Option<&str>) -> usize {
        self.store.invalidate(group, action)
    }

    /// Removes the cached entry stored under `id`
    pub fn invalidate_by_id(&self, id: &str) -> bool {
        self.store.invalidate_by_id(id)
    }
}
