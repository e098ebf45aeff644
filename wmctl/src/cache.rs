//! List caching and its invalidation contract.
//!
//! Worker model listings are cached under the [`WORKER_MODELS_NAMESPACE`] prefix. After any
//! committed mutation the whole namespace is evicted, so the next list reflects the write. The
//! mutated model itself is then re-read from the store, bypassing the cache.
//!
//! Cached values are store records ([`WorkerModelDBResponse`]), which carry no `editable`
//! flag: that flag is computed per caller when the response is assembled.

use crate::api::models::users::CurrentUser;
use crate::api::models::worker_models::{StateFilter, WorkerModelResponse};
use crate::db::models::worker_models::WorkerModelDBResponse;
use crate::db::store::Store;
use crate::errors::{Error, Result};
use crate::policy::visibility::VisibleGroups;
use crate::types::{WorkerModelId, abbrev_uuid};
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error as ThisError;
use tracing::instrument;

/// Key prefix shared by every cached worker model listing
pub const WORKER_MODELS_NAMESPACE: &str = "workermodels:";

#[derive(Debug, ThisError)]
pub enum CacheError {
    #[error("failed to invalidate cache namespace '{namespace}': {message}")]
    Invalidation { namespace: String, message: String },
}

/// Key/value cache supporting bulk eviction by key prefix.
#[async_trait::async_trait]
pub trait NamespacedCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<serde_json::Value>;

    async fn insert(&self, key: String, value: serde_json::Value);

    /// Evict every entry whose key starts with `namespace`
    async fn invalidate_namespace(&self, namespace: &str) -> std::result::Result<(), CacheError>;
}

/// [`NamespacedCache`] on a moka cache with invalidation closures enabled.
#[derive(Clone)]
pub struct MokaCache {
    inner: Cache<String, serde_json::Value>,
}

impl MokaCache {
    pub fn new(max_capacity: u64, time_to_live: Duration) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(time_to_live)
            .support_invalidation_closures()
            .build();
        Self { inner }
    }
}

#[async_trait::async_trait]
impl NamespacedCache for MokaCache {
    async fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.inner.get(key).await
    }

    async fn insert(&self, key: String, value: serde_json::Value) {
        self.inner.insert(key, value).await;
    }

    async fn invalidate_namespace(&self, namespace: &str) -> std::result::Result<(), CacheError> {
        let prefix = namespace.to_string();
        self.inner
            .invalidate_entries_if(move |key, _| key.starts_with(&prefix))
            .map(|_| ())
            .map_err(|e| CacheError::Invalidation {
                namespace: namespace.to_string(),
                message: e.to_string(),
            })
    }
}

/// Key for a filtered listing of worker models visible to `scope`
pub fn list_cache_key(scope: &VisibleGroups, binary: Option<&str>, state: Option<StateFilter>) -> String {
    format!(
        "{WORKER_MODELS_NAMESPACE}list:{}:{}:{}",
        scope.cache_scope(),
        binary.unwrap_or_default(),
        state.map(|s| s.as_str()).unwrap_or_default()
    )
}

/// Key for the usable models of a group or project context
pub fn context_cache_key(context: &str, scope: &VisibleGroups) -> String {
    format!("{WORKER_MODELS_NAMESPACE}{context}:{}", scope.cache_scope())
}

/// Keeps cached listings consistent with committed mutations.
///
/// Entries are stored under their key suffixed with the generation current when the load
/// started. Invalidation bumps the generation before evicting, so a list loaded before a commit
/// but inserted after its invalidation lands under a key no later read will ask for.
#[derive(Clone)]
pub struct CacheInvalidationCoordinator {
    cache: Arc<dyn NamespacedCache>,
    store: Arc<dyn Store>,
    generation: Arc<AtomicU64>,
}

impl CacheInvalidationCoordinator {
    pub fn new(cache: Arc<dyn NamespacedCache>, store: Arc<dyn Store>) -> Self {
        Self {
            cache,
            store,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Evict every cached worker model listing. Call after commit; never fails the caller.
    pub async fn invalidate_list_cache(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.cache.invalidate_namespace(WORKER_MODELS_NAMESPACE).await {
            Ok(()) => tracing::debug!("Invalidated worker model list cache"),
            Err(e) => tracing::warn!(error = %e, "Failed to invalidate worker model list cache"),
        }
    }

    /// Re-read a model from the store, bypassing the cache, as seen by `caller`.
    #[instrument(skip(self, caller), fields(worker_model_id = %abbrev_uuid(&id)), err)]
    pub async fn read_authoritative(&self, id: WorkerModelId, caller: &CurrentUser) -> Result<WorkerModelResponse> {
        let model = self.store.get_worker_model(id).await?.ok_or_else(|| Error::NotFound {
            resource: "Worker model".to_string(),
            id: id.to_string(),
        })?;
        Ok(WorkerModelResponse::for_caller(model, caller))
    }

    /// Read-through listing: serve `key` from the cache, or run `loader` and cache its result.
    pub async fn cached_list<F, Fut>(&self, key: String, loader: F) -> Result<Vec<WorkerModelDBResponse>>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Vec<WorkerModelDBResponse>>> + Send,
    {
        let key = format!("{key}#{}", self.generation.load(Ordering::SeqCst));

        if let Some(value) = self.cache.get(&key).await {
            match serde_json::from_value(value) {
                Ok(models) => {
                    tracing::debug!(key = %key, "Cache hit for worker model list");
                    return Ok(models);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "Discarding undecodable cached worker model list"),
            }
        }

        tracing::debug!(key = %key, "Cache miss for worker model list, loading from store");
        let models = loader().await?;

        match serde_json::to_value(&models) {
            Ok(value) => self.cache.insert(key, value).await,
            Err(e) => tracing::warn!(error = %e, "Failed to encode worker model list for caching"),
        }

        Ok(models)
    }
}
