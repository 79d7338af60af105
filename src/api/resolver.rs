//! Cache-aside resolution of prompt definitions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::cache::{cache_key, PromptCache};
use super::error::AppError;
use super::model::{
    DefinitionDraft, FewShotDraft, FewShotExample, PromptDefinition, ResolvedPrompt, Upserted,
};
use super::store::PromptStore;

/// Default lifetime of a cached snapshot.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Resolves `(tag, version)` through the cache and owns invalidation on
/// writes.
///
/// Store and cache handles are supplied by the caller. Every write bumps a
/// per-key generation before deleting the cache entry; a miss only
/// repopulates the cache if no write to that key happened while it was
/// reading the store.
pub struct PromptResolver {
    store: Arc<dyn PromptStore>,
    cache: Arc<dyn PromptCache>,
    ttl: Duration,
    generations: Mutex<HashMap<String, u64>>,
}

impl PromptResolver {
    pub fn new(store: Arc<dyn PromptStore>, cache: Arc<dyn PromptCache>, ttl: Duration) -> Self {
        Self {
            store,
            cache,
            ttl,
            generations: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the active definition and its active few-shots in
    /// `(sort_order, id)` order.
    pub async fn resolve(&self, tag: &str, version: u32) -> Result<ResolvedPrompt, AppError> {
        if let Some(raw) = self.cache.get(tag, version).await {
            match serde_json::from_str::<ResolvedPrompt>(&raw) {
                Ok(resolved) => {
                    debug!(tag, version, "prompt cache hit");
                    return Ok(resolved);
                }
                Err(e) => warn!(tag, version, error = %e, "discarding unreadable cache entry"),
            }
        }
        debug!(tag, version, "prompt cache miss");

        let generation = self.generation(tag, version);
        let definition = self
            .store
            .find_definition(tag, version)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!(
                    "Prompt definition '{}' version {} not found",
                    tag, version
                ))
                .with_detail("tag", tag)
                .with_detail("version", version)
            })?;
        let few_shots = self.store.list_few_shots(definition.id, true).await?;
        let resolved = ResolvedPrompt {
            definition,
            few_shots,
        };

        if self.generation(tag, version) == generation {
            let payload = serde_json::to_string(&resolved).map_err(|e| {
                AppError::internal("Failed to serialize prompt snapshot")
                    .with_detail("error", e.to_string())
            })?;
            self.cache.set(tag, version, payload, self.ttl).await;
        } else {
            debug!(tag, version, "key written during resolve, not caching");
        }

        Ok(resolved)
    }

    /// Inserts or overwrites the definition for its natural key, then drops
    /// the cached snapshot.
    pub async fn upsert_definition(
        &self,
        draft: DefinitionDraft,
    ) -> Result<PromptDefinition, AppError> {
        if draft.tag.trim().is_empty() {
            return Err(AppError::bad_request("tag must not be empty"));
        }
        if draft.version < 1 {
            return Err(AppError::bad_request("version must be at least 1"));
        }
        if draft.persona.trim().is_empty() {
            return Err(AppError::bad_request("persona must not be empty"));
        }

        let (tag, version) = (draft.tag.clone(), draft.version);
        let definition = self.store.upsert_definition(draft).await?;
        info!(tag = %tag, version, id = definition.id, "prompt definition upserted");
        self.invalidate(&tag, version).await;
        Ok(definition)
    }

    /// Inserts or updates a few-shot and drops the cached snapshot of
    /// `(tag, version)` whichever way the write went.
    pub async fn upsert_few_shot(
        &self,
        tag: &str,
        version: u32,
        draft: FewShotDraft,
    ) -> Result<Upserted<FewShotExample>, AppError> {
        let outcome = self.store.upsert_few_shot(draft).await?;
        match &outcome {
            Upserted::Inserted(row) => info!(tag, version, id = row.id, "few-shot inserted"),
            Upserted::Updated(row) => info!(tag, version, id = row.id, "few-shot updated"),
        }
        self.invalidate(tag, version).await;
        Ok(outcome)
    }

    /// Soft-deletes a few-shot and drops the cached snapshot.
    pub async fn deactivate_few_shot(
        &self,
        id: u64,
        tag: &str,
        version: u32,
    ) -> Result<FewShotExample, AppError> {
        let row = self.store.deactivate_few_shot(id).await?;
        info!(tag, version, id, "few-shot deactivated");
        self.invalidate(tag, version).await;
        Ok(row)
    }

    async fn invalidate(&self, tag: &str, version: u32) {
        *self
            .generations()
            .entry(cache_key(tag, version))
            .or_insert(0) += 1;
        self.cache.delete(tag, version).await;
        debug!(tag, version, "prompt cache invalidated");
    }

    fn generation(&self, tag: &str, version: u32) -> u64 {
        self.generations()
            .get(&cache_key(tag, version))
            .copied()
            .unwrap_or(0)
    }

    /// Recovers the counters from a poisoned lock; they must keep advancing.
    fn generations(&self) -> MutexGuard<'_, HashMap<String, u64>> {
        self.generations.lock().unwrap_or_else(|poisoned| {
            warn!("generation lock poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}
