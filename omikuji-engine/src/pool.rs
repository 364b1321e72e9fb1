//! In-memory content pools.
//!
//! Real deployments back [`ContentPool`] with their own storage; these
//! implementations serve tests, the tester binary, and small embedded pools.

use crate::ContentPool;
use crate::constants::{FALLBACK_ID_PREFIX, LOG_TARGET_POOL};
use crate::data::{CategoryId, ContentItem, EmotionTone};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Failure reported by a content-pool collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolLookupError {
    #[error("content pool unavailable: {reason}")]
    Unavailable { reason: String },
    #[error("content pool malformed: {reason}")]
    Malformed { reason: String },
}

impl PoolLookupError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

type PoolKey = (CategoryId, EmotionTone);

/// Ids in the `fallback-` namespace belong to generated fallback content.
fn is_reserved_id(id: &str) -> bool {
    id.strip_prefix(FALLBACK_ID_PREFIX)
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Serialized form of one `(category, tone)` pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSection {
    pub category: CategoryId,
    pub tone: EmotionTone,
    #[serde(default)]
    pub items: Vec<ContentItem>,
}

/// Serialized form of a whole static pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PoolDocument {
    #[serde(default)]
    pub pools: Vec<PoolSection>,
}

/// Fixed content pool held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticContentPool {
    entries: HashMap<PoolKey, Vec<Arc<ContentItem>>>,
    ids: HashSet<String>,
}

impl StaticContentPool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a pool from its JSON document form.
    ///
    /// # Errors
    ///
    /// Returns [`PoolLookupError::Malformed`] when the JSON does not parse or
    /// any item is rejected by [`StaticContentPool::insert`].
    pub fn from_json(json: &str) -> Result<Self, PoolLookupError> {
        let document: PoolDocument =
            serde_json::from_str(json).map_err(|err| PoolLookupError::malformed(err.to_string()))?;
        Self::from_document(document)
    }

    /// Build a pool from an already-parsed document.
    ///
    /// # Errors
    ///
    /// Returns the first item rejected by [`StaticContentPool::insert`].
    pub fn from_document(document: PoolDocument) -> Result<Self, PoolLookupError> {
        let mut pool = Self::new();
        for section in document.pools {
            for item in section.items {
                pool.insert(section.category, section.tone, item)?;
            }
        }
        Ok(pool)
    }

    /// Add an item under `(category, tone)`.
    ///
    /// # Errors
    ///
    /// Rejects ids that are duplicated or use the reserved fallback prefix,
    /// and weights that are not finite and positive.
    pub fn insert(
        &mut self,
        category: CategoryId,
        tone: EmotionTone,
        item: ContentItem,
    ) -> Result<(), PoolLookupError> {
        if is_reserved_id(&item.id) {
            return Err(PoolLookupError::malformed(format!(
                "item id {} uses the reserved prefix {FALLBACK_ID_PREFIX}-",
                item.id
            )));
        }
        if !item.weight.is_finite() || item.weight <= 0.0 {
            return Err(PoolLookupError::malformed(format!(
                "item {} has invalid weight {}",
                item.id, item.weight
            )));
        }
        if !self.ids.insert(item.id.clone()) {
            return Err(PoolLookupError::malformed(format!(
                "duplicate item id {}",
                item.id
            )));
        }
        self.entries
            .entry((category, tone))
            .or_default()
            .push(Arc::new(item));
        Ok(())
    }

    /// Builder-style [`StaticContentPool::insert`].
    ///
    /// # Errors
    ///
    /// See [`StaticContentPool::insert`].
    pub fn with_item(
        mut self,
        category: CategoryId,
        tone: EmotionTone,
        item: ContentItem,
    ) -> Result<Self, PoolLookupError> {
        self.insert(category, tone, item)?;
        Ok(self)
    }

    /// Total number of items across every pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn items(&self, category: CategoryId, tone: EmotionTone) -> &[Arc<ContentItem>] {
        self.entries
            .get(&(category, tone))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[async_trait]
impl ContentPool for StaticContentPool {
    async fn lookup_pool(
        &self,
        category: CategoryId,
        tone: EmotionTone,
    ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError> {
        Ok(self.items(category, tone).to_vec())
    }
}

/// Memoizing wrapper around another pool.
///
/// Successful lookups are cached per `(category, tone)`; failures are not.
#[derive(Debug)]
pub struct CachedContentPool<P> {
    inner: P,
    cache: DashMap<PoolKey, Vec<Arc<ContentItem>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<P: ContentPool> CachedContentPool<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Drop every cached lookup.
    pub fn invalidate(&self) {
        self.cache.clear();
        log::debug!(target: LOG_TARGET_POOL, "pool cache invalidated");
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub const fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: ContentPool> ContentPool for CachedContentPool<P> {
    async fn lookup_pool(
        &self,
        category: CategoryId,
        tone: EmotionTone,
    ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError> {
        if let Some(cached) = self.cache.get(&(category, tone)) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(cached.value().clone());
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let items = self.inner.lookup_pool(category, tone).await?;
        self.cache.insert((category, tone), items.clone());
        Ok(items)
    }
}
