//! Omikuji Engine
//!
//! Probabilistic content selection for engineer omikuji readings.
//! Given a fortune rank, the engine draws one content item for each of the
//! five fixed categories, steering emotional tone by rank, weighting items by
//! their configured weights, and never repeating content within a session.

pub mod config;
pub mod constants;
pub mod coordinator;
pub mod data;
pub mod emotion;
pub mod fallback;
pub mod numbers;
pub mod pool;
pub mod result;
pub mod sampler;
pub mod seed;
pub mod selector;
pub mod session;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use coordinator::{RandomizationCoordinator, RandomizationError};
pub use data::{CategoryId, CategorySpec, ContentItem, ContentTags, EmotionTone};
pub use emotion::{EmotionDistribution, EmotionModel, EmotionTable, EmotionTier, select_tone};
pub use fallback::{FallbackStamp, StampSource, fallback_content};
pub use pool::{CachedContentPool, PoolDocument, PoolLookupError, PoolSection, StaticContentPool};
pub use result::{
    CategorySelection, CompletenessViolation, FortuneReading, RandomizationResult, Selections,
};
pub use sampler::{AliasTable, SamplerError, WeightedSampler, sample};
pub use seed::{SeedStreams, seed_from_text};
pub use selector::{ContentPoolSelector, SelectionError};
pub use session::{Clock, ManualClock, Session, SessionError, SessionGuard, SystemClock};

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Source of content items, keyed by category and tone.
/// Storage-specific implementations should provide this
#[async_trait]
pub trait ContentPool: Send + Sync {
    /// Every item eligible for `(category, tone)`; an empty pool is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    async fn lookup_pool(
        &self,
        category: CategoryId,
        tone: EmotionTone,
    ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError>;
}

#[async_trait]
impl<P: ContentPool + ?Sized> ContentPool for Arc<P> {
    async fn lookup_pool(
        &self,
        category: CategoryId,
        tone: EmotionTone,
    ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError> {
        (**self).lookup_pool(category, tone).await
    }
}

/// Per-session record of content already shown.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Ids shown so far in `session_id`; unknown sessions have shown nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    async fn shown_content(&self, session_id: &str) -> Result<BTreeSet<String>, SessionError>;

    /// Add `content_ids` to the shown set of `session_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    async fn record_content(
        &self,
        session_id: &str,
        content_ids: &[String],
    ) -> Result<(), SessionError>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    async fn shown_content(&self, session_id: &str) -> Result<BTreeSet<String>, SessionError> {
        (**self).shown_content(session_id).await
    }

    async fn record_content(
        &self,
        session_id: &str,
        content_ids: &[String],
    ) -> Result<(), SessionError> {
        (**self).record_content(session_id, content_ids).await
    }
}
