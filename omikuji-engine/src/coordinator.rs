//! Five-category randomization with session dedup and seed determinism.

use crate::config::{ConfigError, EngineConfig};
use crate::constants::LOG_TARGET_COORDINATOR;
use crate::data::CategoryId;
use crate::emotion::EmotionModel;
use crate::fallback::StampSource;
use crate::result::{FortuneReading, RandomizationResult, Selections};
use crate::seed::{SeedStreams, entropy_rng};
use crate::selector::{ContentPoolSelector, SelectionError};
use crate::session::SessionError;
use crate::{ContentPool, SessionStore};
use std::collections::BTreeSet;
use thiserror::Error;

/// Failure of a whole randomization call. No partial result accompanies it.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RandomizationError {
    #[error("no content could be selected for category {category}")]
    InsufficientContentPool {
        category: CategoryId,
        #[source]
        source: SelectionError,
    },
    #[error("selection set is incomplete: {reason}")]
    InvalidCategorySet { reason: String },
    #[error("session {session_id} could not be read or updated")]
    SessionGuardFailure {
        session_id: String,
        #[source]
        source: SessionError,
    },
}

/// Drives the selector across every required category for one reading.
#[derive(Debug)]
pub struct RandomizationCoordinator<P, S> {
    selector: ContentPoolSelector<P>,
    store: S,
}

impl<P, S> RandomizationCoordinator<P, S>
where
    P: ContentPool,
    S: SessionStore,
{
    /// Coordinator with the default emotion tiers.
    pub fn new(pool: P, store: S) -> Self {
        Self::with_emotion_model(pool, store, EmotionModel::default())
    }

    pub const fn with_emotion_model(pool: P, store: S, emotion: EmotionModel) -> Self {
        Self {
            selector: ContentPoolSelector::with_model(pool, emotion),
            store,
        }
    }

    /// Coordinator using the emotion tiers from `config`.
    ///
    /// # Errors
    ///
    /// Returns the first constraint the configured emotion table violates.
    pub fn from_config(pool: P, store: S, config: &EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::with_emotion_model(pool, store, config.emotion_model()?))
    }

    pub const fn selector(&self) -> &ContentPoolSelector<P> {
        &self.selector
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Draw one selection for each required category.
    ///
    /// With a `session_id`, content already shown in that session is
    /// excluded and the new picks are recorded before returning. With a
    /// `seed`, every draw comes from per-category streams derived from it,
    /// so identical inputs against an unchanged pool give identical results.
    /// Fallback ids are only seed-derived when no session is given; inside a
    /// session they stay unique so the shown set can exclude them.
    ///
    /// # Errors
    ///
    /// * [`RandomizationError::InsufficientContentPool`] when any category's
    ///   pool cannot be read or sampled.
    /// * [`RandomizationError::SessionGuardFailure`] when the session store
    ///   fails on read or record.
    /// * [`RandomizationError::InvalidCategorySet`] if the selections do not
    ///   cover the five categories exactly once.
    pub async fn randomize(
        &self,
        fortune_rank: i32,
        session_id: Option<&str>,
        seed: Option<&str>,
    ) -> Result<RandomizationResult, RandomizationError> {
        let excluded = match session_id {
            Some(id) => self.shown_content(id).await?,
            None => BTreeSet::new(),
        };
        let streams = seed.map(SeedStreams::from_text);
        // Stream stamps would repeat fallback ids across calls in one session.
        let seeded_stamps = if session_id.is_some() {
            StampSource::Clock
        } else {
            StampSource::Stream
        };

        let mut selections = Selections::new();
        for category in CategoryId::ALL {
            let (mut rng, stamps) = match streams {
                Some(streams) => (streams.category_stream(category.index()), seeded_stamps),
                None => (entropy_rng(), StampSource::Clock),
            };
            let selection = self
                .selector
                .select_with(category, fortune_rank, &excluded, &mut rng, stamps)
                .await
                .map_err(|source| {
                    log::warn!(
                        target: LOG_TARGET_COORDINATOR,
                        "rank {fortune_rank}: selection for {category} failed: {source}"
                    );
                    RandomizationError::InsufficientContentPool { category, source }
                })?;
            selections.push(selection);
        }

        let result = RandomizationResult::new(fortune_rank, selections).map_err(|violation| {
            log::error!(
                target: LOG_TARGET_COORDINATOR,
                "rank {fortune_rank}: invalid category set: {violation}"
            );
            RandomizationError::InvalidCategorySet {
                reason: violation.to_string(),
            }
        })?;

        if let Some(id) = session_id {
            self.store
                .record_content(id, &result.content_ids())
                .await
                .map_err(|source| Self::session_failure(id, source))?;
        }

        log::debug!(
            target: LOG_TARGET_COORDINATOR,
            "rank {fortune_rank}: selected {} categories ({} fallback, seeded: {})",
            result.selections().len(),
            result.fallback_count(),
            seed.is_some()
        );
        Ok(result)
    }

    /// [`RandomizationCoordinator::randomize`] wrapped in a fortune reading.
    ///
    /// # Errors
    ///
    /// See [`RandomizationCoordinator::randomize`].
    pub async fn read_fortune(
        &self,
        fortune_rank: i32,
        session_id: Option<&str>,
        seed: Option<&str>,
    ) -> Result<FortuneReading, RandomizationError> {
        let categories = self.randomize(fortune_rank, session_id, seed).await?;
        Ok(FortuneReading::new(fortune_rank).with_categories(categories))
    }

    async fn shown_content(&self, session_id: &str) -> Result<BTreeSet<String>, RandomizationError> {
        self.store
            .shown_content(session_id)
            .await
            .map_err(|source| Self::session_failure(session_id, source))
    }

    fn session_failure(session_id: &str, source: SessionError) -> RandomizationError {
        log::warn!(
            target: LOG_TARGET_COORDINATOR,
            "session {session_id} store failure: {source}"
        );
        RandomizationError::SessionGuardFailure {
            session_id: session_id.to_owned(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ContentItem, EmotionTone};
    use crate::pool::{PoolLookupError, StaticContentPool};
    use crate::session::SessionGuard;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct ReadOnlyStore;

    #[async_trait]
    impl SessionStore for ReadOnlyStore {
        async fn shown_content(&self, _session_id: &str) -> Result<BTreeSet<String>, SessionError> {
            Ok(BTreeSet::new())
        }

        async fn record_content(
            &self,
            session_id: &str,
            _content_ids: &[String],
        ) -> Result<(), SessionError> {
            Err(SessionError::Storage {
                id: session_id.to_owned(),
                reason: "read only".into(),
            })
        }
    }

    struct MissingCategoryPool;

    #[async_trait]
    impl ContentPool for MissingCategoryPool {
        async fn lookup_pool(
            &self,
            category: CategoryId,
            _tone: EmotionTone,
        ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError> {
            if category == CategoryId::Debugging {
                Err(PoolLookupError::unavailable("debugging shard down"))
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn full_pool() -> StaticContentPool {
        let mut pool = StaticContentPool::new();
        for category in CategoryId::ALL {
            for tone in EmotionTone::ALL {
                for n in 0..3 {
                    let id = format!("{category}-{tone}-{n}");
                    pool.insert(category, tone, ContentItem::new(id.clone(), id))
                        .unwrap();
                }
            }
        }
        pool
    }

    #[tokio::test]
    async fn covers_every_category_once() {
        let coordinator = RandomizationCoordinator::new(full_pool(), SessionGuard::new());
        for rank in -3..=5 {
            let result = coordinator.randomize(rank, None, None).await.unwrap();
            assert_eq!(result.selections().len(), 5);
            assert_eq!(result.fortune_rank, rank);
            for category in CategoryId::ALL {
                assert!(result.get(category).is_some());
            }
        }
    }

    #[tokio::test]
    async fn session_picks_are_recorded() {
        let coordinator = RandomizationCoordinator::new(full_pool(), SessionGuard::new());
        let result = coordinator.randomize(1, Some("s1"), None).await.unwrap();
        let shown = coordinator.store().get_shown_content("s1").await.unwrap();
        let expected: BTreeSet<String> = result.content_ids().into_iter().collect();
        assert_eq!(shown, expected);
    }

    #[tokio::test]
    async fn pool_failure_names_the_category() {
        let coordinator = RandomizationCoordinator::new(MissingCategoryPool, SessionGuard::new());
        let err = coordinator.randomize(0, None, None).await.unwrap_err();
        match err {
            RandomizationError::InsufficientContentPool { category, source } => {
                assert_eq!(category, CategoryId::Debugging);
                assert!(matches!(source, SelectionError::PoolAccess { .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn record_failure_is_not_swallowed() {
        let coordinator = RandomizationCoordinator::new(full_pool(), ReadOnlyStore);
        let err = coordinator.randomize(2, Some("s9"), None).await.unwrap_err();
        assert!(matches!(
            err,
            RandomizationError::SessionGuardFailure { ref session_id, .. } if session_id == "s9"
        ));
        assert!(coordinator.randomize(2, None, None).await.is_ok());
    }

    #[tokio::test]
    async fn seeded_calls_match() {
        let coordinator = RandomizationCoordinator::new(full_pool(), SessionGuard::new());
        let a = coordinator.randomize(0, None, Some("x")).await.unwrap();
        let b = coordinator.randomize(0, None, Some("x")).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn seeded_fallbacks_match() {
        let coordinator =
            RandomizationCoordinator::new(StaticContentPool::new(), SessionGuard::new());
        let a = coordinator.randomize(-1, None, Some("empty")).await.unwrap();
        let b = coordinator.randomize(-1, None, Some("empty")).await.unwrap();
        assert_eq!(a.fallback_count(), 5);
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn seeded_session_fallbacks_stay_unique() {
        let coordinator =
            RandomizationCoordinator::new(StaticContentPool::new(), SessionGuard::new());
        let first = coordinator.randomize(4, Some("s"), Some("x")).await.unwrap();
        let second = coordinator.randomize(4, Some("s"), Some("x")).await.unwrap();
        assert_eq!(first.fallback_count(), 5);
        assert_eq!(second.fallback_count(), 5);

        let first_ids: BTreeSet<String> = first.content_ids().into_iter().collect();
        assert!(
            second
                .content_ids()
                .iter()
                .all(|id| !first_ids.contains(id))
        );
        let shown = coordinator.store().get_shown_content("s").await.unwrap();
        assert_eq!(shown.len(), 10);
    }

    #[tokio::test]
    async fn reading_carries_categories() {
        let coordinator = RandomizationCoordinator::new(full_pool(), SessionGuard::new());
        let reading = coordinator.read_fortune(4, None, Some("7")).await.unwrap();
        assert_eq!(reading.rank, 4);
        let categories = reading.categories.unwrap();
        assert!(
            categories
                .selections()
                .iter()
                .all(|s| s.tone == EmotionTone::Positive)
        );
    }

    #[test]
    fn config_with_bad_ttl_is_rejected() {
        let config = EngineConfig {
            session_ttl_secs: 0,
            ..EngineConfig::default()
        };
        assert!(
            RandomizationCoordinator::from_config(full_pool(), SessionGuard::new(), &config)
                .is_err()
        );
    }
}
