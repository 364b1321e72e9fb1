//! Per-category content selection.
//!
//! A draw picks a tone from the rank's distribution, fetches the pool for
//! `(category, tone)`, drops excluded ids, and samples the rest by weight.
//! An empty or fully excluded pool is recovered with fallback content.

use crate::ContentPool;
use crate::constants::LOG_TARGET_SELECTOR;
use crate::data::{CategoryId, ContentItem, EmotionTone};
use crate::emotion::{EmotionModel, select_tone};
use crate::fallback::{StampSource, fallback_content};
use crate::numbers::sample_ratio;
use crate::pool::PoolLookupError;
use crate::result::CategorySelection;
use crate::sampler::{AliasTable, SamplerError};
use crate::seed::entropy_rng;
use rand::RngCore;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure while choosing content for one category.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SelectionError {
    #[error("pool lookup for {category}/{tone} failed")]
    PoolAccess {
        category: CategoryId,
        tone: EmotionTone,
        #[source]
        source: PoolLookupError,
    },
    #[error("pool for {category}/{tone} could not be sampled")]
    Sampler {
        category: CategoryId,
        tone: EmotionTone,
        #[source]
        source: SamplerError,
    },
}

impl SelectionError {
    #[must_use]
    pub const fn category(&self) -> CategoryId {
        match self {
            Self::PoolAccess { category, .. } | Self::Sampler { category, .. } => *category,
        }
    }
}

/// Pool entry whose debug form is just its id, so sampler errors stay short.
struct PoolEntry(Arc<ContentItem>);

impl fmt::Debug for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.id)
    }
}

/// Composes the emotion model, a content pool, and the weighted sampler.
#[derive(Debug)]
pub struct ContentPoolSelector<P> {
    pool: P,
    emotion: EmotionModel,
}

impl<P: ContentPool> ContentPoolSelector<P> {
    pub fn new(pool: P) -> Self {
        Self::with_model(pool, EmotionModel::default())
    }

    pub const fn with_model(pool: P, emotion: EmotionModel) -> Self {
        Self { pool, emotion }
    }

    pub const fn pool(&self) -> &P {
        &self.pool
    }

    pub const fn emotion(&self) -> &EmotionModel {
        &self.emotion
    }

    /// Select content for `category` using fresh entropy.
    ///
    /// # Errors
    ///
    /// See [`ContentPoolSelector::select_with`].
    pub async fn select(
        &self,
        category: CategoryId,
        fortune_rank: i32,
        excluded: &BTreeSet<String>,
    ) -> Result<CategorySelection, SelectionError> {
        let mut rng = entropy_rng();
        self.select_with(category, fortune_rank, excluded, &mut rng, StampSource::Clock)
            .await
    }

    /// Select content for `category`, drawing every random value from `rng`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectionError::PoolAccess`] when the pool lookup fails and
    /// [`SelectionError::Sampler`] when the pool hands back unusable weights.
    /// Empty or exhausted pools are not errors.
    pub async fn select_with<R: RngCore + Send>(
        &self,
        category: CategoryId,
        fortune_rank: i32,
        excluded: &BTreeSet<String>,
        rng: &mut R,
        stamps: StampSource,
    ) -> Result<CategorySelection, SelectionError> {
        let distribution = self.emotion.for_rank(fortune_rank);
        let tone = select_tone(&distribution, sample_ratio(rng.next_u64()));

        let pool = self
            .pool
            .lookup_pool(category, tone)
            .await
            .map_err(|source| SelectionError::PoolAccess {
                category,
                tone,
                source,
            })?;
        let pool_size = pool.len();

        let candidates: Vec<(PoolEntry, f64)> = pool
            .into_iter()
            .filter(|item| !excluded.contains(&item.id))
            .map(|item| {
                let weight = item.weight;
                (PoolEntry(item), weight)
            })
            .collect();

        if candidates.is_empty() {
            log::debug!(
                target: LOG_TARGET_SELECTOR,
                "{category}/{tone}: {} using fallback",
                if pool_size == 0 {
                    "pool empty,"
                } else {
                    "all pool items already shown,"
                }
            );
            let item = fallback_content(category, tone, stamps.stamp(rng));
            return Ok(CategorySelection::new(category, Arc::new(item), tone));
        }

        let table = AliasTable::build(candidates).map_err(|source| SelectionError::Sampler {
            category,
            tone,
            source,
        })?;
        let PoolEntry(item) = table.sample(rng);
        Ok(CategorySelection::new(category, Arc::clone(item), tone))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::StaticContentPool;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct BrokenPool;

    #[async_trait]
    impl ContentPool for BrokenPool {
        async fn lookup_pool(
            &self,
            _category: CategoryId,
            _tone: EmotionTone,
        ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError> {
            Err(PoolLookupError::unavailable("offline"))
        }
    }

    struct ZeroWeightPool;

    #[async_trait]
    impl ContentPool for ZeroWeightPool {
        async fn lookup_pool(
            &self,
            _category: CategoryId,
            _tone: EmotionTone,
        ) -> Result<Vec<Arc<ContentItem>>, PoolLookupError> {
            Ok(vec![Arc::new(ContentItem::new("zero", "t").with_weight(0.0))])
        }
    }

    fn positive_pool(ids: &[&str]) -> StaticContentPool {
        let mut pool = StaticContentPool::new();
        for id in ids {
            pool.insert(
                CategoryId::Deployment,
                EmotionTone::Positive,
                ContentItem::new(*id, format!("text for {id}")),
            )
            .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn top_rank_picks_positive_pool_item() {
        let selector = ContentPoolSelector::new(positive_pool(&["a"]));
        let selection = selector
            .select(CategoryId::Deployment, 4, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(selection.tone, EmotionTone::Positive);
        assert_eq!(selection.content_id(), "a");
        assert!(!selection.is_fallback());
    }

    #[tokio::test]
    async fn exclusion_skips_shown_items() {
        let selector = ContentPoolSelector::new(positive_pool(&["a", "b"]));
        let excluded: BTreeSet<String> = std::iter::once(String::from("a")).collect();
        for _ in 0..50 {
            let selection = selector
                .select(CategoryId::Deployment, 4, &excluded)
                .await
                .unwrap();
            assert_eq!(selection.content_id(), "b");
        }
    }

    #[tokio::test]
    async fn exhausted_pool_falls_back() {
        let selector = ContentPoolSelector::new(positive_pool(&["a"]));
        let excluded: BTreeSet<String> = std::iter::once(String::from("a")).collect();
        let selection = selector
            .select(CategoryId::Deployment, 4, &excluded)
            .await
            .unwrap();
        assert!(selection.is_fallback());
        assert_ne!(selection.content_id(), "a");
        assert_eq!(selection.tone, EmotionTone::Positive);
    }

    #[tokio::test]
    async fn empty_pool_falls_back_with_distinct_ids() {
        let selector = ContentPoolSelector::new(StaticContentPool::new());
        let first = selector
            .select(CategoryId::Learning, -2, &BTreeSet::new())
            .await
            .unwrap();
        let second = selector
            .select(CategoryId::Learning, -2, &BTreeSet::new())
            .await
            .unwrap();
        assert_eq!(first.tone, EmotionTone::Negative);
        assert!(first.is_fallback() && second.is_fallback());
        assert_ne!(first.content_id(), second.content_id());
    }

    #[tokio::test]
    async fn lookup_failure_is_pool_access_error() {
        let selector = ContentPoolSelector::new(BrokenPool);
        let err = selector
            .select(CategoryId::Teamwork, 0, &BTreeSet::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SelectionError::PoolAccess { .. }));
        assert_eq!(err.category(), CategoryId::Teamwork);
    }

    #[tokio::test]
    async fn bad_weights_surface_as_sampler_error() {
        let selector = ContentPoolSelector::new(ZeroWeightPool);
        let err = selector
            .select(CategoryId::CodeReview, 4, &BTreeSet::new())
            .await
            .unwrap_err();
        match err {
            SelectionError::Sampler { source, .. } => {
                assert!(matches!(source, SamplerError::NonPositiveWeight { ref item, .. } if item == "zero"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn seeded_stream_is_reproducible() {
        let selector = ContentPoolSelector::new(positive_pool(&["a", "b", "c", "d"]));
        let mut picks = Vec::new();
        for _ in 0..2 {
            let mut rng = ChaCha8Rng::seed_from_u64(77);
            let mut run = Vec::new();
            for _ in 0..10 {
                let selection = selector
                    .select_with(
                        CategoryId::Deployment,
                        4,
                        &BTreeSet::new(),
                        &mut rng,
                        StampSource::Stream,
                    )
                    .await
                    .unwrap();
                run.push(selection.content_id().to_owned());
            }
            picks.push(run);
        }
        assert_eq!(picks[0], picks[1]);
    }
}
