//! Weighted sampling with the alias method.
//!
//! Building a table is O(n); each draw afterwards costs one bucket pick and
//! one biased coin flip regardless of how many items are in the table.

use crate::constants::LOG_TARGET_SAMPLER;
use crate::numbers::usize_to_f64;
use crate::seed::entropy_rng;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;
use thiserror::Error;

/// Misuse of the weighted sampler.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SamplerError {
    #[error("cannot build a sampler from an empty item list")]
    EmptyInput,
    #[error("item {item} at index {index} has non-positive weight {weight}")]
    NonPositiveWeight {
        index: usize,
        item: String,
        weight: f64,
    },
    #[error("item {item} at index {index} has a non-finite weight")]
    NonFiniteWeight { index: usize, item: String },
    #[error("total weight overflowed")]
    TotalWeightOverflow,
    #[error("draw requested before a successful build")]
    NotBuilt,
}

/// Immutable alias table over a list of weighted items.
#[derive(Debug, Clone)]
pub struct AliasTable<T> {
    items: Vec<T>,
    weights: Vec<f64>,
    prob: Vec<f64>,
    alias: Vec<usize>,
    total_weight: f64,
}

impl<T: fmt::Debug> AliasTable<T> {
    /// Build the table from `(item, weight)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::EmptyInput`] for an empty list and
    /// [`SamplerError::NonPositiveWeight`] / [`SamplerError::NonFiniteWeight`]
    /// naming the first offending item.
    pub fn build(entries: Vec<(T, f64)>) -> Result<Self, SamplerError> {
        if entries.is_empty() {
            return Err(SamplerError::EmptyInput);
        }
        for (index, (item, weight)) in entries.iter().enumerate() {
            if !weight.is_finite() {
                return Err(SamplerError::NonFiniteWeight {
                    index,
                    item: format!("{item:?}"),
                });
            }
            if *weight <= 0.0 {
                return Err(SamplerError::NonPositiveWeight {
                    index,
                    item: format!("{item:?}"),
                    weight: *weight,
                });
            }
        }

        let (items, weights): (Vec<T>, Vec<f64>) = entries.into_iter().unzip();
        let total_weight: f64 = weights.iter().sum();
        if !total_weight.is_finite() {
            return Err(SamplerError::TotalWeightOverflow);
        }

        let (prob, alias) = partition(&weights, total_weight);
        log::trace!(
            target: LOG_TARGET_SAMPLER,
            "alias table built over {} items (total weight {total_weight})",
            items.len()
        );
        Ok(Self {
            items,
            weights,
            prob,
            alias,
            total_weight,
        })
    }
}

/// Split normalized weights into per-bucket keep probabilities and aliases.
fn partition(weights: &[f64], total_weight: f64) -> (Vec<f64>, Vec<usize>) {
    let n = weights.len();
    let scale = usize_to_f64(n) / total_weight;
    let mut scaled: Vec<f64> = weights.iter().map(|w| w * scale).collect();
    let mut prob = vec![0.0; n];
    let mut alias: Vec<usize> = (0..n).collect();

    let mut light = Vec::with_capacity(n);
    let mut heavy = Vec::with_capacity(n);
    for (idx, value) in scaled.iter().enumerate() {
        if *value < 1.0 {
            light.push(idx);
        } else {
            heavy.push(idx);
        }
    }

    while !light.is_empty() && !heavy.is_empty() {
        let (Some(small), Some(large)) = (light.pop(), heavy.pop()) else {
            break;
        };
        prob[small] = scaled[small];
        alias[small] = large;
        scaled[large] = (scaled[large] + scaled[small]) - 1.0;
        if scaled[large] < 1.0 {
            light.push(large);
        } else {
            heavy.push(large);
        }
    }

    // Whatever remains is 1.0 up to floating-point drift.
    for idx in heavy.into_iter().chain(light) {
        prob[idx] = 1.0;
    }
    (prob, alias)
}

impl<T> AliasTable<T> {
    /// Draw the index of one item.
    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let bucket = rng.gen_range(0..self.items.len());
        let coin: f64 = rng.r#gen();
        if coin < self.prob[bucket] {
            bucket
        } else {
            self.alias[bucket]
        }
    }

    /// Draw one item.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> &T {
        &self.items[self.sample_index(rng)]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Exact probability that a draw returns the item at `index`.
    #[must_use]
    pub fn probability_of(&self, index: usize) -> Option<f64> {
        self.weights.get(index).map(|w| w / self.total_weight)
    }

    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    fn into_item(mut self, index: usize) -> T {
        self.items.swap_remove(index)
    }
}

/// Reusable sampler owning both its table and its random source.
///
/// Constructing with [`WeightedSampler::with_seed`] makes the sequence of
/// draws reproducible for identical build input and draw count.
#[derive(Debug, Clone)]
pub struct WeightedSampler<T> {
    table: Option<AliasTable<T>>,
    rng: ChaCha8Rng,
    seed: Option<u64>,
}

impl<T: fmt::Debug> WeightedSampler<T> {
    /// Sampler drawing from operating-system entropy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            table: None,
            rng: entropy_rng(),
            seed: None,
        }
    }

    /// Deterministic sampler.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            table: None,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// Replace the sampling table.
    ///
    /// A failed build leaves the sampler unbuilt.
    ///
    /// # Errors
    ///
    /// Propagates [`AliasTable::build`] errors.
    pub fn build(&mut self, items: Vec<(T, f64)>) -> Result<(), SamplerError> {
        self.table = None;
        self.table = Some(AliasTable::build(items)?);
        Ok(())
    }

    /// Draw one item.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::NotBuilt`] before a successful build.
    pub fn draw(&mut self) -> Result<&T, SamplerError> {
        let table = self.table.as_ref().ok_or(SamplerError::NotBuilt)?;
        Ok(table.sample(&mut self.rng))
    }

    /// Draw one item using an external random source.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::NotBuilt`] before a successful build.
    pub fn draw_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&T, SamplerError> {
        let table = self.table.as_ref().ok_or(SamplerError::NotBuilt)?;
        Ok(table.sample(rng))
    }

    #[must_use]
    pub const fn is_built(&self) -> bool {
        self.table.is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.as_ref().map_or(0, AliasTable::len)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn total_weight(&self) -> Option<f64> {
        self.table.as_ref().map(AliasTable::total_weight)
    }

    #[must_use]
    pub const fn seed(&self) -> Option<u64> {
        self.seed
    }

    #[must_use]
    pub const fn table(&self) -> Option<&AliasTable<T>> {
        self.table.as_ref()
    }
}

impl<T: fmt::Debug> Default for WeightedSampler<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot weighted draw from entropy.
///
/// # Errors
///
/// Propagates [`AliasTable::build`] errors.
pub fn sample<T: fmt::Debug>(items: Vec<(T, f64)>) -> Result<T, SamplerError> {
    sample_with(items, &mut entropy_rng())
}

/// One-shot weighted draw from a caller-supplied random source.
///
/// # Errors
///
/// Propagates [`AliasTable::build`] errors.
pub fn sample_with<T: fmt::Debug, R: Rng + ?Sized>(
    items: Vec<(T, f64)>,
    rng: &mut R,
) -> Result<T, SamplerError> {
    let table = AliasTable::build(items)?;
    let idx = table.sample_index(rng);
    Ok(table.into_item(idx))
}
