//! Fortune rank to emotional tone model.
//!
//! Ranks at or beyond the configured extremes map to single-outcome
//! distributions. Ranks in between read from a tier table; a rank without
//! its own tier is interpolated linearly between its neighbours, with the
//! extremes acting as anchors, so the model stays total and monotonic.

use crate::config::ConfigError;
use crate::constants::{BOTTOM_FORTUNE_RANK, DISTRIBUTION_TOLERANCE, TOP_FORTUNE_RANK};
use crate::data::EmotionTone;
use crate::numbers::clamp_unit;
use serde::{Deserialize, Serialize};

/// Probability of each tone for one draw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionDistribution {
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
}

impl EmotionDistribution {
    pub const ALL_POSITIVE: Self = Self::new(1.0, 0.0, 0.0);
    pub const ALL_NEGATIVE: Self = Self::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(positive: f64, neutral: f64, negative: f64) -> Self {
        Self {
            positive,
            neutral,
            negative,
        }
    }

    #[must_use]
    pub const fn share(&self, tone: EmotionTone) -> f64 {
        match tone {
            EmotionTone::Positive => self.positive,
            EmotionTone::Neutral => self.neutral,
            EmotionTone::Negative => self.negative,
        }
    }

    #[must_use]
    pub fn sum(&self) -> f64 {
        self.positive + self.neutral + self.negative
    }

    /// Whether every share is in `[0, 1]` and the shares sum to one.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        let in_range = [self.positive, self.neutral, self.negative]
            .iter()
            .all(|share| (0.0..=1.0).contains(share));
        in_range && (self.sum() - 1.0).abs() <= DISTRIBUTION_TOLERANCE
    }

    fn lerp(self, other: Self, t: f64) -> Self {
        let mix = |a: f64, b: f64| a + (b - a) * t;
        Self::new(
            mix(self.positive, other.positive),
            mix(self.neutral, other.neutral),
            mix(self.negative, other.negative),
        )
    }
}

/// Tone distribution configured for one fortune rank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionTier {
    pub rank: i32,
    #[serde(flatten)]
    pub distribution: EmotionDistribution,
}

impl EmotionTier {
    #[must_use]
    pub const fn new(rank: i32, positive: f64, neutral: f64, negative: f64) -> Self {
        Self {
            rank,
            distribution: EmotionDistribution::new(positive, neutral, negative),
        }
    }
}

const DEFAULT_TIERS: [EmotionTier; 5] = [
    EmotionTier::new(-1, 0.10, 0.30, 0.60),
    EmotionTier::new(0, 0.25, 0.45, 0.30),
    EmotionTier::new(1, 0.40, 0.40, 0.20),
    EmotionTier::new(2, 0.60, 0.30, 0.10),
    EmotionTier::new(3, 0.80, 0.15, 0.05),
];

/// Tier table mapping ranks to tone distributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTable {
    #[serde(default = "EmotionTable::default_top_rank")]
    pub top_rank: i32,
    #[serde(default = "EmotionTable::default_bottom_rank")]
    pub bottom_rank: i32,
    /// Intermediate tiers, strictly between the extremes.
    #[serde(default = "EmotionTable::default_tiers")]
    pub tiers: Vec<EmotionTier>,
}

impl EmotionTable {
    const fn default_top_rank() -> i32 {
        TOP_FORTUNE_RANK
    }

    const fn default_bottom_rank() -> i32 {
        BOTTOM_FORTUNE_RANK
    }

    fn default_tiers() -> Vec<EmotionTier> {
        DEFAULT_TIERS.to_vec()
    }

    /// Check ordering, normalization, and monotonicity of the tiers.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bottom_rank >= self.top_rank {
            return Err(ConfigError::RankBounds {
                bottom: self.bottom_rank,
                top: self.top_rank,
            });
        }
        let mut previous: Option<&EmotionTier> = None;
        for tier in &self.tiers {
            if tier.rank <= self.bottom_rank || tier.rank >= self.top_rank {
                return Err(ConfigError::TierOutsideBounds {
                    rank: tier.rank,
                    bottom: self.bottom_rank,
                    top: self.top_rank,
                });
            }
            let dist = tier.distribution;
            if !dist.is_normalized() {
                return Err(ConfigError::DistributionNotNormalized {
                    rank: tier.rank,
                    sum: dist.sum(),
                });
            }
            if dist.positive <= 0.0 || dist.positive >= 1.0 {
                return Err(ConfigError::IntermediateExtreme { rank: tier.rank });
            }
            if let Some(prev) = previous {
                if tier.rank <= prev.rank {
                    return Err(ConfigError::TiersOutOfOrder {
                        previous: prev.rank,
                        rank: tier.rank,
                    });
                }
                if dist.positive <= prev.distribution.positive
                    || dist.negative > prev.distribution.negative
                {
                    return Err(ConfigError::NotMonotonic {
                        previous: prev.rank,
                        rank: tier.rank,
                    });
                }
            }
            previous = Some(tier);
        }
        Ok(())
    }

    /// Distribution for `rank` under this table.
    #[must_use]
    pub fn for_rank(&self, rank: i32) -> EmotionDistribution {
        distribution_for(rank, self.bottom_rank, self.top_rank, &self.tiers)
    }
}

impl Default for EmotionTable {
    fn default() -> Self {
        Self {
            top_rank: Self::default_top_rank(),
            bottom_rank: Self::default_bottom_rank(),
            tiers: Self::default_tiers(),
        }
    }
}

fn distribution_for(rank: i32, bottom: i32, top: i32, tiers: &[EmotionTier]) -> EmotionDistribution {
    if rank >= top {
        return EmotionDistribution::ALL_POSITIVE;
    }
    if rank <= bottom {
        return EmotionDistribution::ALL_NEGATIVE;
    }
    if let Some(tier) = tiers.iter().find(|tier| tier.rank == rank) {
        return tier.distribution;
    }

    let (lower_rank, lower) = tiers
        .iter()
        .filter(|tier| tier.rank < rank)
        .map(|tier| (tier.rank, tier.distribution))
        .next_back()
        .unwrap_or((bottom, EmotionDistribution::ALL_NEGATIVE));
    let (upper_rank, upper) = tiers
        .iter()
        .find(|tier| tier.rank > rank)
        .map_or((top, EmotionDistribution::ALL_POSITIVE), |tier| {
            (tier.rank, tier.distribution)
        });
    let span = f64::from(upper_rank) - f64::from(lower_rank);
    let t = (f64::from(rank) - f64::from(lower_rank)) / span;
    lower.lerp(upper, t)
}

/// Validated rank-to-distribution model.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmotionModel {
    table: EmotionTable,
}

impl EmotionModel {
    /// Wrap a tier table after validating it.
    ///
    /// # Errors
    ///
    /// Returns the first constraint the table violates.
    pub fn new(table: EmotionTable) -> Result<Self, ConfigError> {
        table.validate()?;
        Ok(Self { table })
    }

    #[must_use]
    pub fn for_rank(&self, rank: i32) -> EmotionDistribution {
        self.table.for_rank(rank)
    }

    #[must_use]
    pub const fn table(&self) -> &EmotionTable {
        &self.table
    }
}

/// Distribution for `rank` under the built-in tier table.
#[must_use]
pub fn for_rank(rank: i32) -> EmotionDistribution {
    distribution_for(rank, BOTTOM_FORTUNE_RANK, TOP_FORTUNE_RANK, &DEFAULT_TIERS)
}

/// Pick a tone by walking cumulative shares in positive, neutral, negative order.
///
/// Out-of-range samples are clamped into `[0, 1]`. A sample at the very top
/// of the range resolves to the last tone with non-zero share.
#[must_use]
pub fn select_tone(distribution: &EmotionDistribution, sample: f64) -> EmotionTone {
    let draw = clamp_unit(sample);
    let mut cumulative = 0.0;
    for tone in EmotionTone::ALL {
        cumulative += distribution.share(tone);
        if draw < cumulative {
            return tone;
        }
    }
    EmotionTone::ALL
        .into_iter()
        .rev()
        .find(|tone| distribution.share(*tone) > 0.0)
        .unwrap_or(EmotionTone::Neutral)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extremes_are_single_outcome() {
        assert_eq!(for_rank(TOP_FORTUNE_RANK), EmotionDistribution::ALL_POSITIVE);
        assert_eq!(for_rank(99), EmotionDistribution::ALL_POSITIVE);
        assert_eq!(for_rank(BOTTOM_FORTUNE_RANK), EmotionDistribution::ALL_NEGATIVE);
        assert_eq!(for_rank(-50), EmotionDistribution::ALL_NEGATIVE);
    }

    #[test]
    fn intermediate_ranks_are_monotonic() {
        let mut last_positive = 0.0;
        let mut last_negative = 1.0;
        for rank in (BOTTOM_FORTUNE_RANK + 1)..TOP_FORTUNE_RANK {
            let dist = for_rank(rank);
            assert!(dist.is_normalized(), "rank {rank} not normalized");
            assert!(dist.positive > 0.0 && dist.positive < 1.0);
            assert!(dist.positive > last_positive, "positive share fell at {rank}");
            assert!(dist.negative < last_negative, "negative share rose at {rank}");
            last_positive = dist.positive;
            last_negative = dist.negative;
        }
    }

    #[test]
    fn default_table_validates() {
        EmotionTable::default().validate().unwrap();
        let model = EmotionModel::default();
        assert_eq!(model.for_rank(2), for_rank(2));
    }

    #[test]
    fn missing_tier_is_interpolated() {
        let table = EmotionTable {
            top_rank: 4,
            bottom_rank: -2,
            tiers: vec![EmotionTier::new(0, 0.3, 0.4, 0.3)],
        };
        table.validate().unwrap();
        let dist = table.for_rank(2);
        assert!((dist.positive - 0.65).abs() < 1e-9);
        assert!((dist.neutral - 0.2).abs() < 1e-9);
        assert!((dist.negative - 0.15).abs() < 1e-9);
        assert!(dist.is_normalized());

        let bare = EmotionTable {
            tiers: Vec::new(),
            ..EmotionTable::default()
        };
        let mid = bare.for_rank(1);
        assert!((mid.positive - 0.5).abs() < 1e-9);
        assert!((mid.negative - 0.5).abs() < 1e-9);
    }

    #[test]
    fn full_i32_bounds_interpolate() {
        let widest = EmotionTable {
            top_rank: i32::MAX,
            bottom_rank: i32::MIN,
            tiers: Vec::new(),
        };
        let model = EmotionModel::new(widest).unwrap();

        let mid = model.for_rank(0);
        assert!(mid.is_normalized());
        assert!((mid.positive - 0.5).abs() < 1e-6);

        let near_top = model.for_rank(i32::MAX - 1);
        assert!(near_top.is_normalized());
        assert!(near_top.positive > 0.99 && near_top.positive < 1.0);

        let near_bottom = model.for_rank(i32::MIN + 1);
        assert!(near_bottom.negative > 0.99 && near_bottom.negative < 1.0);
        assert_eq!(model.for_rank(i32::MAX), EmotionDistribution::ALL_POSITIVE);
    }

    #[test]
    fn validation_rejects_bad_tables() {
        let unnormalized = EmotionTable {
            tiers: vec![EmotionTier::new(0, 0.5, 0.5, 0.5)],
            ..EmotionTable::default()
        };
        assert!(matches!(
            unnormalized.validate(),
            Err(ConfigError::DistributionNotNormalized { rank: 0, .. })
        ));

        let non_monotonic = EmotionTable {
            tiers: vec![
                EmotionTier::new(0, 0.5, 0.3, 0.2),
                EmotionTier::new(1, 0.4, 0.4, 0.2),
            ],
            ..EmotionTable::default()
        };
        assert!(matches!(
            non_monotonic.validate(),
            Err(ConfigError::NotMonotonic { previous: 0, rank: 1 })
        ));

        let out_of_bounds = EmotionTable {
            tiers: vec![EmotionTier::new(4, 0.5, 0.3, 0.2)],
            ..EmotionTable::default()
        };
        assert!(matches!(
            out_of_bounds.validate(),
            Err(ConfigError::TierOutsideBounds { rank: 4, .. })
        ));

        let extreme_inside = EmotionTable {
            tiers: vec![EmotionTier::new(1, 1.0, 0.0, 0.0)],
            ..EmotionTable::default()
        };
        assert!(EmotionModel::new(extreme_inside).is_err());
    }

    #[test]
    fn tone_selection_walks_cumulative_order() {
        let dist = EmotionDistribution::new(0.2, 0.3, 0.5);
        assert_eq!(select_tone(&dist, 0.0), EmotionTone::Positive);
        assert_eq!(select_tone(&dist, 0.19), EmotionTone::Positive);
        assert_eq!(select_tone(&dist, 0.2), EmotionTone::Neutral);
        assert_eq!(select_tone(&dist, 0.49), EmotionTone::Neutral);
        assert_eq!(select_tone(&dist, 0.5), EmotionTone::Negative);
        assert_eq!(select_tone(&dist, 1.0), EmotionTone::Negative);
        assert_eq!(select_tone(&dist, 7.0), EmotionTone::Negative);
        assert_eq!(select_tone(&dist, -1.0), EmotionTone::Positive);
    }

    #[test]
    fn single_outcome_distributions_ignore_sample() {
        for sample in [0.0, 0.25, 0.999, 1.0] {
            assert_eq!(
                select_tone(&EmotionDistribution::ALL_POSITIVE, sample),
                EmotionTone::Positive
            );
            assert_eq!(
                select_tone(&EmotionDistribution::ALL_NEGATIVE, sample),
                EmotionTone::Negative
            );
        }
    }
}
