pub mod reports;
pub mod seeds;

use anyhow::{Context, Result, bail};
use omikuji_engine::{
    EmotionDistribution, EmotionTone, RandomizationCoordinator, SessionGuard, StaticContentPool,
};
use serde::Serialize;
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub use seeds::{SeedInfo, resolve_seed_inputs};

const DEMO_POOL_JSON: &str = include_str!("../../assets/demo_pool.json");
const DEDUP_SESSION: &str = "omikuji-tester-dedup";
const DEDUP_READINGS: usize = 3;

/// Largest tolerated gap between observed and configured tone share, in percentage points.
pub const MAX_TONE_DRIFT_POINTS: f64 = 5.0;

pub type DemoCoordinator = RandomizationCoordinator<StaticContentPool, SessionGuard>;

/// Coordinator over the bundled demo pool with an in-memory session guard.
pub fn demo_coordinator() -> Result<DemoCoordinator> {
    let pool = StaticContentPool::from_json(DEMO_POOL_JSON).context("loading demo pool")?;
    Ok(RandomizationCoordinator::new(pool, SessionGuard::new()))
}

/// Tone and latency figures for one fortune rank.
#[derive(Debug, Clone, Serialize)]
pub struct RankSweep {
    pub rank: i32,
    pub iterations: usize,
    pub expected: EmotionDistribution,
    pub observed: EmotionDistribution,
    pub max_drift_points: f64,
    pub fallback_rate: f64,
    pub average_latency: Duration,
    pub max_latency: Duration,
}

impl RankSweep {
    #[must_use]
    pub fn within_tolerance(&self) -> bool {
        self.max_drift_points <= MAX_TONE_DRIFT_POINTS
    }
}

/// Outcome of replaying one seed twice.
#[derive(Debug, Clone, Serialize)]
pub struct SeedCheck {
    pub seed: SeedInfo,
    pub rank: i32,
    pub reproducible: bool,
    pub content_ids: Vec<String>,
}

/// Outcome of consecutive readings within one session.
#[derive(Debug, Clone, Serialize)]
pub struct DedupCheck {
    pub readings: usize,
    pub repeated_ids: Vec<String>,
}

impl DedupCheck {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.repeated_ids.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptanceReport {
    pub sweeps: Vec<RankSweep>,
    pub seeds: Vec<SeedCheck>,
    pub dedup: DedupCheck,
}

impl AcceptanceReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.sweeps.iter().all(RankSweep::within_tolerance)
            && self.seeds.iter().all(|check| check.reproducible)
            && self.dedup.passed()
    }
}

#[derive(Debug, Default)]
struct ToneCounts {
    positive: usize,
    neutral: usize,
    negative: usize,
}

impl ToneCounts {
    fn record(&mut self, tone: EmotionTone) {
        match tone {
            EmotionTone::Positive => self.positive += 1,
            EmotionTone::Neutral => self.neutral += 1,
            EmotionTone::Negative => self.negative += 1,
        }
    }

    fn shares(&self) -> EmotionDistribution {
        let total = self.positive + self.neutral + self.negative;
        EmotionDistribution::new(
            ratio(self.positive, total),
            ratio(self.neutral, total),
            ratio(self.negative, total),
        )
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn drift_points(expected: &EmotionDistribution, observed: &EmotionDistribution) -> f64 {
    EmotionTone::ALL
        .into_iter()
        .map(|tone| (expected.share(tone) - observed.share(tone)).abs() * 100.0)
        .fold(0.0, f64::max)
}

/// Run `iterations` unseeded readings at `rank` and compare tones to the model.
pub async fn sweep_rank(
    coordinator: &DemoCoordinator,
    rank: i32,
    iterations: usize,
) -> Result<RankSweep> {
    let mut counts = ToneCounts::default();
    let mut fallbacks = 0usize;
    let mut selections = 0usize;
    let mut total_latency = Duration::ZERO;
    let mut max_latency = Duration::ZERO;

    for _ in 0..iterations {
        let started = Instant::now();
        let result = coordinator
            .randomize(rank, None, None)
            .await
            .with_context(|| format!("randomize failed at rank {rank}"))?;
        let elapsed = started.elapsed();
        total_latency += elapsed;
        max_latency = max_latency.max(elapsed);

        for selection in result.selections() {
            counts.record(selection.tone);
        }
        fallbacks += result.fallback_count();
        selections += result.selections().len();
    }

    let expected = coordinator.selector().emotion().for_rank(rank);
    let observed = counts.shares();
    let average_latency = u32::try_from(iterations)
        .ok()
        .filter(|n| *n > 0)
        .map_or(Duration::ZERO, |n| total_latency / n);
    log::debug!("rank {rank}: observed {observed:?} expected {expected:?}");

    Ok(RankSweep {
        rank,
        iterations,
        max_drift_points: drift_points(&expected, &observed),
        expected,
        observed,
        fallback_rate: ratio(fallbacks, selections),
        average_latency,
        max_latency,
    })
}

/// Replay `seed` twice at `rank` and confirm both results match.
pub async fn check_seed(coordinator: &DemoCoordinator, seed: &SeedInfo, rank: i32) -> Result<SeedCheck> {
    let first = coordinator
        .randomize(rank, None, Some(&seed.token))
        .await
        .with_context(|| format!("seeded randomize failed for {}", seed.token))?;
    let second = coordinator
        .randomize(rank, None, Some(&seed.token))
        .await
        .with_context(|| format!("seeded replay failed for {}", seed.token))?;
    Ok(SeedCheck {
        seed: seed.clone(),
        rank,
        reproducible: first == second,
        content_ids: first.content_ids(),
    })
}

/// Draw several readings in one session and collect any pool item shown twice.
pub async fn check_dedup(coordinator: &DemoCoordinator, rank: i32) -> Result<DedupCheck> {
    let mut seen = HashSet::new();
    let mut repeated_ids = Vec::new();
    for _ in 0..DEDUP_READINGS {
        let result = coordinator
            .randomize(rank, Some(DEDUP_SESSION), None)
            .await
            .context("session reading failed")?;
        for selection in result.selections() {
            if !selection.is_fallback() && !seen.insert(selection.content_id().to_owned()) {
                repeated_ids.push(selection.content_id().to_owned());
            }
        }
    }
    coordinator
        .store()
        .delete(DEDUP_SESSION)
        .await
        .context("clearing dedup session failed")?;
    Ok(DedupCheck {
        readings: DEDUP_READINGS,
        repeated_ids,
    })
}

/// Full acceptance run: rank sweeps, seed replays, and a session dedup check.
pub async fn run_acceptance(
    coordinator: &DemoCoordinator,
    ranks: &[i32],
    iterations: usize,
    seeds: &[SeedInfo],
) -> Result<AcceptanceReport> {
    let mut sweeps = Vec::with_capacity(ranks.len());
    for &rank in ranks {
        sweeps.push(sweep_rank(coordinator, rank, iterations).await?);
    }

    let replay_rank = ranks.first().copied().unwrap_or(0);
    let mut seed_checks = Vec::with_capacity(seeds.len());
    for seed in seeds {
        seed_checks.push(check_seed(coordinator, seed, replay_rank).await?);
    }

    let dedup = check_dedup(coordinator, replay_rank).await?;

    Ok(AcceptanceReport {
        sweeps,
        seeds: seed_checks,
        dedup,
    })
}

/// Fail when any sweep drifted too far or any seed did not reproduce.
pub fn validate_acceptance(report: &AcceptanceReport) -> Result<()> {
    for sweep in &report.sweeps {
        if !sweep.within_tolerance() {
            bail!(
                "Rank {} tone drift {:.2} points exceeds {MAX_TONE_DRIFT_POINTS} points",
                sweep.rank,
                sweep.max_drift_points
            );
        }
    }
    if let Some(check) = report.seeds.iter().find(|check| !check.reproducible) {
        bail!("Seed {} did not reproduce at rank {}", check.seed.token, check.rank);
    }
    if !report.dedup.passed() {
        bail!(
            "Session readings repeated content: {}",
            report.dedup.repeated_ids.join(", ")
        );
    }
    Ok(())
}
