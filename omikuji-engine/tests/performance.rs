use omikuji_engine::{
    AliasTable, CategoryId, ContentItem, EmotionTone, RandomizationCoordinator, SessionGuard,
    StaticContentPool,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

const ITEM_COUNT: u32 = 10_000;
const DRAWS: u32 = 10_000;
const BUILD_BUDGET: Duration = Duration::from_millis(100);
const DRAW_BUDGET: Duration = Duration::from_millis(1);
const RANDOMIZE_BUDGET: Duration = Duration::from_millis(100);

#[test]
fn large_table_builds_and_draws_within_budget() {
    let entries: Vec<(u32, f64)> = (0..ITEM_COUNT)
        .map(|i| (i, f64::from(i % 17 + 1)))
        .collect();

    let started = Instant::now();
    let table = AliasTable::build(entries).expect("valid weights");
    let build_time = started.elapsed();
    assert!(
        build_time < BUILD_BUDGET,
        "build over {ITEM_COUNT} items took {build_time:?}"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(1);
    let started = Instant::now();
    let mut checksum = 0u64;
    for _ in 0..DRAWS {
        checksum = checksum.wrapping_add(u64::from(*table.sample(&mut rng)));
    }
    let average = started.elapsed() / DRAWS;
    assert!(checksum > 0);
    assert!(average < DRAW_BUDGET, "average draw took {average:?}");
}

#[tokio::test]
async fn randomize_fits_request_budget() {
    let mut pool = StaticContentPool::new();
    for category in CategoryId::ALL {
        for tone in EmotionTone::ALL {
            for n in 0..200u32 {
                pool.insert(
                    category,
                    tone,
                    ContentItem::new(format!("{category}-{tone}-{n}"), "text")
                        .with_weight(f64::from(n % 5 + 1)),
                )
                .expect("unique ids");
            }
        }
    }
    let coordinator = RandomizationCoordinator::new(pool, SessionGuard::new());

    for call in 0..20 {
        let session = format!("perf-{call}");
        let started = Instant::now();
        coordinator
            .randomize(call % 7 - 2, Some(&session), None)
            .await
            .expect("randomize");
        let elapsed = started.elapsed();
        assert!(elapsed < RANDOMIZE_BUDGET, "call {call} took {elapsed:?}");
    }
}
