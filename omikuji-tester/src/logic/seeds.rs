use anyhow::{Result, bail};
use omikuji_engine::seed_from_text;
use serde::Serialize;
use std::collections::HashSet;

const MAX_SEED_TOKEN_LEN: usize = 128;
const DEFAULT_SEED: &str = "1337";

/// One seed as typed on the command line plus the value the engine derives from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedInfo {
    pub token: String,
    pub value: u64,
}

impl SeedInfo {
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        Self {
            token: token.to_owned(),
            value: seed_from_text(token),
        }
    }
}

/// Resolve CLI seed tokens, dropping duplicates that derive the same value.
///
/// Accepts decimal integers and free-form text. Falls back to a single
/// default seed when nothing usable was supplied.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<SeedInfo>> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::new();
    for token in tokens {
        if token.is_empty() {
            continue;
        }
        if token.len() > MAX_SEED_TOKEN_LEN {
            bail!("Seed token longer than {MAX_SEED_TOKEN_LEN} bytes: {token}");
        }
        if token.chars().any(char::is_control) {
            bail!("Seed token contains control characters: {token:?}");
        }
        let info = SeedInfo::from_token(token);
        if seen.insert(info.value) {
            seeds.push(info);
        }
    }
    if seeds.is_empty() {
        seeds.push(SeedInfo::from_token(DEFAULT_SEED));
    }
    Ok(seeds)
}
