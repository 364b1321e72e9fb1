//! Centralized tuning constants for the omikuji engine.
//!
//! Values here shape the probabilistic behavior of every draw. They live in
//! code so that changes go through review rather than through loaded assets.

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_TARGET_SAMPLER: &str = "omikuji::sampler";
pub(crate) const LOG_TARGET_SELECTOR: &str = "omikuji::selector";
pub(crate) const LOG_TARGET_SESSION: &str = "omikuji::session";
pub(crate) const LOG_TARGET_COORDINATOR: &str = "omikuji::coordinator";
pub(crate) const LOG_TARGET_POOL: &str = "omikuji::pool";

// Fortune ranks ------------------------------------------------------------
/// Ranks at or above this value always yield a purely positive tone.
pub const TOP_FORTUNE_RANK: i32 = 4;
/// Ranks at or below this value always yield a purely negative tone.
pub const BOTTOM_FORTUNE_RANK: i32 = -2;
/// Allowed drift when checking that a distribution sums to one.
pub const DISTRIBUTION_TOLERANCE: f64 = 1e-6;

// Sessions -----------------------------------------------------------------
/// Inactivity window after which a session is considered expired.
pub const SESSION_TTL_SECS: u64 = 10 * 60;

// Content ------------------------------------------------------------------
/// Default weight applied to content items that do not carry one.
pub const DEFAULT_CONTENT_WEIGHT: f64 = 1.0;
/// Id prefix reserved for synthesized fallback content.
pub const FALLBACK_ID_PREFIX: &str = "fallback";
/// Tag key marking where a content item came from.
pub const TAG_SOURCE: &str = "source";
/// Tag value for synthesized fallback content.
pub const TAG_SOURCE_FALLBACK: &str = "fallback";

// Seeds --------------------------------------------------------------------
pub(crate) const SEED_HASH_DOMAIN: u64 = 0x6f6d_696b_756a_6921;
pub(crate) const STREAM_TAG_CATEGORY: &[u8] = b"omikuji.category.";
