//! Synthesized content for categories whose pool is empty or exhausted.

use crate::constants::{FALLBACK_ID_PREFIX, TAG_SOURCE, TAG_SOURCE_FALLBACK};
use crate::data::{CategoryId, ContentItem, EmotionTone};
use rand::RngCore;
use std::sync::atomic::{AtomicU64, Ordering};

static FALLBACK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Uniqueness source embedded in a fallback id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FallbackStamp {
    pub millis: i64,
    pub nonce: u64,
}

impl FallbackStamp {
    #[must_use]
    pub const fn new(millis: i64, nonce: u64) -> Self {
        Self { millis, nonce }
    }

    /// Wall-clock stamp mixed with a process-wide sequence number.
    ///
    /// Two stamps taken in the same process never share a nonce.
    pub fn from_clock<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        let sequence = FALLBACK_SEQUENCE.fetch_add(1, Ordering::Relaxed);
        let nonce = (rng.next_u64() & 0xFFFF_FFFF_0000_0000) | (sequence & 0xFFFF_FFFF);
        Self {
            millis: chrono::Utc::now().timestamp_millis(),
            nonce,
        }
    }

    /// Stamp drawn entirely from a (typically seeded) random stream.
    pub fn from_stream<R: RngCore + ?Sized>(rng: &mut R) -> Self {
        Self {
            millis: 0,
            nonce: rng.next_u64(),
        }
    }
}

/// How fallback stamps are produced for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StampSource {
    /// Wall clock plus sequence; unique across calls.
    #[default]
    Clock,
    /// Drawn from the caller's stream; reproducible under a seed.
    Stream,
}

impl StampSource {
    pub fn stamp<R: RngCore + ?Sized>(self, rng: &mut R) -> FallbackStamp {
        match self {
            Self::Clock => FallbackStamp::from_clock(rng),
            Self::Stream => FallbackStamp::from_stream(rng),
        }
    }
}

/// Id for a fallback item; always carries the reserved fallback prefix.
#[must_use]
pub fn fallback_id(category: CategoryId, tone: EmotionTone, stamp: FallbackStamp) -> String {
    format!(
        "{FALLBACK_ID_PREFIX}-{category}-{tone}-{:x}-{:016x}",
        stamp.millis, stamp.nonce
    )
}

fn fallback_text(category: CategoryId, tone: EmotionTone) -> String {
    let name = category.spec().name;
    match tone {
        EmotionTone::Positive => {
            format!("{name}: the signs are bright, even if the details are still loading.")
        }
        EmotionTone::Neutral => format!("{name}: steady as a green build. Keep shipping."),
        EmotionTone::Negative => {
            format!("{name}: tread carefully today and read the diff twice.")
        }
    }
}

/// Build the fallback item for `(category, tone)`.
#[must_use]
pub fn fallback_content(
    category: CategoryId,
    tone: EmotionTone,
    stamp: FallbackStamp,
) -> ContentItem {
    ContentItem::new(fallback_id(category, tone, stamp), fallback_text(category, tone))
        .with_tag(TAG_SOURCE, TAG_SOURCE_FALLBACK)
        .with_tag("category", category.as_str())
        .with_tag("tone", tone.as_str())
}
