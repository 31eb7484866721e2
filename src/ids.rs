//! Identifier generation
//!
//! Persona ids embed a per-run timestamp so a fresh pass never collides with
//! an identity that shared the same base name and was hard-deleted earlier.
//! The timestamp source is injected so tests can drive id generation
//! deterministically.

use std::sync::atomic::{AtomicI64, Ordering};

/// Timestamp source for id disambiguation and correlation ids.
pub trait RunClock: Send + Sync {
    /// Milliseconds since the Unix epoch (or a test-controlled sequence).
    fn timestamp_millis(&self) -> i64;
}

/// Wall-clock backed implementation used in production.
pub struct SystemClock;

impl RunClock for SystemClock {
    fn timestamp_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Monotonic counter clock for deterministic tests.
///
/// Every read returns a strictly larger value, so two seeding passes always
/// get distinct disambiguators even when they run back to back.
pub struct SequenceClock {
    next: AtomicI64,
}

impl SequenceClock {
    pub fn starting_at(start: i64) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Default for SequenceClock {
    fn default() -> Self {
        Self::starting_at(1_000)
    }
}

impl RunClock for SequenceClock {
    fn timestamp_millis(&self) -> i64 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }
}

/// Disambiguated persona id: `{base}-{run timestamp}`.
pub fn persona_id(base: &str, run_stamp: i64) -> String {
    format!("{base}-{run_stamp}")
}

/// Globally unique correlation id: time plus a random suffix.
///
/// The suffix keeps ids unique across repeated passes even if two passes
/// share a clock reading.
pub fn correlation_id(prefix: &str, clock: &dyn RunClock) -> String {
    format!(
        "{}-{}-{:08x}",
        prefix,
        clock.timestamp_millis(),
        rand::random::<u32>()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_clock_is_strictly_increasing() {
        let clock = SequenceClock::starting_at(42);
        let a = clock.timestamp_millis();
        let b = clock.timestamp_millis();
        let c = clock.timestamp_millis();
        assert!(a < b && b < c);
        assert_eq!(a, 42);
    }

    #[test]
    fn test_persona_id_embeds_stamp() {
        assert_eq!(persona_id("maya", 1234), "maya-1234");
        assert_ne!(persona_id("maya", 1), persona_id("maya", 2));
    }

    #[test]
    fn test_correlation_ids_are_unique() {
        let clock = SequenceClock::default();
        let a = correlation_id("act", &clock);
        let b = correlation_id("act", &clock);
        assert!(a.starts_with("act-"));
        assert_ne!(a, b);
    }
}
