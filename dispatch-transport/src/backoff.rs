use rand::Rng;
use std::time::Duration;

/// Exponential reconnect delay with up to 25% random jitter, capped at `max_ms`.
pub fn reconnect_delay(attempt: u32, initial_ms: u64, max_ms: u64) -> Duration {
    let base = initial_ms
        .saturating_mul(1u64 << attempt.min(16))
        .min(max_ms);
    let jitter = if base >= 4 {
        rand::thread_rng().gen_range(0..=base / 4)
    } else {
        0
    };
    Duration::from_millis(base.saturating_add(jitter).min(max_ms))
}
