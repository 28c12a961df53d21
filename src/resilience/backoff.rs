//! Exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;

/// Delay before relaunch attempt `attempt` (1-based); attempt 0 waits nothing.
///
/// Doubles from `base_ms`, capped at `max_ms`, plus up to 10% jitter so
/// slots that died together do not relaunch in lockstep.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}
