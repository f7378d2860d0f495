//! Exponential backoff for retry attempts.
//!
//! The delay before attempt `k ≥ 1` is `2^(k−1) + jitter` seconds, with
//! jitter drawn uniformly from `[0.1, 0.5)` to avoid thundering herds.

use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// Compute the backoff delay before the given attempt (0-based initial
/// attempt gets no delay).
#[must_use]
pub fn backoff_delay(attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let base = 2f64.powi(attempt as i32 - 1);
    let jitter = rand::thread_rng().gen_range(0.1..0.5);
    Duration::from_secs_f64(base + jitter)
}

/// Sleep out the backoff for the given attempt.
pub async fn sleep_backoff(attempt: u32) {
    let delay = backoff_delay(attempt);
    if !delay.is_zero() {
        debug!(attempt, delay_secs = delay.as_secs_f64(), "backing off before retry");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_attempt_has_no_delay() {
        assert_eq!(backoff_delay(0), Duration::ZERO);
    }

    #[test]
    fn delays_fall_in_the_specified_window() {
        for attempt in 1..=5u32 {
            let base = 2f64.powi(attempt as i32 - 1);
            for _ in 0..50 {
                let delay = backoff_delay(attempt).as_secs_f64();
                assert!(delay >= base + 0.1 - f64::EPSILON, "attempt {attempt}: {delay}");
                assert!(delay < base + 1.0, "attempt {attempt}: {delay}");
            }
        }
    }

    #[test]
    fn delays_grow_exponentially() {
        // Minimum possible delay of attempt k+1 exceeds the maximum of k
        // from attempt 2 onwards (2^k + 0.1 > 2^(k-1) + 0.5 for k >= 1).
        let max_2 = 2.0 + 0.5;
        let min_3 = 4.0 + 0.1;
        assert!(min_3 > max_2);
    }
}
