//! Backoff delay computation.

use std::time::Duration;

use rand::Rng;

use crate::domain::BackoffStrategy;

/// Smallest delay ever scheduled.
pub const MIN_DELAY: Duration = Duration::from_millis(100);

/// Relative jitter span: delays vary by up to ±20%.
pub const JITTER_RATIO: f64 = 0.2;

/// Source of the jitter factor applied to a computed delay.
pub trait Jitter: Send + Sync {
    /// A factor in `[1 - JITTER_RATIO, 1 + JITTER_RATIO]`.
    fn factor(&self) -> f64;
}

/// Uniform ±20% jitter from the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn factor(&self) -> f64 {
        rand::thread_rng().gen_range((1.0 - JITTER_RATIO)..=(1.0 + JITTER_RATIO))
    }
}

/// Always 1.0; deterministic delays for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn factor(&self) -> f64 {
        1.0
    }
}

/// Delay before retry number `attempts` (1-based count of attempts made).
///
/// - exponential: `initial * multiplier^(attempts - 1)`
/// - linear: `initial * attempts`
/// - fixed: `initial`
///
/// Jitter is applied before clamping to `[MIN_DELAY, max_delay]`.
pub fn compute_delay(
    strategy: BackoffStrategy,
    initial: Duration,
    multiplier: f64,
    attempts: u32,
    max_delay: Duration,
    jitter: &dyn Jitter,
) -> Duration {
    let attempts = attempts.max(1);
    let initial_ms = initial.as_millis() as f64;
    let base_ms = match strategy {
        BackoffStrategy::Exponential => initial_ms * multiplier.powi((attempts - 1) as i32),
        BackoffStrategy::Linear => initial_ms * f64::from(attempts),
        BackoffStrategy::Fixed => initial_ms,
    };

    let jittered_ms = base_ms * jitter.factor();
    let max_ms = max_delay.max(MIN_DELAY).as_millis() as f64;
    let clamped_ms = jittered_ms.clamp(MIN_DELAY.as_millis() as f64, max_ms);
    Duration::from_millis(clamped_ms.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const MAX: Duration = Duration::from_secs(300);

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[rstest]
    #[case(1, 1_000)]
    #[case(2, 2_000)]
    #[case(3, 4_000)]
    fn exponential_doubles(#[case] attempts: u32, #[case] expected_ms: u64) {
        let d = compute_delay(
            BackoffStrategy::Exponential,
            ms(1_000),
            2.0,
            attempts,
            MAX,
            &NoJitter,
        );
        assert_eq!(d, ms(expected_ms));
    }

    #[rstest]
    #[case::linear(BackoffStrategy::Linear, 3, 1_500)]
    #[case::fixed(BackoffStrategy::Fixed, 3, 500)]
    fn other_strategies(
        #[case] strategy: BackoffStrategy,
        #[case] attempts: u32,
        #[case] expected_ms: u64,
    ) {
        let d = compute_delay(strategy, ms(500), 2.0, attempts, MAX, &NoJitter);
        assert_eq!(d, ms(expected_ms));
    }

    #[test]
    fn clamps_to_max_delay() {
        let d = compute_delay(
            BackoffStrategy::Exponential,
            ms(1_000),
            2.0,
            20,
            ms(5_000),
            &NoJitter,
        );
        assert_eq!(d, ms(5_000));
    }

    #[test]
    fn never_below_floor() {
        let d = compute_delay(BackoffStrategy::Fixed, ms(10), 1.0, 1, MAX, &NoJitter);
        assert_eq!(d, MIN_DELAY);
    }

    #[test]
    fn random_jitter_stays_within_twenty_percent() {
        for _ in 0..500 {
            let d = compute_delay(
                BackoffStrategy::Fixed,
                ms(10_000),
                1.0,
                1,
                MAX,
                &RandomJitter,
            );
            assert!(d >= ms(8_000) && d <= ms(12_000), "{d:?}");
        }
    }
}
