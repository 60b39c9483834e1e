use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(5 * 60);

const MIN_DELAY_MS: u64 = 1000;
const JITTER_RATIO: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollPhase {
    Idle,
    Fetching,
    Backoff,
}

/// Host application lifecycle, as reported by the embedding shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppPhase {
    Active,
    Inactive,
    Background,
}

impl AppPhase {
    pub fn is_foreground_transition(from: AppPhase, to: AppPhase) -> bool {
        from != AppPhase::Active && to == AppPhase::Active
    }
}

fn jittered_ms_with_nanos(base_ms: u64, ratio: f64, nanos: i128) -> u64 {
    let frac = ((nanos % 1000) as f64) / 1000.0;
    let delta = (frac * 2.0 - 1.0) * (base_ms as f64 * ratio);
    ((base_ms as f64 + delta).max(MIN_DELAY_MS as f64)) as u64
}

pub(crate) fn backoff_delay_with_nanos(
    interval: Duration,
    max_backoff: Duration,
    consecutive_failures: u32,
    nanos: i128,
) -> Duration {
    // a lone failure is left to the next tick
    if consecutive_failures < 2 {
        return Duration::ZERO;
    }
    let base_ms = interval.as_millis().min(u64::MAX as u128) as u64;
    let exponent = (consecutive_failures - 1).min(16);
    let cap_ms = max_backoff.as_millis().min(u64::MAX as u128) as u64;
    let scaled = base_ms.saturating_mul(1_u64 << exponent).min(cap_ms);
    let jittered = jittered_ms_with_nanos(scaled, JITTER_RATIO, nanos);
    Duration::from_millis(jittered.min(cap_ms.max(MIN_DELAY_MS)))
}

/// How long timer ticks stay suppressed, counted from the start of the
/// failed fetch, after `consecutive_failures` failed polls in a row.
pub fn backoff_delay(interval: Duration, max_backoff: Duration, consecutive_failures: u32) -> Duration {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    backoff_delay_with_nanos(interval, max_backoff, consecutive_failures, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_bounded_around_base() {
        let base_ms = 60_000_u64;

        let slow = jittered_ms_with_nanos(base_ms, 0.1, 0);
        assert!(slow <= base_ms);

        let fast = jittered_ms_with_nanos(base_ms, 0.1, 999);
        assert!(fast >= base_ms);

        let min = jittered_ms_with_nanos(500, 0.1, 0);
        assert!(min >= 1000);
    }

    #[test]
    fn backoff_doubles_per_failure_and_respects_cap() {
        let interval = Duration::from_secs(10);
        let cap = Duration::from_secs(60);
        // 500 nanos sits at the midpoint, so no jitter is applied
        let at = |n| backoff_delay_with_nanos(interval, cap, n, 500);

        assert_eq!(at(0), Duration::ZERO);
        assert_eq!(at(1), Duration::ZERO);
        assert_eq!(at(2), Duration::from_secs(20));
        assert_eq!(at(3), Duration::from_secs(40));
        assert_eq!(at(4), Duration::from_secs(60));
        assert!(backoff_delay_with_nanos(interval, cap, 30, 999) <= cap);
    }

    #[test]
    fn only_returning_to_active_is_a_foreground_transition() {
        assert!(AppPhase::is_foreground_transition(AppPhase::Background, AppPhase::Active));
        assert!(AppPhase::is_foreground_transition(AppPhase::Inactive, AppPhase::Active));
        assert!(!AppPhase::is_foreground_transition(AppPhase::Active, AppPhase::Active));
        assert!(!AppPhase::is_foreground_transition(AppPhase::Active, AppPhase::Background));
    }
}
