//! Sliding-window rate limiting for authentication attempts.
//!
//! Attempts are keyed by caller IP. On every check, entries older than the
//! window are purged; if the remaining count meets the maximum the attempt is
//! refused and *not* recorded, otherwise it is recorded and admitted.

use chrono::Duration;

use crate::types::Timestamp;

/// Default number of attempts allowed per window.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default window length in seconds.
pub const DEFAULT_WINDOW_SECS: i64 = 300;

/// Limits applied to validation attempts from a single IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub max_attempts: u32,
    pub window_secs: i64,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            window_secs: DEFAULT_WINDOW_SECS,
        }
    }
}

impl RateLimitPolicy {
    pub fn window(&self) -> Duration {
        Duration::seconds(self.window_secs)
    }

    /// Oldest timestamp still inside the window ending at `now`.
    pub fn window_start(&self, now: Timestamp) -> Timestamp {
        now - self.window()
    }

    /// Apply the policy to the attempt log of one IP.
    ///
    /// Purges expired entries, then either records `now` and returns `true`,
    /// or returns `false` leaving the log unchanged apart from the purge.
    pub fn admit(&self, attempts: &mut Vec<Timestamp>, now: Timestamp) -> bool {
        let start = self.window_start(now);
        attempts.retain(|t| *t > start);
        if attempts.len() >= self.max_attempts as usize {
            return false;
        }
        attempts.push(now);
        true
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn eleventh_attempt_in_window_is_refused() {
        let policy = RateLimitPolicy::default();
        let mut log = Vec::new();
        let now = Utc::now();

        for i in 0..10 {
            assert!(
                policy.admit(&mut log, now + Duration::seconds(i)),
                "attempt {i} should be admitted"
            );
        }
        assert!(!policy.admit(&mut log, now + Duration::seconds(10)));
        assert_eq!(log.len(), 10, "refused attempts are not recorded");
    }

    #[test]
    fn attempts_outside_window_are_purged() {
        let policy = RateLimitPolicy::default();
        let mut log = Vec::new();
        let start = Utc::now();

        for _ in 0..10 {
            assert!(policy.admit(&mut log, start));
        }
        assert!(!policy.admit(&mut log, start + Duration::seconds(299)));

        let later = start + Duration::seconds(301);
        assert!(policy.admit(&mut log, later));
        assert_eq!(log, vec![later]);
    }

    #[test]
    fn zero_max_refuses_everything() {
        let policy = RateLimitPolicy {
            max_attempts: 0,
            window_secs: 60,
        };
        let mut log = Vec::new();
        assert!(!policy.admit(&mut log, Utc::now()));
    }
}
