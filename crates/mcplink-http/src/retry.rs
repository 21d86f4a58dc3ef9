//! Reconnect policy for long-lived GET streams.

use std::time::Duration;

/// How often a dropped event stream is reopened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Same pause before every attempt
    Fixed {
        /// Pause between attempts
        interval: Duration,
        /// Give up after this many attempts (`None` retries forever)
        max_attempts: Option<u32>,
    },
    /// Doubling pause with jitter, capped at `max_delay`
    Exponential {
        /// First pause
        base: Duration,
        /// Upper bound for any pause
        max_delay: Duration,
        /// Give up after this many attempts (`None` retries forever)
        max_attempts: Option<u32>,
    },
    /// Never reopen
    Never,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            max_attempts: Some(10),
        }
    }
}

impl RetryPolicy {
    /// Pause before retry number `attempt` (0-based), or `None` to give up.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::Fixed {
                interval,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                Some(*interval)
            }
            Self::Exponential {
                base,
                max_delay,
                max_attempts,
            } => {
                if max_attempts.is_some_and(|max| attempt >= max) {
                    return None;
                }
                let max_ms = max_delay.as_millis() as u64;
                let doubled = (base.as_millis() as u64)
                    .saturating_mul(2u64.saturating_pow(attempt))
                    .min(max_ms);
                // +/-25% jitter, derived from the attempt number
                let spread = doubled / 4;
                let offset = if spread > 0 {
                    u64::from(attempt)
                        .wrapping_mul(6_364_136_223_846_793_005)
                        .wrapping_add(1_442_695_040_888_963_407)
                        % (spread * 2)
                } else {
                    0
                };
                Some(Duration::from_millis(
                    doubled.saturating_sub(spread).saturating_add(offset),
                ))
            }
            Self::Never => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fixed_stops_after_max_attempts() {
        let policy = RetryPolicy::Fixed {
            interval: Duration::from_millis(250),
            max_attempts: Some(2),
        };
        assert_eq!(policy.delay(0), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay(1), Some(Duration::from_millis(250)));
        assert_eq!(policy.delay(2), None);
    }

    #[test]
    fn test_exponential_doubles_within_jitter_and_caps() {
        let policy = RetryPolicy::Exponential {
            base: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_attempts: None,
        };
        for (attempt, nominal_ms) in [(0u32, 1000u64), (1, 2000), (2, 4000), (3, 8000), (12, 8000)] {
            let delay = policy.delay(attempt).unwrap().as_millis() as u64;
            assert!(
                delay >= nominal_ms * 3 / 4 && delay <= nominal_ms * 5 / 4,
                "attempt {attempt}: {delay}ms"
            );
        }
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = RetryPolicy::Exponential {
            base: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            max_attempts: None,
        };
        assert!(policy.delay(u32::MAX).unwrap() <= Duration::from_millis(1250));
    }

    #[test]
    fn test_never() {
        assert_eq!(RetryPolicy::Never.delay(0), None);
    }
}
