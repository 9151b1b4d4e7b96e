// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Bounded exponential backoff for the execute-flag poll.
//!
//! The poller asks [`Backoff::next_step`] after every status read that still
//! shows the program running. Sleep periods start at the minimum, double
//! after every step and saturate at the maximum; the last sleep is clipped so
//! the total never exceeds the wait budget. Once the budget is spent the
//! machine answers [`BackoffStep::Expired`] forever.
use std::time::Duration;

/// Poll timing limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// First sleep period.
    pub min_period: Duration,
    /// Ceiling for the sleep period.
    pub max_period: Duration,
    /// Total sleep budget.
    pub max_wait: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_period: Duration::from_micros(50),
            max_period: Duration::from_millis(10),
            max_wait: Duration::from_secs(60),
        }
    }
}

/// What the poller does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffStep {
    /// Sleep this long, then poll again.
    Sleep(Duration),
    /// Budget spent; give up.
    Expired {
        /// Total time slept.
        waited: Duration,
    },
}

/// Backoff state.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    period: Duration,
    waited: Duration,
    steps: u32,
}

impl Backoff {
    /// Fresh machine. A zero minimum period is raised to one microsecond so
    /// the period can grow.
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            period: config.min_period.max(Duration::from_micros(1)),
            config,
            waited: Duration::ZERO,
            steps: 0,
        }
    }

    /// Advances the machine by one poll.
    pub fn next_step(&mut self) -> BackoffStep {
        let remaining = self.config.max_wait.saturating_sub(self.waited);
        if remaining.is_zero() {
            return BackoffStep::Expired {
                waited: self.waited,
            };
        }
        let sleep = self.period.min(remaining);
        self.waited += sleep;
        self.steps += 1;
        self.period = self
            .period
            .saturating_mul(2)
            .min(self.config.max_period.max(self.period));
        BackoffStep::Sleep(sleep)
    }

    /// Total time handed out as sleeps.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Sleep steps handed out.
    pub fn steps(&self) -> u32 {
        self.steps
    }

    /// Period the next sleep would use, before clipping.
    pub fn current_period(&self) -> Duration {
        self.period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sleeps(backoff: &mut Backoff) -> Vec<Duration> {
        let mut out = Vec::new();
        while let BackoffStep::Sleep(d) = backoff.next_step() {
            out.push(d);
        }
        out
    }

    #[test]
    fn periods_double_until_the_ceiling() {
        let mut backoff = Backoff::new(BackoffConfig {
            min_period: Duration::from_micros(50),
            max_period: Duration::from_micros(300),
            max_wait: Duration::from_micros(1000),
        });
        let us: Vec<u128> = sleeps(&mut backoff).iter().map(Duration::as_micros).collect();
        assert_eq!(us, vec![50, 100, 200, 300, 300, 50]);
        assert_eq!(backoff.waited(), Duration::from_micros(1000));
        assert_eq!(
            backoff.next_step(),
            BackoffStep::Expired {
                waited: Duration::from_micros(1000)
            }
        );
    }

    #[test]
    fn reference_limits_spend_exactly_the_budget() {
        let mut backoff = Backoff::new(BackoffConfig {
            min_period: Duration::from_micros(50),
            max_period: Duration::from_millis(10),
            max_wait: Duration::from_secs(1),
        });
        let total: Duration = sleeps(&mut backoff).into_iter().sum();
        assert_eq!(total, Duration::from_secs(1));
        // 8 doubling steps reach the ceiling, then ~99 capped steps.
        assert!(backoff.steps() < 120, "{} steps", backoff.steps());
        assert_eq!(backoff.current_period(), Duration::from_millis(10));
    }

    #[test]
    fn zero_budget_expires_immediately() {
        let mut backoff = Backoff::new(BackoffConfig {
            max_wait: Duration::ZERO,
            ..BackoffConfig::default()
        });
        assert_eq!(
            backoff.next_step(),
            BackoffStep::Expired {
                waited: Duration::ZERO
            }
        );
    }

    #[test]
    fn inverted_limits_do_not_stall() {
        let mut backoff = Backoff::new(BackoffConfig {
            min_period: Duration::ZERO,
            max_period: Duration::ZERO,
            max_wait: Duration::from_micros(10),
        });
        assert_eq!(sleeps(&mut backoff).len(), 10);
    }
}
