// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted executor settings.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use spindle_config::{ConfigError, ConfigService, ConfigStore};

use crate::backoff::BackoffConfig;
use crate::exception::ExceptionPolicy;

/// Poll limits for one execute step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecuteOptions {
    /// Backoff limits.
    pub backoff: BackoffConfig,
    /// Sleep once before polling starts.
    pub expected_runtime: Option<Duration>,
}

impl ExecuteOptions {
    /// Options with the given limits and no runtime hint.
    pub fn new(min_period: Duration, max_period: Duration, max_wait: Duration) -> Self {
        Self {
            backoff: BackoffConfig {
                min_period,
                max_period,
                max_wait,
            },
            expected_runtime: None,
        }
    }

    /// Adds a runtime hint.
    pub fn with_expected_runtime(mut self, runtime: Duration) -> Self {
        self.expected_runtime = Some(runtime);
        self
    }
}

/// Executor settings as stored under [`ExecutorSettings::KEY`].
///
/// Durations are plain integers so the JSON stays hand-editable; missing
/// fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    /// First poll sleep, microseconds.
    pub min_wait_period_us: u64,
    /// Poll sleep ceiling, microseconds.
    pub max_wait_period_us: u64,
    /// Total poll budget, microseconds.
    pub max_wait_us: u64,
    /// Sleep before the first poll, microseconds.
    pub expected_runtime_us: Option<u64>,
    /// Ask the board to timestamp responses.
    pub time_annotation: bool,
    /// Attempts to find the chip out of reset before triggering.
    pub reset_attempts: u32,
    /// Pause between reset checks, milliseconds.
    pub reset_retry_ms: u64,
    /// Exception flags that do not fail a fetch.
    pub exception_policy: ExceptionPolicy,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            min_wait_period_us: 50,
            max_wait_period_us: 10_000,
            max_wait_us: 60_000_000,
            expected_runtime_us: None,
            time_annotation: true,
            reset_attempts: 3,
            reset_retry_ms: 1000,
            exception_policy: ExceptionPolicy::default(),
        }
    }
}

impl ExecutorSettings {
    /// Config key.
    pub const KEY: &'static str = "executor";

    /// Loads settings, falling back to defaults when none are stored.
    pub fn load<S: ConfigStore>(service: &ConfigService<S>) -> Result<Self, ConfigError> {
        service.load_or_default(Self::KEY)
    }

    /// Persists settings.
    pub fn save<S: ConfigStore>(&self, service: &ConfigService<S>) -> Result<(), ConfigError> {
        service.save(Self::KEY, self)
    }

    /// Poll options for [`PlaybackProgramExecutor::run`](crate::PlaybackProgramExecutor::run).
    pub fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            backoff: BackoffConfig {
                min_period: Duration::from_micros(self.min_wait_period_us),
                max_period: Duration::from_micros(self.max_wait_period_us),
                max_wait: Duration::from_micros(self.max_wait_us),
            },
            expected_runtime: self.expected_runtime_us.map(Duration::from_micros),
        }
    }

    /// Pause between reset checks.
    pub fn reset_retry(&self) -> Duration {
        Duration::from_millis(self.reset_retry_ms)
    }
}
