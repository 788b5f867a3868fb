//! RetryPolicy - テナントごとのリトライ設定

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::event::ParseEnumError;

pub const MAX_RETRIES_CEILING: u32 = 10;
pub const MIN_INITIAL_DELAY_MS: u64 = 100;
pub const MIN_TIMEOUT_MS: u64 = 1_000;
pub const MAX_TIMEOUT_MS: u64 = 120_000;

/// リトライ間隔の伸び方
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

impl BackoffStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            BackoffStrategy::Exponential => "exponential",
            BackoffStrategy::Linear => "linear",
            BackoffStrategy::Fixed => "fixed",
        }
    }
}

impl fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackoffStrategy {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exponential" => Ok(BackoffStrategy::Exponential),
            "linear" => Ok(BackoffStrategy::Linear),
            "fixed" => Ok(BackoffStrategy::Fixed),
            other => Err(ParseEnumError {
                kind: "backoff strategy",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("max_retries must be between 0 and {MAX_RETRIES_CEILING}, got {0}")]
    MaxRetriesOutOfRange(u32),

    #[error("initial_delay_ms must be at least {MIN_INITIAL_DELAY_MS}, got {0}")]
    InitialDelayTooSmall(u64),

    #[error("initial_delay_ms ({initial}) must not exceed max_delay_ms ({max})")]
    InitialAboveMax { initial: u64, max: u64 },

    #[error("timeout_ms must be between {MIN_TIMEOUT_MS} and {MAX_TIMEOUT_MS}, got {0}")]
    TimeoutOutOfRange(u64),

    #[error("circuit_breaker_threshold must be at least 1")]
    ZeroBreakerThreshold,

    #[error("policy store unavailable: {0}")]
    Storage(String),
}

/// (tenant, environment) ごとのリトライ動作
///
/// テナントの初回参照時に [`RetryPolicy::default`] で作られ、
/// 検証済みの update で丸ごと置き換わる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_strategy: BackoffStrategy,
    pub timeout_ms: u64,
    // Stored and validated only; no breaker is enforced yet.
    pub circuit_breaker_enabled: bool,
    pub circuit_breaker_threshold: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 2_000,
            max_delay_ms: 300_000,
            backoff_strategy: BackoffStrategy::Exponential,
            timeout_ms: 25_000,
            circuit_breaker_enabled: false,
            circuit_breaker_threshold: 5,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.max_retries > MAX_RETRIES_CEILING {
            return Err(PolicyError::MaxRetriesOutOfRange(self.max_retries));
        }
        if self.initial_delay_ms < MIN_INITIAL_DELAY_MS {
            return Err(PolicyError::InitialDelayTooSmall(self.initial_delay_ms));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(PolicyError::InitialAboveMax {
                initial: self.initial_delay_ms,
                max: self.max_delay_ms,
            });
        }
        if !(MIN_TIMEOUT_MS..=MAX_TIMEOUT_MS).contains(&self.timeout_ms) {
            return Err(PolicyError::TimeoutOutOfRange(self.timeout_ms));
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(PolicyError::ZeroBreakerThreshold);
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// 部分更新を適用して検証する。検証失敗時は `self` を変更しない。
    pub fn apply(&self, update: &PolicyUpdate) -> Result<RetryPolicy, PolicyError> {
        let mut next = self.clone();
        if let Some(v) = update.max_retries {
            next.max_retries = v;
        }
        if let Some(v) = update.initial_delay_ms {
            next.initial_delay_ms = v;
        }
        if let Some(v) = update.max_delay_ms {
            next.max_delay_ms = v;
        }
        if let Some(v) = update.backoff_strategy {
            next.backoff_strategy = v;
        }
        if let Some(v) = update.timeout_ms {
            next.timeout_ms = v;
        }
        if let Some(v) = update.circuit_breaker_enabled {
            next.circuit_breaker_enabled = v;
        }
        if let Some(v) = update.circuit_breaker_threshold {
            next.circuit_breaker_threshold = v;
        }
        next.validate()?;
        Ok(next)
    }
}

/// admin API から受け取る部分更新
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyUpdate {
    pub max_retries: Option<u32>,
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub backoff_strategy: Option<BackoffStrategy>,
    pub timeout_ms: Option<u64>,
    pub circuit_breaker_enabled: Option<bool>,
    pub circuit_breaker_threshold: Option<u32>,
}
