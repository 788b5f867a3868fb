//! Service configuration.
//!
//! Loaded from YAML; every section and field has a default so a partial
//! file (or none at all) works.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::classify::parse_ranges;
use crate::domain::{Environment, EventType, RetryPolicy, TenantId};

/// Overrides `ingress.allowed_ranges` with a comma-separated CIDR list.
pub const ALLOWED_RANGES_ENV: &str = "COURIER_ALLOWED_RANGES";

/// Published gateway callback ranges.
pub const DEFAULT_ALLOWED_RANGES: [&str; 4] = [
    "196.201.214.0/24",
    "196.201.215.0/24",
    "196.201.216.0/24",
    "196.201.217.0/24",
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CourierConfig {
    pub server: ServerConfig,
    pub queue: QueueConfig,
    pub workers: WorkerConfig,
    pub delivery: DeliveryConfig,
    pub dlq: DlqConfig,
    pub metrics: MetricsConfig,
    pub ingress: IngressConfig,
    /// Endpoints registered at startup.
    pub tenants: Vec<TenantRoute>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3001".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Upper bound on waiting + delayed + in-flight jobs.
    pub max_depth: usize,
    /// Entries kept in the finished-job log.
    pub finished_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_depth: 10_000,
            finished_capacity: 1_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { count: 5 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Policy handed to tenants on first reference.
    pub default_policy: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqConfig {
    /// Oldest records are evicted beyond this count.
    pub max_records: usize,
    /// Records older than this are purged by the retention loop.
    pub retention_secs: u64,
    /// How often the retention loop runs.
    pub purge_interval_secs: u64,
    pub max_healthy_jobs: usize,
    pub max_healthy_age_secs: u64,
}

impl Default for DlqConfig {
    fn default() -> Self {
        Self {
            max_records: 1_000,
            retention_secs: 7 * 24 * 60 * 60,
            purge_interval_secs: 60 * 60,
            max_healthy_jobs: 100,
            max_healthy_age_secs: 24 * 60 * 60,
        }
    }
}

impl DlqConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    pub fn max_healthy_age(&self) -> Duration {
        Duration::from_secs(self.max_healthy_age_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub history_capacity: usize,
    pub stream_interval_secs: u64,
    /// Background sampling into the history ring; 0 disables it.
    pub sample_interval_secs: u64,
    pub throughput_window_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            history_capacity: 100,
            stream_interval_secs: 5,
            sample_interval_secs: 30,
            throughput_window_secs: 60,
        }
    }
}

impl MetricsConfig {
    pub fn stream_interval(&self) -> Duration {
        Duration::from_secs(self.stream_interval_secs.max(1))
    }

    pub fn throughput_window(&self) -> Duration {
        Duration::from_secs(self.throughput_window_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngressConfig {
    pub allowed_ranges: Vec<String>,
    /// Used in `dev` when a tenant has no registered endpoint.
    pub dev_fallback_url: Option<String>,
}

impl Default for IngressConfig {
    fn default() -> Self {
        Self {
            allowed_ranges: DEFAULT_ALLOWED_RANGES.iter().map(|s| s.to_string()).collect(),
            dev_fallback_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantRoute {
    pub tenant: TenantId,
    #[serde(default)]
    pub environment: Environment,
    /// Limits the route to one event type; all types when absent.
    #[serde(default)]
    pub event_type: Option<EventType>,
    pub url: String,
    #[serde(default)]
    pub policy: Option<RetryPolicy>,
}

impl CourierConfig {
    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// File if present, defaults otherwise; then environment overrides and
    /// validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) if p.exists() => Self::from_file(p)?,
            Some(p) => {
                tracing::warn!(path = %p.display(), "config file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        if let Ok(raw) = std::env::var(ALLOWED_RANGES_ENV) {
            config.apply_allowed_ranges(&raw);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn apply_allowed_ranges(&mut self, raw: &str) {
        self.ingress.allowed_ranges = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.count == 0 {
            return Err(ConfigError::Invalid("workers.count must be at least 1".into()));
        }
        if self.queue.max_depth == 0 {
            return Err(ConfigError::Invalid("queue.max_depth must be at least 1".into()));
        }
        if self.dlq.purge_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "dlq.purge_interval_secs must be at least 1".into(),
            ));
        }
        if self.metrics.history_capacity == 0 {
            return Err(ConfigError::Invalid(
                "metrics.history_capacity must be at least 1".into(),
            ));
        }
        parse_ranges(&self.ingress.allowed_ranges)
            .map_err(|e| ConfigError::Invalid(format!("ingress.allowed_ranges: {e}")))?;
        self.delivery
            .default_policy
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("delivery.default_policy: {e}")))?;
        for route in &self.tenants {
            if let Some(policy) = &route.policy {
                policy.validate().map_err(|e| {
                    ConfigError::Invalid(format!("tenants[{}].policy: {e}", route.tenant))
                })?;
            }
        }
        Ok(())
    }
}
