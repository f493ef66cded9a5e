//! Poller and worker configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest page the coordination service hands out
pub const MAX_PAGE_SIZE: usize = 1000;

/// Configuration for one decision poller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollerConfig {
    /// Domain the workflows are registered in
    pub domain: String,

    /// Task list to poll for decision tasks
    pub task_list: String,

    /// Identity reported to the service with every poll
    pub identity: String,

    /// Maximum history events per page
    pub page_size: usize,

    /// Poll interval right after a task was handled
    #[serde(with = "duration_millis")]
    pub min_interval: Duration,

    /// Poll interval ceiling while idle
    #[serde(with = "duration_millis")]
    pub max_interval: Duration,

    /// Growth of the poll interval after each empty poll
    pub backoff_multiplier: f64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            domain: "default".to_string(),
            task_list: "deciders".to_string(),
            identity: format!("decider-{}", Uuid::now_v7()),
            page_size: 100,
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            backoff_multiplier: 1.5,
        }
    }
}

impl PollerConfig {
    pub fn new(domain: impl Into<String>, task_list: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            task_list: task_list.into(),
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `REPLAYFLOW_DOMAIN`: Domain (default: "default")
    /// - `REPLAYFLOW_TASK_LIST`: Decision task list (default: "deciders")
    /// - `REPLAYFLOW_IDENTITY`: Poller identity (default: "decider-<uuid>")
    /// - `REPLAYFLOW_PAGE_SIZE`: History page size (default: 100)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            domain: var("REPLAYFLOW_DOMAIN").unwrap_or(defaults.domain),
            task_list: var("REPLAYFLOW_TASK_LIST").unwrap_or(defaults.task_list),
            identity: var("REPLAYFLOW_IDENTITY").unwrap_or(defaults.identity),
            page_size: var("REPLAYFLOW_PAGE_SIZE")
                .and_then(|s| s.parse().ok())
                .map_or(defaults.page_size, clamp_page_size),
            ..defaults
        }
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Set the history page size, clamped to 1..=1000
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = clamp_page_size(size);
        self
    }

    /// Set minimum poll interval
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Set maximum poll interval
    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier.max(1.0);
        self
    }
}

fn clamp_page_size(size: usize) -> usize {
    size.clamp(1, MAX_PAGE_SIZE)
}

/// Configuration for a pool of decision pollers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// Number of pollers running concurrently
    pub pollers: usize,

    /// Configuration shared by every poller; each gets its own identity suffix
    pub poller: PollerConfig,

    /// How long shutdown waits for in-flight decision tasks
    #[serde(with = "duration_millis")]
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            pollers: 4,
            poller: PollerConfig::default(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl WorkerConfig {
    pub fn new(poller: PollerConfig) -> Self {
        Self {
            poller,
            ..Default::default()
        }
    }

    /// Create configuration from environment variables
    ///
    /// Reads everything [`PollerConfig::from_env`] reads, plus
    /// `REPLAYFLOW_WORKERS` for the number of pollers (default: 4).
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let pollers = var("REPLAYFLOW_WORKERS")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(4);
        Self {
            pollers: pollers.max(1),
            poller: PollerConfig::from_vars(var),
            ..Default::default()
        }
    }

    /// Set the number of concurrent pollers
    pub fn with_pollers(mut self, pollers: usize) -> Self {
        self.pollers = pollers.max(1);
        self
    }

    /// Set shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
