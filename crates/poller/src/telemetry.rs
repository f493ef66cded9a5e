// Tracing bootstrap for decider processes
//
// Console output only; the filter comes from RUST_LOG or LOG_LEVEL.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for log output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Log filter (e.g., "info", "debug", "replayflow_decider=debug")
    pub log_filter: Option<String>,
    /// Whether to color console output
    pub ansi: bool,
    /// Whether to print the target module of each event
    pub with_target: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            ansi: true,
            with_target: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `RUST_LOG` or `LOG_LEVEL`: Log filter
    /// - `NO_COLOR`: Disables colored output when set to anything non-empty
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            log_filter: var("RUST_LOG").or_else(|| var("LOG_LEVEL")),
            ansi: var("NO_COLOR").map_or(true, |v| v.is_empty()),
            ..Default::default()
        }
    }

    /// The filter to install; invalid directives fall back to `info`
    pub fn filter(&self) -> EnvFilter {
        self.log_filter
            .as_deref()
            .and_then(|f| EnvFilter::try_new(f).ok())
            .unwrap_or_else(|| EnvFilter::new("info"))
    }
}

/// Install the global tracing subscriber
///
/// Fails if a subscriber is already installed.
///
/// # Example
///
/// ```ignore
/// use replayflow_poller::telemetry::{init_tracing, TelemetryConfig};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     init_tracing(&TelemetryConfig::from_env())?;
///     // ... start the decider worker
///     Ok(())
/// }
/// ```
pub fn init_tracing(config: &TelemetryConfig) -> Result<(), TryInitError> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(config.with_target)
        .with_ansi(config.ansi)
        .with_filter(config.filter());

    tracing_subscriber::registry().with(console_layer).try_init()?;

    tracing::debug!(filter = ?config.log_filter, "Tracing initialized");
    Ok(())
}
