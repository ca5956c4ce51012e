//! Configuration for keel

use keel_registry::CatalogConfig;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::resolver::RevisitPolicy;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeelConfig {
    /// Package sources and override locations
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Reconciliation settings
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Seconds between reconciliation ticks
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,

    /// Treatment of dependencies reached through more than one path
    #[serde(default)]
    pub revisit_policy: RevisitPolicy,

    /// Upper bound on components stepped at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_reconciles: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            reconcile_interval_secs: default_reconcile_interval(),
            revisit_policy: RevisitPolicy::default(),
            max_concurrent_reconciles: default_max_concurrent(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Enable JSON output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_reconcile_interval() -> u64 {
    10
}

fn default_max_concurrent() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

impl KeelConfig {
    /// Load configuration from defaults, an optional file and the environment
    ///
    /// Environment variables use the `KEEL` prefix with `__` between path
    /// segments, e.g. `KEEL__LIFECYCLE__REVISIT_POLICY=allow-resolved`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&KeelConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KEEL")
                .separator("__")
                .try_parsing(true),
        );

        Ok(builder.build()?.try_deserialize()?)
    }
}
