//! Configuration for the risk register runtime

use riskreg_workflow::{ApprovalConfig, WorkflowConfig};
use serde::{Deserialize, Serialize};

/// Main register configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterConfig {
    /// Storage backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Which control edits need manager approval
    #[serde(default)]
    pub approval: ApprovalConfig,

    /// Review and event settings
    #[serde(default)]
    pub workflow: WorkflowConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
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

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RegisterConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `RISKREG__`-prefixed environment variables (`__` separates levels,
    /// e.g. `RISKREG__WORKFLOW__VALIDATE_BASELINE_ON_APPROVAL=true`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&RegisterConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("RISKREG")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("approval.control_ids")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}
