//! Application configuration management.

use rust_decimal::Decimal;
use serde::Deserialize;

/// Environment variable prefix for configuration overrides.
const ENV_PREFIX: &str = "PROCURA";

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Workflow engine configuration.
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How a condition treats a field that is absent from the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingFieldPolicy {
    /// Missing field satisfies the condition (historical behaviour).
    #[default]
    Pass,
    /// Missing field fails the condition.
    Fail,
}

/// Workflow engine configuration.
///
/// The thresholds drive the legacy amount-band routing used when a request
/// has no applicable dynamic workflow steps.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    /// Requests at or below this amount are approved without an approver.
    #[serde(default = "default_auto_approval_threshold")]
    pub auto_approval_threshold: Decimal,
    /// Requests at or below this amount need only a manager.
    #[serde(default = "default_manager_only_threshold")]
    pub manager_only_threshold: Decimal,
    /// Requests above this amount need the CEO after the manager.
    #[serde(default = "default_ceo_approval_threshold")]
    pub ceo_approval_threshold: Decimal,
    /// Condition behaviour for absent request fields.
    #[serde(default)]
    pub missing_field_policy: MissingFieldPolicy,
    /// Lifetime of one-shot approval tokens, in hours.
    #[serde(default = "default_approval_token_ttl_hours")]
    pub approval_token_ttl_hours: u32,
}

fn default_auto_approval_threshold() -> Decimal {
    Decimal::new(100, 0)
}

fn default_manager_only_threshold() -> Decimal {
    Decimal::new(5_000, 0)
}

fn default_ceo_approval_threshold() -> Decimal {
    Decimal::new(50_000, 0)
}

fn default_approval_token_ttl_hours() -> u32 {
    72
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            auto_approval_threshold: default_auto_approval_threshold(),
            manager_only_threshold: default_manager_only_threshold(),
            ceo_approval_threshold: default_ceo_approval_threshold(),
            missing_field_policy: MissingFieldPolicy::default(),
            approval_token_ttl_hours: default_approval_token_ttl_hours(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "procura=debug".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// Sources, lowest precedence first: `config/default`, `config/{RUN_MODE}`,
    /// then `PROCURA__SECTION__KEY` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Parses configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed.
    pub fn from_toml_str(source: &str) -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}
