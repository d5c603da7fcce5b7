//! # Service Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                            │
//! │     TALLY_DATABASE_PATH=/var/lib/tally/tally.db                         │
//! │     TALLY_TAX_RATE_BPS=500                                              │
//! │                                                                         │
//! │  2. TOML Config File                                                    │
//! │     $TALLY_CONFIG, or                                                   │
//! │     ~/.config/tally-pos/tally.toml (Linux)                              │
//! │     ~/Library/Application Support/com.tally.pos/tally.toml (macOS)      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "/var/lib/tally/tally.db"
//! max_connections = 5
//!
//! [checkout]
//! tax_rate_bps = 500                # 5%
//! loyalty_spend_unit_cents = 1000   # one point per 10.00
//!
//! [tenancy]
//! fallback_to_first_shop = true
//!
//! [retry]
//! attempts = 3
//! base_delay_ms = 300
//!
//! [outbox]
//! batch_size = 50
//! poll_interval_secs = 5
//! max_attempts = 10
//!
//! [logging]
//! filter = "info,tally=debug,sqlx=warn"
//! json = false
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use tally_core::{Rate, DEFAULT_TAX_RATE_BPS, LOYALTY_SPEND_UNIT_CENTS};
use tally_db::DbConfig;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "TALLY_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("tally.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            busy_timeout_ms: default_busy_timeout_ms(),
            run_migrations: true,
        }
    }
}

impl DatabaseSettings {
    pub fn db_config(&self) -> DbConfig {
        if self.path.as_os_str() == ":memory:" {
            return DbConfig::in_memory().run_migrations(self.run_migrations);
        }

        DbConfig::new(&self.path)
            .max_connections(self.max_connections)
            .min_connections(self.min_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .run_migrations(self.run_migrations)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSettings {
    /// Sales tax on the discounted subtotal, in basis points.
    #[serde(default = "default_tax_rate_bps")]
    pub tax_rate_bps: u32,

    /// Spend that earns one loyalty point, in cents.
    #[serde(default = "default_loyalty_spend_unit")]
    pub loyalty_spend_unit_cents: i64,
}

fn default_tax_rate_bps() -> u32 {
    DEFAULT_TAX_RATE_BPS
}

fn default_loyalty_spend_unit() -> i64 {
    LOYALTY_SPEND_UNIT_CENTS
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        CheckoutSettings {
            tax_rate_bps: default_tax_rate_bps(),
            loyalty_spend_unit_cents: default_loyalty_spend_unit(),
        }
    }
}

impl CheckoutSettings {
    pub fn tax_rate(&self) -> Rate {
        Rate::from_bps(self.tax_rate_bps)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenancySettings {
    /// Attribute writes to the first shop when nothing else resolves.
    ///
    /// Suits a single-shop deployment. Multi-shop deployments should turn
    /// this off so unattributed writes stay unscoped instead.
    #[serde(default = "default_true")]
    pub fallback_to_first_shop: bool,
}

impl Default for TenancySettings {
    fn default() -> Self {
        TenancySettings {
            fallback_to_first_shop: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts including the first.
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    300
}

fn default_max_delay_ms() -> u64 {
    5_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetrySettings {
            attempts: default_retry_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboxSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Entries that failed this many times are skipped.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_batch_size() -> u32 {
    50
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for OutboxSettings {
    fn default() -> Self {
        OutboxSettings {
            batch_size: default_batch_size(),
            poll_interval_secs: default_poll_interval_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl OutboxSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_filter() -> String {
    "info,tally=debug,sqlx=warn".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            filter: default_log_filter(),
            json: false,
        }
    }
}

// =============================================================================
// PosConfig
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub checkout: CheckoutSettings,

    #[serde(default)]
    pub tenancy: TenancySettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub outbox: OutboxSettings,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PosConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (`config_path`, `$TALLY_CONFIG`, or the platform config dir)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        let path = config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .or_else(Self::default_config_path);

        if let Some(path) = path {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns defaults if loading fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load config: {}. Using defaults.", e);
            Self::default()
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Applies `TALLY_*` overrides read through `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("TALLY_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(value) = lookup("TALLY_TAX_RATE_BPS") {
            self.checkout.tax_rate_bps = parse_value("TALLY_TAX_RATE_BPS", &value)?;
        }

        if let Some(value) = lookup("TALLY_LOYALTY_SPEND_UNIT_CENTS") {
            self.checkout.loyalty_spend_unit_cents =
                parse_value("TALLY_LOYALTY_SPEND_UNIT_CENTS", &value)?;
        }

        if let Some(value) = lookup("TALLY_FALLBACK_TO_FIRST_SHOP") {
            self.tenancy.fallback_to_first_shop =
                parse_value("TALLY_FALLBACK_TO_FIRST_SHOP", &value)?;
        }

        if let Some(filter) = lookup("TALLY_LOG") {
            self.logging.filter = filter;
        }

        if let Some(value) = lookup("TALLY_LOG_JSON") {
            self.logging.json = parse_value("TALLY_LOG_JSON", &value)?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.checkout.tax_rate_bps > Rate::FULL_BPS {
            return Err(ConfigError::invalid(
                "checkout.tax_rate_bps",
                format!("must be at most {}", Rate::FULL_BPS),
            ));
        }

        if self.checkout.loyalty_spend_unit_cents <= 0 {
            return Err(ConfigError::invalid(
                "checkout.loyalty_spend_unit_cents",
                "must be positive",
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::invalid("database.max_connections", "must be positive"));
        }

        if self.retry.attempts == 0 {
            return Err(ConfigError::invalid("retry.attempts", "must be positive"));
        }

        if self.outbox.batch_size == 0 {
            return Err(ConfigError::invalid("outbox.batch_size", "must be positive"));
        }

        Ok(())
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "tally", "pos")
            .map(|dirs| dirs.config_dir().join("tally.toml"))
    }
}

fn parse_value<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid(field, format!("cannot parse '{}'", value)))
}
