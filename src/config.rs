use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

use crate::services::seed::COLOR_NAMES;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_DATABASE_URL: &str = "sqlite://storefront.db?mode=rwc";
const CONFIG_DIR: &str = "config";
const DEFAULT_SEED_CUSTOMERS: u32 = 100;
const DEFAULT_SEED_ORDERS: u32 = 1000;
const DEFAULT_SEED_PRODUCTS: u32 = 10;
pub const DEFAULT_REVENUE_WINDOW_DAYS: i64 = 30;
pub const DEFAULT_SPEND_THRESHOLD: i64 = 500;

/// Synthetic data generation settings
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SeedConfig {
    /// Number of customers to fabricate
    #[serde(default = "default_seed_customers")]
    #[validate(range(min = 1, max = 100000))]
    pub customers: u32,

    /// Number of orders to fabricate, spread over existing customers
    #[serde(default = "default_seed_orders")]
    #[validate(range(max = 1000000))]
    pub orders: u32,

    /// Number of products; each gets a distinct color name
    #[serde(default = "default_seed_products")]
    #[validate(range(min = 1))]
    pub products: u32,

    /// Fixed RNG seed for reproducible data
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

impl SeedConfig {
    /// Field validation plus the rules that depend on other modules
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;

        let mut errors = ValidationErrors::new();
        if self.products as usize > COLOR_NAMES.len() {
            let mut err = ValidationError::new("products");
            err.message = Some(
                format!(
                    "products cannot exceed {} (one per available color name)",
                    COLOR_NAMES.len()
                )
                .into(),
            );
            errors.add("products", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            customers: DEFAULT_SEED_CUSTOMERS,
            orders: DEFAULT_SEED_ORDERS,
            products: DEFAULT_SEED_PRODUCTS,
            rng_seed: None,
        }
    }
}

/// Default parameters for reports invoked without explicit arguments
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    /// Trailing window for the revenue report, in days
    #[serde(default = "default_revenue_window_days")]
    #[validate(range(min = 0))]
    pub revenue_window_days: i64,

    /// Spending threshold for the big-spender report, in currency units
    #[serde(default = "default_spend_threshold")]
    pub spend_threshold: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            revenue_window_days: DEFAULT_REVENUE_WINDOW_DAYS,
            spend_threshold: DEFAULT_SPEND_THRESHOLD,
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to create the schema on startup when it is missing
    #[serde(default = "default_true_bool")]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1))]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Seed generator settings
    #[serde(default)]
    #[validate]
    pub seed: SeedConfig,

    /// Report defaults
    #[serde(default)]
    #[validate]
    pub reports: ReportConfig,
}

impl AppConfig {
    /// Creates a configuration with defaults for everything but the
    /// connection URL
    pub fn new(database_url: String) -> Self {
        Self {
            database_url,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: default_true_bool(),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            seed: SeedConfig::default(),
            reports: ReportConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        self.seed.validate_all()?;

        let mut errors = ValidationErrors::new();
        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_true_bool() -> bool {
    true
}

// SQLite allows a single writer; in-memory databases also vanish per connection
fn default_db_max_connections() -> u32 {
    1
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_seed_customers() -> u32 {
    DEFAULT_SEED_CUSTOMERS
}
fn default_seed_orders() -> u32 {
    DEFAULT_SEED_ORDERS
}
fn default_seed_products() -> u32 {
    DEFAULT_SEED_PRODUCTS
}

fn default_revenue_window_days() -> i64 {
    DEFAULT_REVENUE_WINDOW_DAYS
}
fn default_spend_threshold() -> i64 {
    DEFAULT_SPEND_THRESHOLD
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront={},sea_orm=warn,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] with an explicit config directory
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(
            File::with_name(&config_dir.join("default").to_string_lossy()).required(false),
        )
        .add_source(File::with_name(&config_dir.join(&run_env).to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
