use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration error: {0}")]
    Load(#[from] ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// How auto-selection breaks ties between equal lowest prices.
///
/// A policy knob rather than a hard-coded rule: the tie-break is a
/// business choice, not a requirement, so tenants can pick.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Earliest `filled_at` wins (first bidder at the best price).
    #[default]
    EarliestResponse,
    /// Lowest supplier id wins (deterministic regardless of timing).
    LowestSupplierId,
}

/// Automatic winner selection policy.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct WinnerPolicy {
    pub tie_break: TieBreak,
}

/// Application configuration, loaded from `config/{default,<env>}.toml`
/// overlaid with `APP__`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// HS256 secret for verifying buyer JWTs issued by the identity
    /// collaborator (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Bind host
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Environment name ("development", "test", "production")
    pub environment: String,

    /// Log level for this crate's targets
    pub log_level: String,

    /// Emit JSON-formatted logs
    #[serde(default)]
    pub log_json: bool,

    /// Run migrations on startup
    #[serde(default = "default_true")]
    pub auto_migrate: bool,

    /// Base URL embedded in supplier invitation links
    #[serde(default = "default_portal_base_url")]
    pub portal_base_url: String,

    #[serde(default)]
    #[validate]
    pub winner_policy: WinnerPolicy,
}

fn default_true() -> bool {
    true
}

fn default_portal_base_url() -> String {
    "http://localhost:8080/portal/quotes".to_string()
}

impl AppConfig {
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Minimal constructor for tests and tooling.
    pub fn for_tests(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "test".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: true,
            portal_base_url: default_portal_base_url(),
            winner_policy: WinnerPolicy::default(),
        }
    }
}

/// Loads configuration for the environment selected by `RUN_ENV` /
/// `APP_ENV` (default: development).
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // jwt_secret has no default: it must come from a config file or the
    // environment so an insecure placeholder never reaches production.
    let builder = Config::builder()
        .set_default("database_url", "sqlite://sourcing.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"));

    let cfg: AppConfig = builder.build()?.try_deserialize()?;
    cfg.validate()
        .map_err(|e| AppConfigError::Validation(e.to_string()))?;
    Ok(cfg)
}

/// Initializes the global tracing subscriber. `RUST_LOG` overrides the
/// configured level when set.
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let default_directive = format!("sourcing_api={},tower_http=info", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);
    let filter = EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        let _ = registry.with(fmt::layer().json()).try_init();
    } else {
        let _ = registry.with(fmt::layer()).try_init();
    }
}
