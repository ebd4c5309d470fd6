//! Reports configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `SHOPIFY_STORE` - Shopify store domain (e.g., your-store.myshopify.com)
//! - `SHOPIFY_ACCESS_TOKEN` - Admin API access token
//!
//! ## Optional
//! - `SHOPIFY_API_VERSION` - API version (default: 2025-01)
//! - `REPORT_OUTPUT_DIR` - Directory for CSV artifacts (default: output)
//! - `REPORT_WORKER_POLL_INTERVAL` - Job poll interval in seconds (default: 5)
//! - `DATABASE_URL` - `PostgreSQL` connection string (worker mode only)
//! - `SMTP_HOST` - SMTP relay host (email disabled when unset)
//! - `SMTP_PORT` - SMTP relay port (default: 587)
//! - `SMTP_USERNAME` - SMTP username
//! - `SMTP_PASSWORD` - SMTP password
//! - `REPORT_FROM_ADDRESS` - From address for report emails
//! - `REPORT_RECIPIENTS` - Comma-separated recipient addresses

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Reports application configuration.
#[derive(Debug, Clone)]
pub struct ReportsConfig {
    /// Shopify Admin API configuration
    pub shopify: ShopifyConfig,
    /// Email delivery configuration (None disables email)
    pub email: Option<EmailConfig>,
    /// Directory CSV artifacts are written to
    pub output_dir: PathBuf,
    /// How often the worker polls for queued jobs
    pub worker_poll_interval: Duration,
    /// `PostgreSQL` connection string (worker mode only)
    pub database_url: Option<SecretString>,
}

/// Shopify Admin API configuration.
///
/// Implements `Debug` manually to redact the access token.
#[derive(Clone)]
pub struct ShopifyConfig {
    /// Shopify store domain (e.g., your-store.myshopify.com)
    pub store: String,
    /// Shopify API version (e.g., 2025-01)
    pub api_version: String,
    /// Admin API access token
    pub access_token: SecretString,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("store", &self.store)
            .field("api_version", &self.api_version)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// SMTP delivery configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP relay host
    pub smtp_host: String,
    /// SMTP relay port
    pub smtp_port: u16,
    /// SMTP username
    pub smtp_username: String,
    /// SMTP password
    pub smtp_password: SecretString,
    /// From address for report emails
    pub from_address: String,
    /// Recipient addresses
    pub recipients: Vec<String>,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("recipients", &self.recipients)
            .finish()
    }
}

impl ReportsConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let shopify = ShopifyConfig::from_env()?;
        let email = EmailConfig::from_env()?;
        let output_dir = PathBuf::from(get_env_or_default("REPORT_OUTPUT_DIR", "output"));
        let poll_seconds = get_env_or_default("REPORT_WORKER_POLL_INTERVAL", "5")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("REPORT_WORKER_POLL_INTERVAL".to_string(), e.to_string())
            })?;
        let database_url = get_optional_env("DATABASE_URL").map(SecretString::from);

        Ok(Self {
            shopify,
            email,
            output_dir,
            worker_poll_interval: Duration::from_secs(poll_seconds),
            database_url,
        })
    }
}

impl ShopifyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: normalize_store_domain(&get_required_env("SHOPIFY_STORE")?),
            api_version: get_env_or_default("SHOPIFY_API_VERSION", "2025-01"),
            access_token: get_required_secret("SHOPIFY_ACCESS_TOKEN")?,
        })
    }

    /// The Admin GraphQL endpoint for this store and API version.
    #[must_use]
    pub fn graphql_endpoint(&self) -> String {
        format!(
            "https://{}/admin/api/{}/graphql.json",
            self.store, self.api_version
        )
    }
}

impl EmailConfig {
    /// Email is enabled only when `SMTP_HOST` is set; once enabled, the
    /// remaining delivery variables are required.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST") else {
            return Ok(None);
        };

        let smtp_port = get_env_or_default("SMTP_PORT", "587")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("SMTP_PORT".to_string(), e.to_string()))?;
        let recipients: Vec<String> = get_required_env("REPORT_RECIPIENTS")?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        if recipients.is_empty() {
            return Err(ConfigError::InvalidEnvVar(
                "REPORT_RECIPIENTS".to_string(),
                "no recipient addresses".to_string(),
            ));
        }

        Ok(Some(Self {
            smtp_host,
            smtp_port,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_required_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("REPORT_FROM_ADDRESS")?,
            recipients,
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Strip any URL scheme and trailing slash from a store domain.
fn normalize_store_domain(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}
