//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `LACED_DATABASE_URL` - `PostgreSQL` connection string
//! - `LACED_BASE_URL` - Public URL for the storefront
//! - `CURRENCY_API_URL` - Exchange-rate endpoint returning `{status_code, data: {mid}}`
//! - `SNEAKS_API_URL` / `SNEAKS_API_KEY` - Sneaker aggregator provider
//! - `RESALE_API_URL` / `RESALE_TOKEN_URL` / `RESALE_CLIENT_ID` /
//!   `RESALE_CLIENT_SECRET` - Secondary marketplace provider (OAuth2
//!   client credentials)
//! - `MARKET_API_URL` / `MARKET_API_KEY` - General marketplace search provider
//!
//! ## Optional
//! - `LACED_HOST` - Bind address (default: 127.0.0.1)
//! - `LACED_PORT` - Listen port (default: 3000)
//! - `LACED_DEFAULT_PROVIDER` - Provider used by listing pages (default: sneaks)
//! - `CURRENCY_TTL_SECS` - Exchange-rate freshness window (default: 3600)
//! - `CURRENCY_CODE` / `CURRENCY_SYMBOL` - Display currency (default: IDR / Rp)
//! - `RESALE_TIMEOUT_SECS` - Resale request timeout (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use laced_core::PriceFormat;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Provider used by listing pages when none is named in the query
    pub default_provider: String,
    /// Exchange-rate service configuration
    pub currency: CurrencyConfig,
    /// Product-data provider configuration
    pub providers: ProvidersConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Exchange-rate service configuration.
#[derive(Debug, Clone)]
pub struct CurrencyConfig {
    /// Endpoint returning `{ status_code, data: { mid } }`
    pub api_url: String,
    /// Freshness window for the cached rate
    pub ttl: Duration,
    /// ISO 4217 code of the display currency
    pub code: String,
    /// Display conventions for rendered prices
    pub format: PriceFormat,
}

/// Product-data provider configuration.
#[derive(Debug, Clone)]
pub struct ProvidersConfig {
    pub sneaks: SneaksConfig,
    pub resale: ResaleConfig,
    pub market: MarketConfig,
}

/// Sneaker aggregator provider (static API key).
///
/// Implements `Debug` manually to redact the key.
#[derive(Clone)]
pub struct SneaksConfig {
    pub api_url: String,
    pub api_key: SecretString,
}

impl std::fmt::Debug for SneaksConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SneaksConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Secondary marketplace provider (OAuth2 client credentials).
///
/// The only integration with deliberate resilience settings: an explicit
/// request timeout and a bounded retry with linear backoff on the token
/// fetch.
#[derive(Clone)]
pub struct ResaleConfig {
    pub api_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub request_timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl std::fmt::Debug for ResaleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResaleConfig")
            .field("api_url", &self.api_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("request_timeout", &self.request_timeout)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .finish()
    }
}

/// General marketplace search provider (static API key).
#[derive(Clone)]
pub struct MarketConfig {
    pub api_url: String,
    pub api_key: SecretString,
}

impl std::fmt::Debug for MarketConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

impl StorefrontConfig {
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

        let database_url = get_database_url("LACED_DATABASE_URL")?;
        let host = get_env_or_default("LACED_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("LACED_HOST".to_owned(), e.to_string()))?;
        let port = get_env_or_default("LACED_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("LACED_PORT".to_owned(), e.to_string()))?;
        let base_url = get_required_env("LACED_BASE_URL")?;
        let default_provider = get_env_or_default("LACED_DEFAULT_PROVIDER", "sneaks");

        let currency = CurrencyConfig::from_env()?;
        let providers = ProvidersConfig::from_env()?;
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            default_provider,
            currency,
            providers,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl CurrencyConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ttl_secs = get_env_or_default("CURRENCY_TTL_SECS", "3600")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("CURRENCY_TTL_SECS".to_owned(), e.to_string())
            })?;
        let symbol = get_env_or_default("CURRENCY_SYMBOL", "Rp");

        Ok(Self {
            api_url: get_required_url("CURRENCY_API_URL")?,
            ttl: Duration::from_secs(ttl_secs),
            code: get_env_or_default("CURRENCY_CODE", "IDR"),
            format: PriceFormat {
                symbol,
                thousands_separator: '.',
            },
        })
    }
}

impl ProvidersConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            sneaks: SneaksConfig {
                api_url: get_required_url("SNEAKS_API_URL")?,
                api_key: get_required_secret("SNEAKS_API_KEY")?,
            },
            resale: ResaleConfig::from_env()?,
            market: MarketConfig {
                api_url: get_required_url("MARKET_API_URL")?,
                api_key: get_required_secret("MARKET_API_KEY")?,
            },
        })
    }
}

impl ResaleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_env_or_default("RESALE_TIMEOUT_SECS", "10")
            .parse::<u64>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("RESALE_TIMEOUT_SECS".to_owned(), e.to_string())
            })?;

        Ok(Self {
            api_url: get_required_url("RESALE_API_URL")?,
            token_url: get_required_url("RESALE_TOKEN_URL")?,
            client_id: get_required_env("RESALE_CLIENT_ID")?,
            client_secret: get_required_secret("RESALE_CLIENT_SECRET")?,
            request_timeout: Duration::from_secs(timeout_secs),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get a required environment variable that must parse as an absolute URL.
fn get_required_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    validate_url(key, &value)?;
    Ok(value)
}

/// Check that a configured endpoint is an absolute http(s) URL.
fn validate_url(key: &str, value: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_owned(), e.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::InvalidEnvVar(
            key.to_owned(),
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }
    Ok(())
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_accepts_https() {
        assert!(validate_url("TEST", "https://api.example.com/v1").is_ok());
    }

    #[test]
    fn test_validate_url_rejects_relative() {
        assert!(validate_url("TEST", "/v1/products").is_err());
    }

    #[test]
    fn test_validate_url_rejects_other_schemes() {
        let err = validate_url("TEST", "ftp://example.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_socket_addr() {
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_owned(),
            default_provider: "sneaks".to_owned(),
            currency: CurrencyConfig {
                api_url: "https://fx.example.com/usd".to_owned(),
                ttl: Duration::from_secs(3600),
                code: "IDR".to_owned(),
                format: PriceFormat::default(),
            },
            providers: ProvidersConfig {
                sneaks: SneaksConfig {
                    api_url: "https://sneaks.example.com".to_owned(),
                    api_key: SecretString::from("key"),
                },
                resale: ResaleConfig {
                    api_url: "https://resale.example.com".to_owned(),
                    token_url: "https://resale.example.com/oauth/token".to_owned(),
                    client_id: "client".to_owned(),
                    client_secret: SecretString::from("secret"),
                    request_timeout: Duration::from_secs(10),
                    max_attempts: 3,
                    retry_backoff: Duration::from_millis(500),
                },
                market: MarketConfig {
                    api_url: "https://market.example.com".to_owned(),
                    api_key: SecretString::from("key"),
                },
            },
            sentry_dsn: None,
        };

        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_provider_config_debug_redacts_secrets() {
        let config = ResaleConfig {
            api_url: "https://resale.example.com".to_owned(),
            token_url: "https://resale.example.com/oauth/token".to_owned(),
            client_id: "client_id_value".to_owned(),
            client_secret: SecretString::from("super_secret_value"),
            request_timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_backoff: Duration::from_millis(500),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("client_id_value"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_value"));
    }
}
