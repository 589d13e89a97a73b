//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `BASKET_API_BASE_URL` - Base URL of the collection server (e.g. `https://shop.example.com/api/`)
//!
//! ## Optional
//! - `BASKET_API_TOKEN` - Bearer credential for the signed-in shopper (absent = signed out)
//! - `BASKET_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `BASKET_RECONCILE_ORDERING` - `settle` or `issue` (default: settle)
//! - `BASKET_SNAPSHOT_CACHE_CAPACITY` - Max cached product snapshots (default: 1000)
//! - `BASKET_SNAPSHOT_CACHE_TTL_SECS` - Snapshot cache TTL (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::reconcile::ReconcileOrdering;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SNAPSHOT_CACHE_CAPACITY: u64 = 1000;
const DEFAULT_SNAPSHOT_CACHE_TTL_SECS: u64 = 300;

/// Substrings of template tokens, matched case-insensitively.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-", "your_", "changeme", "placeholder", "example", "xxx", "todo", "token-here",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the collection server. Always ends with `/`.
    pub api_base_url: Url,
    /// Bearer credential for the current shopper, if signed in.
    pub api_token: Option<SecretString>,
    /// Timeout applied by the HTTP transport to every request.
    pub request_timeout: Duration,
    /// How overlapping responses for the same product are reconciled.
    pub reconcile_ordering: ReconcileOrdering,
    /// Product snapshot cache settings.
    pub snapshot_cache: SnapshotCacheConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

/// Product snapshot cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotCacheConfig {
    /// Maximum number of cached snapshots.
    pub capacity: u64,
    /// How long a cached snapshot stays valid.
    pub ttl: Duration,
}

impl Default for SnapshotCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_SNAPSHOT_CACHE_CAPACITY,
            ttl: Duration::from_secs(DEFAULT_SNAPSHOT_CACHE_TTL_SECS),
        }
    }
}

impl EngineConfig {
    /// Configuration with defaults for everything but the server URL.
    #[must_use]
    pub fn new(api_base_url: Url) -> Self {
        Self {
            api_base_url: normalize_base_url(api_base_url),
            api_token: None,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            reconcile_ordering: ReconcileOrdering::default(),
            snapshot_cache: SnapshotCacheConfig::default(),
            sentry_dsn: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the API token fails validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = get_required_env("BASKET_API_BASE_URL")?;
        let api_base_url = Url::parse(&api_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("BASKET_API_BASE_URL".to_string(), e.to_string())
        })?;
        if api_base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidEnvVar(
                "BASKET_API_BASE_URL".to_string(),
                "must be an absolute http(s) URL".to_string(),
            ));
        }

        let api_token = get_optional_token("BASKET_API_TOKEN")?;
        let request_timeout = Duration::from_secs(get_parsed_env_or_default(
            "BASKET_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let reconcile_ordering = get_env_or_default("BASKET_RECONCILE_ORDERING", "settle")
            .parse::<ReconcileOrdering>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("BASKET_RECONCILE_ORDERING".to_string(), e.to_string())
            })?;
        let snapshot_cache = SnapshotCacheConfig {
            capacity: get_parsed_env_or_default(
                "BASKET_SNAPSHOT_CACHE_CAPACITY",
                DEFAULT_SNAPSHOT_CACHE_CAPACITY,
            )?,
            ttl: Duration::from_secs(get_parsed_env_or_default(
                "BASKET_SNAPSHOT_CACHE_TTL_SECS",
                DEFAULT_SNAPSHOT_CACHE_TTL_SECS,
            )?),
        };
        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            api_base_url: normalize_base_url(api_base_url),
            api_token,
            request_timeout,
            reconcile_ordering,
            snapshot_cache,
            sentry_dsn,
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Ensure the base URL path ends with `/` so endpoint segments append cleanly.
fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable. Empty values count as absent.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get and parse an environment variable, falling back to a default.
fn get_parsed_env_or_default<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}

/// Shannon entropy of a token, in bits per character.
fn bits_per_char(token: &str) -> f64 {
    let mut chars: Vec<char> = token.chars().collect();
    if chars.is_empty() {
        return 0.0;
    }
    chars.sort_unstable();

    #[allow(clippy::cast_precision_loss)] // token lengths are far below 2^52
    let total = chars.len() as f64;
    chars
        .chunk_by(|a, b| a == b)
        .map(|run| {
            #[allow(clippy::cast_precision_loss)]
            let p = run.len() as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Reject bearer tokens copied from a template or typed by hand.
fn check_token(token: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = token.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("looks like a template value (contains '{pattern}')"),
        ));
    }

    let entropy = bits_per_char(token);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("{entropy:.2} bits/char, expected at least {MIN_ENTROPY_BITS_PER_CHAR:.1}"),
        ));
    }
    Ok(())
}

/// Read the shopper token, if configured.
fn get_optional_token(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|token| check_token(&token, key).map(|()| SecretString::from(token)))
        .transpose()
}
