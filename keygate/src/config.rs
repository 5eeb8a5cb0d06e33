//! Gateway configuration module.
//!
//! Configuration is read from environment variables.
//!
//! # Environment Variables
//!
//! - `KEYGATE_JWKS_URL`: URL of the authority's key-publication document (required)
//! - `KEYGATE_FETCH_TIMEOUT_SECS`: Timeout for one keyset fetch (default: `10`)
//! - `KEYGATE_REFRESH_INTERVAL_SECS`: Background refresh period, `0` disables (default: `300`)
//! - `KEYGATE_LISTEN_PORT`: Port to listen on (default: `8080`)
//! - `KEYGATE_ISSUER`: Required `iss` claim (default: unchecked)
//! - `KEYGATE_AUDIENCE`: Required `aud` entry (default: unchecked)
//! - `KEYGATE_VALIDATE_EXPIRY`: Enforce `exp`/`nbf` (default: `false`)
//!
//! # Invariants
//!
//! - `jwks_url` is an absolute `http` or `https` URL
//! - `fetch_timeout` is non-zero

use std::time::Duration;

use crate::auth::ClaimPolicy;

const JWKS_URL: &str = "KEYGATE_JWKS_URL";
const FETCH_TIMEOUT_SECS: &str = "KEYGATE_FETCH_TIMEOUT_SECS";
const REFRESH_INTERVAL_SECS: &str = "KEYGATE_REFRESH_INTERVAL_SECS";
const LISTEN_PORT: &str = "KEYGATE_LISTEN_PORT";
const ISSUER: &str = "KEYGATE_ISSUER";
const AUDIENCE: &str = "KEYGATE_AUDIENCE";
const VALIDATE_EXPIRY: &str = "KEYGATE_VALIDATE_EXPIRY";

/// Gateway configuration.
///
/// # Pre-conditions
///
/// When constructed via `from_env()`:
/// - `KEYGATE_JWKS_URL` must be set
/// - All values that are set must be valid for their types
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeygateConfig {
    /// Where the authority publishes its signing keys.
    pub jwks_url: String,
    /// Upper bound on one keyset fetch.
    pub fetch_timeout: Duration,
    /// Background refresh period. `None` disables background refresh.
    pub refresh_interval: Option<Duration>,
    /// Port to listen on for HTTP requests.
    pub listen_port: u16,
    /// Required token issuer.
    pub issuer: Option<String>,
    /// Audience the token must be issued for.
    pub audience: Option<String>,
    /// Whether `exp` and `nbf` are enforced.
    pub validate_expiry: bool,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable is missing.
    MissingEnvVar(String),
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingEnvVar(name) => {
                write!(f, "missing required environment variable: {name}")
            }
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl KeygateConfig {
    /// Default port for the gateway.
    pub const DEFAULT_PORT: u16 = 8080;
    /// Default fetch timeout in seconds.
    pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
    /// Default refresh interval in seconds.
    pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 300;

    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `KEYGATE_JWKS_URL` is not set, empty, or not an http(s) URL
    /// - a numeric variable is set but does not parse
    /// - `KEYGATE_VALIDATE_EXPIRY` is set to something other than a boolean
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Same as [`KeygateConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwks_url = load_jwks_url(lookup(JWKS_URL))?;

        let fetch_timeout_secs = load_u64(
            FETCH_TIMEOUT_SECS,
            lookup(FETCH_TIMEOUT_SECS),
            Self::DEFAULT_FETCH_TIMEOUT_SECS,
        )?;
        if fetch_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: FETCH_TIMEOUT_SECS.to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let refresh_interval_secs = load_u64(
            REFRESH_INTERVAL_SECS,
            lookup(REFRESH_INTERVAL_SECS),
            Self::DEFAULT_REFRESH_INTERVAL_SECS,
        )?;

        let listen_port = match lookup(LISTEN_PORT) {
            Some(value) => value.parse::<u16>().map_err(|_| ConfigError::InvalidValue {
                name: LISTEN_PORT.to_string(),
                message: format!("'{value}' is not a valid port number (must be 1-65535)"),
            })?,
            None => Self::DEFAULT_PORT,
        };

        let validate_expiry = match lookup(VALIDATE_EXPIRY) {
            Some(value) => parse_bool(VALIDATE_EXPIRY, &value)?,
            None => false,
        };

        Ok(Self {
            jwks_url,
            fetch_timeout: Duration::from_secs(fetch_timeout_secs),
            refresh_interval: (refresh_interval_secs > 0)
                .then(|| Duration::from_secs(refresh_interval_secs)),
            listen_port,
            issuer: lookup(ISSUER).filter(|issuer| !issuer.is_empty()),
            audience: lookup(AUDIENCE).filter(|audience| !audience.is_empty()),
            validate_expiry,
        })
    }

    /// The claim checks this configuration asks for.
    #[must_use]
    pub fn claim_policy(&self) -> ClaimPolicy {
        let mut policy = ClaimPolicy::default();
        if self.validate_expiry {
            policy = policy.with_expiry(0);
        }
        if let Some(issuer) = &self.issuer {
            policy = policy.with_issuer(issuer.clone());
        }
        if let Some(audience) = &self.audience {
            policy = policy.with_audience(audience.clone());
        }
        policy
    }
}

fn load_jwks_url(value: Option<String>) -> Result<String, ConfigError> {
    let url = value.ok_or_else(|| ConfigError::MissingEnvVar(JWKS_URL.to_string()))?;
    if url.is_empty() {
        return Err(ConfigError::InvalidValue {
            name: JWKS_URL.to_string(),
            message: "must not be empty".to_string(),
        });
    }

    let parsed = reqwest::Url::parse(&url).map_err(|e| ConfigError::InvalidValue {
        name: JWKS_URL.to_string(),
        message: format!("'{url}' is not a valid URL: {e}"),
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            name: JWKS_URL.to_string(),
            message: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(url)
}

fn load_u64(name: &str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    value.map_or(Ok(default), |value| {
        value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a whole number of seconds"),
        })
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            message: format!("'{value}' is not a boolean"),
        }),
    }
}
