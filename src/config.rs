//! Environment-driven configuration.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `QUOTES_ENV` | unset | when set, `.env.development.local` is not loaded |
//! | `HOST` | `0.0.0.0` | listen host |
//! | `PORT` | required | listen port |
//! | `DATABASE_URL` | required | SQLite path, `sqlite://path` or `:memory:` |
//! | `SHUTDOWN_GRACE_SECS` | `30` | drain deadline after a termination signal |
//! | `RATE_LIMIT_PER_MINUTE` | `100` | requests per client IP per minute, `0` disables |
//! | `LOG_FORMAT` | `pretty` | `pretty` or `json` |
//! | `RUST_LOG` | `quotes=info` | tracing filter directives |

use std::env;
use std::num::NonZeroU32;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use crate::lifecycle::DEFAULT_GRACE_PERIOD;
use crate::middleware::rate_limit::RateLimit;

/// Local env file loaded on developer machines.
pub const ENV_FILE: &str = ".env.development.local";

/// Any non-empty value skips [`ENV_FILE`].
pub const SKIP_ENV_FILE: &str = "QUOTES_ENV";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {path} in the current directory (set QUOTES_ENV to skip it): {source}")]
    EnvFile {
        path: &'static str,
        #[source]
        source: dotenvy::Error,
    },

    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub grace_period: Duration,
    pub rate_limit: Option<RateLimit>,
    pub logging: LoggingConfig,
}

impl Config {
    /// Loads the local env file unless skipped, then reads the process
    /// environment. Variables already set win over the file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let skip = env::var(SKIP_ENV_FILE).is_ok_and(|v| !v.is_empty());
        if !skip {
            dotenvy::from_filename(ENV_FILE)
                .map_err(|source| ConfigError::EnvFile { path: ENV_FILE, source })?;
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = required(&get, "PORT")?;
        let port = port.parse().map_err(|_| ConfigError::Invalid { key: "PORT", value: port })?;

        let grace_period = match get("SHUTDOWN_GRACE_SECS") {
            None => DEFAULT_GRACE_PERIOD,
            Some(v) => v
                .parse()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::Invalid { key: "SHUTDOWN_GRACE_SECS", value: v })?,
        };

        let rate_limit = match get("RATE_LIMIT_PER_MINUTE") {
            None => Some(RateLimit::default()),
            Some(v) => v
                .parse::<u32>()
                .map(|n| NonZeroU32::new(n).map(RateLimit::per_minute))
                .map_err(|_| ConfigError::Invalid { key: "RATE_LIMIT_PER_MINUTE", value: v })?,
        };

        let format = match get("LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid { key: "LOG_FORMAT", value: other.to_owned() });
            }
        };

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port,
            database_url: required(&get, "DATABASE_URL")?,
            grace_period,
            rate_limit,
            logging: LoggingConfig { format, ..LoggingConfig::default() },
        })
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn listen_addr(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, ConfigError> {
    get(key).filter(|v| !v.is_empty()).ok_or(ConfigError::Missing(key))
}

// ── Logging ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Installs the global tracing subscriber. Call once, from `main`.
    pub fn init(&self) {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));

        match self.format {
            LogFormat::Json => fmt().json().with_env_filter(filter).init(),
            LogFormat::Pretty => fmt().with_env_filter(filter).init(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "quotes=info".into(),
            format: LogFormat::Pretty,
        }
    }
}
