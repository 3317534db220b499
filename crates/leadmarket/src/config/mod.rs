use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Deployment stage the service believes it is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }

    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Top-level configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub feed: FeedConfig,
    pub claims: ClaimConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(&env_or("APP_ENV", "development"));

        let host = env_or("APP_HOST", "127.0.0.1");
        let port = env_or("APP_PORT", "3000")
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env_or("APP_LOG_LEVEL", "info");
        // Production defaults to machine-readable logs; an explicit
        // APP_LOG_JSON overrides either default.
        let json_logs = match env::var("APP_LOG_JSON") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidLogFlag)?,
            Err(_) => environment.is_production(),
        };

        let feed_buffer = env_or("APP_FEED_BUFFER", "256")
            .parse::<usize>()
            .ok()
            .filter(|buffer| *buffer >= 1)
            .ok_or(ConfigError::InvalidFeedBuffer)?;

        let retry_attempts = env_or("APP_CLAIM_RETRY_ATTEMPTS", "3")
            .parse::<u32>()
            .ok()
            .filter(|attempts| *attempts >= 1)
            .ok_or(ConfigError::InvalidRetryBudget)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                json_logs,
            },
            feed: FeedConfig {
                buffer: feed_buffer,
            },
            claims: ClaimConfig { retry_attempts },
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    /// Emit JSON log lines instead of the compact console format.
    pub json_logs: bool,
}

/// Tuning for the real-time lead feed.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Frames kept per topic for a lagging subscriber.
    pub buffer: usize,
}

/// Tuning shared by the claim arbiter and the wallet ledger.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// Attempts allowed per contested storage write before giving up.
    pub retry_attempts: u32,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFlag,
    InvalidFeedBuffer,
    InvalidRetryBudget,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFlag => write!(f, "APP_LOG_JSON must be a boolean flag"),
            ConfigError::InvalidFeedBuffer => {
                write!(f, "APP_FEED_BUFFER must be a positive integer")
            }
            ConfigError::InvalidRetryBudget => {
                write!(f, "APP_CLAIM_RETRY_ATTEMPTS must be an integer of at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
