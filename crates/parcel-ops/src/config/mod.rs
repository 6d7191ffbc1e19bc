use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Deployment stage the counter service runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Everything the binaries read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub counter: CounterConfig,
}

impl AppConfig {
    /// Reads `.env` (if present) and then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let port = text("APP_PORT", "3000")
            .trim()
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let defaults = CounterConfig::default();
        let limit = |name: &'static str, default: usize| match lookup(name) {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => Ok(value),
                _ => Err(ConfigError::InvalidLimit { name }),
            },
        };

        Ok(Self {
            environment: AppEnvironment::parse(&text("APP_ENV", "development")),
            server: ServerConfig {
                host: text("APP_HOST", "127.0.0.1"),
                port,
            },
            telemetry: TelemetryConfig {
                log_level: text("APP_LOG_LEVEL", "info"),
            },
            counter: CounterConfig {
                snapshot_limit: limit("PARCELOPS_SNAPSHOT_LIMIT", defaults.snapshot_limit)?,
                display_limit: limit("PARCELOPS_DISPLAY_LIMIT", defaults.display_limit)?,
                listing_limit: limit("PARCELOPS_LISTING_LIMIT", defaults.listing_limit)?,
                barcode_attempts: limit("PARCELOPS_BARCODE_ATTEMPTS", defaults.barcode_attempts)?,
            },
        })
    }
}

/// HTTP bind address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = if self.host.eq_ignore_ascii_case("localhost") {
            IpAddr::from([127, 0, 0, 1])
        } else {
            self.host
                .parse()
                .map_err(|source| ConfigError::InvalidHost {
                    host: self.host.clone(),
                    source,
                })?
        };
        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Bare level or full `EnvFilter` directives.
    pub log_level: String,
}

/// Fetch caps and intake knobs for the counter workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterConfig {
    /// Most-recent records loaded for client-side search.
    pub snapshot_limit: usize,
    /// Matches returned to the caller out of a search.
    pub display_limit: usize,
    /// Records watched by the live listing feed.
    pub listing_limit: usize,
    /// Generated barcodes tried before intake gives up.
    pub barcode_attempts: usize,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            snapshot_limit: 1000,
            display_limit: 50,
            listing_limit: 200,
            barcode_attempts: 3,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        host: String,
        source: std::net::AddrParseError,
    },
    InvalidLimit {
        name: &'static str,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a port number"),
            ConfigError::InvalidHost { host, .. } => {
                write!(f, "APP_HOST '{}' is not an IP address or localhost", host)
            }
            ConfigError::InvalidLimit { name } => {
                write!(f, "{name} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source, .. } => Some(source),
            ConfigError::InvalidPort | ConfigError::InvalidLimit { .. } => None,
        }
    }
}
