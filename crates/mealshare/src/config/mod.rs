use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use crate::workflows::donation::claims::RewardTable;

/// Distinguishes runtime behavior for different stages of the service.
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
}

/// Top-level configuration for the application.
///
/// Loaded once at startup and handed to the components that need it; nothing
/// reads the environment after this point.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub sweeper: SweeperConfig,
    pub claims: ClaimConfig,
    pub rewards: RewardTable,
    pub delivery: DeliveryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or(ConfigError::InvalidLogFormat(raw))?,
            Err(_) => LogFormat::Compact,
        };

        let interval_minutes: u64 = parse_var("SWEEP_INTERVAL_MINUTES", 30)?;
        if !(1..=SweeperConfig::MAX_INTERVAL_MINUTES).contains(&interval_minutes) {
            return Err(ConfigError::OutOfRange {
                key: "SWEEP_INTERVAL_MINUTES",
                detail: "must be between 1 and 1440",
            });
        }
        let warning_window_minutes: i64 = parse_var("SWEEP_WARNING_WINDOW_MINUTES", 120)?;
        if !(1..=SweeperConfig::MAX_WARNING_WINDOW_MINUTES).contains(&warning_window_minutes) {
            return Err(ConfigError::OutOfRange {
                key: "SWEEP_WARNING_WINDOW_MINUTES",
                detail: "must be between 1 and 10080",
            });
        }

        let token_ttl_hours: i64 = parse_var("CLAIM_TOKEN_TTL_HOURS", 24)?;
        if !(1..=ClaimConfig::MAX_TOKEN_TTL_HOURS).contains(&token_ttl_hours) {
            return Err(ConfigError::OutOfRange {
                key: "CLAIM_TOKEN_TTL_HOURS",
                detail: "must be between 1 and 168",
            });
        }
        let token_length: usize = parse_var("CLAIM_TOKEN_LENGTH", 24)?;
        if token_length < ClaimConfig::MIN_TOKEN_LENGTH {
            return Err(ConfigError::OutOfRange {
                key: "CLAIM_TOKEN_LENGTH",
                detail: "must be at least 20 characters",
            });
        }

        let defaults = RewardTable::default();
        let rewards = RewardTable {
            tokens_per_meal: parse_positive_f64("REWARD_TOKENS_PER_MEAL", defaults.tokens_per_meal)?,
            meals_per_kg: parse_positive_f64("MEALS_PER_KG", defaults.meals_per_kg)?,
            meals_per_tray: parse_positive_f64("MEALS_PER_TRAY", defaults.meals_per_tray)?,
            meals_per_box: parse_positive_f64("MEALS_PER_BOX", defaults.meals_per_box)?,
        };

        let delivery = DeliveryConfig {
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| DeliveryConfig::DEFAULT_MAIL_FROM.to_string()),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            sweeper: SweeperConfig {
                interval_minutes,
                warning_window_minutes,
            },
            claims: ClaimConfig {
                token_ttl_hours,
                token_length,
            },
            rewards,
            delivery,
        })
    }
}

impl Default for AppConfig {
    /// Development defaults matching an empty environment.
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
                log_format: LogFormat::Compact,
            },
            sweeper: SweeperConfig::default(),
            claims: ClaimConfig::default(),
            rewards: RewardTable::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_positive_f64(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    let value: f64 = parse_var(key, default)?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            key,
            detail: "must be a positive number",
        })
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
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Cadence of the background expiration sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweeperConfig {
    pub interval_minutes: u64,
    pub warning_window_minutes: i64,
}

impl SweeperConfig {
    pub const MAX_INTERVAL_MINUTES: u64 = 24 * 60;
    pub const MAX_WARNING_WINDOW_MINUTES: i64 = 7 * 24 * 60;

    /// Sweep cadence, clamped to `[1, MAX_INTERVAL_MINUTES]` minutes.
    pub fn interval(&self) -> std::time::Duration {
        let minutes = self.interval_minutes.clamp(1, Self::MAX_INTERVAL_MINUTES);
        std::time::Duration::from_secs(minutes * 60)
    }

    /// Warning lead time, clamped to `[1, MAX_WARNING_WINDOW_MINUTES]` minutes.
    pub fn warning_window(&self) -> chrono::Duration {
        let minutes = self
            .warning_window_minutes
            .clamp(1, Self::MAX_WARNING_WINDOW_MINUTES);
        chrono::Duration::minutes(minutes)
    }
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 30,
            warning_window_minutes: 120,
        }
    }
}

/// QR claim code issuance settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimConfig {
    pub token_ttl_hours: i64,
    pub token_length: usize,
}

impl ClaimConfig {
    pub const MIN_TOKEN_LENGTH: usize = 20;
    pub const MAX_TOKEN_TTL_HOURS: i64 = 7 * 24;

    /// Pickup-code lifetime, clamped to `[1, MAX_TOKEN_TTL_HOURS]` hours.
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.token_ttl_hours.clamp(1, Self::MAX_TOKEN_TTL_HOURS))
    }
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            token_ttl_hours: 24,
            token_length: 24,
        }
    }
}

/// Sender identity handed to the outbound mail channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryConfig {
    pub mail_from: String,
}

impl DeliveryConfig {
    pub const DEFAULT_MAIL_FROM: &'static str = "no-reply@mealshare.local";
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            mail_from: Self::DEFAULT_MAIL_FROM.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidNumber { key: &'static str, value: String },
    OutOfRange { key: &'static str, detail: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT must be 'compact' or 'pretty' (found '{value}')")
            }
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be numeric (found '{value}')")
            }
            ConfigError::OutOfRange { key, detail } => write!(f, "{key} {detail}"),
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
