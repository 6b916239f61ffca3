use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::workflows::intake::{EditPolicy, IntakeSettings, UserId};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:applications.db?mode=rwc";
const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SESSION_IDLE_SECS: i64 = 86_400;

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
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub intake: IntakeConfig,
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

        let database_url =
            env::var("APP_DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
        let storage_timeout_ms = match non_empty("APP_STORAGE_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidStorageTimeout { value: raw })?,
            None => DEFAULT_STORAGE_TIMEOUT_MS,
        };

        let moderator = non_empty("APP_MODERATOR_ID").ok_or(ConfigError::MissingModerator)?;
        let moderator = moderator
            .trim()
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| ConfigError::InvalidModerator { value: moderator })?;

        let session_idle_secs = match non_empty("APP_SESSION_IDLE_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|value| *value >= 0)
                .ok_or(ConfigError::InvalidSessionIdle { value: raw })?,
            None => DEFAULT_SESSION_IDLE_SECS,
        };

        let edit_policy = match non_empty("APP_EDIT_POLICY") {
            Some(raw) => {
                EditPolicy::parse(&raw).ok_or(ConfigError::InvalidEditPolicy { value: raw })?
            }
            None => EditPolicy::default(),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                database_url,
                timeout: Duration::from_millis(storage_timeout_ms),
            },
            intake: IntakeConfig {
                moderator,
                edit_policy,
                session_idle_secs,
            },
        })
    }

    /// Runtime settings for the intake service derived from this configuration.
    pub fn intake_settings(&self) -> IntakeSettings {
        IntakeSettings {
            edit_policy: self.intake.edit_policy,
            storage_timeout: self.storage.timeout,
            session_idle: self.intake.session_idle(),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
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
}

/// Where applications are persisted.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    /// Upper bound on any single storage call.
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Sqlite(String),
}

impl StorageConfig {
    pub fn backend(&self) -> StorageBackend {
        let url = self.database_url.trim();
        if url.eq_ignore_ascii_case("memory") {
            StorageBackend::Memory
        } else {
            StorageBackend::Sqlite(url.to_string())
        }
    }
}

/// Intake and moderation behavior.
#[derive(Debug, Clone)]
pub struct IntakeConfig {
    pub moderator: UserId,
    pub edit_policy: EditPolicy,
    /// Zero disables idle expiry.
    pub session_idle_secs: i64,
}

impl IntakeConfig {
    pub fn session_idle(&self) -> Option<chrono::Duration> {
        (self.session_idle_secs > 0).then(|| chrono::Duration::seconds(self.session_idle_secs))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    MissingModerator,
    InvalidModerator { value: String },
    InvalidStorageTimeout { value: String },
    InvalidSessionIdle { value: String },
    InvalidEditPolicy { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::MissingModerator => write!(f, "APP_MODERATOR_ID must be set"),
            ConfigError::InvalidModerator { value } => {
                write!(f, "APP_MODERATOR_ID must be an integer user id, got '{value}'")
            }
            ConfigError::InvalidStorageTimeout { value } => write!(
                f,
                "APP_STORAGE_TIMEOUT_MS must be a positive number of milliseconds, got '{value}'"
            ),
            ConfigError::InvalidSessionIdle { value } => write!(
                f,
                "APP_SESSION_IDLE_SECS must be a non-negative number of seconds, got '{value}'"
            ),
            ConfigError::InvalidEditPolicy { value } => write!(
                f,
                "APP_EDIT_POLICY must be 'rewalk' or 'summary', got '{value}'"
            ),
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
