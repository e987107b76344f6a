use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Главная структура конфигурации - контейнер для всех настроек
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub storage: StorageConfig,
    pub holds: HoldStoreConfig,
    pub reservation: ReservationConfig,
    pub auth: AuthConfig,
    pub features: FeatureFlags,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub rust_log: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldBackend {
    Memory,
    Redis,
}

// Каталог и журнал бронирований
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub pool_size: u32,
}

// Хранилище удержаний мест
#[derive(Debug, Clone, Deserialize)]
pub struct HoldStoreConfig {
    pub backend: HoldBackend,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReservationConfig {
    pub hold_ttl: Duration,
    pub max_hold_ttl: Duration,
    pub max_seats_per_hold: usize,
    pub sweep_interval: Duration,
    pub attempt_retention: Duration,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::from_secs(300),
            max_hold_ttl: Duration::from_secs(900),
            max_seats_per_hold: 10,
            sweep_interval: Duration::from_secs(15),
            attempt_retention: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub password_hash_cost: u32,
}

// Feature flags для включения/выключения функциональности
#[derive(Debug, Clone, Deserialize)]
pub struct FeatureFlags {
    pub enable_admin_api: bool,
}

fn var_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: FromStr>(name: &'static str, default: &str) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn seconds_var(name: &'static str, default: &str) -> Result<Duration, ConfigError> {
    parse_var::<u64>(name, default).map(Duration::from_secs)
}

impl FromStr for StorageBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageBackend::Memory),
            "postgres" => Ok(StorageBackend::Postgres),
            _ => Err(()),
        }
    }
}

impl FromStr for HoldBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(HoldBackend::Memory),
            "redis" => Ok(HoldBackend::Redis),
            _ => Err(()),
        }
    }
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage_backend: StorageBackend = parse_var("STORAGE_BACKEND", "memory")?;
        let database_url = env::var("DATABASE_URL").ok();
        if storage_backend == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing("DATABASE_URL"));
        }

        let hold_backend: HoldBackend = parse_var("HOLD_BACKEND", "memory")?;
        let redis_url = env::var("REDIS_URL").ok();
        if hold_backend == HoldBackend::Redis && redis_url.is_none() {
            return Err(ConfigError::Missing("REDIS_URL"));
        }

        let reservation = ReservationConfig {
            hold_ttl: seconds_var("HOLD_TTL_SECONDS", "300")?,
            max_hold_ttl: seconds_var("MAX_HOLD_TTL_SECONDS", "900")?,
            max_seats_per_hold: parse_var("MAX_SEATS_PER_HOLD", "10")?,
            sweep_interval: seconds_var("SWEEP_INTERVAL_SECONDS", "15")?,
            attempt_retention: seconds_var("ATTEMPT_RETENTION_SECONDS", "3600")?,
        };
        if reservation.hold_ttl.is_zero() || reservation.hold_ttl > reservation.max_hold_ttl {
            return Err(ConfigError::Invalid {
                name: "HOLD_TTL_SECONDS",
                value: reservation.hold_ttl.as_secs().to_string(),
            });
        }
        if reservation.sweep_interval.is_zero() {
            return Err(ConfigError::Invalid {
                name: "SWEEP_INTERVAL_SECONDS",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            app: AppConfig {
                host: var_or("HOST", "0.0.0.0"),
                port: parse_var("PORT", "8000")?,
                environment: var_or("ENVIRONMENT", "development"),
                rust_log: var_or("RUST_LOG", "cinema_booking=debug,tower_http=debug"),
                log_format: parse_var("LOG_FORMAT", "text")?,
            },
            storage: StorageConfig {
                backend: storage_backend,
                database_url,
                pool_size: parse_var("DB_POOL_SIZE", "20")?,
            },
            holds: HoldStoreConfig {
                backend: hold_backend,
                redis_url,
            },
            reservation,
            auth: AuthConfig {
                password_hash_cost: parse_var("PASSWORD_HASH_COST", "12")?,
            },
            features: FeatureFlags {
                enable_admin_api: parse_var("ENABLE_ADMIN_API", "false")?,
            },
        })
    }

    /// All-in-memory configuration, used by tests and local demos.
    pub fn in_memory() -> Self {
        Config {
            app: AppConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: "test".to_string(),
                rust_log: "cinema_booking=debug".to_string(),
                log_format: LogFormat::Text,
            },
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                database_url: None,
                pool_size: 1,
            },
            holds: HoldStoreConfig {
                backend: HoldBackend::Memory,
                redis_url: None,
            },
            reservation: ReservationConfig::default(),
            auth: AuthConfig {
                password_hash_cost: bcrypt::DEFAULT_COST,
            },
            features: FeatureFlags {
                enable_admin_api: true,
            },
        }
    }
}
