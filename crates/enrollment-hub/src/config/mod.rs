use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

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

    fn default_log_level(self) -> &'static str {
        match self {
            Self::Production => "info",
            Self::Development | Self::Test => "debug",
        }
    }
}

/// Top-level configuration shared by the HTTP service and the worker.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub store: StoreConfig,
    pub broker: BrokerConfig,
    pub worker: WorkerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT", 8003u16).map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL")
            .unwrap_or_else(|_| environment.default_log_level().to_string());

        let db_path = env::var("DB_FILE_PATH").unwrap_or_else(|_| "enrollment_db.json".to_string());
        let lock_timeout_secs = parse_var("DB_LOCK_TIMEOUT", 10u64)
            .ok()
            .filter(|secs| *secs >= 1)
            .ok_or(ConfigError::InvalidLockTimeout)?;

        let broker = BrokerConfig {
            host: env::var("RABBITMQ_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_var("RABBITMQ_PORT", 5672u16).map_err(|_| ConfigError::InvalidBrokerPort)?,
            user: env::var("RABBITMQ_USER").unwrap_or_else(|_| "guest".to_string()),
            password: env::var("RABBITMQ_PASS").unwrap_or_else(|_| "guest".to_string()),
            vhost: env::var("RABBITMQ_VHOST").unwrap_or_else(|_| "/".to_string()),
            queue: env::var("QUEUE_NAME").unwrap_or_else(|_| "enrollments.requests".to_string()),
        };

        let min_processing_secs = parse_var("ENROLLMENT_WORKER_MIN_SECONDS", 2u64)
            .map_err(|_| ConfigError::InvalidWorkerFloor)?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            store: StoreConfig {
                path: PathBuf::from(db_path),
                lock_timeout: Duration::from_secs(lock_timeout_secs),
            },
            broker,
            worker: WorkerConfig {
                min_processing: Duration::from_secs(min_processing_secs),
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ()> {
    match env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| ()),
        Err(_) => Ok(default),
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
}

/// Location of the JSON document store and how long writers wait for its lock.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub lock_timeout: Duration,
}

/// RabbitMQ connection parameters and the enrollment request queue.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub queue: String,
}

impl BrokerConfig {
    pub fn amqp_url(&self) -> String {
        let vhost = if self.vhost.is_empty() { "/" } else { self.vhost.as_str() };
        format!(
            "amqp://{}:{}@{}:{}/{}",
            self.user,
            self.password,
            self.host,
            self.port,
            urlencoding::encode(vhost)
        )
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Minimum time spent on each message before it is finalized.
    pub min_processing: Duration,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLockTimeout,
    InvalidBrokerPort,
    InvalidWorkerFloor,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLockTimeout => {
                write!(f, "DB_LOCK_TIMEOUT must be a whole number of seconds >= 1")
            }
            ConfigError::InvalidBrokerPort => write!(f, "RABBITMQ_PORT must be a valid u16"),
            ConfigError::InvalidWorkerFloor => {
                write!(f, "ENROLLMENT_WORKER_MIN_SECONDS must be a whole number of seconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLockTimeout
            | ConfigError::InvalidBrokerPort
            | ConfigError::InvalidWorkerFloor => None,
        }
    }
}
