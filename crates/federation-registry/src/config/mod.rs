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
}

pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_PAYMENT_API_BASE: &str = "https://sandbox.cashfree.com/pg";
pub const DEFAULT_PAYMENT_API_VERSION: &str = "2023-08-01";
const DEFAULT_PAYMENT_TIMEOUT_SECS: u64 = 10;

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    pub payments: PaymentConfig,
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

        let data_dir =
            PathBuf::from(env::var("APP_DATA_DIR").unwrap_or_else(|_| "./data".to_string()));
        let upload_dir = optional_var("APP_UPLOAD_DIR").map(PathBuf::from);
        let public_base_url = optional_var("APP_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{host}:{port}"));
        let upload_max_bytes = match optional_var("APP_UPLOAD_MAX_BYTES") {
            Some(raw) => raw
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidNumber {
                    variable: "APP_UPLOAD_MAX_BYTES",
                })?,
            None => DEFAULT_UPLOAD_MAX_BYTES,
        };

        let admin_token = optional_var("APP_ADMIN_TOKEN");

        let app_id = optional_var("PAYMENT_APP_ID");
        let secret_key = optional_var("PAYMENT_SECRET_KEY");
        let webhook_secret = optional_var("PAYMENT_WEBHOOK_SECRET").or_else(|| secret_key.clone());
        let timeout_secs = match optional_var("PAYMENT_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidNumber {
                    variable: "PAYMENT_TIMEOUT_SECS",
                })?,
            None => DEFAULT_PAYMENT_TIMEOUT_SECS,
        };

        let payments = PaymentConfig {
            credentials: match (app_id, secret_key) {
                (Some(app_id), Some(secret_key)) => {
                    Some(ProcessorCredentials { app_id, secret_key })
                }
                _ => None,
            },
            api_base: optional_var("PAYMENT_API_BASE")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_BASE.to_string()),
            api_version: optional_var("PAYMENT_API_VERSION")
                .unwrap_or_else(|| DEFAULT_PAYMENT_API_VERSION.to_string()),
            return_url: optional_var("PAYMENT_RETURN_URL")
                .unwrap_or_else(|| format!("{public_base_url}/payments/return")),
            notify_url: optional_var("PAYMENT_NOTIFY_URL")
                .unwrap_or_else(|| format!("{public_base_url}/payments/webhook")),
            webhook_secret,
            timeout: Duration::from_secs(timeout_secs),
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                data_dir,
                upload_dir,
                public_base_url,
                upload_max_bytes,
            },
            admin: AdminConfig { token: admin_token },
            payments,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where application documents and uploaded objects live.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub upload_dir: Option<PathBuf>,
    pub public_base_url: String,
    pub upload_max_bytes: usize,
}

impl StorageConfig {
    pub fn upload_dir(&self) -> PathBuf {
        self.upload_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("uploads"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdminConfig {
    pub token: Option<String>,
}

/// Payment processor settings. Missing credentials select the synthetic processor.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub credentials: Option<ProcessorCredentials>,
    pub api_base: String,
    pub api_version: String,
    pub return_url: String,
    pub notify_url: String,
    pub webhook_secret: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone)]
pub struct ProcessorCredentials {
    pub app_id: String,
    pub secret_key: String,
}

impl fmt::Debug for ProcessorCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorCredentials")
            .field("app_id", &self.app_id)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable } => {
                write!(f, "{variable} must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
