//! Application configuration
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database connection URL
    pub database_url: String,
    /// Session expiration in hours
    pub session_expiry_hours: u64,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// CORS allowed origins
    pub cors_origins: Vec<String>,
    /// Environment (development/production)
    pub environment: Environment,
    /// Trusted proxy IP prefixes (e.g., ["10.0.0.", "172.16."])
    /// Only trust X-Forwarded-For headers from these IPs
    pub trusted_proxies: Vec<String>,
    /// Admin account created on startup when no admin exists yet
    pub bootstrap_admin: Option<AdminCredentials>,
    /// Minutes between background occupancy repairs, `None` when disabled
    pub reconcile_interval_minutes: Option<u64>,
}

#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        // Build DATABASE_URL from either:
        // 1. DATABASE_URL (standard)
        // 2. Individual components: DATABASE_SERVER_HOST, DATABASE_SERVER_PORT, DATABASE_SERVER_USER, DATABASE_PASSWORD, DATABASE_DB
        let database_url = env::var("DATABASE_URL")
            .or_else(|_| {
                let host = env::var("DATABASE_SERVER_HOST")?;
                let port = env::var("DATABASE_SERVER_PORT").unwrap_or_else(|_| "5432".to_string());
                let user = env::var("DATABASE_SERVER_USER")?;
                let password = env::var("DATABASE_PASSWORD")?;
                let db = env::var("DATABASE_DB")?;
                Ok(format!(
                    "postgres://{}:{}@{}:{}/{}",
                    user, password, host, port, db
                ))
            })
            .map_err(|_: env::VarError| {
                ConfigError::Missing(
                    "DATABASE_URL or DATABASE_SERVER_HOST + DATABASE_SERVER_USER + DATABASE_PASSWORD + DATABASE_DB is required".to_string(),
                )
            })?;

        let bootstrap_admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(username), Ok(password)) if !username.trim().is_empty() => {
                if password.len() < 8 {
                    return Err(ConfigError::Invalid(
                        "ADMIN_PASSWORD must be at least 8 characters".to_string(),
                    ));
                }
                Some(AdminCredentials {
                    username: username.trim().to_string(),
                    password,
                })
            }
            _ => None,
        };

        let reconcile_interval_minutes = match env::var("RECONCILE_INTERVAL_MINUTES") {
            Ok(value) => parse_interval(&value)?,
            Err(_) => Some(60),
        };

        Ok(Config {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database_url,
            session_expiry_hours: env::var("SESSION_EXPIRY_HOURS")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or(8),
            max_body_size: env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB default
            cors_origins: env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|o| o.trim().to_string()).collect())
                .unwrap_or_else(|_| vec!["http://localhost:8080".to_string()]),
            environment,
            // Examples: "10.0.0.", "172.16.", "127.0.0.1"
            trusted_proxies: env::var("TRUSTED_PROXIES")
                .map(|s| {
                    s.split(',')
                        .map(|p| p.trim().to_string())
                        .filter(|p| !p.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            bootstrap_admin,
            reconcile_interval_minutes,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `0` disables the background task
fn parse_interval(value: &str) -> Result<Option<u64>, ConfigError> {
    let minutes: u64 = value.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!(
            "RECONCILE_INTERVAL_MINUTES must be a whole number, got '{}'",
            value
        ))
    })?;
    Ok((minutes > 0).then_some(minutes))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
