use crate::ConfigError;
use std::{collections::HashMap, env, str::FromStr};

/// Default OpenAI-compatible endpoint used when `OPENAI_BASE_URL` is unset.
pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used when the `general` settings record does not name one.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

fn required(key: &'static str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing { key }),
    }
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Configuration for the proxy server process
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub logging: LoggingConfig,
}

impl ProxyConfig {
    /// Load configuration from environment variables
    ///
    /// Fails when the provider credential is absent; the server must not
    /// start without it.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            server: ServerConfig::from_env()?,
            provider: ProviderConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }
}

/// Configuration for the client side: orchestrator, relay and local store
#[derive(Debug, Clone)]
pub struct ClientAppConfig {
    pub client: ClientConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

impl ClientAppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            client: ClientConfig::from_env()?,
            database: DatabaseConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_or("PORT", 3000)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Upstream provider credential and endpoint
#[derive(Clone)]
pub struct ProviderConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl ProviderConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: required("OPENAI_API_KEY")?,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_PROVIDER_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            timeout_seconds: parse_or("PROVIDER_TIMEOUT_SECONDS", 120)?,
        })
    }
}

// The credential never ends up in logs.
impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// How the client reaches the proxy and how long it waits
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub proxy_url: String,
    pub default_model: String,
    /// Deadline for the proxy to answer with response headers
    pub request_timeout_seconds: u64,
    /// Deadline for reading a whole event stream
    pub stream_timeout_seconds: u64,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            proxy_url: required("PROXY_URL")?.trim_end_matches('/').to_string(),
            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            request_timeout_seconds: parse_or("PROXY_REQUEST_TIMEOUT_SECONDS", 60)?,
            stream_timeout_seconds: parse_or("STREAM_TIMEOUT_SECONDS", 300)?,
        })
    }
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub max_connections: usize,
}

impl DatabaseConfig {
    /// Create a connection URL for this database configuration
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username, self.password, self.host, self.port, self.database
        )
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: parse_or("DATABASE_PORT", 5432)?,
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "chat_relay".to_string()),
            username: env::var("DATABASE_USERNAME").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DATABASE_PASSWORD").unwrap_or_else(|_| "postgres".to_string()),
            max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
        })
    }
}

/// Logging Configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub modules: HashMap<String, String>,
}

impl LoggingConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut modules = HashMap::new();

        // Load module-specific log levels
        if let Ok(level) = env::var("LOG_MODULE_API") {
            modules.insert("api".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_SERVICES") {
            modules.insert("services".to_string(), level);
        }
        if let Ok(level) = env::var("LOG_MODULE_PROVIDERS") {
            modules.insert("inference_providers".to_string(), level);
        }

        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            modules,
        })
    }

    /// Build an `EnvFilter` directive string, e.g. `info,api=debug`
    pub fn filter_directive(&self) -> String {
        let mut filter = self.level.clone();
        let mut modules: Vec<_> = self.modules.iter().collect();
        modules.sort();
        for (module, level) in modules {
            filter.push_str(&format!(",{module}={level}"));
        }
        filter
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            modules: HashMap::new(),
        }
    }
}
