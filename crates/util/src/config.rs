use std::{env, fmt, net::SocketAddr};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

const DEFAULT_DATABASE_URL: &str = "sqlite://staffdesk.db";
const DEFAULT_DELIVERABILITY_API_URL: &str = "https://api.zerobounce.net/v2/";
const DEFAULT_MAIL_SENDER: &str = "no-reply@example.com";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns `true` when the current environment should behave as development.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub deliverability_api_url: String,
    pub deliverability_api_key: String,
    pub mail_api_url: String,
    pub mail_api_token: String,
    pub mail_sender: String,
    pub admin_email: String,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    ///
    /// The API credentials, the mail endpoint and the administrator address
    /// have no sensible defaults and must be present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;

        let bind_value =
            env::var("APP_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_value.parse().map_err(ConfigError::BindAddress)?;

        Ok(Self {
            bind_addr,
            environment,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            deliverability_api_url: env::var("DELIVERABILITY_API_URL")
                .unwrap_or_else(|_| DEFAULT_DELIVERABILITY_API_URL.to_string()),
            deliverability_api_key: require("DELIVERABILITY_API_KEY")?,
            mail_api_url: require("MAIL_API_URL")?,
            mail_api_token: require("MAIL_API_TOKEN")?,
            mail_sender: env::var("MAIL_SENDER")
                .unwrap_or_else(|_| DEFAULT_MAIL_SENDER.to_string()),
            admin_email: require("ADMIN_EMAIL")?,
        })
    }
}

fn require(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name))
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingVar(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingVar(name) => write!(f, "required environment variable {name} is not set"),
        }
    }
}

impl std::error::Error for ConfigError {}
