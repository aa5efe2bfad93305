use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::env;

pub const PAYPAL_LIVE_BASE_URL: &str = "https://api-m.paypal.com";
pub const PAYPAL_SANDBOX_BASE_URL: &str = "https://api-m.sandbox.paypal.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub paypal: PayPalConfig,
    #[serde(default)]
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Verification settings for caller tokens issued by the identity backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    /// "live" selects the production API, anything else the sandbox.
    #[serde(default = "default_paypal_env")]
    pub environment: String,
    #[serde(default)]
    pub base_url: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    pub webhook_id: String,
    #[serde(default = "default_brand_name")]
    pub brand_name: String,
    /// Origin used for return/cancel URLs. Derived from the request when unset.
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cache_tokens")]
    pub cache_tokens: bool,
    #[serde(default = "default_token_margin_secs")]
    pub token_expiry_margin_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    /// Empty means any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_paypal_env() -> String {
    "sandbox".to_string()
}

fn default_brand_name() -> String {
    "WatchVIM".to_string()
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_cache_tokens() -> bool {
    true
}

fn default_token_margin_secs() -> i64 {
    60
}

impl PayPalConfig {
    pub fn api_base(&self) -> String {
        if let Some(url) = self.base_url.as_deref().filter(|u| !u.is_empty()) {
            return url.trim_end_matches('/').to_string();
        }
        if self.environment.eq_ignore_ascii_case("live") {
            PAYPAL_LIVE_BASE_URL.to_string()
        } else {
            PAYPAL_SANDBOX_BASE_URL.to_string()
        }
    }
}

impl Config {
    pub fn from_toml() -> AppResult<Self> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let mut config: Config = match std::fs::read_to_string(&config_path) {
            Ok(config_str) => toml::from_str(&config_str).map_err(|e| {
                AppError::ConfigError(format!("failed to parse {config_path}: {e}"))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::from_env_defaults()?,
            Err(e) => {
                return Err(AppError::ConfigError(format!(
                    "cannot read config file {config_path}: {e}"
                )));
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn from_env_defaults() -> AppResult<Self> {
        fn get_env(name: &str) -> Option<String> {
            env::var(name).ok()
        }
        fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
            env::var(name)
                .ok()
                .and_then(|v| v.parse::<T>().ok())
                .unwrap_or(default)
        }

        let database_url = get_env("DATABASE_URL").ok_or_else(|| {
            AppError::ConfigError(
                "DATABASE_URL is not set and no config.toml was found".to_string(),
            )
        })?;

        Ok(Config {
            server: ServerConfig {
                host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: get_env_parse("SERVER_PORT", 8080u16),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
            },
            jwt: JwtConfig {
                secret: get_env("JWT_SECRET").unwrap_or_default(),
                audience: get_env("JWT_AUDIENCE"),
            },
            paypal: PayPalConfig {
                environment: get_env("PAYPAL_ENV").unwrap_or_else(default_paypal_env),
                base_url: get_env("PAYPAL_BASE_URL"),
                client_id: get_env("PAYPAL_CLIENT_ID").unwrap_or_default(),
                client_secret: get_env("PAYPAL_CLIENT_SECRET").unwrap_or_default(),
                webhook_id: get_env("PAYPAL_WEBHOOK_ID").unwrap_or_default(),
                brand_name: get_env("PAYPAL_BRAND_NAME").unwrap_or_else(default_brand_name),
                public_base_url: get_env("PUBLIC_BASE_URL"),
                request_timeout_secs: get_env_parse("PAYPAL_TIMEOUT_SECS", default_timeout_secs()),
                cache_tokens: get_env_parse("PAYPAL_TOKEN_CACHE", default_cache_tokens()),
                token_expiry_margin_secs: get_env_parse(
                    "PAYPAL_TOKEN_MARGIN_SECS",
                    default_token_margin_secs(),
                ),
            },
            cors: CorsConfig::default(),
        })
    }

    // Environment variables win even when a config file exists.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("SERVER_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            self.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            self.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_AUDIENCE") {
            self.jwt.audience = Some(v);
        }
        if let Ok(v) = env::var("PAYPAL_ENV") {
            self.paypal.environment = v;
        }
        if let Ok(v) = env::var("PAYPAL_BASE_URL") {
            self.paypal.base_url = Some(v);
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_ID") {
            self.paypal.client_id = v;
        }
        if let Ok(v) = env::var("PAYPAL_CLIENT_SECRET") {
            self.paypal.client_secret = v;
        }
        if let Ok(v) = env::var("PAYPAL_WEBHOOK_ID") {
            self.paypal.webhook_id = v;
        }
        if let Ok(v) = env::var("PAYPAL_BRAND_NAME") {
            self.paypal.brand_name = v;
        }
        if let Ok(v) = env::var("PUBLIC_BASE_URL") {
            self.paypal.public_base_url = Some(v);
        }
        if let Ok(v) = env::var("PAYPAL_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.paypal.request_timeout_secs = n;
        }
        if let Ok(v) = env::var("PAYPAL_TOKEN_CACHE")
            && let Ok(b) = v.parse()
        {
            self.paypal.cache_tokens = b;
        }
        if let Ok(v) = env::var("PAYPAL_TOKEN_MARGIN_SECS")
            && let Ok(n) = v.parse()
        {
            self.paypal.token_expiry_margin_secs = n;
        }
        if let Ok(v) = env::var("CORS_ALLOWED_ORIGINS") {
            self.cors.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
    }

    /// Logs missing credentials that would make every provider call fail.
    pub fn warn_on_incomplete(&self) {
        if self.paypal.client_id.is_empty() || self.paypal.client_secret.is_empty() {
            log::warn!("PayPal client credentials are not configured");
        }
        if self.paypal.webhook_id.is_empty() {
            log::warn!("PAYPAL_WEBHOOK_ID is empty, every webhook will fail verification");
        }
        if self.jwt.secret.is_empty() {
            log::warn!("JWT_SECRET is empty, caller authentication will reject every token");
        }
    }
}
