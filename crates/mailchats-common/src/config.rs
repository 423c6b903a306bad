//! Configuration for MailChats

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend selection
    #[serde(default)]
    pub storage: StorageConfig,

    /// Database configuration (postgres backend only)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Campaign mailer configuration
    #[serde(default)]
    pub mailer: MailerConfig,

    /// DeepSeek AI configuration
    #[serde(default)]
    pub ai: AiConfig,

    /// Verification code mailer configuration
    #[serde(default)]
    pub verification: VerificationConfig,

    /// Login configuration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Theme file configuration
    #[serde(default)]
    pub theme: ThemeFileConfig,

    /// File the configuration was read from, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the built single-page app, if any
    pub static_dir: Option<PathBuf>,

    /// CORS allowed origins (empty allows any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            static_dir: None,
            cors_origins: Vec::new(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend: "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Campaign mailer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailerConfig {
    /// Sender name used when a request does not provide one
    #[serde(default = "default_from_name")]
    pub default_from_name: String,

    /// API key used for the "API" send method when a request does not provide one
    pub default_api_key: Option<String>,

    /// HTTP endpoint for the "API" send method; sends are simulated when unset
    pub api_url: Option<String>,

    /// Per-message timeout in seconds
    #[serde(default = "default_mailer_timeout")]
    pub timeout_secs: u64,

    /// Emails per second when a request does not provide a speed
    #[serde(default = "default_send_speed")]
    pub default_send_speed: f64,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            default_from_name: default_from_name(),
            default_api_key: None,
            api_url: None,
            timeout_secs: default_mailer_timeout(),
            default_send_speed: default_send_speed(),
        }
    }
}

fn default_from_name() -> String {
    "Email Support".to_string()
}

fn default_mailer_timeout() -> u64 {
    30
}

fn default_send_speed() -> f64 {
    10.0
}

/// DeepSeek AI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key
    pub api_key: Option<String>,

    /// API base URL
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,

    /// Chat model name
    #[serde(default = "default_ai_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_ai_timeout")]
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            timeout_secs: default_ai_timeout(),
        }
    }
}

fn default_ai_base_url() -> String {
    "https://api.deepseek.com/v1".to_string()
}

fn default_ai_model() -> String {
    "deepseek-chat".to_string()
}

fn default_ai_timeout() -> u64 {
    60
}

/// Verification code mailer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// SMTP relay host
    pub smtp_host: Option<String>,

    /// SMTP relay port
    #[serde(default = "default_submission_port")]
    pub smtp_port: u16,

    /// SMTP username
    pub smtp_username: Option<String>,

    /// SMTP password
    pub smtp_password: Option<String>,

    /// Sender address (defaults to the SMTP username)
    pub from_address: Option<String>,

    /// Sender display name
    #[serde(default = "default_verification_from_name")]
    pub from_name: String,

    /// Code lifetime in seconds
    #[serde(default = "default_code_ttl")]
    pub code_ttl_secs: u64,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            smtp_host: None,
            smtp_port: default_submission_port(),
            smtp_username: None,
            smtp_password: None,
            from_address: None,
            from_name: default_verification_from_name(),
            code_ttl_secs: default_code_ttl(),
        }
    }
}

fn default_submission_port() -> u16 {
    587
}

fn default_verification_from_name() -> String {
    "MailChats.com".to_string()
}

fn default_code_ttl() -> u64 {
    600
}

/// Login configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Password that always unlocks the app
    #[serde(default = "default_password")]
    pub default_password: String,

    /// URL of the license key list (one key per line)
    #[serde(default = "default_license_url")]
    pub license_url: String,

    /// Session lifetime in hours
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,

    /// Username of the account seeded at startup
    pub default_username: Option<String>,

    /// Password of the account seeded at startup
    pub default_user_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_password: default_password(),
            license_url: default_license_url(),
            session_ttl_hours: default_session_ttl(),
            default_username: None,
            default_user_password: None,
        }
    }
}

fn default_password() -> String {
    "code to my email".to_string()
}

fn default_license_url() -> String {
    "https://iowagroups.center/Licensed.txt".to_string()
}

fn default_session_ttl() -> i64 {
    24
}

/// Theme file configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeFileConfig {
    /// Path of theme.json
    #[serde(default = "default_theme_path")]
    pub path: PathBuf,
}

impl Default for ThemeFileConfig {
    fn default() -> Self {
        Self {
            path: default_theme_path(),
        }
    }
}

fn default_theme_path() -> PathBuf {
    PathBuf::from("theme.json")
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the first file found, then environment.
    ///
    /// Runs before logging is set up; the chosen file is kept in `source`.
    pub fn load() -> crate::Result<Self> {
        Self::load_from(&[
            PathBuf::from("./config.toml"),
            PathBuf::from("./mailchats.toml"),
            PathBuf::from("/etc/mailchats/config.toml"),
        ])
    }

    /// Load from the first of `paths` that exists, then environment
    pub fn load_from(paths: &[PathBuf]) -> crate::Result<Self> {
        let source = paths.iter().find(|p| p.exists()).cloned();

        let mut builder = config::Config::builder();
        if let Some(path) = &source {
            builder = builder.add_source(config::File::from(path.as_path()));
        }

        // MAILCHATS_SERVER__PORT=8080 style overrides
        builder = builder.add_source(
            config::Environment::with_prefix("MAILCHATS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Config = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| crate::Error::Config(format!("Failed to load config: {}", e)))?;

        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.source = source;
        Ok(config)
    }

    /// Apply the plain environment variables the app has always honoured
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }

        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url);
            self.storage.backend = "postgres".to_string();
        }

        if let Some(key) = lookup("DEEPSEEK_API_KEY").filter(|k| !k.is_empty()) {
            self.ai.api_key = Some(key);
        }

        if let (Some(username), Some(password)) =
            (lookup("DEFAULT_LOGIN_EMAIL"), lookup("DEFAULT_USER_PASSWORD"))
        {
            self.auth.default_username = Some(username);
            self.auth.default_user_password = Some(password);
        }
    }
}
