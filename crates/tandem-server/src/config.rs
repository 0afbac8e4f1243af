//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Streaming speech-to-text service settings.
    #[serde(default)]
    pub stt: SttConfig,

    /// Advice LLM provider settings.
    #[serde(default)]
    pub advice: AdviceConfig,

    /// Identity provider settings.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Meeting-bot provider settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Externally reachable base URL of this server, used to build the
    /// streaming callback URL handed to dispatched meeting bots
    /// (e.g. `wss://tandem.example.com`).
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "tandem_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Streaming STT service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    /// WebSocket endpoint of the streaming STT service.
    #[serde(default = "default_stt_url")]
    pub url: String,

    /// API key for the STT service. Empty disables auth (local upstreams).
    #[serde(default)]
    pub api_key: String,

    /// Recognition model name.
    #[serde(default = "default_stt_model")]
    pub model: String,

    /// Recognition language.
    #[serde(default = "default_stt_language")]
    pub language: String,
}

/// Advice LLM provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdviceConfig {
    /// Base URL of the `generateContent`-style provider.
    #[serde(default = "default_advice_url")]
    pub url: String,

    /// API key for the provider.
    #[serde(default)]
    pub api_key: String,

    /// Generation model name.
    #[serde(default = "default_advice_model")]
    pub model: String,
}

/// Identity provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Endpoint that resolves a bearer token to a user identity.
    #[serde(default = "default_auth_url")]
    pub url: String,
}

/// Meeting-bot provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Base URL of the bot dispatch API.
    #[serde(default = "default_bot_url")]
    pub url: String,

    /// API key for the bot provider.
    #[serde(default)]
    pub api_key: String,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    8000
}

fn default_db_path() -> String {
    "tandem.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_stt_url() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

fn default_stt_model() -> String {
    "nova-2".to_string()
}

fn default_stt_language() -> String {
    "ja".to_string()
}

fn default_advice_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_advice_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_auth_url() -> String {
    "http://127.0.0.1:9000/auth/v1/user".to_string()
}

fn default_bot_url() -> String {
    "https://api.meetingbaas.com".to_string()
}

fn default_public_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

// Kept in agreement with the serde field defaults above: deserializing an
// empty document and calling `Config::default()` must yield the same
// configuration, `public_url` included.
impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            stt: SttConfig::default(),
            advice: AdviceConfig::default(),
            auth: AuthConfig::default(),
            bot: BotConfig::default(),
            public_url: default_public_url(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            url: default_stt_url(),
            api_key: String::new(),
            model: default_stt_model(),
            language: default_stt_language(),
        }
    }
}

impl Default for AdviceConfig {
    fn default() -> Self {
        Self {
            url: default_advice_url(),
            api_key: String::new(),
            model: default_advice_model(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            url: default_auth_url(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            url: default_bot_url(),
            api_key: String::new(),
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `TANDEM_HOST` / `TANDEM_PORT` override `server.host` / `server.port`
/// - `TANDEM_DB_PATH` overrides `database.path`
/// - `TANDEM_LOG_LEVEL` / `TANDEM_LOG_JSON` override the `logging` section
/// - `TANDEM_STT_URL` / `TANDEM_STT_API_KEY` override the `stt` section
/// - `TANDEM_ADVICE_URL` / `TANDEM_ADVICE_API_KEY` override the `advice` section
/// - `TANDEM_AUTH_URL` overrides `auth.url`
/// - `TANDEM_BOT_URL` / `TANDEM_BOT_API_KEY` override the `bot` section
/// - `TANDEM_PUBLIC_URL` overrides `public_url`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("TANDEM_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("TANDEM_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("TANDEM_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("TANDEM_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("TANDEM_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(url) = std::env::var("TANDEM_STT_URL") {
        config.stt.url = url;
    }
    if let Ok(key) = std::env::var("TANDEM_STT_API_KEY") {
        config.stt.api_key = key;
    }
    if let Ok(url) = std::env::var("TANDEM_ADVICE_URL") {
        config.advice.url = url;
    }
    if let Ok(key) = std::env::var("TANDEM_ADVICE_API_KEY") {
        config.advice.api_key = key;
    }
    if let Ok(url) = std::env::var("TANDEM_AUTH_URL") {
        config.auth.url = url;
    }
    if let Ok(url) = std::env::var("TANDEM_BOT_URL") {
        config.bot.url = url;
    }
    if let Ok(key) = std::env::var("TANDEM_BOT_API_KEY") {
        config.bot.api_key = key;
    }
    if let Ok(url) = std::env::var("TANDEM_PUBLIC_URL") {
        config.public_url = url;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_every_section() {
        let config: Config = toml::from_str("").expect("empty config should parse");
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.database.pool_max_size, 8);
        assert_eq!(config.stt.model, "nova-2");
        assert_eq!(config.stt.language, "ja");
        assert!(!config.logging.json);
    }

    #[test]
    fn default_matches_empty_document() {
        // `load_config(None)` goes through `Config::default()`, so it must
        // agree with what deserializing an empty file produces.
        let config = Config::default();
        let parsed: Config = toml::from_str("").expect("empty config should parse");

        assert_eq!(config.public_url, default_public_url());
        assert_eq!(config.public_url, parsed.public_url);
        assert_eq!(config.server.port, parsed.server.port);
        assert_eq!(config.auth.url, parsed.auth.url);
        assert_eq!(config.bot.url, parsed.bot.url);
    }

    #[test]
    fn partial_file_overrides_only_named_keys() {
        let config: Config = toml::from_str(
            r#"
            public_url = "wss://tandem.example.com"

            [server]
            port = 9090

            [stt]
            api_key = "dg-key"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, default_host());
        assert_eq!(config.stt.api_key, "dg-key");
        assert_eq!(config.stt.url, default_stt_url());
        assert_eq!(config.public_url, "wss://tandem.example.com");
    }
}
