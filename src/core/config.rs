//! Configuration management for Taskpulse.
//!
//! Handles loading configuration from TOML files and overlaying secrets from
//! the environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Database settings
    pub database: DatabaseConfig,

    /// AI provider settings
    pub ai: AiConfig,

    /// Evidence file storage settings
    pub storage: StorageConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Maximum accepted request body, in bytes (uploads included)
    pub max_body_bytes: usize,
}

/// Database settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path of the SQLite database file
    pub path: PathBuf,
}

/// AI provider settings.
///
/// Providers are tried in order: Gemini, then Groq. A provider without an
/// API key is skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Timeout for a single provider request, in seconds
    pub request_timeout_secs: u64,

    /// Primary provider
    pub gemini: ProviderConfig,

    /// Secondary provider
    pub groq: ProviderConfig,
}

/// Settings for one AI provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// API key; usually supplied through the environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name
    pub model: String,

    /// API base URL
    pub base_url: String,
}

/// Where evidence files are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Local directory
    Local,
    /// Cloudinary
    Cloudinary,
}

/// Evidence file storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to use
    pub backend: StorageBackend,

    /// Local directory backend
    pub local: LocalStorageConfig,

    /// Cloudinary backend
    pub cloudinary: CloudinaryConfig,
}

/// Local directory storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStorageConfig {
    /// Directory files are written to
    pub dir: PathBuf,

    /// URL prefix under which the directory is served
    pub public_base_url: String,
}

/// Cloudinary storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    /// Cloud name
    pub cloud_name: Option<String>,

    /// API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// API secret
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret: Option<String>,

    /// Folder uploads are placed in
    pub folder: String,

    /// Upload timeout, in seconds
    pub timeout_secs: u64,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.taskpulse.toml` in current directory
    /// 2. `~/.config/taskpulse/config.toml`
    /// 3. Falls back to defaults
    ///
    /// Environment variables (and a `.env` file, if present) override the
    /// file values for secrets and the database path.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::locate() {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// The config file that [`Config::load`] would read, if any.
    pub fn locate() -> Option<PathBuf> {
        let local_config = PathBuf::from(".taskpulse.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        Self::config_dir().map(|dir| dir.join("config.toml")).filter(|path| path.exists())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Overlay values from the environment.
    pub fn apply_env(&mut self) {
        let _ = dotenvy::dotenv();

        if let Some(key) = env_value("GEMINI_API_KEY") {
            self.ai.gemini.api_key = Some(key);
        }
        if let Some(key) = env_value("GROQ_API_KEY") {
            self.ai.groq.api_key = Some(key);
        }
        if let Some(name) = env_value("CLOUDINARY_CLOUD_NAME") {
            self.storage.cloudinary.cloud_name = Some(name);
        }
        if let Some(key) = env_value("CLOUDINARY_API_KEY") {
            self.storage.cloudinary.api_key = Some(key);
        }
        if let Some(secret) = env_value("CLOUDINARY_API_SECRET") {
            self.storage.cloudinary.api_secret = Some(secret);
        }
        if let Some(path) = env_value("TASKPULSE_DATABASE") {
            self.database.path = PathBuf::from(path);
        }
    }

    /// Get the socket address to bind the server to.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.server.host, self.server.port).parse()
    }

    /// Render the configuration as TOML with secrets masked.
    pub fn to_redacted_toml(&self) -> anyhow::Result<String> {
        let mut shown = self.clone();
        for key in [
            &mut shown.ai.gemini.api_key,
            &mut shown.ai.groq.api_key,
            &mut shown.storage.cloudinary.api_key,
            &mut shown.storage.cloudinary.api_secret,
        ] {
            if key.is_some() {
                *key = Some("********".to_string());
            }
        }
        Ok(toml::to_string_pretty(&shown)?)
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("taskpulse"))
    }

    /// Get the data directory path (for the database and local uploads).
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("taskpulse"))
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".to_string(), port: 8080, max_body_bytes: 20 * 1024 * 1024 }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = Config::data_dir()
            .map(|d| d.join("taskpulse.db"))
            .unwrap_or_else(|| PathBuf::from("taskpulse.db"));
        Self { path }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            gemini: ProviderConfig {
                api_key: None,
                model: "gemini-2.0-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            },
            groq: ProviderConfig {
                api_key: None,
                model: "llama-3.3-70b-versatile".to_string(),
                base_url: "https://api.groq.com/openai/v1".to_string(),
            },
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local: LocalStorageConfig::default(),
            cloudinary: CloudinaryConfig::default(),
        }
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        let dir = Config::data_dir()
            .map(|d| d.join("uploads"))
            .unwrap_or_else(|| PathBuf::from("uploads"));
        Self { dir, public_base_url: "/uploads".to_string() }
    }
}

impl Default for CloudinaryConfig {
    fn default() -> Self {
        Self {
            cloud_name: None,
            api_key: None,
            api_secret: None,
            folder: "uploads".to_string(),
            timeout_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.ai.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.ai.groq.model, "llama-3.3-70b-versatile");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert!(config.ai.gemini.api_key.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [database]
            path = "/var/lib/taskpulse/app.db"

            [ai]
            request_timeout_secs = 15

            [ai.groq]
            model = "llama-3.1-8b-instant"
            base_url = "http://localhost:9999/v1"

            [storage]
            backend = "cloudinary"

            [storage.cloudinary]
            cloud_name = "demo"
            folder = "evidence"
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.path, PathBuf::from("/var/lib/taskpulse/app.db"));
        assert_eq!(config.ai.request_timeout_secs, 15);
        assert_eq!(config.ai.groq.model, "llama-3.1-8b-instant");
        // untouched section keeps defaults
        assert_eq!(config.ai.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.storage.backend, StorageBackend::Cloudinary);
        assert_eq!(config.storage.cloudinary.cloud_name.as_deref(), Some("demo"));
        assert_eq!(config.storage.cloudinary.folder, "evidence");
    }

    #[test]
    fn test_socket_addr() {
        let config = Config::default();
        assert_eq!(config.socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_redacted_toml_masks_secrets() {
        let mut config = Config::default();
        config.ai.gemini.api_key = Some("super-secret".to_string());
        let rendered = config.to_redacted_toml().unwrap();
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("********"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("GROQ_API_KEY", "groq-from-env");
        std::env::set_var("TASKPULSE_DATABASE", "/tmp/from-env.db");

        let mut config = Config::default();
        config.apply_env();
        assert_eq!(config.ai.groq.api_key.as_deref(), Some("groq-from-env"));
        assert_eq!(config.database.path, PathBuf::from("/tmp/from-env.db"));

        std::env::remove_var("GROQ_API_KEY");
        std::env::remove_var("TASKPULSE_DATABASE");
    }

    #[test]
    #[serial]
    fn test_blank_env_values_are_ignored() {
        std::env::set_var("GEMINI_API_KEY", "   ");
        let mut config = Config::default();
        config.apply_env();
        assert!(config.ai.gemini.api_key.is_none());
        std::env::remove_var("GEMINI_API_KEY");
    }
}
