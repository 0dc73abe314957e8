//! Configuration loading and management.
//!
//! The bot reads a single JSON file. Every field has a default, and a missing
//! file simply yields the defaults.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Nickname to register with.
    #[serde(default = "default_nick")]
    pub nick: String,
    /// Server address.
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Channels joined after registration.
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    /// Plugins loaded at startup.
    #[serde(default = "default_plugins")]
    pub plugins: Vec<String>,
    /// Plugin namespace; its final path component prefixes qualified plugin names.
    #[serde(default = "default_plugins_path")]
    pub plugins_path: String,
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    /// Directory holding the per-network identity databases.
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Seconds between keep-alive PINGs.
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,
    /// Extra constructor arguments, keyed by plugin name.
    #[serde(default)]
    pub plugin_settings: HashMap<String, serde_json::Value>,
}

// =============================================================================
// Defaults
// =============================================================================

fn default_nick() -> String {
    "pancakesbot".to_string()
}

fn default_network() -> String {
    "irc.slashnet.org".to_string()
}

fn default_port() -> u16 {
    6667
}

fn default_channels() -> Vec<String> {
    vec!["#bots".to_string()]
}

fn default_plugins() -> Vec<String> {
    vec!["admin".to_string()]
}

fn default_plugins_path() -> String {
    "plugins".to_string()
}

fn default_command_prefix() -> String {
    "~".to_string()
}

fn default_storage_path() -> String {
    "storage".to_string()
}

fn default_username() -> String {
    "pancakes".to_string()
}

fn default_realname() -> String {
    "robot".to_string()
}

fn default_keepalive_secs() -> u64 {
    300
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            network: default_network(),
            port: default_port(),
            channels: default_channels(),
            plugins: default_plugins(),
            plugins_path: default_plugins_path(),
            command_prefix: default_command_prefix(),
            storage_path: default_storage_path(),
            username: default_username(),
            realname: default_realname(),
            keepalive_secs: default_keepalive_secs(),
            plugin_settings: HashMap::new(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, or defaults if the file does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    /// `<storage_path>/users-<network>.db`
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.storage_path).join(format!("users-{}.db", self.network))
    }

    /// Namespace prefix for qualified plugin names (`plugins` in `plugins.admin`).
    pub fn plugin_prefix(&self) -> String {
        Path::new(&self.plugins_path)
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(default_plugins_path)
    }

    /// Constructor settings for one plugin; `Null` when none are configured.
    pub fn settings_for(&self, plugin: &str) -> serde_json::Value {
        self.plugin_settings
            .get(plugin)
            .cloned()
            .unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config.nick, "pancakesbot");
        assert_eq!(config.network, "irc.slashnet.org");
        assert_eq!(config.port, 6667);
        assert_eq!(config.channels, vec!["#bots"]);
        assert_eq!(config.plugins, vec!["admin"]);
        assert_eq!(config.command_prefix, "~");
        assert_eq!(config.keepalive_secs, 300);
    }

    #[test]
    fn fields_override_defaults() {
        let config = Config::from_json(
            r##"{"nick": "waffles", "port": 6697, "channels": ["#a", "#b"],
                "plugin_settings": {"admin": {"admin_id": 4}}}"##,
        )
        .unwrap();
        assert_eq!(config.nick, "waffles");
        assert_eq!(config.port, 6697);
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.settings_for("admin")["admin_id"], 4);
        assert!(config.settings_for("greet").is_null());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(Config::from_json("{nick"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load("/nonexistent/pancakes/config.json").unwrap();
        assert_eq!(config.nick, "pancakesbot");
    }

    #[test]
    fn database_path_is_per_network() {
        let config = Config {
            storage_path: "/var/lib/pancakes".into(),
            network: "irc.example.net".into(),
            ..Config::default()
        };
        assert_eq!(
            config.database_path(),
            PathBuf::from("/var/lib/pancakes/users-irc.example.net.db")
        );
    }

    #[test]
    fn plugin_prefix_is_last_path_component() {
        let config = Config {
            plugins_path: "/opt/bot/extras/".into(),
            ..Config::default()
        };
        assert_eq!(config.plugin_prefix(), "extras");
        assert_eq!(Config::default().plugin_prefix(), "plugins");
    }
}
