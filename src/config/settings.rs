use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::mcp::{
    AuthType, ClientInfo, HttpTransportConfig, InMemoryServerDirectory, RetryConfig,
    ServerEndpoint, SessionConfig,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub client: ClientSettings,

    #[serde(default)]
    pub transport: TransportSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub servers: HashMap<String, ServerSettings>,
}

/// Identity sent in `initialize`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default = "default_client_name")]
    pub name: String,

    #[serde(default = "default_client_version")]
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportSettings {
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_timeout_secs")]
    pub reply_timeout_secs: u64,

    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    #[serde(default = "default_invoke_path")]
    pub invoke_path: String,

    #[serde(default = "default_true")]
    pub send_initialized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    pub base_url: String,

    #[serde(default)]
    pub auth_type: AuthType,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_client_name() -> String {
    env!("CARGO_PKG_NAME").to_string()
}
fn default_client_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_ws_path() -> String {
    "/ws".to_string()
}
fn default_invoke_path() -> String {
    "/tools/call".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_delay_ms() -> u64 {
    200
}
fn default_backoff_multiplier() -> u32 {
    2
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            name: default_client_name(),
            version: default_client_version(),
        }
    }
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_timeout_secs(),
            reply_timeout_secs: default_timeout_secs(),
            ws_path: default_ws_path(),
            invoke_path: default_invoke_path(),
            send_initialized: true,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl Settings {
    /// Loads `path`, or the per-user config file when `None`. A missing file
    /// yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config at {}, using defaults", config_path.display());
            Ok(Settings::default())
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let settings: Settings =
            toml::from_str(&content).context("Failed to parse config file")?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("ai", "webrana", "mcpgate")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn client_info(&self) -> ClientInfo {
        ClientInfo {
            name: self.client.name.clone(),
            version: self.client.version.clone(),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry.max_retries,
            initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
            backoff_multiplier: self.retry.backoff_multiplier,
        }
    }

    pub fn http_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            request_timeout: Duration::from_secs(self.transport.request_timeout_secs),
            retry: self.retry_config(),
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            client: self.client_info(),
            ws_path: self.transport.ws_path.clone(),
            connect_timeout: Duration::from_secs(self.transport.connect_timeout_secs),
            reply_timeout: Duration::from_secs(self.transport.reply_timeout_secs),
            send_initialized: self.transport.send_initialized,
            ..SessionConfig::default()
        }
    }

    /// Endpoint for a configured, enabled server.
    pub fn server(&self, id: &str) -> Result<Option<ServerEndpoint>> {
        match self.servers.get(id) {
            Some(server) if server.enabled => {
                let endpoint = ServerEndpoint::new(id, &server.base_url, server.auth_type)
                    .with_context(|| format!("Invalid server '{}'", id))?;
                Ok(Some(endpoint))
            }
            _ => Ok(None),
        }
    }

    /// Directory of every enabled server. Invalid entries are skipped with a
    /// warning.
    pub fn directory(&self) -> InMemoryServerDirectory {
        self.servers
            .iter()
            .filter(|(_, server)| server.enabled)
            .filter_map(|(id, server)| {
                match ServerEndpoint::new(id.as_str(), &server.base_url, server.auth_type) {
                    Ok(endpoint) => Some(endpoint),
                    Err(e) => {
                        tracing::warn!(server = %id, "Skipping server: {}", e);
                        None
                    }
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ServerId;

    const SAMPLE: &str = r#"
[client]
name = "agent-host"
version = "2.1.0"

[transport]
reply_timeout_secs = 10
ws_path = "/socket"

[retry]
max_retries = 1

[servers.kb]
base_url = "https://kb.example.com/api"
auth_type = "bearer"

[servers.legacy]
base_url = "http://legacy.local"
enabled = false

[servers.broken]
base_url = "ftp://nowhere"
"#;

    #[test]
    fn test_partial_file_fills_defaults() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();

        assert_eq!(settings.client.name, "agent-host");
        assert_eq!(settings.transport.reply_timeout_secs, 10);
        assert_eq!(settings.transport.request_timeout_secs, 30);
        assert_eq!(settings.transport.invoke_path, "/tools/call");
        assert!(settings.transport.send_initialized);
        assert_eq!(settings.retry.max_retries, 1);
        assert_eq!(settings.retry.initial_delay_ms, 200);
        assert_eq!(settings.servers["kb"].auth_type, AuthType::Bearer);
    }

    #[test]
    fn test_runtime_configs() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();

        let session = settings.session_config();
        assert_eq!(session.ws_path, "/socket");
        assert_eq!(session.reply_timeout, Duration::from_secs(10));
        assert_eq!(session.client.version, "2.1.0");

        let http = settings.http_config();
        assert_eq!(http.retry.max_retries, 1);
        assert_eq!(http.retry.delay_for_attempt(0), Duration::from_millis(200));
    }

    #[test]
    fn test_directory_skips_disabled_and_invalid() {
        let settings: Settings = toml::from_str(SAMPLE).unwrap();
        let ids: Vec<ServerId> = settings
            .directory()
            .list()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![ServerId::from("kb")]);

        assert!(settings.server("legacy").unwrap().is_none());
        assert!(settings.server("broken").is_err());
    }

    #[test]
    fn test_defaults_match_protocol_budget() {
        let settings = Settings::default();
        assert_eq!(settings.retry_config(), RetryConfig::default());
        assert_eq!(settings.session_config(), SessionConfig::default());
    }
}
