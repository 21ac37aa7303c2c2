use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

const API_KEY_ENV: &str = "OPENAI_SERCET_KEY";
const DEVELOPMENT_ENV: &str = "DEVELOPMENT";

/// Which fragment source serves `/chat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayMode {
    /// Relay the upstream provider's completion stream.
    Production,
    /// Replay the fixed paragraph without calling the provider.
    Development,
}

#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub mode: RelayMode,
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub token_interval: Duration,
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mode", &self.mode)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("token_interval", &self.token_interval)
            .finish()
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    upstream: UpstreamSection,
}

#[derive(Debug, Deserialize, Default)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize, Default)]
struct UpstreamSection {
    model: Option<String>,
    base_url: Option<String>,
    token_interval_ms: Option<u64>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3450
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_token_interval_ms() -> u64 {
    100
}

impl ServerConfig {
    /// Load `.env`, then the optional TOML file, then the process environment.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().map_err(|err| anyhow::anyhow!("Error loading .env file: {}", err))?;

        let file_config = load_from_file()?.unwrap_or_default();
        Ok(Self::resolve(file_config, |key| env::var(key).ok()))
    }

    /// Build a config from environment-style lookups alone.
    #[cfg(test)]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::resolve(FileConfig::default(), lookup)
    }

    fn resolve(file: FileConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let host = lookup("STREAMCHAT_HOST")
            .or(file.server.host)
            .unwrap_or_else(default_host);
        let port = lookup("STREAMCHAT_PORT")
            .and_then(|value| value.parse::<u16>().ok())
            .or(file.server.port)
            .unwrap_or_else(default_port);
        let model = lookup("OPENAI_MODEL")
            .or(file.upstream.model)
            .unwrap_or_else(default_model);
        let base_url = lookup("OPENAI_BASE_URL")
            .or(file.upstream.base_url)
            .unwrap_or_else(default_base_url);
        let token_interval_ms = lookup("STREAMCHAT_TOKEN_INTERVAL_MS")
            .and_then(|value| value.parse::<u64>().ok())
            .or(file.upstream.token_interval_ms)
            .unwrap_or_else(default_token_interval_ms);

        let mode = match lookup(DEVELOPMENT_ENV).as_deref() {
            Some("true") => RelayMode::Development,
            _ => RelayMode::Production,
        };
        let api_key = lookup(API_KEY_ENV).filter(|key| !key.is_empty());

        Self {
            host,
            port,
            mode,
            api_key,
            model,
            base_url,
            token_interval: Duration::from_millis(token_interval_ms),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn load_from_file() -> anyhow::Result<Option<FileConfig>> {
    let config_path = env::var("STREAMCHAT_CONFIG").ok();
    let path = if let Some(path) = config_path {
        Some(path)
    } else if Path::new("server.toml").exists() {
        Some("server.toml".to_string())
    } else {
        None
    };

    let Some(path) = path else {
        return Ok(None);
    };

    parse_file(&path).map(Some)
}

fn parse_file(path: &str) -> anyhow::Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .map_err(|err| anyhow::anyhow!("Failed to read config {}: {}", path, err))?;
    toml::from_str(&contents)
        .map_err(|err| anyhow::anyhow!("Failed to parse config {}: {}", path, err))
}
