pub mod validation;

use serde::{Deserialize, Serialize};

use self::validation::validate_config;

/// Environment variable that overrides the default config file path.
pub const CONFIG_PATH_ENV: &str = "YUANBAO_PROXY_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_host")]
    pub host: String,
    /// Whole-request timeout for upstream calls, in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    #[serde(default = "default_http_pool_max_idle_per_host")]
    pub http_pool_max_idle_per_host: usize,
    #[serde(default = "default_http_pool_idle_timeout_secs")]
    pub http_pool_idle_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_worker_threads: Option<usize>,
    #[serde(default)]
    pub base_path: String,
    #[serde(default)]
    pub http_use_env_proxy: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_timeout() -> u64 {
    180
}
fn default_http_pool_max_idle_per_host() -> usize {
    16
}
fn default_http_pool_idle_timeout_secs() -> u64 {
    15
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            timeout: default_timeout(),
            http_pool_max_idle_per_host: default_http_pool_max_idle_per_host(),
            http_pool_idle_timeout_secs: default_http_pool_idle_timeout_secs(),
            runtime_worker_threads: None,
            base_path: String::new(),
            http_use_env_proxy: false,
        }
    }
}

/// Upstream Yuanbao service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Agent used when a request does not carry its own `agent_id`.
    #[serde(default = "default_agent_id")]
    pub agent_id: String,
    #[serde(default = "default_hy_source")]
    pub hy_source: String,
    #[serde(default)]
    pub hy_user: String,
    /// Fixed upstream token. When unset, the client's bearer token is forwarded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hy_token: Option<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
}

fn default_base_url() -> String {
    "https://yuanbao.tencent.com".to_string()
}
fn default_agent_id() -> String {
    "naQivTmsDa".to_string()
}
fn default_hy_source() -> String {
    "web".to_string()
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.0.0 Safari/537.36".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            agent_id: default_agent_id(),
            hy_source: default_hy_source(),
            hy_user: String::new(),
            hy_token: None,
            user_agent: default_user_agent(),
            proxy: None,
        }
    }
}

/// One entry of the external-name to upstream-model table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    /// Name clients send in `model`. Matched case-insensitively.
    pub name: String,
    /// Upstream `chatModelId`.
    pub upstream_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub support_functions: Vec<String>,
}

impl ModelConfig {
    fn builtin(name: &str, upstream_id: &str, support_functions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            upstream_id: upstream_id.to_string(),
            support_functions: support_functions.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Built-in model table used when the config file omits `models`.
#[must_use]
pub fn default_models() -> Vec<ModelConfig> {
    const SEARCH: &[&str] = &["supportInternetSearch"];
    vec![
        ModelConfig::builtin("deepseek-v3", "deep_seek_v3", &[]),
        ModelConfig::builtin("deepseek-r1", "deep_seek", &[]),
        ModelConfig::builtin("deepseek-v3-search", "deep_seek_v3", SEARCH),
        ModelConfig::builtin("deepseek-r1-search", "deep_seek", SEARCH),
        ModelConfig::builtin("hunyuan", "hunyuan_gpt_175B_0404", &[]),
        ModelConfig::builtin("hunyuan-t1", "hunyuan_t1", &[]),
        ModelConfig::builtin("hunyuan-search", "hunyuan_gpt_175B_0404", SEARCH),
        ModelConfig::builtin("hunyuan-t1-search", "hunyuan_t1", SEARCH),
    ]
}

/// Client authentication configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientAuthConfig {
    /// When empty, the bearer token is treated as the upstream `hy_token`.
    #[serde(default)]
    pub allowed_keys: Vec<String>,
}

/// Feature flags and settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fail the request when a `{`-prefixed upstream line is not valid JSON.
    #[serde(default = "default_true")]
    pub strict_json_lines: bool,
}

fn default_true() -> bool {
    true
}
fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            strict_json_lines: true,
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default = "default_models")]
    pub models: Vec<ModelConfig>,
    #[serde(default)]
    pub client_authentication: ClientAuthConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            models: default_models(),
            client_authentication: ClientAuthConfig::default(),
            features: FeaturesConfig::default(),
        }
    }
}

/// Resolve the config file path from the environment, falling back to `config.yaml`.
#[must_use]
pub fn config_path_from_env() -> String {
    std::env::var(CONFIG_PATH_ENV)
        .ok()
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
}

/// Load configuration from a YAML file and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] when reading the file fails, [`ConfigError::Yaml`]
/// when parsing fails, or [`ConfigError::Validation`] when semantic validation fails.
pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from YAML text.
///
/// # Errors
///
/// Returns [`ConfigError::Yaml`] or [`ConfigError::Validation`].
pub fn parse_config(contents: &str) -> Result<AppConfig, ConfigError> {
    let config: AppConfig = serde_yaml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_example_config() {
        let config = load_config("config.example.yaml");
        assert!(
            config.is_ok(),
            "Failed to load example config: {:?}",
            config.err()
        );
        let config = config.unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.upstream.base_url, "https://yuanbao.tencent.com");
        assert!(config.upstream.hy_token.is_none());
        assert!(config.client_authentication.allowed_keys.is_empty());
        assert!(config.features.strict_json_lines);
        assert!(config.models.iter().any(|m| m.name == "deepseek-r1"));
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("{}").unwrap();
        assert_eq!(config.server.timeout, 180);
        assert_eq!(config.upstream.agent_id, "naQivTmsDa");
        assert_eq!(config.models, default_models());
        assert_eq!(config.features.log_level, "INFO");
    }

    #[test]
    fn test_models_override_replaces_builtin_table() {
        let yaml = r"
models:
  - name: custom
    upstream_id: custom_upstream
    support_functions: [supportInternetSearch]
";
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.models[0].upstream_id, "custom_upstream");
        assert_eq!(
            config.models[0].support_functions,
            vec!["supportInternetSearch".to_string()]
        );
    }

    #[test]
    fn test_strict_json_lines_can_be_disabled() {
        let config = parse_config("features:\n  strict_json_lines: false\n").unwrap();
        assert!(!config.features.strict_json_lines);
    }
}
