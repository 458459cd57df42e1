use std::collections::HashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream(config)?;
    validate_models(config)?;
    validate_allowed_keys(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    let parsed = url::Url::parse(upstream.base_url.trim()).map_err(|err| {
        validation_err(format!("upstream.base_url is not a valid URL: {err}"))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(
            "upstream.base_url must start with http:// or https://",
        ));
    }
    if upstream.agent_id.trim().is_empty() {
        return Err(validation_err("upstream.agent_id cannot be empty"));
    }
    if upstream.hy_source.trim().is_empty() {
        return Err(validation_err("upstream.hy_source cannot be empty"));
    }
    if let Some(token) = upstream.hy_token.as_deref() {
        if token.trim().is_empty() {
            return Err(validation_err("upstream.hy_token cannot be empty when set"));
        }
    }
    validate_proxy_url(upstream.proxy.as_deref())
}

fn validate_proxy_url(proxy: Option<&str>) -> Result<(), ConfigError> {
    let Some(proxy) = proxy.map(str::trim) else {
        return Ok(());
    };
    if proxy.is_empty() {
        return Err(validation_err("upstream.proxy cannot be empty when set"));
    }
    let parsed = url::Url::parse(proxy)
        .map_err(|err| validation_err(format!("upstream.proxy is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https" | "socks5" | "socks5h") {
        return Err(validation_err(
            "upstream.proxy must use http://, https:// or socks5://",
        ));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    if config.models.is_empty() {
        return Err(validation_err("models cannot be empty"));
    }

    // Lookup is case-insensitive, so names must be unique after lowercasing.
    let mut seen = HashSet::new();
    for model in &config.models {
        if model.name.trim().is_empty() {
            return Err(validation_err("model name cannot be empty"));
        }
        if model.upstream_id.trim().is_empty() {
            return Err(validation_err(format!(
                "Model '{}': upstream_id cannot be empty",
                model.name
            )));
        }
        if !seen.insert(model.name.to_lowercase()) {
            return Err(validation_err(format!(
                "duplicate model entry '{}'",
                model.name
            )));
        }
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    let keys = &config.client_authentication.allowed_keys;
    for key in keys {
        if key.trim().is_empty() {
            return Err(validation_err("allowed_keys contains an empty key"));
        }
    }
    if !keys.is_empty() && config.upstream.hy_token.is_none() {
        return Err(validation_err(
            "upstream.hy_token must be set when client_authentication.allowed_keys is used",
        ));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;

    fn make_valid_config() -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: UpstreamConfig::default(),
            models: default_models(),
            client_authentication: ClientAuthConfig::default(),
            features: FeaturesConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = make_valid_config();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_invalid_base_url() {
        let mut config = make_valid_config();
        config.upstream.base_url = "ftp://bad.url".to_string();
        assert!(validate_config(&config).is_err());

        config.upstream.base_url = "not a url".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_agent_id() {
        let mut config = make_valid_config();
        config.upstream.agent_id = "  ".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_hy_token_when_set() {
        let mut config = make_valid_config();
        config.upstream.hy_token = Some(String::new());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_duplicate_model_names_differ_only_in_case() {
        let mut config = make_valid_config();
        let mut dup = config.models[0].clone();
        dup.name = dup.name.to_uppercase();
        config.models.push(dup);
        let msg = validate_config(&config).unwrap_err().to_string();
        assert!(msg.contains("duplicate model entry"));
    }

    #[test]
    fn test_empty_models() {
        let mut config = make_valid_config();
        config.models.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_upstream_id() {
        let mut config = make_valid_config();
        config.models[0].upstream_id = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_allowed_keys_require_fixed_token() {
        let mut config = make_valid_config();
        config.client_authentication.allowed_keys = vec!["client-key".to_string()];
        assert!(validate_config(&config).is_err());

        config.upstream.hy_token = Some("token".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_allowed_keys_reject_blank_entry() {
        let mut config = make_valid_config();
        config.upstream.hy_token = Some("token".to_string());
        config.client_authentication.allowed_keys = vec![" ".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = make_valid_config();
        config.features.log_level = "VERBOSE".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_pool_max_idle_per_host() {
        let mut config = make_valid_config();
        config.server.http_pool_max_idle_per_host = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_runtime_worker_threads() {
        let mut config = make_valid_config();
        config.server.runtime_worker_threads = Some(0);
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_invalid_proxy_url() {
        let mut config = make_valid_config();
        config.upstream.proxy = Some("bad-proxy".to_string());
        assert!(validate_config(&config).is_err());

        config.upstream.proxy = Some("http://127.0.0.1:8080".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
