use crate::config::AppConfig;
use crate::error::ProxyError;
use http::header::AUTHORIZATION;
use rustc_hash::FxHashSet;

/// Compact key index used in hot-path authentication.
pub enum AllowedClientKeys {
    /// No allow-list configured: the bearer token is the upstream token.
    Disabled,
    Single { bearer: Box<str> },
    Multiple(FxHashSet<String>),
}

/// Extract the bearer token from the `Authorization` header.
///
/// # Errors
///
/// Returns `ProxyError::Auth` when the header is missing, not a bearer
/// credential, or empty.
pub fn extract_bearer_token(headers: &http::HeaderMap) -> Result<&str, ProxyError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ProxyError::Auth("Missing API key".to_string()))
}

/// Authenticate an incoming request against the pre-indexed allow-list.
///
/// With [`AllowedClientKeys::Disabled`] any well-formed bearer token passes;
/// the upstream decides whether it is valid.
///
/// # Errors
///
/// Returns `ProxyError::Auth` when the API key is missing or not allowed.
pub fn authenticate(
    headers: &http::HeaderMap,
    allowed_keys: &AllowedClientKeys,
) -> Result<(), ProxyError> {
    match allowed_keys {
        AllowedClientKeys::Disabled => extract_bearer_token(headers).map(|_| ()),
        AllowedClientKeys::Single { bearer } => match headers.get(AUTHORIZATION) {
            Some(value) if value.as_bytes() == bearer.as_bytes() => Ok(()),
            Some(_) => Err(ProxyError::Auth("Invalid API key".to_string())),
            None => Err(ProxyError::Auth("Missing API key".to_string())),
        },
        AllowedClientKeys::Multiple(allowed_set) => {
            let client_key = extract_bearer_token(headers)?;
            if allowed_set.contains(client_key) {
                Ok(())
            } else {
                Err(ProxyError::Auth("Invalid API key".to_string()))
            }
        }
    }
}

/// Authenticate the request and pick the `hy_token` to present upstream.
///
/// # Errors
///
/// Returns `ProxyError::Auth` when authentication fails.
pub fn resolve_upstream_token<'a>(
    headers: &'a http::HeaderMap,
    allowed_keys: &AllowedClientKeys,
    configured_token: Option<&'a str>,
) -> Result<&'a str, ProxyError> {
    authenticate(headers, allowed_keys)?;
    match (allowed_keys, configured_token) {
        (_, Some(token)) => Ok(token),
        (AllowedClientKeys::Disabled, None) => extract_bearer_token(headers),
        // Config validation rejects an allow-list without a fixed token.
        (_, None) => Err(ProxyError::Internal(
            "upstream.hy_token is not configured".to_string(),
        )),
    }
}

/// Build a hash-set index for allowed client keys.
#[must_use]
pub fn build_allowed_key_set(config: &AppConfig) -> AllowedClientKeys {
    let mut allowed_set: FxHashSet<String> = config
        .client_authentication
        .allowed_keys
        .iter()
        .cloned()
        .collect();

    match allowed_set.len() {
        0 => AllowedClientKeys::Disabled,
        1 => match allowed_set.drain().next() {
            Some(single_key) => AllowedClientKeys::Single {
                bearer: format!("Bearer {single_key}").into_boxed_str(),
            },
            None => AllowedClientKeys::Disabled,
        },
        _ => AllowedClientKeys::Multiple(allowed_set),
    }
}
