use std::sync::Once;
use std::time::Duration;

use serde::Serialize;

use crate::config::ServerConfig;
use crate::error::ProxyError;
use crate::protocol::yuanbao::{
    ConversationClearRequest, ConversationCreateRequest, ConversationCreateResponse,
    YuanbaoChatRequest,
};
use crate::util::truncate_utf8;

use super::PreparedUpstream;

static RUSTLS_PROVIDER_INIT: Once = Once::new();
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_UPSTREAM_ERROR_LEN: usize = 500;

fn build_reqwest_client(
    config: &ServerConfig,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, ProxyError> {
    let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
    };

    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(config.http_pool_max_idle_per_host.max(1))
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(Duration::from_secs(config.timeout));

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| ProxyError::Transport(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !config.http_use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| ProxyError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Single-attempt HTTP client for the Yuanbao endpoints.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build the pooled client from the server config.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Transport` for an unusable proxy URL or TLS setup.
    pub fn new(config: &ServerConfig, proxy_url: Option<&str>) -> Result<Self, ProxyError> {
        RUSTLS_PROVIDER_INIT.call_once(|| {
            let _ = rustls::crypto::ring::default_provider().install_default();
        });
        Ok(Self {
            client: build_reqwest_client(config, proxy_url)?,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &url::Url,
        headers: &http::HeaderMap,
        body: &T,
    ) -> Result<reqwest::Response, ProxyError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| ProxyError::Internal(format!("failed to encode upstream body: {e}")))?;

        let mut request = reqwest::Request::new(http::Method::POST, url.clone());
        *request.headers_mut() = headers.clone();
        *request.body_mut() = Some(reqwest::Body::from(body));

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;
        ensure_success(response).await
    }

    /// Provision a new upstream conversation and return its id.
    ///
    /// # Errors
    ///
    /// Returns an upstream or transport error, including when the response
    /// carries no usable `id`.
    pub async fn create_conversation(
        &self,
        prepared: &PreparedUpstream,
        headers: &http::HeaderMap,
        agent_id: &str,
    ) -> Result<String, ProxyError> {
        let response = self
            .post_json(
                prepared.create_conversation_url(),
                headers,
                &ConversationCreateRequest { agent_id },
            )
            .await?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::Transport(e.to_string()))?;
        let created: ConversationCreateResponse =
            serde_json::from_slice(&bytes).map_err(|e| ProxyError::Upstream {
                status,
                message: format!("invalid conversation create response: {e}"),
            })?;

        match created.id {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(ProxyError::Upstream {
                status,
                message: "conversation create response has no id".to_string(),
            }),
        }
    }

    /// Start the chat call. The returned response body is the event stream.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Upstream` for a non-2xx status and
    /// `ProxyError::Transport` when the request could not be sent.
    pub async fn open_chat_stream(
        &self,
        prepared: &PreparedUpstream,
        headers: &http::HeaderMap,
        chat_id: &str,
        body: &YuanbaoChatRequest,
    ) -> Result<reqwest::Response, ProxyError> {
        let url = prepared.chat_url(chat_id)?;
        self.post_json(&url, headers, body).await
    }

    /// Delete an upstream conversation.
    ///
    /// # Errors
    ///
    /// Returns an upstream or transport error.
    pub async fn remove_conversation(
        &self,
        prepared: &PreparedUpstream,
        headers: &http::HeaderMap,
        chat_id: &str,
    ) -> Result<(), ProxyError> {
        self.post_json(
            prepared.clear_conversation_url(),
            headers,
            &ConversationClearRequest {
                conversation_ids: [chat_id],
            },
        )
        .await
        .map(drop)
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ProxyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.bytes().await.unwrap_or_default();
    Err(ProxyError::Upstream {
        status: status.as_u16(),
        message: sanitize_upstream_error(&body),
    })
}

/// Pull a readable message out of an upstream error body, truncated.
pub(crate) fn sanitize_upstream_error(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        let message = json
            .get("error")
            .and_then(|e| e.get("message").or(Some(e)))
            .and_then(serde_json::Value::as_str)
            .or_else(|| json.get("msg").and_then(serde_json::Value::as_str))
            .or_else(|| json.get("detail").and_then(serde_json::Value::as_str));
        if let Some(message) = message {
            return truncate_utf8(message, MAX_UPSTREAM_ERROR_LEN);
        }
    }

    let raw = String::from_utf8_lossy(body);
    truncate_utf8(raw.trim(), MAX_UPSTREAM_ERROR_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_prefers_structured_message() {
        assert_eq!(
            sanitize_upstream_error(br#"{"error":{"message":"quota exceeded"}}"#),
            "quota exceeded"
        );
        assert_eq!(sanitize_upstream_error(br#"{"error":"denied"}"#), "denied");
        assert_eq!(sanitize_upstream_error(br#"{"code":1,"msg":"login required"}"#), "login required");
        assert_eq!(sanitize_upstream_error(b"  Bad Gateway \n"), "Bad Gateway");
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let body = "错".repeat(400);
        let message = sanitize_upstream_error(body.as_bytes());
        assert!(message.ends_with("..."));
        assert!(message.len() <= MAX_UPSTREAM_ERROR_LEN + 3);
    }

    #[test]
    fn test_new_rejects_bad_proxy() {
        let err = HttpTransport::new(&ServerConfig::default(), Some("::not a url::")).unwrap_err();
        assert!(matches!(err, ProxyError::Transport(_)));
    }
}
