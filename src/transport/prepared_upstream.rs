use crate::config::UpstreamConfig;
use crate::error::ProxyError;

const CONVERSATION_CREATE_PATH: [&str; 5] = ["api", "user", "agent", "conversation", "create"];
const CONVERSATION_CLEAR_PATH: [&str; 6] = ["api", "user", "agent", "conversation", "v1", "clear"];
const CHAT_PATH: [&str; 2] = ["api", "chat"];

/// Precomputed upstream endpoints and headers used by hot request paths.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    base: url::Url,
    origin: String,
    create_conversation_url: url::Url,
    clear_conversation_url: url::Url,
    static_headers: http::HeaderMap,
    cookie_prefix: String,
    proxy: Option<String>,
}

impl PreparedUpstream {
    /// Build the prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Internal` when the base URL or a static header
    /// value is unusable. Config validation rejects these first.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, ProxyError> {
        let origin = upstream.base_url.trim_end_matches('/').to_string();
        let base = url::Url::parse(&origin)
            .map_err(|e| ProxyError::Internal(format!("invalid upstream base_url: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ProxyError::Internal(format!(
                "upstream base_url cannot carry a path: {origin}"
            )));
        }

        let mut static_headers = http::HeaderMap::new();
        static_headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        static_headers.insert(
            http::header::ORIGIN,
            header_value("Origin", &origin).map_err(into_internal)?,
        );
        static_headers.insert(
            http::header::USER_AGENT,
            header_value("User-Agent", &upstream.user_agent).map_err(into_internal)?,
        );

        Ok(Self {
            create_conversation_url: join_segments(&base, &CONVERSATION_CREATE_PATH)?,
            clear_conversation_url: join_segments(&base, &CONVERSATION_CLEAR_PATH)?,
            base,
            origin,
            static_headers,
            cookie_prefix: format!(
                "hy_source={}; hy_user={}; hy_token=",
                upstream.hy_source, upstream.hy_user
            ),
            proxy: normalize_proxy(upstream.proxy.as_deref()),
        })
    }

    #[must_use]
    pub fn create_conversation_url(&self) -> &url::Url {
        &self.create_conversation_url
    }

    #[must_use]
    pub fn clear_conversation_url(&self) -> &url::Url {
        &self.clear_conversation_url
    }

    /// `{base}/api/chat/{chat_id}`, with `chat_id` kept as one path segment.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Internal` if the base URL cannot take a path.
    pub fn chat_url(&self, chat_id: &str) -> Result<url::Url, ProxyError> {
        let mut url = join_segments(&self.base, &CHAT_PATH)?;
        url.path_segments_mut()
            .map_err(|()| ProxyError::Internal("upstream base_url cannot carry a path".into()))?
            .push(chat_id);
        Ok(url)
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Headers for one upstream call: session cookie plus agent-specific
    /// `Referer` and `X-Agentid` on top of the static set.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::InvalidRequest` when the token or agent id cannot
    /// be carried in an HTTP header.
    pub fn build_upstream_headers(
        &self,
        hy_token: &str,
        agent_id: &str,
    ) -> Result<http::HeaderMap, ProxyError> {
        let mut headers = self.static_headers.clone();

        let mut cookie = String::with_capacity(self.cookie_prefix.len() + hy_token.len());
        cookie.push_str(&self.cookie_prefix);
        cookie.push_str(hy_token);
        headers.insert(http::header::COOKIE, header_value("Cookie", &cookie)?);

        let referer = format!("{}/chat/{agent_id}", self.origin);
        headers.insert(http::header::REFERER, header_value("Referer", &referer)?);
        headers.insert("x-agentid", header_value("X-Agentid", agent_id)?);
        Ok(headers)
    }
}

fn join_segments(base: &url::Url, segments: &[&str]) -> Result<url::Url, ProxyError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| ProxyError::Internal("upstream base_url cannot carry a path".into()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn header_value(name: &str, value: &str) -> Result<http::HeaderValue, ProxyError> {
    http::HeaderValue::from_str(value)
        .map_err(|_| ProxyError::InvalidRequest(format!("value not allowed in {name} header")))
}

fn into_internal(err: ProxyError) -> ProxyError {
    ProxyError::Internal(err.to_string())
}

fn normalize_proxy(proxy: Option<&str>) -> Option<String> {
    proxy.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_upstream(base_url: &str) -> UpstreamConfig {
        UpstreamConfig {
            base_url: base_url.to_string(),
            hy_user: "user-1".to_string(),
            user_agent: "test-agent".to_string(),
            proxy: Some("  ".to_string()),
            ..UpstreamConfig::default()
        }
    }

    #[test]
    fn test_endpoint_urls() {
        let prepared = PreparedUpstream::new(&make_upstream("https://yb.example.com/")).unwrap();
        assert_eq!(
            prepared.create_conversation_url().as_str(),
            "https://yb.example.com/api/user/agent/conversation/create"
        );
        assert_eq!(
            prepared.clear_conversation_url().as_str(),
            "https://yb.example.com/api/user/agent/conversation/v1/clear"
        );
        assert_eq!(
            prepared.chat_url("abc-123").unwrap().as_str(),
            "https://yb.example.com/api/chat/abc-123"
        );
        assert!(prepared.proxy().is_none());
    }

    #[test]
    fn test_chat_id_stays_one_segment() {
        let prepared = PreparedUpstream::new(&make_upstream("http://127.0.0.1:9000")).unwrap();
        assert_eq!(
            prepared.chat_url("a/b?c").unwrap().as_str(),
            "http://127.0.0.1:9000/api/chat/a%2Fb%3Fc"
        );
    }

    #[test]
    fn test_base_path_is_kept() {
        let prepared = PreparedUpstream::new(&make_upstream("http://host/prefix")).unwrap();
        assert_eq!(
            prepared.chat_url("x").unwrap().as_str(),
            "http://host/prefix/api/chat/x"
        );
    }

    #[test]
    fn test_upstream_headers() {
        let prepared = PreparedUpstream::new(&make_upstream("https://yb.example.com")).unwrap();
        let headers = prepared.build_upstream_headers("tok", "agent-7").unwrap();
        assert_eq!(
            headers[http::header::COOKIE],
            "hy_source=web; hy_user=user-1; hy_token=tok"
        );
        assert_eq!(headers[http::header::ORIGIN], "https://yb.example.com");
        assert_eq!(
            headers[http::header::REFERER],
            "https://yb.example.com/chat/agent-7"
        );
        assert_eq!(headers["x-agentid"], "agent-7");
        assert_eq!(headers[http::header::USER_AGENT], "test-agent");
        assert_eq!(headers[http::header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let prepared = PreparedUpstream::new(&make_upstream("https://yb.example.com")).unwrap();
        let err = prepared
            .build_upstream_headers("bad\ntoken", "agent")
            .unwrap_err();
        assert!(matches!(err, ProxyError::InvalidRequest(_)));
    }
}
