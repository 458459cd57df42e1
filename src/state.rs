mod request_id;

use bytes::Bytes;

use crate::auth::{resolve_upstream_token, AllowedClientKeys};
use crate::config::AppConfig;
use crate::error::ProxyError;
use crate::routing::ModelRegistry;
use crate::transport::{HttpTransport, PreparedUpstream};

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub models: ModelRegistry,
    pub upstream: PreparedUpstream,
    allowed_client_keys: AllowedClientKeys,
    request_ids: RequestIdGenerator,
    models_response_body: Bytes,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        upstream: PreparedUpstream,
        allowed_client_keys: AllowedClientKeys,
    ) -> Self {
        let models = ModelRegistry::new(&config.models);
        let models_response_body = crate::api::models::build_models_response_body(&models);
        Self {
            config,
            transport,
            models,
            upstream,
            allowed_client_keys,
            request_ids: RequestIdGenerator::new(),
            models_response_body,
        }
    }

    /// Authenticate the request and return the `hy_token` for upstream calls.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Auth` when the API key is missing or invalid.
    pub fn upstream_token<'a>(&'a self, headers: &'a http::HeaderMap) -> Result<&'a str, ProxyError> {
        resolve_upstream_token(
            headers,
            &self.allowed_client_keys,
            self.config.upstream.hy_token.as_deref(),
        )
    }

    /// Authenticate a request that does not talk to the upstream.
    ///
    /// # Errors
    ///
    /// Returns `ProxyError::Auth` when the API key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), ProxyError> {
        crate::auth::authenticate(headers, &self.allowed_client_keys)
    }

    #[must_use]
    pub fn next_completion_id(&self) -> String {
        self.request_ids.next_completion_id()
    }

    #[must_use]
    pub fn models_response_body(&self) -> Bytes {
        self.models_response_body.clone()
    }
}
