// src/client/mod.rs
//! Authenticated and public API clients.

use anyhow::Result;
use reqwest::Method;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::app_log;
use crate::config::ClientConfig;
use crate::error::HttpError;
use crate::navigation::Navigator;
use crate::role::{Role, RoleContext};
use crate::storage::{self, TokenStore};
use crate::transport::{
    bearer, ApiRequest, ApiResponse, RequestConfig, ReqwestTransport, Transport, AUTHORIZATION,
};

mod refresh;

pub use refresh::RefreshError;

pub const TOKEN_ENDPOINT: &str = "/api/accounts/token/";
pub const REFRESH_ENDPOINT: &str = "/api/accounts/token/refresh/";

/// Paths containing this are login/token calls and never trigger a refresh.
pub const TOKEN_PATH_MARKER: &str = "/token/";

pub fn is_token_path(path: &str) -> bool {
    path.contains(TOKEN_PATH_MARKER)
}

/// A request plus its retry guard. Once `retried` is set, no further
/// refresh is attempted for it.
#[derive(Debug, Clone)]
pub struct TrackedRequest {
    pub request: ApiRequest,
    pub retried: bool,
}

impl TrackedRequest {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request,
            retried: false,
        }
    }
}

/// Both clients, built from one configuration.
#[derive(Clone)]
pub struct ApiClients {
    pub auth: ScopedClient,
    pub public: PublicClient,
}

impl ApiClients {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        let config = Arc::new(config);
        Self {
            auth: ScopedClient::new(config.clone(), transport.clone(), store, navigator),
            public: PublicClient::new(config, transport),
        }
    }

    /// Build both clients over a reqwest transport honoring the configured timeout.
    pub fn from_config(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout_seconds)?);
        Ok(Self::new(config, transport, store, navigator))
    }
}

/// Client for endpoints that must work without login. No token, no retry.
#[derive(Clone)]
pub struct PublicClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl PublicClient {
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        config: Option<RequestConfig>,
    ) -> Result<ApiResponse, HttpError> {
        let request = ApiRequest::new(method, path)
            .with_body(body)
            .with_config(config);
        send(&self.config, self.transport.as_ref(), &request).await
    }

    pub async fn get(&self, path: &str, config: Option<RequestConfig>) -> Result<ApiResponse, HttpError> {
        self.request(Method::GET, path, None, config).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::POST, path, Some(body), None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::PUT, path, Some(body), None).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::PATCH, path, Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, HttpError> {
        self.request(Method::DELETE, path, None, None).await
    }
}

/// Client that attaches the role-scoped bearer token to every request and
/// recovers once from a 401 by refreshing the access token.
#[derive(Clone)]
pub struct ScopedClient {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    store: Arc<dyn TokenStore>,
    navigator: Arc<dyn Navigator>,
    role_context: RoleContext,
    default_headers: Arc<RwLock<BTreeMap<String, String>>>,
}

impl ScopedClient {
    pub fn new(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            navigator,
            role_context: RoleContext::new(),
            default_headers: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn role_context(&self) -> &RoleContext {
        &self.role_context
    }

    pub fn set_role_context(&self, role: Option<Role>) {
        self.role_context.set(role);
    }

    /// Access token for the next request.
    ///
    /// A jobseeker context always wins over the stored active role, so
    /// jobseeker-scoped calls never pick up a recruiter token.
    pub fn resolve_token(&self) -> Option<String> {
        if self.role_context.get() == Some(Role::Jobseeker) {
            return self.store.get(&storage::access_token_key(Role::Jobseeker));
        }

        storage::stored_role(self.store.as_ref())
            .and_then(|role| self.store.get(&storage::access_token_key(role)))
    }

    pub fn default_header(&self, name: &str) -> Option<String> {
        self.default_headers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.clone())
    }

    fn set_default_header(&self, name: &str, value: String) {
        let mut headers = self
            .default_headers
            .write()
            .unwrap_or_else(|e| e.into_inner());
        headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        headers.insert(name.to_string(), value);
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        config: Option<RequestConfig>,
    ) -> Result<ApiResponse, HttpError> {
        let request = ApiRequest::new(method, path)
            .with_body(body)
            .with_config(config);
        self.execute(TrackedRequest::new(request)).await
    }

    pub async fn get(&self, path: &str, config: Option<RequestConfig>) -> Result<ApiResponse, HttpError> {
        self.request(Method::GET, path, None, config).await
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::POST, path, Some(body), None).await
    }

    pub async fn put(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::PUT, path, Some(body), None).await
    }

    pub async fn patch(&self, path: &str, body: Value) -> Result<ApiResponse, HttpError> {
        self.request(Method::PATCH, path, Some(body), None).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, HttpError> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// Send a tracked request, refreshing and retrying at most once on 401.
    pub async fn execute(&self, mut tracked: TrackedRequest) -> Result<ApiResponse, HttpError> {
        let error = match self.send_decorated(&mut tracked.request).await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        if !error.is_unauthorized() || tracked.retried || is_token_path(&tracked.request.path) {
            return Err(error);
        }

        tracked.retried = true;

        let role = storage::stored_role(self.store.as_ref());
        let access = match self.refresh_access_token(role).await {
            Ok(access) => access,
            Err(refresh_error) => {
                app_log!(
                    warn,
                    "Token refresh failed for {} {}: {}",
                    tracked.request.method,
                    tracked.request.path,
                    refresh_error
                );
                self.handle_refresh_failure(role);
                return Err(error);
            }
        };

        tracked.request.set_header(AUTHORIZATION, bearer(&access));
        self.send_decorated(&mut tracked.request).await
    }

    async fn send_decorated(&self, request: &mut ApiRequest) -> Result<ApiResponse, HttpError> {
        self.decorate(request);
        send(&self.config, self.transport.as_ref(), request).await
    }

    fn decorate(&self, request: &mut ApiRequest) {
        let defaults = self
            .default_headers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for (name, value) in defaults {
            if request.header(&name).is_none() {
                request.set_header(&name, value);
            }
        }

        if let Some(token) = self.resolve_token() {
            request.set_header(AUTHORIZATION, bearer(&token));
        }
    }
}

async fn send(
    config: &ClientConfig,
    transport: &dyn Transport,
    request: &ApiRequest,
) -> Result<ApiResponse, HttpError> {
    let url = config.url_for(&request.path);
    app_log!(trace, "Sending {} {}", request.method, url);
    transport.send(&url, request).await?.error_for_status()
}
