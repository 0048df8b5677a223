// src/transport.rs
//! Wire-level request/response types and the HTTP transport seam.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::app_log;
use crate::error::HttpError;

pub const AUTHORIZATION: &str = "Authorization";

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Optional per-call settings: query parameters and extra headers.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
}

impl RequestConfig {
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: Option<Value>) -> Self {
        self.body = body;
        self
    }

    pub fn with_config(mut self, config: Option<RequestConfig>) -> Self {
        if let Some(config) = config {
            self.query.extend(config.query);
            self.headers.extend(config.headers);
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Set a header, replacing any existing value regardless of case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status < 400
    }

    /// Turn 4xx/5xx responses into [`HttpError::Status`].
    pub fn error_for_status(self) -> Result<Self, HttpError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(HttpError::Status {
                status: self.status,
                body: self.body,
            })
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_str(&self.body).map_err(|e| HttpError::Decode(e.to_string()))
    }

    /// Body as JSON, or a JSON string when the body is not JSON.
    pub fn json_value(&self) -> Value {
        if self.body.trim().is_empty() {
            return Value::Null;
        }
        serde_json::from_str(&self.body).unwrap_or_else(|_| Value::String(self.body.clone()))
    }
}

/// Sends one request and reports whatever response arrived. Only a missing
/// response (or an unbuildable request) is an `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, HttpError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, HttpError> {
        let mut map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| HttpError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| HttpError::InvalidRequest(format!("header {}: {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, url: &str, request: &ApiRequest) -> Result<ApiResponse, HttpError> {
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(Self::header_map(&request.headers)?);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        app_log!(trace, "{} {} -> {}", request.method, url, status);

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status,
            headers: BTreeMap::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let mut request = ApiRequest::new(Method::GET, "/api/jobs/");
        request.set_header("authorization", "Bearer OLD");
        request.set_header(AUTHORIZATION, bearer("NEW"));

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("AUTHORIZATION"), Some("Bearer NEW"));
    }

    #[test]
    fn test_config_merges_query_and_headers() {
        let config = RequestConfig::default()
            .with_query("search", "rust")
            .with_header("X-Trace", "1");
        let request = ApiRequest::new(Method::GET, "/api/jobs/").with_config(Some(config));

        assert_eq!(request.query, vec![("search".to_string(), "rust".to_string())]);
        assert_eq!(request.header("x-trace"), Some("1"));
    }

    #[test]
    fn test_error_for_status() {
        assert!(response(200, "{}").error_for_status().is_ok());
        assert!(response(304, "").error_for_status().is_ok());

        let err = response(404, "missing").error_for_status().unwrap_err();
        assert_eq!(
            err,
            HttpError::Status {
                status: 404,
                body: "missing".to_string()
            }
        );
    }

    #[test]
    fn test_json_decoding() {
        #[derive(Deserialize)]
        struct Job {
            title: String,
        }

        let job: Job = response(200, r#"{"title":"Rust dev"}"#).json().unwrap();
        assert_eq!(job.title, "Rust dev");

        assert!(matches!(
            response(200, "oops").json::<Job>(),
            Err(HttpError::Decode(_))
        ));
        assert_eq!(response(200, "oops").json_value(), Value::String("oops".into()));
        assert_eq!(response(204, "").json_value(), Value::Null);
    }
}
