//! Outbound HTTP for API nodes
//!
//! The engine talks to the network through the [`HttpClient`] trait so that
//! hosts can substitute their own transport (and tests can run offline).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{FlowEngineError, Result};
use crate::types::{ApiConfig, HttpMethod};

/// Header added to every request unless the node overrides it
pub const CONTENT_TYPE: &str = "Content-Type";
pub const JSON_MIME: &str = "application/json";

/// A fully resolved request, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Never set for GET
    pub body: Option<String>,
}

impl HttpRequest {
    /// Build a request from an API node's configuration.
    ///
    /// Node headers are merged over `Content-Type: application/json`; a node
    /// header whose name matches case-insensitively replaces the default.
    pub fn from_config(config: &ApiConfig) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(CONTENT_TYPE.to_string(), JSON_MIME.to_string());

        for (name, value) in config.headers.iter().flatten() {
            headers.retain(|existing: &String, _| !existing.eq_ignore_ascii_case(name));
            headers.insert(name.clone(), value.clone());
        }

        let body = match config.method {
            HttpMethod::Get => None,
            _ => config.body.clone(),
        };

        Self {
            method: config.method,
            url: config.url.clone(),
            headers,
            body,
        }
    }
}

/// Transport used by API nodes.
///
/// Implementations return the parsed JSON body. Non-2xx statuses are not
/// errors; only transport failures and unparseable bodies are.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<Value>;
}

/// Default client backed by `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (timeouts, proxies, TLS).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<Value> {
        log::debug!("HTTP {} {}", request.method, request.url);

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(|e| {
            FlowEngineError::Http(format!("{} {}: {}", request.method, request.url, e))
        })?;

        let status = response.status();
        let text = response.text().await?;
        log::debug!(
            "HTTP {} {} -> {} ({} bytes)",
            request.method,
            request.url,
            status,
            text.len()
        );

        serde_json::from_str(&text).map_err(|e| FlowEngineError::ResponseParse {
            url: request.url.clone(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(method: HttpMethod) -> ApiConfig {
        ApiConfig {
            url: "https://api.example.com/items".to_string(),
            method,
            headers: None,
            body: Some(r#"{"name":"widget"}"#.to_string()),
        }
    }

    #[test]
    fn test_default_content_type() {
        let request = HttpRequest::from_config(&config(HttpMethod::Post));

        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers.get(CONTENT_TYPE).map(String::as_str), Some(JSON_MIME));
        assert_eq!(request.body.as_deref(), Some(r#"{"name":"widget"}"#));
    }

    #[test]
    fn test_node_headers_override_case_insensitively() {
        let mut cfg = config(HttpMethod::Put);
        cfg.headers = Some(BTreeMap::from([
            ("content-type".to_string(), "text/plain".to_string()),
            ("Authorization".to_string(), "Bearer abc".to_string()),
        ]));

        let request = HttpRequest::from_config(&cfg);

        assert_eq!(request.headers.len(), 2);
        assert!(!request.headers.contains_key(CONTENT_TYPE));
        assert_eq!(
            request.headers.get("content-type").map(String::as_str),
            Some("text/plain")
        );
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer abc")
        );
    }

    #[test]
    fn test_transport_failure_is_http_error() {
        let client = ReqwestHttpClient::new();
        let request = HttpRequest::from_config(&ApiConfig {
            // Port 1 is never listening
            url: "http://127.0.0.1:1/unreachable".to_string(),
            ..Default::default()
        });

        let err = tokio_test::block_on(client.send(request)).unwrap_err();
        assert!(matches!(err, FlowEngineError::Http(_)));
    }

    #[test]
    fn test_get_drops_body() {
        let request = HttpRequest::from_config(&config(HttpMethod::Get));
        assert_eq!(request.body, None);

        let request = HttpRequest::from_config(&config(HttpMethod::Delete));
        assert!(request.body.is_some());
    }
}
