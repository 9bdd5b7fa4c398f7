//! Request/response boundary between the backend client and the network
//!
//! The backend client only speaks in `ApiRequest`/`ApiResponse` values. Any HTTP
//! status counts as a delivered response; a `TransportError` means no response
//! was obtained at all.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde::Serialize;
use tracing::debug;

use crate::error::TransportError;

/// An outgoing API request, relative to the transport's base URL
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,

    /// Path beginning with `/`, optionally carrying a query string
    pub path: String,

    pub headers: Vec<(String, String)>,

    /// JSON body, if any
    pub body: Option<Vec<u8>>,
}

impl ApiRequest {
    /// Create a GET request with no body
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Create a POST request with a JSON-encoded body
    pub fn post_json<T: Serialize>(path: impl Into<String>, body: &T) -> Result<Self, serde_json::Error> {
        Ok(Self {
            method: Method::POST,
            path: path.into(),
            headers: Vec::new(),
            body: Some(serde_json::to_vec(body)?),
        })
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Append a query parameter, percent-encoding both name and value
    pub fn with_query(mut self, name: &str, value: &str) -> Self {
        let separator = if self.path.contains('?') { '&' } else { '?' };
        self.path = format!(
            "{}{}{}={}",
            self.path,
            separator,
            urlencoding::encode(name),
            urlencoding::encode(value)
        );
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {}", token))
    }

    /// Look up a header value (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Bearer token carried in the Authorization header, if any
    pub fn bearer_token(&self) -> Option<&str> {
        self.header("Authorization").and_then(|v| v.strip_prefix("Bearer "))
    }
}

/// A delivered HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response with a JSON body
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Sends API requests and returns whatever the server answered
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Join a base URL and a request path
///
/// The base may carry a path prefix (`https://api.offload.app/api`) and may or
/// may not end in `/`. The prefix is preserved and the path, including any
/// query string, is appended unmodified. Absolute URLs pass through unchanged.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }

    let base = base_url.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{}{}", base, path)
    } else {
        format!("{}/{}", base, path)
    }
}

/// reqwest-backed transport rooted at a base URL
pub struct HttpTransport {
    base_url: String,
    http: Client,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let base_url = base_url.into();
        debug!(%base_url, ?timeout, "HttpTransport::new: called");

        Url::parse(&base_url).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = resolve_url(&self.base_url, &request.path);
        debug!(method = %request.method, %url, "HttpTransport::send: called");

        let mut builder = self.http.request(request.method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.header("content-type", "application/json").body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();

        debug!(%status, body_len = %body.len(), "HttpTransport::send: response received");
        Ok(ApiResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_preserves_prefix() {
        assert_eq!(
            resolve_url("https://api.offload.app/api", "/v1/health"),
            "https://api.offload.app/api/v1/health"
        );
    }

    #[test]
    fn test_resolve_url_trailing_slash() {
        assert_eq!(
            resolve_url("https://api.offload.app/api/", "/v1/health"),
            "https://api.offload.app/api/v1/health"
        );
    }

    #[test]
    fn test_resolve_url_keeps_query() {
        assert_eq!(
            resolve_url("https://api.offload.app/api/", "/v1/usage/reconcile?feature=breakdown"),
            "https://api.offload.app/api/v1/usage/reconcile?feature=breakdown"
        );
    }

    #[test]
    fn test_resolve_url_bare_host() {
        assert_eq!(
            resolve_url("https://api.offload.app", "/v1/sessions/anonymous"),
            "https://api.offload.app/v1/sessions/anonymous"
        );
        assert_eq!(resolve_url("https://api.offload.app/", "v1/health"), "https://api.offload.app/v1/health");
    }

    #[test]
    fn test_resolve_url_absolute_passthrough() {
        assert_eq!(
            resolve_url("https://api.offload.app/api", "https://other.example/v1/health"),
            "https://other.example/v1/health"
        );
    }

    #[test]
    fn test_request_builders() {
        let request = ApiRequest::post_json("/v1/ai/breakdown/generate", &serde_json::json!({"a": 1}))
            .unwrap()
            .with_bearer("tok-1")
            .with_header("X-Offload-Cloud-Opt-In", "true");

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.bearer_token(), Some("tok-1"));
        assert_eq!(request.header("authorization"), Some("Bearer tok-1"));
        assert_eq!(request.header("x-offload-cloud-opt-in"), Some("true"));
        assert_eq!(request.body.as_deref(), Some(br#"{"a":1}"#.as_slice()));

        let request = ApiRequest::get("/v1/health");
        assert!(request.body.is_none());
        assert!(request.bearer_token().is_none());
    }

    #[test]
    fn test_with_query_encodes_reserved_characters() {
        let request = ApiRequest::get("/v1/usage/reconcile")
            .with_query("feature", "a&b#c d")
            .with_query("page", "2");

        assert_eq!(request.path, "/v1/usage/reconcile?feature=a%26b%23c%20d&page=2");

        let url = Url::parse(&resolve_url("https://api.offload.app/api", &request.path)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![
                ("feature".to_string(), "a&b#c d".to_string()),
                ("page".to_string(), "2".to_string())
            ]
        );
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_response_success_range() {
        assert!(ApiResponse::new(200, "").is_success());
        assert!(ApiResponse::new(204, "").is_success());
        assert!(!ApiResponse::new(401, "").is_success());
        assert!(!ApiResponse::new(500, "").is_success());
    }

    #[test]
    fn test_http_transport_rejects_bad_base_url() {
        let result = HttpTransport::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(TransportError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_scripted_transport_records_requests() {
        let transport = mock::ScriptedTransport::new(vec![Ok(ApiResponse::new(200, "{}"))]);

        let first = transport.send(ApiRequest::get("/v1/health")).await;
        assert!(first.is_ok());

        let second = transport.send(ApiRequest::get("/v1/health")).await;
        assert!(second.is_err());

        assert_eq!(transport.paths(), vec!["/v1/health", "/v1/health"]);
    }
}
