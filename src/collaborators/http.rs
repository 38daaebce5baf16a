//! HTTP transport contract: `Execute(Request) → Response` plus
//! `SetBaseUrl`/`SetTimeout`. Grounded in the pack's `executors::http::
//! HttpExecutor` (method/url/header/body/timeout construction, `reqwest`
//! client, response status/headers/body/duration capture), split out into a
//! trait so the kernel can be driven by a `MockHttpClient` in tests the same
//! way deterministic end-to-end tests require a canned-response collaborator.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub size_bytes: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpErrorKind {
    Timeout,
    Network,
    TransportCancelled,
}

#[derive(Debug, Clone)]
pub struct HttpError {
    pub kind: HttpErrorKind,
    pub message: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for HttpError {}

/// `SetBaseUrl`/`SetTimeout` take `&self` (interior mutability) rather than
/// `&mut self` so a single `Arc<dyn HttpClient>` can be shared across the
/// scheduler's suites while the call strategy swaps base URL/timeout for
/// the duration of one cross-suite call and restores them on exit.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
    fn set_base_url(&self, base_url: Option<String>);
    fn set_timeout(&self, timeout: Duration);
    fn base_url(&self) -> Option<String>;
    fn timeout(&self) -> Duration;
}

struct ClientState {
    base_url: Option<String>,
    timeout: Duration,
}

/// Default collaborator backing the CLI binary: wraps a `reqwest::Client`.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    state: RwLock<ClientState>,
}

impl ReqwestHttpClient {
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            state: RwLock::new(ClientState {
                base_url: None,
                timeout: default_timeout,
            }),
        }
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(60_000))
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|e| HttpError {
            kind: HttpErrorKind::Network,
            message: format!("invalid HTTP method {}: {}", request.method, e),
        })?;

        let mut builder = self.client.request(method, &request.url).timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let start = std::time::Instant::now();
        let response = builder.send().await.map_err(|e| {
            let kind = if e.is_timeout() {
                HttpErrorKind::Timeout
            } else {
                HttpErrorKind::Network
            };
            HttpError {
                kind,
                message: e.to_string(),
            }
        })?;

        let status_code = response.status().as_u16();
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }
        let raw = response.bytes().await.map_err(|e| HttpError {
            kind: HttpErrorKind::Network,
            message: e.to_string(),
        })?;
        let size_bytes = raw.len() as u64;
        let body: Value = serde_json::from_slice(&raw).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&raw).into_owned())
        });
        let duration_ms = start.elapsed().as_millis() as u64;

        Ok(HttpResponse {
            status_code,
            headers,
            body,
            size_bytes,
            duration_ms,
        })
    }

    fn set_base_url(&self, base_url: Option<String>) {
        self.state.write().unwrap().base_url = base_url;
    }

    fn set_timeout(&self, timeout: Duration) {
        self.state.write().unwrap().timeout = timeout;
    }

    fn base_url(&self) -> Option<String> {
        self.state.read().unwrap().base_url.clone()
    }

    fn timeout(&self) -> Duration {
        self.state.read().unwrap().timeout
    }
}

/// Canned-response collaborator for deterministic scenario fixtures in tests.
/// Responses are keyed by `METHOD url`; a missing key yields a network error.
pub struct MockHttpClient {
    responses: RwLock<HashMap<String, Result<HttpResponse, HttpError>>>,
    requests: RwLock<Vec<HttpRequest>>,
    state: RwLock<ClientState>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self {
            responses: RwLock::new(HashMap::new()),
            requests: RwLock::new(Vec::new()),
            state: RwLock::new(ClientState {
                base_url: None,
                timeout: Duration::from_millis(60_000),
            }),
        }
    }

    pub fn on(&self, method: &str, url: &str, response: HttpResponse) {
        self.responses
            .write()
            .unwrap()
            .insert(format!("{} {}", method.to_uppercase(), url), Ok(response));
    }

    pub fn on_error(&self, method: &str, url: &str, error: HttpError) {
        self.responses
            .write()
            .unwrap()
            .insert(format!("{} {}", method.to_uppercase(), url), Err(error));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.read().unwrap().clone()
    }
}

impl Default for MockHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let key = format!("{} {}", request.method.to_uppercase(), request.url);
        self.requests.write().unwrap().push(request.clone());
        match self.responses.read().unwrap().get(&key) {
            Some(result) => result.clone(),
            None => Err(HttpError {
                kind: HttpErrorKind::Network,
                message: format!("no mocked response for {}", key),
            }),
        }
    }

    fn set_base_url(&self, base_url: Option<String>) {
        self.state.write().unwrap().base_url = base_url;
    }

    fn set_timeout(&self, timeout: Duration) {
        self.state.write().unwrap().timeout = timeout;
    }

    fn base_url(&self) -> Option<String> {
        self.state.read().unwrap().base_url.clone()
    }

    fn timeout(&self) -> Duration {
        self.state.read().unwrap().timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_client_returns_canned_response() {
        let mock = MockHttpClient::new();
        mock.on(
            "GET",
            "http://api.test/v1/id",
            HttpResponse {
                status_code: 200,
                headers: HashMap::new(),
                body: serde_json::json!({"id": 42}),
                size_bytes: 10,
                duration_ms: 1,
            },
        );

        let response = mock
            .execute(HttpRequest {
                method: "GET".to_string(),
                url: "http://api.test/v1/id".to_string(),
                headers: HashMap::new(),
                query: HashMap::new(),
                body: None,
                timeout: Duration::from_secs(1),
            })
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, serde_json::json!({"id": 42}));
    }

    #[tokio::test]
    async fn mock_client_errors_on_unregistered_url() {
        let mock = MockHttpClient::new();
        let result = mock
            .execute(HttpRequest {
                method: "GET".to_string(),
                url: "http://api.test/missing".to_string(),
                headers: HashMap::new(),
                query: HashMap::new(),
                body: None,
                timeout: Duration::from_secs(1),
            })
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn base_url_and_timeout_round_trip() {
        let client = ReqwestHttpClient::default();
        client.set_base_url(Some("http://example.com".to_string()));
        client.set_timeout(Duration::from_millis(5000));
        assert_eq!(client.base_url(), Some("http://example.com".to_string()));
        assert_eq!(client.timeout(), Duration::from_millis(5000));
    }
}
