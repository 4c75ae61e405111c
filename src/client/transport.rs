//! Transport layer for A2A client communication.
//!
//! Provides the `Transport` trait for abstracting over different communication
//! protocols, and `JsonRpcTransport` for the standard JSON-RPC over HTTP binding.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::{A2AError, A2AResult};
use crate::types::{
    CancelTaskParams, GetTaskParams, GetTaskPushNotificationConfigParams, JsonRpcRequest,
    JsonRpcResponse, ListTasksParams, SetTaskPushNotificationConfigParams, TaskIdParams,
};

use super::sse::SseStream;

/// Transport abstraction for A2A communication.
///
/// Implementations handle the low-level details of sending JSON-RPC requests
/// and receiving responses (or SSE streams) over a particular protocol binding.
///
/// Python SDK ref: `ClientTransport` (abstract base class in `transports/base.py`)
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a JSON-RPC request and receive a JSON-RPC response.
    async fn send(&self, request: &JsonRpcRequest) -> A2AResult<JsonRpcResponse>;

    /// Send a JSON-RPC request and receive an SSE event stream.
    ///
    /// Used for streaming methods like `message/stream` and `tasks/subscribe`.
    async fn send_stream(&self, request: &JsonRpcRequest) -> A2AResult<SseStream>;

    /// Close the transport and release any held resources.
    ///
    /// Python SDK ref: `ClientTransport.close()`, `JsonRpcTransport.close()`
    ///
    /// The default implementation is a no-op. Override if your transport holds
    /// resources (e.g., persistent connections) that need explicit cleanup.
    async fn close(&self) -> A2AResult<()> {
        Ok(())
    }
}

/// Configuration for [`JsonRpcTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout. Defaults to 60 seconds.
    pub timeout: Duration,
    /// Additional HTTP headers to include on every request.
    pub headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            headers: HashMap::new(),
        }
    }
}

/// JSON-RPC over HTTP transport using `reqwest`.
///
/// This is the standard transport for the A2A JSON-RPC protocol binding.
/// It sends POST requests with `Content-Type: application/json` and parses
/// the response as a JSON-RPC result or error.
///
/// For streaming methods, the response is interpreted as an SSE event stream.
///
/// # Example
///
/// ```no_run
/// use a2a_rs::client::JsonRpcTransport;
///
/// let transport = JsonRpcTransport::new("http://localhost:7420/a2a");
/// ```
#[derive(Debug, Clone)]
pub struct JsonRpcTransport {
    client: reqwest::Client,
    url: String,
}

impl JsonRpcTransport {
    /// Create a new transport targeting the given A2A endpoint URL.
    ///
    /// Uses default configuration (60s timeout, no extra headers).
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(url, TransportConfig::default())
    }

    /// Create a new transport with custom configuration.
    pub fn with_config(url: impl Into<String>, config: TransportConfig) -> Self {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                default_headers.insert(name, val);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url: url.into(),
        }
    }

    /// Create a new transport with an existing `reqwest::Client`.
    ///
    /// Useful when you want to share a connection pool or configure TLS
    /// settings externally.
    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Returns the URL this transport sends requests to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Create a transport with a custom timeout (builder-style).
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let mut config = TransportConfig::default();
        config.timeout = timeout;
        Self::with_config(self.url, config)
    }

    /// Add a custom header (builder-style).
    pub fn with_header(self, key: &str, value: &str) -> Self {
        // Rebuild the client with the new header
        let mut config = TransportConfig::default();
        config.headers.insert(key.to_string(), value.to_string());
        Self::with_config(self.url, config)
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn send(&self, request: &JsonRpcRequest) -> A2AResult<JsonRpcResponse> {
        let body = serde_json::to_vec(request).map_err(|e| {
            A2AError::Transport(format!("failed to serialize JSON-RPC request: {e}"))
        })?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    A2AError::Timeout(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    A2AError::Transport(format!("connection failed: {e}"))
                } else {
                    A2AError::Transport(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;

        let rpc_response: JsonRpcResponse = serde_json::from_slice(&bytes).map_err(|e| {
            A2AError::InvalidJson(format!("failed to parse JSON-RPC response: {e}"))
        })?;

        Ok(rpc_response)
    }

    async fn send_stream(&self, request: &JsonRpcRequest) -> A2AResult<SseStream> {
        let body = serde_json::to_vec(request).map_err(|e| {
            A2AError::Transport(format!("failed to serialize JSON-RPC request: {e}"))
        })?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    A2AError::Timeout(format!("stream request timed out: {e}"))
                } else if e.is_connect() {
                    A2AError::Transport(format!("stream connection failed: {e}"))
                } else {
                    A2AError::Transport(format!("stream HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(SseStream::from_response(response))
    }
}

/// HTTP+REST transport using `reqwest`.
///
/// Implements the same [`Transport`] trait as [`JsonRpcTransport`], but
/// speaks the `/v1` REST binding instead: each JSON-RPC method is mapped to
/// a REST route (path/query parameters, typed request bodies), and the
/// response is wrapped back into a synthetic [`JsonRpcResponse`] so callers
/// of [`super::A2AClient`] don't need to know which wire format is in play.
///
/// # Example
///
/// ```no_run
/// use a2a_rs::client::RestTransport;
///
/// let transport = RestTransport::new("http://localhost:7420");
/// ```
#[derive(Debug, Clone)]
pub struct RestTransport {
    client: reqwest::Client,
    /// Base URL of the agent, e.g. `http://localhost:7420` — REST routes are
    /// mounted under `{base_url}/v1/...`.
    base_url: String,
}

impl RestTransport {
    /// Create a new transport targeting the given agent base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_config(base_url, TransportConfig::default())
    }

    /// Create a new transport with custom configuration.
    pub fn with_config(base_url: impl Into<String>, config: TransportConfig) -> Self {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &config.headers {
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                default_headers.insert(name, val);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create a transport with an existing `reqwest::Client`.
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the base URL this transport sends requests to.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// Create a transport with a custom timeout (builder-style).
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let mut config = TransportConfig::default();
        config.timeout = timeout;
        Self::with_config(self.base_url, config)
    }

    /// Add a custom header (builder-style).
    pub fn with_header(self, key: &str, value: &str) -> Self {
        let mut config = TransportConfig::default();
        config.headers.insert(key.to_string(), value.to_string());
        Self::with_config(self.base_url, config)
    }

    fn route(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle_response(response: reqwest::Response) -> A2AResult<serde_json::Value> {
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| A2AError::Transport(format!("failed to read response body: {e}")))?;

        if !status.is_success() {
            let body_text = String::from_utf8_lossy(&bytes).to_string();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| A2AError::InvalidJson(format!("failed to parse REST response: {e}")))
    }

    fn map_transport_error(e: reqwest::Error, what: &str) -> A2AError {
        if e.is_timeout() {
            A2AError::Timeout(format!("{what} timed out: {e}"))
        } else if e.is_connect() {
            A2AError::Transport(format!("{what} connection failed: {e}"))
        } else {
            A2AError::Transport(format!("{what} failed: {e}"))
        }
    }
}

#[async_trait]
impl Transport for RestTransport {
    /// Dispatch a JSON-RPC-shaped request to its corresponding REST route.
    ///
    /// The result is wrapped in a synthetic [`JsonRpcResponse`] so the
    /// typed methods on [`super::A2AClient`] can parse it exactly as they
    /// would a JSON-RPC transport's response.
    async fn send(&self, request: &JsonRpcRequest) -> A2AResult<JsonRpcResponse> {
        let id = request.id.clone();
        let params = request.params.clone().unwrap_or(serde_json::Value::Null);

        let result = match request.method.as_str() {
            "message/send" => {
                let response = self
                    .client
                    .post(self.route("/v1/message:send"))
                    .json(&params)
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "message/send"))?;
                Self::handle_response(response).await?
            }
            "tasks/get" => {
                let p: GetTaskParams = serde_json::from_value(params).map_err(|e| {
                    A2AError::invalid_params(format!("invalid tasks/get params: {e}"))
                })?;
                let mut url = self.route(&format!("/v1/tasks/{}", p.id));
                if let Some(len) = p.history_length {
                    url.push_str(&format!("?historyLength={len}"));
                }
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "tasks/get"))?;
                Self::handle_response(response).await?
            }
            "tasks/list" => {
                let p: ListTasksParams = serde_json::from_value(params).map_err(|e| {
                    A2AError::invalid_params(format!("invalid tasks/list params: {e}"))
                })?;
                let mut query = Vec::new();
                if let Some(ctx) = &p.context_id {
                    query.push(("contextId".to_string(), ctx.clone()));
                }
                if let Some(status) = &p.status {
                    if let Ok(v) = serde_json::to_value(status) {
                        if let Some(s) = v.as_str() {
                            query.push(("status".to_string(), s.to_string()));
                        }
                    }
                }
                if let Some(size) = p.page_size {
                    query.push(("pageSize".to_string(), size.to_string()));
                }
                if let Some(token) = &p.page_token {
                    query.push(("pageToken".to_string(), token.clone()));
                }

                let response = self
                    .client
                    .get(self.route("/v1/tasks"))
                    .query(&query)
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "tasks/list"))?;
                Self::handle_response(response).await?
            }
            "tasks/cancel" => {
                let p: CancelTaskParams = serde_json::from_value(params).map_err(|e| {
                    A2AError::invalid_params(format!("invalid tasks/cancel params: {e}"))
                })?;
                let response = self
                    .client
                    .post(self.route(&format!("/v1/tasks/{}:cancel", p.id)))
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "tasks/cancel"))?;
                Self::handle_response(response).await?
            }
            "tasks/pushNotificationConfig/set" => {
                let p: SetTaskPushNotificationConfigParams = serde_json::from_value(params)
                    .map_err(|e| {
                        A2AError::invalid_params(format!(
                            "invalid tasks/pushNotificationConfig/set params: {e}"
                        ))
                    })?;
                let response = self
                    .client
                    .post(self.route(&format!(
                        "/v1/tasks/{}/pushNotificationConfigs",
                        p.task_id
                    )))
                    .json(&p.config)
                    .send()
                    .await
                    .map_err(|e| {
                        Self::map_transport_error(e, "tasks/pushNotificationConfig/set")
                    })?;
                Self::handle_response(response).await?
            }
            "tasks/pushNotificationConfig/get" => {
                let p: GetTaskPushNotificationConfigParams = serde_json::from_value(params)
                    .map_err(|e| {
                        A2AError::invalid_params(format!(
                            "invalid tasks/pushNotificationConfig/get params: {e}"
                        ))
                    })?;
                let url = match &p.push_notification_config_id {
                    Some(config_id) => self.route(&format!(
                        "/v1/tasks/{}/pushNotificationConfigs/{}",
                        p.id, config_id
                    )),
                    None => self.route(&format!("/v1/tasks/{}/pushNotificationConfigs", p.id)),
                };
                let response = self
                    .client
                    .get(url)
                    .send()
                    .await
                    .map_err(|e| {
                        Self::map_transport_error(e, "tasks/pushNotificationConfig/get")
                    })?;
                Self::handle_response(response).await?
            }
            "agent/getAuthenticatedExtendedCard" => {
                let response = self
                    .client
                    .get(self.route("/v1/card"))
                    .send()
                    .await
                    .map_err(|e| {
                        Self::map_transport_error(e, "agent/getAuthenticatedExtendedCard")
                    })?;
                Self::handle_response(response).await?
            }
            method => {
                return Err(A2AError::Transport(format!(
                    "REST transport has no route for method '{method}'"
                )));
            }
        };

        Ok(JsonRpcResponse::success(id, result))
    }

    /// Dispatch a streaming JSON-RPC-shaped request to its REST SSE route.
    async fn send_stream(&self, request: &JsonRpcRequest) -> A2AResult<SseStream> {
        let params = request.params.clone().unwrap_or(serde_json::Value::Null);

        let response = match request.method.as_str() {
            "message/stream" => self
                .client
                .post(self.route("/v1/message:stream"))
                .header("Accept", "text/event-stream")
                .json(&params)
                .send()
                .await
                .map_err(|e| Self::map_transport_error(e, "message/stream"))?,
            "tasks/resubscribe" => {
                let p: TaskIdParams = serde_json::from_value(params).map_err(|e| {
                    A2AError::invalid_params(format!("invalid tasks/resubscribe params: {e}"))
                })?;
                self.client
                    .post(self.route(&format!("/v1/tasks/{}:subscribe", p.id)))
                    .header("Accept", "text/event-stream")
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "tasks/resubscribe"))?
            }
            method => {
                return Err(A2AError::Transport(format!(
                    "REST transport has no streaming route for method '{method}'"
                )));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(A2AError::Http {
                status: status.as_u16(),
                body: body_text,
            });
        }

        Ok(SseStream::from_response(response))
    }
}
