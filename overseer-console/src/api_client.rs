//! API client layer for the REST and WebSocket collaborators.

use crate::config::ConsoleConfig;
use overseer_core::AgentId;
use overseer_wire::{HistoryPage, ToolHistoryResponse};
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, Request};
use tokio_tungstenite::MaybeTlsStream;
use tokio_tungstenite::WebSocketStream;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
    #[error("Config error: {0}")]
    Config(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// HTTP side-channel: paginated history, tool history, exec-task deletion.
#[derive(Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: String,
    auth_header: HeaderMap,
}

impl RestClient {
    pub fn new(config: &ConsoleConfig) -> Result<Self, ApiClientError> {
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let auth_header = build_auth_headers(config.auth_token.as_deref())?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_header,
        })
    }

    /// One page of persisted transcript history for an agent.
    pub async fn fetch_history(
        &self,
        agent_id: &AgentId,
        limit: usize,
        offset: usize,
    ) -> Result<HistoryPage, ApiClientError> {
        let url = format!("{}/api/agents/{}/history", self.base_url, agent_id);
        let response = self
            .client
            .get(url)
            .headers(self.auth_header.clone())
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;
        parse_response(response).await
    }

    pub async fn fetch_tool_history(
        &self,
        limit: usize,
    ) -> Result<ToolHistoryResponse, ApiClientError> {
        let url = format!("{}/api/agents/tool-history", self.base_url);
        let response = self
            .client
            .get(url)
            .headers(self.auth_header.clone())
            .query(&[("limit", limit)])
            .send()
            .await?;
        parse_response(response).await
    }

    pub async fn delete_exec_task(&self, task_id: &str) -> Result<(), ApiClientError> {
        let url = format!("{}/api/exec/tasks/{}", self.base_url, task_id);
        let response = self
            .client
            .delete(url)
            .headers(self.auth_header.clone())
            .send()
            .await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let text = response.text().await.unwrap_or_default();
            Err(ApiClientError::InvalidResponse(format!(
                "HTTP {}: {}",
                status.as_u16(),
                text
            )))
        }
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json::<T>().await?)
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(ApiClientError::InvalidResponse(format!(
            "HTTP {}: {}",
            status.as_u16(),
            text
        )))
    }
}

fn build_auth_headers(token: Option<&str>) -> Result<HeaderMap, ApiClientError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let value = format!("Bearer {}", token);
        headers.insert(
            HeaderName::from_static("authorization"),
            HeaderValue::from_str(&value).map_err(|e| ApiClientError::Config(e.to_string()))?,
        );
    }
    Ok(headers)
}

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// WebSocket dialer. The auth token rides as a subprotocol value rather than
/// in the URL so it never lands in server access logs.
#[derive(Clone)]
pub struct WsClient {
    endpoint: String,
    auth_token: Option<String>,
}

impl WsClient {
    pub fn new(config: &ConsoleConfig) -> Self {
        Self {
            endpoint: config.ws_endpoint.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    pub async fn connect(&self) -> Result<WsStream, ApiClientError> {
        let request = self.build_request()?;
        let (stream, _) = tokio_tungstenite::connect_async(request).await?;
        Ok(stream)
    }

    fn build_request(&self) -> Result<Request<()>, ApiClientError> {
        let mut request = self
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| ApiClientError::Config(e.to_string()))?;
        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("auth-{}", token))
                .map_err(|e| ApiClientError::Config(e.to_string()))?;
            request
                .headers_mut()
                .insert(HeaderName::from_static("sec-websocket-protocol"), value);
        }
        Ok(request)
    }
}
