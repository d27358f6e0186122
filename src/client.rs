//! Typed HTTP client for the engine's control surface.
//!
//! Used by the supervisor and the CLI subcommands. Every request carries the
//! timeout given at construction, except `start`, which answers only after
//! the initial scan and has its own budget (see
//! [`EngineClient::with_start_timeout`]). Error responses are decoded from
//! the `{ "error": { "code", "message" } }` body into [`ClientError::Api`].

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::models::{
    ActionResponse, RemoteStoreParams, SearchHit, SearchRequest, StartRequest, StatusResponse,
};
use crate::server::{ErrorBody, HealthResponse};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection refused, timeout, or an undecodable response.
    #[error("engine request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("engine returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
}

impl ClientError {
    /// The API error code, if the engine answered with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ClientError::Api { code, .. } => Some(code),
            ClientError::Transport(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineClient {
    client: reqwest::Client,
    base_url: String,
    start_timeout: Option<Duration>,
}

impl EngineClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            start_timeout: None,
        })
    }

    /// Override the request timeout for `start` only.
    pub fn with_start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = Some(timeout);
        self
    }

    /// Client for an engine on the loopback interface.
    pub fn local(port: u16, timeout: Duration) -> Result<Self, ClientError> {
        Self::new(format!("http://127.0.0.1:{}", port), timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        decode(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self.client.get(self.url(path)).send().await?;
        decode(response).await
    }

    pub async fn start(
        &self,
        path: &str,
        remote: Option<&RemoteStoreParams>,
    ) -> Result<ActionResponse, ClientError> {
        let mut request = self
            .client
            .post(self.url("/start"))
            .json(&StartRequest::new(path, remote));
        if let Some(timeout) = self.start_timeout {
            request = request.timeout(timeout);
        }
        decode(request.send().await?).await
    }

    pub async fn stop(&self) -> Result<ActionResponse, ClientError> {
        self.post("/stop", &serde_json::json!({})).await
    }

    pub async fn clear(&self) -> Result<ActionResponse, ClientError> {
        self.post("/clear", &serde_json::json!({})).await
    }

    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        path_prefix: Option<&str>,
    ) -> Result<Vec<SearchHit>, ClientError> {
        let body = SearchRequest {
            query: query.to_string(),
            top_k,
            path_prefix: path_prefix.map(str::to_string),
        };
        self.post("/search", &body).await
    }

    pub async fn status(&self) -> Result<StatusResponse, ClientError> {
        self.get("/status").await
    }

    /// Ask the server to stop the engine and exit.
    pub async fn shutdown(&self) -> Result<ActionResponse, ClientError> {
        self.post("/shutdown", &serde_json::json!({})).await
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get("/health").await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }
    let text = response.text().await?;
    Err(api_error(status, &text))
}

fn api_error(status: StatusCode, text: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(text) {
        Ok(body) => ClientError::Api {
            status: status.as_u16(),
            code: body.error.code,
            message: body.error.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            code: "http".to_string(),
            message: text.to_string(),
        },
    }
}
