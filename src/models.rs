//! Core data types: indexed blocks and the JSON bodies of the control surface.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The stored unit for one file: its last-read text and that text's embedding.
///
/// Replaced wholesale whenever the file content changes.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedBlock {
    pub path: PathBuf,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Connection parameters for a remote vector index service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStoreParams {
    pub url: String,
    pub api_key: Option<String>,
}

/// Body of `POST /start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub path: String,
    #[serde(default, alias = "qdrant_url", skip_serializing_if = "Option::is_none")]
    pub remote_store_url: Option<String>,
    #[serde(default, alias = "qdrant_api_key", skip_serializing_if = "Option::is_none")]
    pub remote_store_api_key: Option<String>,
}

impl StartRequest {
    pub fn new(path: impl Into<String>, remote: Option<&RemoteStoreParams>) -> Self {
        Self {
            path: path.into(),
            remote_store_url: remote.map(|r| r.url.clone()),
            remote_store_api_key: remote.and_then(|r| r.api_key.clone()),
        }
    }

    /// Remote parameters, present only when a URL was supplied.
    pub fn remote(&self) -> Option<RemoteStoreParams> {
        self.remote_store_url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| RemoteStoreParams {
                url: url.clone(),
                api_key: self.remote_store_api_key.clone(),
            })
    }
}

/// Body of `POST /search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Only return files whose path starts with this prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

pub fn default_top_k() -> usize {
    5
}

/// One search result as returned over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub path: String,
    /// Leading characters of the file content.
    pub content: String,
    #[serde(default)]
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    Running,
    NotStarted,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: EngineStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<usize>,
}

impl StatusResponse {
    pub fn is_running(&self) -> bool {
        self.status == EngineStatus::Running
    }
}

/// Body returned by the lifecycle endpoints (`started`, `stopped`, `cleared`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub status: String,
}

impl ActionResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_request_camel_case() {
        let req: StartRequest = serde_json::from_str(
            r#"{"path":"/w","remoteStoreUrl":"http://q:6333","remoteStoreApiKey":"k"}"#,
        )
        .unwrap();
        let remote = req.remote().unwrap();
        assert_eq!(remote.url, "http://q:6333");
        assert_eq!(remote.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_start_request_legacy_names() {
        let req: StartRequest =
            serde_json::from_str(r#"{"path":"/w","qdrant_url":"http://q:6333"}"#).unwrap();
        assert_eq!(req.remote().unwrap().url, "http://q:6333");
    }

    #[test]
    fn test_start_request_blank_url_is_local() {
        let req: StartRequest =
            serde_json::from_str(r#"{"path":"/w","remoteStoreUrl":"  "}"#).unwrap();
        assert!(req.remote().is_none());
    }

    #[test]
    fn test_search_request_default_top_k() {
        let req: SearchRequest = serde_json::from_str(r#"{"query":"foo"}"#).unwrap();
        assert_eq!(req.top_k, 5);
        assert!(req.path_prefix.is_none());
    }

    #[test]
    fn test_status_wire_format() {
        let body = serde_json::to_value(StatusResponse {
            status: EngineStatus::NotStarted,
            root: None,
            files: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({ "status": "not_started" }));
    }
}
