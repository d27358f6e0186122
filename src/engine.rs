//! The engine: a two-state machine over one bound workspace.
//!
//! ```text
//! NotStarted ──start──▶ Running ──stop/clear──▶ NotStarted
//!                        │  ▲
//!                        └──┘ start (replaces the bound workspace)
//! ```
//!
//! Transitions are serialized by a dedicated mutex, separate from the state
//! lock, so a long initial scan never blocks `status` or `search` against
//! the state that is still installed. Searches clone the scanner handle and
//! release the state lock before ranking.

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::config::Config;
use crate::embedding::{create_provider, EmbeddingProvider};
use crate::error::EngineError;
use crate::models::{EngineStatus, RemoteStoreParams, SearchHit, StatusResponse};
use crate::scanner::WorkspaceScanner;
use crate::store::{LocalIndex, QdrantIndex, VectorIndex};
use crate::watcher::WorkspaceWatcher;

struct Workspace {
    scanner: Arc<WorkspaceScanner>,
    watcher: WorkspaceWatcher,
}

enum EngineState {
    NotStarted,
    Running(Workspace),
}

pub struct Engine {
    config: Arc<Config>,
    embedder: Arc<dyn EmbeddingProvider>,
    state: RwLock<EngineState>,
    transition: Mutex<()>,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.index)?;
        Ok(Self {
            config: Arc::new(config),
            embedder,
            state: RwLock::new(EngineState::NotStarted),
            transition: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Bind the engine to `path`: scan it, then watch it.
    ///
    /// Remote parameters select the Qdrant-backed index; without them the
    /// `[remote]` config section is used if it names a URL, else the local
    /// index. A running workspace is replaced once the new one is ready.
    pub async fn start(
        &self,
        path: &Path,
        remote: Option<RemoteStoreParams>,
    ) -> Result<(), EngineError> {
        let _transition = self.transition.lock().await;

        let root = match tokio::fs::canonicalize(path).await {
            Ok(root) if root.is_dir() => root,
            _ => return Err(EngineError::PathNotFound(path.to_path_buf())),
        };

        let remote = remote.or_else(|| self.configured_remote()).map(|mut params| {
            if params.api_key.is_none() {
                params.api_key = self.config.remote.api_key.clone();
            }
            params
        });
        let vectors: Arc<dyn VectorIndex> = match remote {
            Some(params) => {
                let index = QdrantIndex::connect(
                    &params,
                    &self.config.remote.collection,
                    self.embedder.dims(),
                    self.config.remote.timeout(),
                )
                .await?;
                info!(url = %params.url, collection = %self.config.remote.collection, "Using remote vector index");
                Arc::new(index)
            }
            None => Arc::new(LocalIndex::new()),
        };

        let scanner = WorkspaceScanner::new(&root, &self.config.index, self.embedder.clone(), vectors)
            .map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        let scanner = Arc::new(scanner);
        scanner.scan().await;
        let watcher = WorkspaceWatcher::spawn(scanner.clone())?;

        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, EngineState::Running(Workspace { scanner, watcher }))
        };
        if let EngineState::Running(old) = previous {
            info!(root = %old.scanner.root().display(), "Replacing bound workspace");
            old.watcher.stop().await;
        }

        info!(root = %root.display(), "Engine started");
        Ok(())
    }

    fn configured_remote(&self) -> Option<RemoteStoreParams> {
        let remote = &self.config.remote;
        remote
            .url
            .as_ref()
            .filter(|url| !url.trim().is_empty())
            .map(|url| RemoteStoreParams {
                url: url.clone(),
                api_key: remote.api_key.clone(),
            })
    }

    /// Detach the watcher and drop the index. Idempotent.
    pub async fn stop(&self) {
        let _transition = self.transition.lock().await;
        if self.unbind().await {
            info!("Engine stopped");
        }
    }

    /// Like [`stop`](Self::stop), but an error when nothing is bound.
    pub async fn clear(&self) -> Result<(), EngineError> {
        let _transition = self.transition.lock().await;
        if !self.unbind().await {
            return Err(EngineError::NotStarted);
        }
        info!("Engine cleared");
        Ok(())
    }

    async fn unbind(&self) -> bool {
        let previous = {
            let mut state = self.state.write().await;
            std::mem::replace(&mut *state, EngineState::NotStarted)
        };
        match previous {
            EngineState::Running(workspace) => {
                workspace.watcher.stop().await;
                true
            }
            EngineState::NotStarted => false,
        }
    }

    async fn scanner(&self) -> Option<Arc<WorkspaceScanner>> {
        match &*self.state.read().await {
            EngineState::Running(workspace) => Some(workspace.scanner.clone()),
            EngineState::NotStarted => None,
        }
    }

    pub async fn is_running(&self) -> bool {
        self.scanner().await.is_some()
    }

    /// Search the bound workspace.
    ///
    /// A relative `path_prefix` is resolved against the root. Content in each
    /// hit is cut to the configured number of characters.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        path_prefix: Option<&str>,
    ) -> Result<Vec<SearchHit>, EngineError> {
        let scanner = self.scanner().await.ok_or(EngineError::NotStarted)?;
        let prefix = path_prefix.filter(|p| !p.is_empty()).map(|p| {
            let p = PathBuf::from(p);
            if p.is_absolute() {
                p
            } else {
                scanner.root().join(p)
            }
        });

        let results = scanner.search(query, top_k, prefix.as_deref()).await?;
        let limit = self.config.index.snippet_chars;
        Ok(results
            .into_iter()
            .map(|scored| SearchHit {
                path: scored.block.path.display().to_string(),
                content: snippet(&scored.block.content, limit),
                score: scored.score,
            })
            .collect())
    }

    pub async fn status(&self) -> StatusResponse {
        match self.scanner().await {
            Some(scanner) => StatusResponse {
                status: EngineStatus::Running,
                root: Some(scanner.root().display().to_string()),
                files: Some(scanner.len().await),
            },
            None => StatusResponse {
                status: EngineStatus::NotStarted,
                root: None,
                files: None,
            },
        }
    }
}

/// First `limit` characters of `content`.
fn snippet(content: &str, limit: usize) -> String {
    content.chars().take(limit).collect()
}
