//! Error taxonomy for the engine and the supervisor.
//!
//! Engine-side errors surface through the control surface as HTTP status
//! codes; supervisor-side errors stay inside the hosting process.

use std::path::PathBuf;

use crate::client::ClientError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// `start` was called on a root that does not exist.
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),

    #[error("engine not started")]
    NotStarted,

    /// The remote vector index could not be reached or its collection could
    /// not be created. Fatal to the `start` call that triggered it.
    #[error("remote store initialization failed: {0}")]
    RemoteStoreInit(String),

    /// A single upsert/delete/search against the remote vector index failed.
    #[error("remote store operation failed: {0}")]
    RemoteStoreOperation(String),

    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to watch workspace: {0}")]
    Watch(#[from] notify::Error),

    /// The index settings (exclude globs) could not be compiled for a root.
    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("failed to spawn engine process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The engine never answered its status endpoint within the probe budget.
    #[error("engine process unresponsive after {attempts} status probes")]
    ProcessUnresponsive { attempts: u32 },

    #[error("engine process did not exit within {0:?}")]
    ShutdownTimeout(std::time::Duration),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("supervisor cancelled")]
    Cancelled,
}
