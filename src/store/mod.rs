//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the seam between the scanner and wherever
//! embeddings are mirrored. Two implementations exist, selected once when
//! the engine starts:
//!
//! | Type | Behavior |
//! |------|----------|
//! | [`LocalIndex`] | Keeps nothing; the scanner ranks its own blocks |
//! | [`QdrantIndex`] | Mirrors every block into a Qdrant collection and answers searches from it |
//!
//! Implementations must be `Send + Sync` so the watcher task and request
//! handlers can share them.

pub mod local;
pub mod qdrant;

pub use local::LocalIndex;
pub use qdrant::QdrantIndex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayload {
    pub path: String,
}

/// A nearest-neighbor hit: the record id (the file path) and its raw score.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub score: f32,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Short label for logs and status output.
    fn name(&self) -> &str;

    /// Insert or replace the record for `id`.
    async fn upsert(
        &self,
        id: &str,
        vector: &[f32],
        payload: &RecordPayload,
    ) -> Result<(), EngineError>;

    /// Remove the record for `id`. Removing an absent id is not an error.
    async fn delete(&self, id: &str) -> Result<(), EngineError>;

    /// Nearest neighbors of `vector`, best first.
    ///
    /// Returns `None` when the index keeps no vectors of its own, in which
    /// case the caller ranks its blocks directly.
    async fn search(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Option<Vec<VectorHit>>, EngineError>;
}
