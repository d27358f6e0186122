//! In-process [`VectorIndex`]: vectors live only in the scanner's blocks.

use async_trait::async_trait;

use super::{RecordPayload, VectorHit, VectorIndex};
use crate::error::EngineError;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalIndex;

impl LocalIndex {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VectorIndex for LocalIndex {
    fn name(&self) -> &str {
        "local"
    }

    async fn upsert(
        &self,
        _id: &str,
        _vector: &[f32],
        _payload: &RecordPayload,
    ) -> Result<(), EngineError> {
        Ok(())
    }

    async fn delete(&self, _id: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn search(
        &self,
        _vector: &[f32],
        _limit: usize,
    ) -> Result<Option<Vec<VectorHit>>, EngineError> {
        Ok(None)
    }
}
