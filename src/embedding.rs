//! Embedding provider abstraction and vector utilities.
//!
//! Defines the [`EmbeddingProvider`] trait and the built-in
//! [`HashEmbedder`], a deterministic, offline expansion of a SHA-256 digest.
//! Hash embeddings guarantee that identical text yields an identical vector,
//! but they carry no semantics: texts differing by one byte produce unrelated
//! vectors. Search quality is therefore limited to near-duplicate matching
//! until a real model is plugged in behind the same trait.
//!
//! # Provider Selection
//!
//! ```rust
//! # use code_index_engine::config::IndexConfig;
//! # use code_index_engine::embedding::create_provider;
//! let provider = create_provider(&IndexConfig::default()).unwrap();
//! assert_eq!(provider.model_name(), "sha256-expand");
//! assert_eq!(provider.embed("fn main() {}").len(), 32);
//! ```

use anyhow::{bail, Result};
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::config::IndexConfig;

/// Small constant added to the cosine denominator so empty or zero vectors
/// score 0 instead of dividing by zero.
pub const COSINE_EPSILON: f32 = 1e-6;

/// Trait for embedding providers.
///
/// `embed` must be pure: the same text always maps to the same vector of
/// exactly [`dims`](EmbeddingProvider::dims) values.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier.
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;
    /// Embeds one piece of text.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Instantiate the provider named by `index.embedding_provider`.
pub fn create_provider(config: &IndexConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding_provider.as_str() {
        "hash" => Ok(Arc::new(HashEmbedder::new(config.embedding_dims))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Hash Provider ============

/// Deterministic embedding built from a repeatedly extended SHA-256 digest.
///
/// The digest of the text is extended by appending the digest of the whole
/// buffer until it covers `dims` 4-byte groups. Each group is read as a
/// little-endian `u32` and the vector is divided by its maximum, so every
/// component lies in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(32)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "sha256-expand"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let needed = self.dims * 4;
        let mut digest = Sha256::digest(text.as_bytes()).to_vec();
        while digest.len() < needed {
            let next = Sha256::digest(&digest);
            digest.extend_from_slice(&next);
        }

        let raw: Vec<u32> = digest[..needed]
            .chunks_exact(4)
            .map(|group| u32::from_le_bytes([group[0], group[1], group[2], group[3]]))
            .collect();

        let max = raw.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return vec![0.0; self.dims];
        }
        let max = max as f64;
        raw.into_iter().map(|v| (v as f64 / max) as f32).collect()
    }
}

/// Cosine similarity as `dot(a, b) / (|a| * |b| + ε)`.
///
/// Returns `0.0` for vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt() + COSINE_EPSILON)
}
