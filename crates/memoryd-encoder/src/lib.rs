//! The embedding-model runtime is an external collaborator (spec §1):
//! this crate only draws the boundary the rest of the engine calls
//! through. A real deployment wires in its own [`Embedder`] backed by
//! whatever inference runtime it runs (ONNX, a remote model service,
//! ...); [`DeterministicEmbedder`] is the one shipped here, used in
//! tests and as the zero-config default.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("encoder unavailable: {0}")]
    Unavailable(String),
    #[error("text exceeds encoder's input limit")]
    InputTooLarge,
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Dimensionality this encoder produces. Callers validate this
    /// against `EMBED_DIM` (spec §6) once at startup.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EncodeError>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EncodeError> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// Deterministic, dependency-free stand-in for a real encoder: hashes
/// the input and spreads the hash bytes into a unit vector. Same text
/// always yields the same vector, which is all the ingestion,
/// dedup, and search tests need — it is not meant to carry any
/// semantic meaning.
pub struct DeterministicEmbedder {
    dim: usize,
}

impl DeterministicEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl Default for DeterministicEmbedder {
    fn default() -> Self {
        Self::new(384)
    }
}

#[async_trait]
impl Embedder for DeterministicEmbedder {
    fn dimension(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EncodeError> {
        if text.len() > 10_000 {
            return Err(EncodeError::InputTooLarge);
        }
        let mut out = Vec::with_capacity(self.dim);
        let mut counter: u32 = 0;
        while out.len() < self.dim {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for byte in digest {
                if out.len() == self.dim {
                    break;
                }
                // Map into [-1, 1]; dividing below normalizes to unit length.
                out.push((byte as f32 - 127.5) / 127.5);
            }
            counter += 1;
        }
        let norm: f32 = out.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut out {
                *v /= norm;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let enc = DeterministicEmbedder::new(384);
        let a = enc.embed("hello world").await.unwrap();
        let b = enc.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 384);
    }

    #[tokio::test]
    async fn different_text_yields_different_vector() {
        let enc = DeterministicEmbedder::new(384);
        let a = enc.embed("hello").await.unwrap();
        let b = enc.embed("world").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let enc = DeterministicEmbedder::new(384);
        let v = enc.embed("normalize me").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn oversized_input_is_rejected() {
        let enc = DeterministicEmbedder::new(384);
        let text = "x".repeat(10_001);
        assert!(matches!(enc.embed(&text).await, Err(EncodeError::InputTooLarge)));
    }
}
