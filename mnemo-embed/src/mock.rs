use crate::embed::Embedder;
use crate::error::EmbedError;

/// Deterministic embedder for tests and local development.
///
/// Hashes each input token into a fixed-size float vector and L2-normalizes
/// the result, so semantically identical text always maps to the same
/// vector and cosine similarity behaves sanely without a real model.
pub struct MockEmbedder {
    dim: usize,
    model: String,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, model: "mock-embedder-v1".to_string() }
    }

    pub fn with_model(dim: usize, model: impl Into<String>) -> Self {
        Self { dim, model: model.into() }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dim];
        if text.is_empty() {
            return v;
        }
        for token in text.split_whitespace() {
            let mut hash: u64 = 1469598103934665603; // FNV offset basis
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211); // FNV prime
            }
            let idx = (hash as usize) % self.dim;
            let sign = if hash & 1 == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait::async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        if text.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        Ok(self.embed_one(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Err(EmbedError::EmptyInput);
        }
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_text_yields_same_vector() {
        let e = MockEmbedder::new(16);
        let a = e.embed("hello world").await.unwrap();
        let b = e.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[tokio::test]
    async fn empty_input_is_rejected() {
        let e = MockEmbedder::new(8);
        assert!(matches!(e.embed("").await, Err(EmbedError::EmptyInput)));
    }

    #[tokio::test]
    async fn batch_matches_individual_embeds() {
        let e = MockEmbedder::new(8);
        let batch = e.embed_batch(&["a b", "c"]).await.unwrap();
        let single = e.embed("a b").await.unwrap();
        assert_eq!(batch[0], single);
    }
}
