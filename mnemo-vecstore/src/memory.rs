use std::collections::HashMap;
use std::sync::RwLock;

use crate::cosine::cosine_distance;
use crate::error::VecError;
use crate::vecstore::{Match, VecIndex};

/// Memory is an in-memory VecIndex using brute-force cosine distance.
/// Intended for testing and small-scale use (< 1000 vectors).
pub struct MemoryIndex {
    vectors: RwLock<HashMap<String, Vec<f32>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl VecIndex for MemoryIndex {
    fn insert(&self, id: &str, vector: &[f32]) -> Result<(), VecError> {
        let mut vecs = self.vectors.write().unwrap();
        vecs.insert(id.to_string(), vector.to_vec());
        Ok(())
    }

    fn batch_insert(&self, ids: &[&str], vectors: &[&[f32]]) -> Result<(), VecError> {
        if ids.len() != vectors.len() {
            return Err(VecError::BatchLengthMismatch {
                ids: ids.len(),
                vectors: vectors.len(),
            });
        }
        let mut vecs = self.vectors.write().unwrap();
        for (id, vec) in ids.iter().zip(vectors.iter()) {
            vecs.insert(id.to_string(), vec.to_vec());
        }
        Ok(())
    }

    fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<Match>, VecError> {
        let vecs = self.vectors.read().unwrap();
        if vecs.is_empty() || top_k == 0 {
            return Ok(vec![]);
        }

        let mut results: Vec<(String, f32)> = vecs
            .iter()
            .map(|(id, vec)| (id.clone(), cosine_distance(query, vec)))
            .collect();

        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        if results.len() > top_k {
            results.truncate(top_k);
        }

        Ok(results
            .into_iter()
            .map(|(id, distance)| Match { id, distance })
            .collect())
    }

    fn delete(&self, id: &str) -> Result<(), VecError> {
        let mut vecs = self.vectors.write().unwrap();
        vecs.remove(id);
        Ok(())
    }

    fn len(&self) -> usize {
        self.vectors.read().unwrap().len()
    }

    fn flush(&self) -> Result<(), VecError> {
        Ok(())
    }
}
