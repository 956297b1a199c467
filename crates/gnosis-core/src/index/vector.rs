//! Quantized Vector Store.
//!
//! Grounded on the teacher's `search/vector.rs` `VectorIndex` shape
//! (config struct, stats struct, error enum) but reimplemented as an
//! explicit flat, optionally 8-bit-quantized store rather than
//! HNSW/usearch — see DESIGN.md for why `usearch` is dropped: it solves
//! approximate search at a scale this embedded store never reaches, and
//! its exact-recall cost here is a linear scan anyway once quantized.

use std::collections::HashMap;

pub use crate::config::VectorStoreConfig;

/// Errors specific to the vector store, mirroring the teacher's
/// `VectorSearchError` shape.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum VectorStoreError {
    InvalidDimensions { expected: usize, got: usize },
    KeyNotFound(String),
}

impl std::fmt::Display for VectorStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VectorStoreError::InvalidDimensions { expected, got } => {
                write!(f, "invalid dimensions: expected {expected}, got {got}")
            }
            VectorStoreError::KeyNotFound(key) => write!(f, "key not found: {key}"),
        }
    }
}

impl std::error::Error for VectorStoreError {}

/// Index statistics, mirroring the teacher's `VectorIndexStats`.
#[derive(Debug, Clone)]
pub struct VectorStoreStats {
    pub total_vectors: usize,
    pub dimensions: usize,
    pub quantized: bool,
    pub memory_bytes: usize,
    /// ~4.0 once quantized (8-bit vs 32-bit float), 1.0 otherwise.
    pub memory_reduction_ratio: f64,
}

enum Stored {
    Float(Vec<f32>),
    Quantized { values: Vec<i8>, scale: f32 },
}

impl Stored {
    fn quantize(vector: &[f32]) -> Self {
        let max_abs = vector.iter().fold(0.0_f32, |acc, v| acc.max(v.abs()));
        if max_abs == 0.0 {
            return Stored::Quantized {
                values: vec![0; vector.len()],
                scale: 1.0,
            };
        }
        let scale = max_abs / 127.0;
        let values = vector
            .iter()
            .map(|v| (v / scale).round().clamp(-127.0, 127.0) as i8)
            .collect();
        Stored::Quantized { values, scale }
    }

    fn dequantized(&self) -> Vec<f32> {
        match self {
            Stored::Float(v) => v.clone(),
            Stored::Quantized { values, scale } => {
                values.iter().map(|q| *q as f32 * scale).collect()
            }
        }
    }

    fn cosine_similarity(&self, query: &[f32]) -> f32 {
        match self {
            Stored::Float(v) => cosine_similarity_raw(v, query),
            Stored::Quantized { values, scale } => {
                // dot(q_i * scale, query_i) = scale * dot(q_i, query_i); the
                // query vector stays float so this only avoids
                // dequantizing the stored side into a temporary Vec.
                let dot: f32 = values
                    .iter()
                    .zip(query.iter())
                    .map(|(q, x)| (*q as f32) * x)
                    .sum::<f32>()
                    * scale;
                let stored_norm: f32 = values
                    .iter()
                    .map(|q| (*q as f32 * scale).powi(2))
                    .sum::<f32>()
                    .sqrt();
                let query_norm: f32 = query.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
                if stored_norm == 0.0 || query_norm == 0.0 {
                    0.0
                } else {
                    dot / (stored_norm * query_norm)
                }
            }
        }
    }
}

fn cosine_similarity_raw(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x.powi(2)).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Flat embedding store, quantizing to 8-bit in place once population
/// crosses `config.quantization_threshold`.
pub struct VectorStore {
    config: VectorStoreConfig,
    vectors: HashMap<String, Stored>,
    quantized: bool,
}

impl VectorStore {
    pub fn new(config: VectorStoreConfig) -> Self {
        Self {
            config,
            vectors: HashMap::new(),
            quantized: false,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Insert or replace the embedding for `name`. O(1).
    pub fn upsert(&mut self, name: &str, vector: Vec<f32>) -> Result<(), VectorStoreError> {
        if vector.len() != self.config.dimensions {
            return Err(VectorStoreError::InvalidDimensions {
                expected: self.config.dimensions,
                got: vector.len(),
            });
        }
        let stored = if self.quantized {
            Stored::quantize(&vector)
        } else {
            Stored::Float(vector)
        };
        self.vectors.insert(name.to_string(), stored);

        if !self.quantized && self.vectors.len() > self.config.quantization_threshold {
            self.quantize_all();
        }
        Ok(())
    }

    /// O(1) removal.
    pub fn remove(&mut self, name: &str) -> Option<()> {
        self.vectors.remove(name).map(|_| ())
    }

    pub fn get(&self, name: &str) -> Option<Vec<f32>> {
        self.vectors.get(name).map(Stored::dequantized)
    }

    fn quantize_all(&mut self) {
        let names: Vec<String> = self.vectors.keys().cloned().collect();
        for name in names {
            if let Some(Stored::Float(v)) = self.vectors.get(&name) {
                let quantized = Stored::quantize(v);
                self.vectors.insert(name, quantized);
            }
        }
        self.quantized = true;
    }

    /// Top-k cosine similarity search against `query`, filtered to
    /// `similarity >= min_similarity`.
    pub fn top_k(
        &self,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
    ) -> Vec<(String, f32)> {
        let mut scored: Vec<(String, f32)> = self
            .vectors
            .iter()
            .map(|(name, stored)| (name.clone(), stored.cosine_similarity(query)))
            .filter(|(_, score)| *score >= min_similarity)
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }

    pub fn stats(&self) -> VectorStoreStats {
        let per_vector_bytes = if self.quantized {
            self.config.dimensions + std::mem::size_of::<f32>()
        } else {
            self.config.dimensions * std::mem::size_of::<f32>()
        };
        VectorStoreStats {
            total_vectors: self.vectors.len(),
            dimensions: self.config.dimensions,
            quantized: self.quantized,
            memory_bytes: per_vector_bytes * self.vectors.len(),
            memory_reduction_ratio: if self.quantized {
                (self.config.dimensions * std::mem::size_of::<f32>()) as f64
                    / per_vector_bytes as f64
            } else {
                1.0
            },
        }
    }
}
