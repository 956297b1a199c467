//! Derived search indexes kept consistent with the graph store: the
//! TF/IDF inverted index (C3) and the quantized vector store (C4).

pub mod tfidf;
pub mod vector;

pub use tfidf::TfIdfIndex;
pub use vector::{VectorStore, VectorStoreConfig, VectorStoreError, VectorStoreStats};
