//! Local embedding generation.
//!
//! Uses fastembed (ONNX-based) to embed text locally with no external
//! API calls, then Matryoshka-truncates to a smaller dimension before
//! anything touches the vector store (C4).

pub mod local;

pub use local::{
    cosine_similarity, dot_product, euclidean_distance, matryoshka_truncate, Embedding,
    EmbeddingError, EmbeddingService, BATCH_SIZE, EMBEDDING_DIMENSIONS, MAX_TEXT_LENGTH,
};
