//! Semantic layer search.
//!
//! Produces a query embedding — consulting the embedding cache (C5) first
//! — and ranks entities present in the quantized vector store (C4) by
//! cosine similarity, reusing the `EmbeddingService` + `cosine_similarity`
//! building blocks directly.

use crate::cache::TtlLruCache;
use crate::index::VectorStore;

/// One semantic match.
#[derive(Debug, Clone)]
pub struct SemanticMatch {
    pub name: String,
    pub similarity: f32,
}

/// Embedding-cache key: hash of text + mode.
pub fn cache_key(text: &str, mode: &str) -> String {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    mode.hash(&mut hasher);
    text.hash(&mut hasher);
    format!("{mode}:{:x}", hasher.finish())
}

/// Embed `query`, consulting `cache` first and populating it on miss.
/// Returns `None` if the embedding model is unavailable — disabled
/// feature, or failed to initialize — so callers can treat a missing
/// embedding the same way any layer failure is treated: an empty score
/// map rather than a hard error.
#[cfg(feature = "embeddings")]
pub fn embed_query(cache: &TtlLruCache<Vec<f32>>, query: &str) -> Option<Vec<f32>> {
    let key = cache_key(query, "query");
    if let Some(cached) = cache.get(&key) {
        return Some(cached);
    }
    let service = crate::embeddings::EmbeddingService::new();
    let embedding = service.embed(query).ok()?;
    cache.set(key, embedding.vector.clone());
    Some(embedding.vector)
}

#[cfg(not(feature = "embeddings"))]
pub fn embed_query(_cache: &TtlLruCache<Vec<f32>>, _query: &str) -> Option<Vec<f32>> {
    None
}

/// Rank entities in `vector_store` by cosine similarity to `query_vector`,
/// returning the top `top_k` with similarity >= `min_similarity`.
pub fn search(
    vector_store: &VectorStore,
    query_vector: &[f32],
    top_k: usize,
    min_similarity: f32,
) -> Vec<SemanticMatch> {
    vector_store
        .top_k(query_vector, top_k, min_similarity)
        .into_iter()
        .map(|(name, similarity)| SemanticMatch { name, similarity })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VectorStoreConfig;

    #[test]
    fn cache_key_differs_by_mode() {
        assert_ne!(cache_key("alice", "query"), cache_key("alice", "document"));
    }

    #[test]
    fn search_filters_by_min_similarity() {
        let mut store = VectorStore::new(VectorStoreConfig {
            dimensions: 3,
            quantization_threshold: 100,
        });
        store.upsert("close", vec![1.0, 0.0, 0.0]).unwrap();
        store.upsert("orthogonal", vec![0.0, 1.0, 0.0]).unwrap();
        let matches = search(&store, &[1.0, 0.0, 0.0], 5, 0.5);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "close");
    }

    #[cfg(not(feature = "embeddings"))]
    #[test]
    fn embed_query_without_feature_returns_none() {
        use std::time::Duration;
        let cache = TtlLruCache::new(10, Duration::from_secs(60));
        assert!(embed_query(&cache, "hello").is_none());
    }
}
