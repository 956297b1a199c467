//! Process-wide configuration records.
//!
//! Every tunable lives on an explicit config struct constructed once at
//! [`crate::Gnosis::open`] time and threaded through the components that
//! need it. There is no hidden mutable module-level state.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level configuration bag, one field group per component family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GnosisConfig {
    pub decay: DecayConfig,
    pub salience: SalienceConfig,
    pub context_window: ContextWindowConfig,
    pub caches: CacheConfig,
    pub indexer: IndexerConfig,
    pub vector_store: VectorStoreConfig,
}

impl Default for GnosisConfig {
    fn default() -> Self {
        Self {
            decay: DecayConfig::default(),
            salience: SalienceConfig::default(),
            context_window: ContextWindowConfig::default(),
            caches: CacheConfig::default(),
            indexer: IndexerConfig::default(),
            vector_store: VectorStoreConfig::default(),
        }
    }
}

/// C9 decay tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecayConfig {
    pub half_life_hours: f64,
    pub importance_modulation: bool,
    pub access_modulation: bool,
    pub min_importance: f64,
    /// Bounded ring-buffer size for recent-access tracking.
    pub recent_access_window: usize,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 168.0,
            importance_modulation: true,
            access_modulation: true,
            min_importance: 0.1,
            recent_access_window: 100,
        }
    }
}

/// C10 salience weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SalienceConfig {
    pub weight_importance: f64,
    pub weight_recency: f64,
    pub weight_frequency: f64,
    pub weight_context: f64,
    pub weight_novelty: f64,
    pub session_boost_factor: f64,
    pub recent_entity_boost_factor: f64,
    pub use_semantic_similarity: bool,
    pub uniqueness_threshold: f64,
}

impl Default for SalienceConfig {
    fn default() -> Self {
        Self {
            weight_importance: 0.25,
            weight_recency: 0.25,
            weight_frequency: 0.20,
            weight_context: 0.20,
            weight_novelty: 0.10,
            session_boost_factor: 1.0,
            recent_entity_boost_factor: 0.3,
            use_semantic_similarity: true,
            uniqueness_threshold: 0.5,
        }
    }
}

/// C11 context-window packing tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextWindowConfig {
    pub default_max_tokens: u32,
    pub token_multiplier: f64,
    pub reserve_buffer: u32,
    pub max_entities_to_consider: usize,
    pub diversity_threshold: f64,
    pub enforce_diversity: bool,
    /// Budget-allocation percentages for the alternate packing entry
    /// point, keyed by memory type name; must sum to <= 1.0.
    pub pool_percentages: HashMap<String, f64>,
    pub spillover_page_size: usize,
}

impl Default for ContextWindowConfig {
    fn default() -> Self {
        let mut pool_percentages = HashMap::new();
        pool_percentages.insert("working".to_string(), 0.3);
        pool_percentages.insert("episodic".to_string(), 0.4);
        pool_percentages.insert("semantic".to_string(), 0.3);

        Self {
            default_max_tokens: 4000,
            token_multiplier: 1.3,
            reserve_buffer: 100,
            max_entities_to_consider: 1000,
            diversity_threshold: 0.85,
            enforce_diversity: true,
            pool_percentages,
            spillover_page_size: 25,
        }
    }
}

/// C5 cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub plan_cache_max: usize,
    pub plan_cache_ttl_secs: u64,
    pub embedding_cache_max: usize,
    pub embedding_cache_ttl_secs: u64,
    pub compressed_cache_max_uncompressed: usize,
    pub compressed_cache_min_compression_size: usize,
    pub compressed_cache_min_compression_ratio: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            plan_cache_max: 1000,
            plan_cache_ttl_secs: 300,
            embedding_cache_max: 1000,
            embedding_cache_ttl_secs: 3600,
            compressed_cache_max_uncompressed: 200,
            compressed_cache_min_compression_size: 256,
            compressed_cache_min_compression_ratio: 0.75,
        }
    }
}

/// Incremental indexer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub flush_threshold: usize,
    pub flush_interval_ms: u64,
    pub embedding_mode: String,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 50,
            flush_interval_ms: 5000,
            embedding_mode: "document".to_string(),
        }
    }
}

/// C4 quantized vector store tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    pub dimensions: usize,
    /// Population above which vectors are quantized to 8-bit.
    pub quantization_threshold: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            dimensions: 256,
            quantization_threshold: 1000,
        }
    }
}
