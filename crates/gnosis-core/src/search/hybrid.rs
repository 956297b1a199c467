//! Hybrid Orchestrator.
//!
//! Dispatches the three layer searches, fuses their scores into one
//! ranking, and can stop early once the results look adequate. An
//! optional reflective wrapper re-runs the search with a reformulated
//! query when the first pass looks weak.
//!
//! Keeps the "fuse several ranked lists into one" shape of an
//! RRF/linear-combination fuser but extends it to a three-layer weighted
//! combination driven by the query analyzer/planner (C6), with a
//! plan-cache consult, early termination, and a reflection loop on top.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use crate::cache::{normalize_plan_key, CacheStats, TtlLruCache};
use crate::config::CacheConfig;
use crate::graph::{Entity, GraphStore};
use crate::index::{TfIdfIndex, VectorStore};
use crate::query::{analyze, plan, ExecutionPlan, QueryAnalysis, TargetLayer};
use crate::search::lexical;
use crate::search::semantic;
use crate::search::symbolic::{self, SymbolicFilters};

/// One of the three retrieval layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    Semantic,
    Lexical,
    Symbolic,
}

/// Tuning knobs for one hybrid search call.
#[derive(Debug, Clone)]
pub struct HybridOptions {
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    pub symbolic_weight: f64,
    pub limit: usize,
    pub min_similarity: f32,
    pub lexical_tags: Option<Vec<String>>,
    pub lexical_min_importance: Option<f64>,
    pub lexical_max_importance: Option<f64>,
    pub symbolic_filters: SymbolicFilters,
    /// Minimum matched-result count required for early termination to
    /// kick in, independent of the adequacy score itself.
    pub min_result_count: usize,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            semantic_weight: 1.0,
            lexical_weight: 1.0,
            symbolic_weight: 1.0,
            limit: 10,
            min_similarity: 0.0,
            lexical_tags: None,
            lexical_min_importance: None,
            lexical_max_importance: None,
            symbolic_filters: SymbolicFilters::default(),
            min_result_count: 5,
        }
    }
}

/// One fused result.
#[derive(Debug, Clone)]
pub struct HybridResult {
    pub entity: Entity,
    pub combined: f64,
    pub semantic: f64,
    pub lexical: f64,
    pub symbolic: f64,
    pub matched_layers: BTreeSet<Layer>,
}

/// Full response of one [`HybridOrchestrator::search`] call.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<HybridResult>,
    pub early_terminated: bool,
    pub executed_layers: Vec<Layer>,
    pub adequacy_score: f64,
}

/// One step of a [`HybridOrchestrator::reflective_search`] run.
#[derive(Debug, Clone)]
pub struct ReflectionStep {
    pub iteration: usize,
    pub query: String,
    pub limit: usize,
    pub adequacy: f64,
}

/// Tuning for the reflective wrapper.
#[derive(Debug, Clone)]
pub struct ReflectionOptions {
    pub max_iterations: usize,
    pub adequacy_threshold: f64,
    pub limit_increase_factor: f64,
}

impl Default for ReflectionOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            adequacy_threshold: 0.6,
            limit_increase_factor: 1.5,
        }
    }
}

/// Final outcome of a reflective search, with the full iteration history.
#[derive(Debug, Clone)]
pub struct ReflectionReport {
    pub response: SearchResponse,
    pub history: Vec<ReflectionStep>,
}

/// Normalize semantic/lexical/symbolic weights so they sum to 1.
fn normalize_weights(options: &HybridOptions) -> (f64, f64, f64) {
    let total = (options.semantic_weight + options.lexical_weight + options.symbolic_weight).max(1e-9);
    (
        options.semantic_weight / total,
        options.lexical_weight / total,
        options.symbolic_weight / total,
    )
}

/// Order in which the three layers are dispatched for this search,
/// driven by the planner's target layer (C6) so the layer the plan
/// thinks is most likely to answer the query runs first and has the
/// best shot at satisfying early termination before the others run.
fn layer_order(execution_plan: &ExecutionPlan) -> [Layer; 3] {
    let primary = execution_plan
        .sub_queries
        .first()
        .map(|sq| sq.target_layer)
        .unwrap_or(TargetLayer::Hybrid);
    match primary {
        TargetLayer::Semantic => [Layer::Semantic, Layer::Lexical, Layer::Symbolic],
        TargetLayer::Lexical => [Layer::Lexical, Layer::Semantic, Layer::Symbolic],
        TargetLayer::Symbolic => [Layer::Symbolic, Layer::Semantic, Layer::Lexical],
        TargetLayer::Hybrid => [Layer::Semantic, Layer::Lexical, Layer::Symbolic],
    }
}

/// Derived quality measure used to decide early termination and to drive
/// reflection: a blend of top-k mean score, result-count coverage against
/// the caller's minimum, and score consistency (inverse variance).
fn adequacy_score(scores: &[f64], min_result_count: usize) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let top_k: Vec<f64> = scores.iter().take(5).copied().collect();
    let mean = top_k.iter().sum::<f64>() / top_k.len() as f64;
    let coverage = (scores.len() as f64 / min_result_count.max(1) as f64).min(1.0);
    let variance = top_k.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / top_k.len() as f64;
    let consistency = (1.0 - variance).clamp(0.0, 1.0);
    (0.5 * mean + 0.3 * coverage + 0.2 * consistency).clamp(0.0, 1.0)
}

/// Consults the plan cache (C5), dispatches the three layer searches
/// (C7), and fuses their scores with early termination.
pub struct HybridOrchestrator {
    plan_cache: TtlLruCache<(QueryAnalysis, ExecutionPlan)>,
    embedding_cache: TtlLruCache<Vec<f32>>,
    adequacy_threshold: f64,
}

impl HybridOrchestrator {
    pub fn new(cache_config: &CacheConfig, adequacy_threshold: f64) -> Self {
        Self {
            plan_cache: TtlLruCache::new(
                cache_config.plan_cache_max,
                Duration::from_secs(cache_config.plan_cache_ttl_secs),
            ),
            embedding_cache: TtlLruCache::new(
                cache_config.embedding_cache_max,
                Duration::from_secs(cache_config.embedding_cache_ttl_secs),
            ),
            adequacy_threshold,
        }
    }

    /// Analyze+plan `query`, consulting the plan cache first.
    fn analyze_and_plan(&self, query: &str) -> (QueryAnalysis, ExecutionPlan) {
        let key = normalize_plan_key(query);
        if let Some(cached) = self.plan_cache.get(&key) {
            return cached;
        }
        let analysis = analyze(query);
        let execution_plan = plan(query, &analysis);
        self.plan_cache.set(key, (analysis.clone(), execution_plan.clone()));
        (analysis, execution_plan)
    }

    pub fn plan_cache_stats(&self) -> CacheStats {
        self.plan_cache.stats()
    }

    /// Run the semantic layer, tolerating total unavailability (missing
    /// embedding model) as an empty map.
    fn semantic_layer(
        &self,
        vectors: &VectorStore,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> HashMap<String, f64> {
        match semantic::embed_query(&self.embedding_cache, query) {
            Some(vector) => semantic::search(vectors, &vector, top_k, min_similarity)
                .into_iter()
                .map(|m| (m.name, m.similarity as f64))
                .collect(),
            None => HashMap::new(),
        }
    }

    fn lexical_layer(
        &self,
        index: &TfIdfIndex,
        entities: &[Entity],
        query: &str,
        options: &HybridOptions,
        top_k: usize,
    ) -> HashMap<String, f64> {
        lexical::ranked(
            index,
            entities,
            query,
            options.lexical_tags.as_deref(),
            options.lexical_min_importance,
            options.lexical_max_importance,
            top_k,
        )
        .into_iter()
        .map(|m| (m.name, m.score))
        .collect()
    }

    fn symbolic_layer(&self, entities: &[Entity], filters: &SymbolicFilters) -> HashMap<String, f64> {
        if filters.is_empty() {
            // Baseline is applied at combination time, not here, so an
            // empty-filter query doesn't silently match the entire graph
            // through this layer.
            return HashMap::new();
        }
        symbolic::search(entities, filters)
            .into_iter()
            .map(|(entity, score, _matched)| (entity.name, score))
            .collect()
    }

    /// One hybrid search pass.
    ///
    /// The three layers are dispatched from within this single task
    /// rather than as separate `tokio::spawn`s: none of them perform
    /// their own I/O (the graph, index, and vector store are all
    /// in-memory, already-locked snapshots by the time this is called),
    /// so the real cost is CPU-bound scoring work that a spawn would not
    /// parallelize without also forcing `Send + 'static` on borrowed
    /// data. Layers run in the order the planner (C6) picks for this
    /// query; adequacy is recomputed from the fused results after each
    /// one completes, and the remaining layers are skipped once it is
    /// met.
    pub async fn search(
        &self,
        store: &GraphStore,
        index: &TfIdfIndex,
        vectors: &VectorStore,
        query: &str,
        options: &HybridOptions,
    ) -> SearchResponse {
        let (_analysis, execution_plan) = self.analyze_and_plan(query);
        let (ws, wl, wsy) = normalize_weights(options);
        let per_layer_limit = (options.limit * 2).max(options.limit);
        let entities = store.all_entities();
        let filters_empty = options.symbolic_filters.is_empty();
        let by_name: HashMap<&str, &Entity> = entities.iter().map(|e| (e.name.as_str(), e)).collect();

        let mut semantic_scores: HashMap<String, f64> = HashMap::new();
        let mut lexical_scores: HashMap<String, f64> = HashMap::new();
        let mut symbolic_scores: HashMap<String, f64> = HashMap::new();
        let mut executed_layers: Vec<Layer> = Vec::with_capacity(3);
        let mut results: Vec<HybridResult> = Vec::new();
        let mut adequacy = 0.0_f64;

        for layer in layer_order(&execution_plan) {
            match layer {
                Layer::Semantic => {
                    semantic_scores =
                        self.semantic_layer(vectors, query, per_layer_limit, options.min_similarity);
                }
                Layer::Lexical => {
                    lexical_scores =
                        self.lexical_layer(index, &entities, query, options, per_layer_limit);
                }
                Layer::Symbolic => {
                    symbolic_scores = self.symbolic_layer(&entities, &options.symbolic_filters);
                }
            }
            executed_layers.push(layer);

            // Normalize lexical scores against the max observed so all
            // three layers land in [0, 1].
            let max_lexical = lexical_scores.values().cloned().fold(0.0_f64, f64::max);
            let normalize_lexical = |v: f64| if max_lexical > 0.0 { v / max_lexical } else { 0.0 };

            let mut names: BTreeSet<String> = BTreeSet::new();
            names.extend(semantic_scores.keys().cloned());
            names.extend(lexical_scores.keys().cloned());
            names.extend(symbolic_scores.keys().cloned());

            let mut fused: Vec<HybridResult> = Vec::with_capacity(names.len());
            for name in &names {
                let Some(entity) = by_name.get(name.as_str()) else {
                    continue;
                };
                let mut matched_layers = BTreeSet::new();
                let semantic_score = semantic_scores.get(name).copied().unwrap_or(0.0);
                if semantic_scores.contains_key(name) {
                    matched_layers.insert(Layer::Semantic);
                }
                let lexical_raw = lexical_scores.get(name).copied().unwrap_or(0.0);
                if lexical_scores.contains_key(name) {
                    matched_layers.insert(Layer::Lexical);
                }
                let lexical_score = normalize_lexical(lexical_raw);
                let symbolic_score = match symbolic_scores.get(name) {
                    Some(score) => {
                        matched_layers.insert(Layer::Symbolic);
                        *score
                    }
                    None if filters_empty => 0.5,
                    None => 0.0,
                };

                if matched_layers.is_empty() {
                    continue;
                }

                let combined = ws * semantic_score + wl * lexical_score + wsy * symbolic_score;
                fused.push(HybridResult {
                    entity: (*entity).clone(),
                    combined,
                    semantic: semantic_score,
                    lexical: lexical_score,
                    symbolic: symbolic_score,
                    matched_layers,
                });
            }

            // Ordered by combined score descending, then semantic/lexical/
            // symbolic sub-scores, then name, for deterministic results.
            fused.sort_by(|a, b| {
                b.combined
                    .partial_cmp(&a.combined)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.semantic.partial_cmp(&a.semantic).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| b.lexical.partial_cmp(&a.lexical).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| b.symbolic.partial_cmp(&a.symbolic).unwrap_or(std::cmp::Ordering::Equal))
                    .then_with(|| a.entity.name.cmp(&b.entity.name))
            });
            fused.truncate(options.limit);

            let combined_scores: Vec<f64> = fused.iter().map(|r| r.combined).collect();
            adequacy = adequacy_score(&combined_scores, options.min_result_count);
            results = fused;

            let ran_all_layers = executed_layers.len() == 3;
            if !ran_all_layers
                && adequacy >= self.adequacy_threshold
                && results.len() >= options.min_result_count
            {
                break;
            }
        }

        let early_terminated = executed_layers.len() < 3;

        SearchResponse {
            results,
            early_terminated,
            executed_layers,
            adequacy_score: adequacy,
        }
    }

    /// Reformulate `query` by injecting a type hint inferred from its
    /// analysis, e.g. a detected person name.
    fn reformulate(&self, query: &str, analysis: &QueryAnalysis) -> String {
        if let Some(person) = analysis.persons.first() {
            if !query.contains(person.as_str()) {
                return format!("{query} {person}");
            }
        }
        if let Some(location) = analysis.locations.first() {
            if !query.contains(location.as_str()) {
                return format!("{query} {location}");
            }
        }
        format!("{query} details")
    }

    /// Reflective wrapper: re-run [`Self::search`] up to
    /// `reflection.max_iterations` times, reformulating the query and
    /// growing the limit whenever adequacy is not met. Terminates on adequacy met, max iterations, or an
    /// unchanged query.
    pub async fn reflective_search(
        &self,
        store: &GraphStore,
        index: &TfIdfIndex,
        vectors: &VectorStore,
        query: &str,
        options: &HybridOptions,
        reflection: &ReflectionOptions,
    ) -> ReflectionReport {
        let mut current_query = query.to_string();
        let mut current_options = options.clone();
        let mut history = Vec::new();
        let mut last_response = None;

        for iteration in 0..reflection.max_iterations.max(1) {
            let response = self.search(store, index, vectors, &current_query, &current_options).await;
            history.push(ReflectionStep {
                iteration,
                query: current_query.clone(),
                limit: current_options.limit,
                adequacy: response.adequacy_score,
            });

            let adequate = response.adequacy_score >= reflection.adequacy_threshold;
            let is_last = iteration + 1 >= reflection.max_iterations;
            if adequate || is_last {
                last_response = Some(response);
                break;
            }

            let (analysis, _plan) = self.analyze_and_plan(&current_query);
            let reformulated = self.reformulate(&current_query, &analysis);
            if reformulated == current_query {
                last_response = Some(response);
                break;
            }
            current_query = reformulated;
            current_options.limit =
                ((current_options.limit as f64) * reflection.limit_increase_factor).ceil() as usize;
        }

        ReflectionReport {
            response: last_response.expect("at least one iteration always runs"),
            history,
        }
    }
}
