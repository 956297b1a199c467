//! Context Window Manager.
//!
//! Greedily packs salience-ranked memories into a token budget, keeping
//! `must_include` memories unconditionally, enforcing a minimum diversity
//! between accepted memories, and reporting anything that spilled over
//! the budget as a paginated, cursor-addressable overflow list.

use std::collections::HashSet;

use base64::Engine as _;

use crate::config::ContextWindowConfig;
use crate::graph::Entity;
use crate::text::tokenize;

/// One candidate memory offered to the packer, already salience-scored
/// by C10.
#[derive(Debug, Clone)]
pub struct PackingCandidate {
    pub entity: Entity,
    pub salience: f64,
    /// Bypasses the min-salience filter and the budget itself cannot
    /// evict it once admitted, but it still counts against the budget.
    pub must_include: bool,
}

/// Why a candidate did not make it into the packed context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionReason {
    LowSalience,
    BudgetExhausted,
}

/// A memory that was packed into the context.
#[derive(Debug, Clone)]
pub struct PackedMemory {
    pub name: String,
    pub tokens: u32,
    pub salience: f64,
    pub must_include: bool,
}

/// One page of budget-exhausted overflow.
#[derive(Debug, Clone)]
pub struct SpilloverPage {
    pub entries: Vec<String>,
    pub next_cursor: Option<String>,
    pub total_remaining: usize,
}

/// Full result of a packing pass.
#[derive(Debug, Clone)]
pub struct PackResult {
    pub included: Vec<PackedMemory>,
    pub excluded: Vec<(String, ExclusionReason)>,
    pub total_tokens: u32,
    pub budget_tokens: u32,
    pub spillover: Option<SpilloverPage>,
}

impl PackResult {
    /// Number of included memories that were must-include.
    pub fn must_include_count(&self) -> usize {
        self.included.iter().filter(|m| m.must_include).count()
    }
}

/// Per-pool token allocation for the alternate budget-split entry point.
#[derive(Debug, Clone, Copy)]
pub struct PoolBudgets {
    pub working: u32,
    pub episodic: u32,
    pub semantic: u32,
}

pub struct ContextWindowManager {
    config: ContextWindowConfig,
}

impl ContextWindowManager {
    pub fn new(config: ContextWindowConfig) -> Self {
        Self { config }
    }

    /// Estimate token cost of `text` as word count times the configured
    /// multiplier, rounded up.
    pub fn estimate_tokens(&self, text: &str) -> u32 {
        let words = text.split_whitespace().count().max(1);
        (words as f64 * self.config.token_multiplier).ceil() as u32
    }

    /// Greedily pack `candidates` into `max_tokens` (or the configured
    /// default), dropping anything below `min_salience` unless it is
    /// `must_include`, then filling remaining budget by
    /// salience-per-token efficiency, enforcing diversity if configured.
    pub fn pack(
        &self,
        candidates: Vec<PackingCandidate>,
        max_tokens: Option<u32>,
        min_salience: f64,
    ) -> PackResult {
        let budget_tokens = max_tokens
            .unwrap_or(self.config.default_max_tokens)
            .saturating_sub(self.config.reserve_buffer);

        let mut must_include = Vec::new();
        let mut optional = Vec::new();
        let mut excluded: Vec<(String, ExclusionReason)> = Vec::new();

        for candidate in candidates
            .into_iter()
            .take(self.config.max_entities_to_consider)
        {
            if !candidate.must_include && candidate.salience < min_salience {
                excluded.push((candidate.entity.name.clone(), ExclusionReason::LowSalience));
                continue;
            }
            if candidate.must_include {
                must_include.push(candidate);
            } else {
                optional.push(candidate);
            }
        }

        optional.sort_by(|a, b| {
            let ea = a.salience / self.estimate_tokens(&a.entity.document_text()).max(1) as f64;
            let eb = b.salience / self.estimate_tokens(&b.entity.document_text()).max(1) as f64;
            eb.partial_cmp(&ea).unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut included = Vec::new();
        let mut included_tokensets: Vec<HashSet<String>> = Vec::new();
        let mut used = 0u32;

        for candidate in must_include {
            let tokens = self.estimate_tokens(&candidate.entity.document_text());
            used += tokens;
            included_tokensets.push(tokenize(&candidate.entity.document_text()).into_iter().collect());
            included.push(PackedMemory {
                name: candidate.entity.name.clone(),
                tokens,
                salience: candidate.salience,
                must_include: true,
            });
        }

        let mut overflow = Vec::new();
        for candidate in optional {
            let tokens = self.estimate_tokens(&candidate.entity.document_text());
            if used.saturating_add(tokens) > budget_tokens {
                overflow.push(candidate.entity.name.clone());
                continue;
            }
            if self.config.enforce_diversity {
                let doc_tokens: HashSet<String> =
                    tokenize(&candidate.entity.document_text()).into_iter().collect();
                let too_similar = included_tokensets
                    .iter()
                    .any(|existing| jaccard(&doc_tokens, existing) >= self.config.diversity_threshold);
                if too_similar {
                    // Not reported as excluded: the candidate is simply
                    // passed over and the next-best candidate in
                    // efficiency order is considered for the budget this
                    // one would have used, rather than being dropped.
                    continue;
                }
                included_tokensets.push(doc_tokens);
            }
            used += tokens;
            included.push(PackedMemory {
                name: candidate.entity.name.clone(),
                tokens,
                salience: candidate.salience,
                must_include: false,
            });
        }

        let spillover = if overflow.is_empty() {
            None
        } else {
            let page = self.spillover_page(&overflow, None);
            for name in &overflow {
                excluded.push((name.clone(), ExclusionReason::BudgetExhausted));
            }
            Some(page)
        };

        PackResult {
            included,
            excluded,
            total_tokens: used,
            budget_tokens,
            spillover,
        }
    }

    /// Page through `overflow` starting at the offset encoded in `cursor`
    /// (or 0 when `cursor` is `None`), `spillover_page_size` entries at a
    /// time. The cursor is an opaque base64 string; callers must not
    /// parse it.
    pub fn spillover_page(&self, overflow: &[String], cursor: Option<&str>) -> SpilloverPage {
        let offset = cursor.and_then(decode_cursor).unwrap_or(0).min(overflow.len());
        let end = (offset + self.config.spillover_page_size).min(overflow.len());
        let entries = overflow[offset..end].to_vec();
        let next_cursor = if end < overflow.len() {
            Some(encode_cursor(end))
        } else {
            None
        };
        SpilloverPage {
            entries,
            next_cursor,
            total_remaining: overflow.len() - end,
        }
    }

    /// Split `max_tokens` across working/episodic/semantic pools using
    /// the configured percentages, after reserving `reserve_buffer` tokens
    /// off the top.
    pub fn allocate_budget(&self, max_tokens: u32) -> PoolBudgets {
        let usable = max_tokens.saturating_sub(self.config.reserve_buffer) as f64;
        let pct = |key: &str| self.config.pool_percentages.get(key).copied().unwrap_or(0.0);
        PoolBudgets {
            working: (usable * pct("working")).floor() as u32,
            episodic: (usable * pct("episodic")).floor() as u32,
            semantic: (usable * pct("semantic")).floor() as u32,
        }
    }
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

fn encode_cursor(offset: usize) -> String {
    base64::engine::general_purpose::STANDARD.encode(offset.to_string())
}

fn decode_cursor(cursor: &str) -> Option<usize> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(cursor).ok()?;
    std::str::from_utf8(&bytes).ok()?.parse().ok()
}
