//! Shared text utilities: tokenization used by the graph's own inverted
//! index (C1), the TF/IDF index (C3), and lexical search (C7).
//!
//! Tokenization rule: lowercase, split on non-alphanumeric,
//! drop tokens shorter than 2 characters.

/// Tokenize `text` per the rule above.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .map(|t| t.to_string())
        .collect()
}
