//! Lexical layer search.
//!
//! Operates on the TF/IDF index (C3). `ranked` scores with TF-IDF,
//! `boolean` evaluates a small AST over `AND | OR | NOT | FIELD:value |
//! "quoted phrase" | ( )`, and `fuzzy` scores per-field edit distance.
//! The boolean parser never builds a raw query string into an evaluated
//! expression — it always lexes into a token stream first.

use crate::graph::Entity;
use crate::index::TfIdfIndex;
use crate::text::tokenize;

/// One ranked lexical match.
#[derive(Debug, Clone)]
pub struct RankedMatch {
    pub name: String,
    pub score: f64,
}

/// `Σ tf(t,d) × idf(t)` over query tokens, filtered and limited.
pub fn ranked(
    index: &TfIdfIndex,
    entities: &[Entity],
    query: &str,
    tags: Option<&[String]>,
    min_importance: Option<f64>,
    max_importance: Option<f64>,
    limit: usize,
) -> Vec<RankedMatch> {
    let by_name: std::collections::HashMap<&str, &Entity> =
        entities.iter().map(|e| (e.name.as_str(), e)).collect();

    let mut scores = index.score_all(query);
    scores.retain(|(name, score)| {
        if *score <= 0.0 {
            return false;
        }
        let Some(entity) = by_name.get(name.as_str()) else {
            return false;
        };
        if let Some(tags) = tags {
            let wanted: std::collections::BTreeSet<String> =
                tags.iter().map(|t| t.to_lowercase()).collect();
            if !wanted.iter().any(|t| entity.tags.contains(t)) {
                return false;
            }
        }
        if let Some(min) = min_importance {
            if entity.importance < min {
                return false;
            }
        }
        if let Some(max) = max_importance {
            if entity.importance > max {
                return false;
            }
        }
        true
    });

    scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scores
        .into_iter()
        .take(limit)
        .map(|(name, score)| RankedMatch { name, score })
        .collect()
}

// ---------------------------------------------------------------------
// Boolean query AST
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum BoolExpr {
    Term(String),
    Phrase(String),
    Field(String, String),
    And(Vec<BoolExpr>),
    Or(Vec<BoolExpr>),
    Not(Box<BoolExpr>),
}

struct Tokenizer<'a> {
    rest: std::iter::Peekable<std::str::Chars<'a>>,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Word(String),
    Phrase(String),
    Field(String, String),
    And,
    Or,
    Not,
    LParen,
    RParen,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            rest: input.chars().peekable(),
        }
    }

    fn next_token(&mut self) -> Option<Tok> {
        while self.rest.peek().is_some_and(|c| c.is_whitespace()) {
            self.rest.next();
        }
        let c = *self.rest.peek()?;
        match c {
            '(' => {
                self.rest.next();
                Some(Tok::LParen)
            }
            ')' => {
                self.rest.next();
                Some(Tok::RParen)
            }
            '"' => {
                self.rest.next();
                let mut s = String::new();
                for ch in self.rest.by_ref() {
                    if ch == '"' {
                        break;
                    }
                    s.push(ch);
                }
                Some(Tok::Phrase(s))
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = self.rest.peek() {
                    if ch.is_whitespace() || ch == '(' || ch == ')' {
                        break;
                    }
                    word.push(ch);
                    self.rest.next();
                }
                if let Some((field, value)) = word.split_once(':') {
                    return Some(Tok::Field(field.to_lowercase(), value.to_string()));
                }
                match word.to_uppercase().as_str() {
                    "AND" => Some(Tok::And),
                    "OR" => Some(Tok::Or),
                    "NOT" => Some(Tok::Not),
                    _ => Some(Tok::Word(word)),
                }
            }
        }
    }

    fn all(mut self) -> Vec<Tok> {
        let mut tokens = Vec::new();
        while let Some(t) = self.next_token() {
            tokens.push(t);
        }
        tokens
    }
}

struct Parser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    /// expr := term (AND|OR term)*  (implicit AND between adjacent terms)
    fn parse_expr(&mut self) -> BoolExpr {
        let mut terms = vec![self.parse_unary()];
        let mut is_or = false;
        loop {
            match self.peek() {
                Some(Tok::And) => {
                    self.advance();
                    terms.push(self.parse_unary());
                }
                Some(Tok::Or) => {
                    self.advance();
                    is_or = true;
                    terms.push(self.parse_unary());
                }
                Some(Tok::RParen) | None => break,
                _ => terms.push(self.parse_unary()),
            }
        }
        if terms.len() == 1 {
            terms.into_iter().next().unwrap()
        } else if is_or {
            BoolExpr::Or(terms)
        } else {
            BoolExpr::And(terms)
        }
    }

    fn parse_unary(&mut self) -> BoolExpr {
        match self.peek() {
            Some(Tok::Not) => {
                self.advance();
                BoolExpr::Not(Box::new(self.parse_unary()))
            }
            Some(Tok::LParen) => {
                self.advance();
                let inner = self.parse_expr();
                if matches!(self.peek(), Some(Tok::RParen)) {
                    self.advance();
                }
                inner
            }
            _ => match self.advance() {
                Some(Tok::Word(w)) => BoolExpr::Term(w),
                Some(Tok::Phrase(p)) => BoolExpr::Phrase(p),
                Some(Tok::Field(f, v)) => BoolExpr::Field(f, v),
                _ => BoolExpr::And(Vec::new()),
            },
        }
    }
}

fn parse(query: &str) -> BoolExpr {
    let tokens = Tokenizer::new(query).all();
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_expr()
}

fn evaluate(expr: &BoolExpr, entity: &Entity) -> bool {
    match expr {
        BoolExpr::Term(term) => {
            let term_lower = term.to_lowercase();
            tokenize(&entity.document_text()).iter().any(|t| *t == term_lower)
        }
        BoolExpr::Phrase(phrase) => entity
            .document_text()
            .to_lowercase()
            .contains(&phrase.to_lowercase()),
        BoolExpr::Field(field, value) => {
            let value_lower = value.to_lowercase();
            match field.as_str() {
                "name" => entity.name.to_lowercase().contains(&value_lower),
                "type" => entity.entity_type.to_lowercase().contains(&value_lower),
                "observation" => entity
                    .observations
                    .iter()
                    .any(|o| o.to_lowercase().contains(&value_lower)),
                _ => false,
            }
        }
        BoolExpr::And(children) => children.iter().all(|c| evaluate(c, entity)),
        BoolExpr::Or(children) => children.iter().any(|c| evaluate(c, entity)),
        BoolExpr::Not(child) => !evaluate(child, entity),
    }
}

/// Evaluate a boolean query against every entity.
pub fn boolean<'a>(entities: &'a [Entity], query: &str) -> Vec<&'a Entity> {
    let ast = parse(query);
    entities.iter().filter(|e| evaluate(&ast, e)).collect()
}

// ---------------------------------------------------------------------
// Fuzzy matching
// ---------------------------------------------------------------------

fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];
    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn field_similarity(field: &str, query: &str) -> f64 {
    let max_len = field.len().max(query.len()).max(1);
    1.0 - levenshtein(&field.to_lowercase(), &query.to_lowercase()) as f64 / max_len as f64
}

/// `1 − levenshtein/max_len` per field; an entity matches when any field
/// exceeds `threshold`.
pub fn fuzzy<'a>(entities: &'a [Entity], query: &str, threshold: f64) -> Vec<(&'a Entity, f64)> {
    entities
        .iter()
        .filter_map(|entity| {
            let mut fields = vec![entity.name.as_str(), entity.entity_type.as_str()];
            fields.extend(entity.observations.iter().map(|s| s.as_str()));
            let best = fields
                .iter()
                .map(|f| field_similarity(f, query))
                .fold(0.0_f64, f64::max);
            (best >= threshold).then_some((entity, best))
        })
        .collect()
}
