//! Inverted index with separate title and body tables.
//!
//! Maps normalized tokens to the set of document IDs whose title or body
//! contains them. Ranking is exact term overlap:
//!
//! 1. Tokenize the query (see [`tokenize`]). If no token survives, return
//!    the first `max_results` indexed documents in insertion order.
//! 2. For each distinct query token, add `title_weight` to every document in
//!    its title posting set and `body_weight` to every document in its body
//!    posting set.
//! 3. Sort by score (desc), then id (asc). Truncate to `max_results`.
//!
//! There is no length normalization and no idf weighting.

use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};

/// Tokens of this many characters or fewer are never indexed.
pub const MIN_TOKEN_CHARS: usize = 3;

/// Which table a piece of text is indexed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Body,
}

/// Ranking parameters for [`InvertedIndex::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub max_results: usize,
    pub title_weight: u32,
    pub body_weight: u32,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_results: 10,
            title_weight: 2,
            body_weight: 1,
        }
    }
}

/// A document ID with its accumulated overlap score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoredId {
    pub id: String,
    pub score: u32,
}

/// Split text into lowercase alphanumeric tokens longer than two characters.
///
/// Non-alphanumeric characters are deleted rather than treated as
/// separators (`"don't"` becomes `"dont"`); whitespace separates tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
        .map(str::to_string)
        .collect()
}

/// Token → document-ID posting sets for titles and bodies.
#[derive(Debug, Default, Clone)]
pub struct InvertedIndex {
    title: HashMap<String, HashSet<String>>,
    body: HashMap<String, HashSet<String>>,
    /// Every indexed document ID, in first-seen order.
    order: Vec<String>,
    seen: HashSet<String>,
}

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` to the posting set of every token in `text` under `field`.
    ///
    /// Indexing the same `(field, id, text)` again changes nothing.
    pub fn index(&mut self, field: Field, id: &str, text: &str) {
        if self.seen.insert(id.to_string()) {
            self.order.push(id.to_string());
        }
        let table = match field {
            Field::Title => &mut self.title,
            Field::Body => &mut self.body,
        };
        for token in tokenize(text) {
            table.entry(token).or_default().insert(id.to_string());
        }
    }

    /// Rank documents by weighted term overlap with `query`.
    pub fn search(&self, query: &str, opts: &SearchOptions) -> Vec<ScoredId> {
        let tokens: BTreeSet<String> = tokenize(query).into_iter().collect();

        if tokens.is_empty() {
            return self
                .order
                .iter()
                .take(opts.max_results)
                .map(|id| ScoredId {
                    id: id.clone(),
                    score: 0,
                })
                .collect();
        }

        let mut scores: HashMap<&str, u32> = HashMap::new();
        for token in &tokens {
            if let Some(ids) = self.title.get(token) {
                for id in ids {
                    let score = scores.entry(id.as_str()).or_insert(0);
                    *score = score.saturating_add(opts.title_weight);
                }
            }
            if let Some(ids) = self.body.get(token) {
                for id in ids {
                    let score = scores.entry(id.as_str()).or_insert(0);
                    *score = score.saturating_add(opts.body_weight);
                }
            }
        }

        let mut results: Vec<ScoredId> = scores
            .into_iter()
            .filter(|(_, score)| *score > 0)
            .map(|(id, score)| ScoredId {
                id: id.to_string(),
                score,
            })
            .collect();

        results.sort_by(|a, b| b.score.cmp(&a.score).then(a.id.cmp(&b.id)));
        results.truncate(opts.max_results);
        results
    }

    /// Posting set for `token` under `field`, if any document contains it.
    pub fn postings(&self, field: Field, token: &str) -> Option<&HashSet<String>> {
        match field {
            Field::Title => self.title.get(token),
            Field::Body => self.body.get(token),
        }
    }

    /// Number of distinct tokens in the given table.
    pub fn term_count(&self, field: Field) -> usize {
        match field {
            Field::Title => self.title.len(),
            Field::Body => self.body.len(),
        }
    }

    pub fn document_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
