//! Language-model collaborator boundary.
//!
//! Retrieval only needs two capabilities from a model: cut a query-focused
//! excerpt out of a text, and judge whether a text answers a query. The
//! index and search paths never go through this trait.
//!
//! [`LexicalModel`] is a deterministic stand-in built on token overlap. It
//! is what the CLI and server use when no model service is wired in.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tree_harness_core::index::tokenize;
use tree_harness_core::snippet::preview;

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// A short passage of `text` relevant to `query`.
    async fn excerpt(&self, text: &str, query: &str) -> Result<String>;

    /// Whether `text` is likely enough to answer `query` on its own.
    async fn is_relevant(&self, text: &str, query: &str) -> Result<bool>;
}

/// Token-overlap stand-in for a real model.
#[derive(Debug, Clone)]
pub struct LexicalModel {
    pub excerpt_chars: usize,
    /// Fraction of distinct query tokens that must appear in the text.
    pub min_coverage: f64,
}

impl Default for LexicalModel {
    fn default() -> Self {
        Self {
            excerpt_chars: 600,
            min_coverage: 0.5,
        }
    }
}

#[async_trait]
impl LanguageModel for LexicalModel {
    async fn excerpt(&self, text: &str, query: &str) -> Result<String> {
        Ok(preview(text, query, self.excerpt_chars))
    }

    async fn is_relevant(&self, text: &str, query: &str) -> Result<bool> {
        let wanted: HashSet<String> = tokenize(query).into_iter().collect();
        if wanted.is_empty() {
            return Ok(false);
        }
        let present: HashSet<String> = tokenize(text).into_iter().collect();
        let hits = wanted.iter().filter(|t| present.contains(*t)).count();
        Ok(hits as f64 / wanted.len() as f64 >= self.min_coverage)
    }
}
