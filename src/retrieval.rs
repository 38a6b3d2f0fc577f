//! Two-stage retrieval.
//!
//! Stage 1 ([`RetrievalService::find_candidates`]) is cheap: it gathers a
//! handful of candidates and gives each a short preview and a breadcrumb.
//! Stage 2 ([`RetrievalService::get_detail`]) is expensive: full content
//! for one document plus its hierarchy neighbours.
//!
//! Candidates come from an ordered chain of strategies, each of which may
//! decline to run:
//!
//! | Strategy | Runs when | Contributes |
//! |----------|-----------|-------------|
//! | cache index | the cache is ready | ranked local hits |
//! | remote search | fewer than `target_candidates` so far | the shortfall |
//! | popular | still nothing | most retrieved documents |
//!
//! Retrieval never fails. Remote errors are logged and degrade the result
//! (empty preview, `"Unknown path"` breadcrumb, missing detail).
//! [`CandidateSet::NoCandidates`] is an answer, not an error: every
//! strategy that ran succeeded and none matched. When nothing was found and
//! a strategy failed, the result is [`CandidateSet::Degraded`] instead.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use tree_harness_core::classify::{classify, DocumentType};
use tree_harness_core::frequency::AccessTracker;
use tree_harness_core::index::SearchOptions;
use tree_harness_core::models::{document_url, Document, DocumentKind, UNTITLED};
use tree_harness_core::snippet::preview;

use crate::cache::{DocumentCache, Generation};
use crate::config::Config;
use crate::llm::{LanguageModel, LexicalModel};
use crate::tree::flatten_document;

/// Breadcrumb shown when no title on the path could be resolved.
pub const UNKNOWN_PATH: &str = "Unknown path";

const BREADCRUMB_SEPARATOR: &str = " > ";

#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    pub target_candidates: usize,
    pub preview_depth: usize,
    pub preview_chars: usize,
    pub detail_depth: usize,
    pub related_limit: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            target_candidates: 5,
            preview_depth: 1,
            preview_chars: 300,
            detail_depth: 3,
            related_limit: 3,
        }
    }
}

impl RetrievalSettings {
    pub fn from_config(config: &Config) -> Self {
        let r = &config.retrieval;
        Self {
            target_candidates: r.target_candidates,
            preview_depth: r.preview_depth,
            preview_chars: r.preview_chars,
            detail_depth: r.detail_depth,
            related_limit: r.related_limit,
        }
    }
}

/// Decides whether stage 1 was enough or the top candidate needs stage 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationPolicy {
    Always,
    Never,
    /// Escalate when the top candidate scored below the threshold.
    ScoreBelow(u32),
    /// Ask the language model whether the top preview suffices.
    Judge,
}

impl EscalationPolicy {
    /// Parse `always`, `never`, `judge`, or `score_below:<n>`.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim() {
            "always" => Ok(Self::Always),
            "never" => Ok(Self::Never),
            "judge" => Ok(Self::Judge),
            other => match other.strip_prefix("score_below:") {
                Some(n) => match n.trim().parse::<u32>() {
                    Ok(n) => Ok(Self::ScoreBelow(n)),
                    Err(_) => bail!("invalid score_below threshold: '{}'", n),
                },
                None => bail!(
                    "unknown escalation policy '{}' (expected always, never, judge, or score_below:<n>)",
                    other
                ),
            },
        }
    }
}

impl fmt::Display for EscalationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "always"),
            Self::Never => write!(f, "never"),
            Self::Judge => write!(f, "judge"),
            Self::ScoreBelow(n) => write!(f, "score_below:{}", n),
        }
    }
}

/// Which strategy produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateOrigin {
    Cache,
    Remote,
    Popular,
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub url: String,
    pub score: u32,
    pub origin: CandidateOrigin,
    pub preview: String,
    pub breadcrumb: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CandidateSet {
    Found { candidates: Vec<Candidate> },
    NoCandidates,
    /// Nothing found, but a remote lookup failed along the way.
    Degraded,
}

impl CandidateSet {
    pub fn candidates(&self) -> &[Candidate] {
        match self {
            Self::Found { candidates } => candidates,
            Self::NoCandidates | Self::Degraded => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RelatedDocument {
    pub id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    pub id: String,
    pub title: String,
    pub url: String,
    pub kind: DocumentKind,
    pub content: String,
    pub breadcrumb: String,
    pub related: Vec<RelatedDocument>,
    pub document_type: DocumentType,
    /// Whether the content came from the cache rather than a live fetch.
    pub from_cache: bool,
    /// Query-focused passage, when a query was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub query: String,
    pub policy: String,
    pub candidates: CandidateSet,
    pub escalated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<DocumentDetail>,
    /// Passage for the caller to answer from; `None` without candidates.
    pub excerpt: Option<String>,
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    CacheIndex,
    RemoteSearch,
    Popular,
}

const STAGE_ONE: [Strategy; 3] = [Strategy::CacheIndex, Strategy::RemoteSearch, Strategy::Popular];

enum StrategyOutcome {
    Skipped,
    Hits(Vec<Hit>),
    Failed,
}

/// A candidate before its preview and breadcrumb are built.
struct Hit {
    id: String,
    score: u32,
    origin: CandidateOrigin,
    document: Option<Document>,
}

pub struct RetrievalService {
    cache: Arc<DocumentCache>,
    tracker: AccessTracker,
    model: Arc<dyn LanguageModel>,
    policy: EscalationPolicy,
    settings: RetrievalSettings,
}

impl RetrievalService {
    pub fn new(
        cache: Arc<DocumentCache>,
        model: Arc<dyn LanguageModel>,
        policy: EscalationPolicy,
        settings: RetrievalSettings,
    ) -> Self {
        Self {
            cache,
            tracker: AccessTracker::new(),
            model,
            policy,
            settings,
        }
    }

    /// A service over `cache` using the lexical stand-in model and the
    /// configured escalation policy.
    pub fn from_config(cache: Arc<DocumentCache>, config: &Config) -> Result<Self> {
        let policy = EscalationPolicy::parse(&config.retrieval.escalation)?;
        Ok(Self::new(
            cache,
            Arc::new(LexicalModel::default()),
            policy,
            RetrievalSettings::from_config(config),
        ))
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn tracker(&self) -> &AccessTracker {
        &self.tracker
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    // ============ Stage 1 ============

    pub async fn find_candidates(&self, query: &str) -> CandidateSet {
        let generation = self.cache.snapshot();
        let target = self.settings.target_candidates;

        let mut hits: Vec<Hit> = Vec::new();
        let mut failed = false;
        for strategy in STAGE_ONE {
            if hits.len() >= target {
                break;
            }
            let found = match self.run_strategy(strategy, query, &hits, &generation).await {
                StrategyOutcome::Hits(found) => found,
                StrategyOutcome::Skipped => continue,
                StrategyOutcome::Failed => {
                    failed = true;
                    continue;
                }
            };
            debug!(?strategy, found = found.len(), "stage 1 strategy");
            for hit in found {
                if hits.len() >= target {
                    break;
                }
                if !hits.iter().any(|h| h.id == hit.id) {
                    hits.push(hit);
                }
            }
        }

        if hits.is_empty() {
            return if failed {
                CandidateSet::Degraded
            } else {
                CandidateSet::NoCandidates
            };
        }

        let mut candidates = Vec::with_capacity(hits.len());
        for hit in hits {
            candidates.push(self.build_candidate(hit, query, &generation).await);
        }
        CandidateSet::Found { candidates }
    }

    async fn run_strategy(
        &self,
        strategy: Strategy,
        query: &str,
        have: &[Hit],
        generation: &Generation,
    ) -> StrategyOutcome {
        match strategy {
            Strategy::CacheIndex => {
                if generation.built_at().is_none() {
                    return StrategyOutcome::Skipped;
                }
                let options = SearchOptions {
                    max_results: self.settings.target_candidates,
                    ..self.cache.settings().search.clone()
                };
                let hits = generation
                    .index()
                    .search(query, &options)
                    .into_iter()
                    .map(|s| Hit {
                        document: generation.document(&s.id).cloned(),
                        id: s.id,
                        score: s.score,
                        origin: CandidateOrigin::Cache,
                    })
                    .collect();
                StrategyOutcome::Hits(hits)
            }
            Strategy::RemoteSearch => {
                let source = self.cache.source();
                if !source.is_configured() {
                    return StrategyOutcome::Skipped;
                }
                // Duplicates of earlier hits are dropped, so ask for a full set.
                let limit = self.settings.target_candidates;
                match source.search(query, limit).await {
                    Ok(docs) => StrategyOutcome::Hits(
                        docs.into_iter()
                            .filter(|d| !have.iter().any(|h| h.id == d.id))
                            .map(|d| Hit {
                                id: d.id.clone(),
                                score: 0,
                                origin: CandidateOrigin::Remote,
                                document: Some(generation.document(&d.id).cloned().unwrap_or(d)),
                            })
                            .collect(),
                    ),
                    Err(e) => {
                        warn!(error = %e, "remote search failed");
                        StrategyOutcome::Failed
                    }
                }
            }
            Strategy::Popular => {
                if !have.is_empty() {
                    return StrategyOutcome::Skipped;
                }
                let popular = self.tracker.most_frequent(self.settings.target_candidates);
                StrategyOutcome::Hits(
                    popular
                        .into_iter()
                        .map(|(id, _)| Hit {
                            document: generation.document(&id).cloned(),
                            id,
                            score: 0,
                            origin: CandidateOrigin::Popular,
                        })
                        .collect(),
                )
            }
        }
    }

    async fn build_candidate(&self, hit: Hit, query: &str, generation: &Generation) -> Candidate {
        let cached = generation.document(&hit.id);
        let preview_text = match cached {
            Some(doc) => preview(&doc.body, query, self.settings.preview_chars),
            None => self.live_preview(&hit.id, query).await,
        };

        let document = match hit.document {
            Some(doc) => Some(doc),
            None => self.fetch_metadata(&hit.id).await,
        };
        let (title, url) = match &document {
            Some(doc) => (doc.display_title().to_string(), doc.url.clone()),
            None => (UNTITLED.to_string(), document_url(&hit.id)),
        };

        let breadcrumb = self.breadcrumb(&hit.id, generation).await;
        self.tracker.record(&hit.id);

        Candidate {
            id: hit.id,
            title,
            url,
            score: hit.score,
            origin: hit.origin,
            preview: preview_text,
            breadcrumb,
        }
    }

    /// Shallow fetch used only to preview an uncached document.
    async fn live_preview(&self, id: &str, query: &str) -> String {
        let source = self.cache.source();
        if !source.is_configured() {
            return String::new();
        }
        match flatten_document(source.as_ref(), id, self.settings.preview_depth).await {
            Ok(flat) => preview(&flat.text, query, self.settings.preview_chars),
            Err(e) => {
                debug!(id, error = %e, "preview fetch failed");
                String::new()
            }
        }
    }

    async fn fetch_metadata(&self, id: &str) -> Option<Document> {
        let source = self.cache.source();
        if !source.is_configured() {
            return None;
        }
        match source.get_document(id).await {
            Ok(doc) => Some(doc),
            Err(e) => {
                debug!(id, error = %e, "metadata fetch failed");
                None
            }
        }
    }

    /// Title of `id`, cache first, then the remote source.
    async fn resolve_title(&self, id: &str, generation: &Generation) -> Option<String> {
        if let Some(doc) = generation.document(id) {
            return Some(doc.display_title().to_string());
        }
        self.fetch_metadata(id)
            .await
            .map(|doc| doc.display_title().to_string())
    }

    /// Titles from the outermost ancestor down to `id`, joined by `" > "`.
    async fn breadcrumb(&self, id: &str, generation: &Generation) -> String {
        let path = self.cache.resolver(generation).path_to_root(id).await;
        let mut titles = Vec::with_capacity(path.len());
        for step in &path {
            if let Some(title) = self.resolve_title(step, generation).await {
                titles.push(title);
            }
        }
        if titles.is_empty() {
            UNKNOWN_PATH.to_string()
        } else {
            titles.join(BREADCRUMB_SEPARATOR)
        }
    }

    // ============ Stage 2 ============

    /// Full content, neighbours, and a type tag for one document. `None`
    /// when the document is neither cached nor fetchable.
    pub async fn get_detail(&self, id: &str, query: Option<&str>) -> Option<DocumentDetail> {
        let generation = self.cache.snapshot();

        let (document, from_cache) = match generation.document(id) {
            Some(doc) => (doc.clone(), true),
            None => (self.fetch_uncached(id).await?, false),
        };

        let resolver = self.cache.resolver(&generation);
        let mut related = Vec::new();
        for related_id in resolver.related(id, self.settings.related_limit).await {
            let title = self
                .resolve_title(&related_id, &generation)
                .await
                .unwrap_or_else(|| UNTITLED.to_string());
            related.push(RelatedDocument {
                url: document_url(&related_id),
                id: related_id,
                title,
            });
        }

        let breadcrumb = self.breadcrumb(id, &generation).await;
        let document_type = classify(&document.title, &document.body);
        let excerpt = query.map(|q| preview(&document.body, q, self.settings.preview_chars));
        self.tracker.record(id);

        Some(DocumentDetail {
            id: document.id.clone(),
            title: document.display_title().to_string(),
            url: document.url,
            kind: document.kind,
            content: document.body,
            breadcrumb,
            related,
            document_type,
            from_cache,
            excerpt,
        })
    }

    /// Metadata plus a depth-bounded flatten, straight from the source.
    async fn fetch_uncached(&self, id: &str) -> Option<Document> {
        let source = self.cache.source();
        if !source.is_configured() {
            return None;
        }
        let metadata = self.fetch_metadata(id).await;
        match flatten_document(source.as_ref(), id, self.settings.detail_depth).await {
            Ok(flat) => {
                let mut doc =
                    metadata.unwrap_or_else(|| Document::new(id, "", DocumentKind::Page));
                doc.body = flat.text;
                Some(doc)
            }
            Err(e) => {
                debug!(id, error = %e, "detail fetch failed");
                metadata
            }
        }
    }

    // ============ Answer flow ============

    /// Stage 1, then stage 2 on the top candidate if the policy says so.
    pub async fn answer(&self, query: &str) -> Answer {
        let candidates = self.find_candidates(query).await;
        let Some(top) = candidates.candidates().first().cloned() else {
            return Answer {
                query: query.to_string(),
                policy: self.policy.to_string(),
                candidates,
                escalated: false,
                detail: None,
                excerpt: None,
            };
        };

        let escalate = self.should_escalate(&top, query).await;
        let detail = if escalate {
            self.get_detail(&top.id, Some(query)).await
        } else {
            None
        };

        let source_text = detail
            .as_ref()
            .map(|d| d.content.as_str())
            .unwrap_or(top.preview.as_str());
        let excerpt = match self.model.excerpt(source_text, query).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "model excerpt failed; using preview");
                top.preview.clone()
            }
        };

        Answer {
            query: query.to_string(),
            policy: self.policy.to_string(),
            candidates,
            escalated: escalate,
            detail,
            excerpt: Some(excerpt),
        }
    }

    async fn should_escalate(&self, top: &Candidate, query: &str) -> bool {
        match self.policy {
            EscalationPolicy::Always => true,
            EscalationPolicy::Never => false,
            EscalationPolicy::ScoreBelow(threshold) => top.score < threshold,
            EscalationPolicy::Judge => match self.model.is_relevant(&top.preview, query).await {
                Ok(sufficient) => !sufficient,
                Err(e) => {
                    warn!(error = %e, "relevance judgement failed; escalating");
                    true
                }
            },
        }
    }
}
