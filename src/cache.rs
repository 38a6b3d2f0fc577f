//! Document cache: bulk load, inverted index, and hierarchy in one snapshot.
//!
//! The cache mirrors the remote corpus in memory. Each load builds a fresh
//! [`Generation`] (documents, index, hierarchy, counters) off to the side
//! and swaps it in with one pointer store, so readers always see either
//! the previous generation or the complete new one.
//!
//! # Lifecycle
//!
//! ```text
//! uninitialized ──initialize()──▶ loading ──▶ ready
//!                                   ▲           │
//!                                   └─refresh()─┘
//! ```
//!
//! Loads are single-flight. A second `initialize()`/`refresh()` while a
//! load is running returns [`LoadOutcome::AlreadyLoading`] immediately.
//! The loading flag is owned by a guard, so a load that errors out or whose
//! task is cancelled still clears it and installs nothing.
//!
//! # Load order
//!
//! 1. Configured known collections and their items.
//! 2. Full paginated enumeration of pages and collections, skipping IDs
//!    already handled in this pass, with a pause between listing pages.
//! 3. Every page is flattened at `flatten_depth`, indexed by title and
//!    body, and linked into the hierarchy (its parent, plus the nested
//!    pages and collections found while flattening).
//! 4. Every collection has its title indexed and its items enumerated,
//!    flattened, and indexed the same way.
//!
//! A failure on one document is logged and that document is skipped. A
//! failure of the enumeration itself aborts the load.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tree_harness_core::hierarchy::HierarchyGraph;
use tree_harness_core::index::{Field, InvertedIndex, ScoredId, SearchOptions};
use tree_harness_core::models::{CollectionQuery, Document, DocumentFilter, DocumentKind};
use tree_harness_core::source::ContentSource;

use crate::config::Config;
use crate::hierarchy::HierarchyResolver;
use crate::tree::flatten_document;

/// Failures a cache caller has to tell apart.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("content source is not configured (missing API token)")]
    NotConfigured,
    #[error("a cache load is already in progress")]
    Conflict,
    #[error("cache load failed: {0}")]
    Load(String),
}

/// Result of a call to [`DocumentCache::initialize`] or
/// [`DocumentCache::refresh`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A new generation was installed.
    Completed {
        documents: usize,
        collections: usize,
    },
    /// Another load was in flight; nothing was started.
    AlreadyLoading,
    /// `initialize()` found the cache already loaded.
    AlreadyInitialized,
}

/// Snapshot returned by [`DocumentCache::status`].
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub initialized: bool,
    pub loading: bool,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub document_count: usize,
    pub collection_count: usize,
    pub indexed_title_term_count: usize,
    pub indexed_body_term_count: usize,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub flatten_depth: usize,
    pub page_delay: Duration,
    pub known_collections: Vec<String>,
    /// `None` disables the background refresh loop.
    pub refresh_interval: Option<Duration>,
    pub search: SearchOptions,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            flatten_depth: 5,
            page_delay: Duration::from_millis(100),
            known_collections: Vec::new(),
            refresh_interval: Some(Duration::from_secs(3600)),
            search: SearchOptions::default(),
        }
    }
}

impl CacheSettings {
    pub fn from_config(config: &Config) -> Self {
        let interval = config.cache.refresh_interval_secs;
        Self {
            flatten_depth: config.cache.flatten_depth,
            page_delay: Duration::from_millis(config.source.page_delay_ms),
            known_collections: config.source.known_collections.clone(),
            refresh_interval: (interval > 0).then(|| Duration::from_secs(interval)),
            search: SearchOptions {
                max_results: config.retrieval.max_results,
                title_weight: config.retrieval.title_weight,
                body_weight: config.retrieval.body_weight,
            },
        }
    }
}

/// One complete, immutable load of the corpus.
///
/// Only the hierarchy is mutable after installation: lazily discovered
/// edges are memoized into it and vanish with the generation.
#[derive(Debug, Default)]
pub struct Generation {
    documents: HashMap<String, Document>,
    index: InvertedIndex,
    hierarchy: RwLock<HierarchyGraph>,
    collection_count: usize,
    built_at: Option<DateTime<Utc>>,
}

impl Generation {
    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.get(id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn hierarchy(&self) -> &RwLock<HierarchyGraph> {
        &self.hierarchy
    }

    pub fn built_at(&self) -> Option<DateTime<Utc>> {
        self.built_at
    }
}

/// Clears the loading flag when dropped.
struct LoadGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

pub struct DocumentCache {
    source: Arc<dyn ContentSource>,
    settings: CacheSettings,
    current: RwLock<Arc<Generation>>,
    loading: Arc<AtomicBool>,
}

impl DocumentCache {
    pub fn new(source: Arc<dyn ContentSource>, settings: CacheSettings) -> Self {
        Self {
            source,
            settings,
            current: RwLock::new(Arc::new(Generation::default())),
            loading: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn source(&self) -> &Arc<dyn ContentSource> {
        &self.source
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// The generation currently installed. Holding the returned `Arc` keeps
    /// that generation alive across a concurrent swap.
    pub fn snapshot(&self) -> Arc<Generation> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// True once a load has completed.
    pub fn is_ready(&self) -> bool {
        self.snapshot().built_at.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// Ranked search over the current generation. Empty before the first
    /// load completes.
    pub fn search(&self, query: &str) -> Vec<ScoredId> {
        self.snapshot().index.search(query, &self.settings.search)
    }

    /// The cached document, if present in the current generation.
    pub fn get_content(&self, id: &str) -> Option<Document> {
        self.snapshot().documents.get(id).cloned()
    }

    /// A lazy hierarchy resolver over `generation`'s graph.
    pub fn resolver<'a>(
        &'a self,
        generation: &'a Generation,
    ) -> HierarchyResolver<'a, dyn ContentSource> {
        HierarchyResolver::new(self.source.as_ref(), generation.hierarchy())
    }

    pub fn status(&self) -> CacheStatus {
        let generation = self.snapshot();
        CacheStatus {
            initialized: generation.built_at.is_some(),
            loading: self.is_loading(),
            last_refresh_time: generation.built_at,
            document_count: generation.documents.len(),
            collection_count: generation.collection_count,
            indexed_title_term_count: generation.index.term_count(Field::Title),
            indexed_body_term_count: generation.index.term_count(Field::Body),
        }
    }

    /// First load. A no-op once the cache is ready.
    pub async fn initialize(&self) -> Result<LoadOutcome, CacheError> {
        if self.is_ready() {
            return Ok(LoadOutcome::AlreadyInitialized);
        }
        self.refresh().await
    }

    /// Build and install a new generation.
    pub async fn refresh(&self) -> Result<LoadOutcome, CacheError> {
        match self.try_begin() {
            Ok(guard) => self.load(guard).await,
            Err(CacheError::Conflict) => {
                debug!("load requested while another is in flight");
                Ok(LoadOutcome::AlreadyLoading)
            }
            Err(e) => Err(e),
        }
    }

    /// Start a refresh in a background task.
    ///
    /// The loading flag is claimed before this returns, so a caller gets
    /// [`CacheError::Conflict`] synchronously when a load is already running.
    pub fn begin_refresh(
        self: &Arc<Self>,
    ) -> Result<JoinHandle<Result<LoadOutcome, CacheError>>, CacheError> {
        let guard = self.try_begin()?;
        let cache = Arc::clone(self);
        Ok(tokio::spawn(async move { cache.load(guard).await }))
    }

    /// Refresh every `refresh_interval` for as long as the task lives.
    /// Returns `None` when periodic refresh is disabled.
    pub fn spawn_refresh_loop(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let period = self.settings.refresh_interval?;
        let cache = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match cache.refresh().await {
                    Ok(LoadOutcome::Completed { documents, .. }) => {
                        info!(documents, "scheduled refresh complete");
                    }
                    Ok(_) => debug!("scheduled refresh skipped"),
                    Err(e) => warn!(error = %e, "scheduled refresh failed"),
                }
            }
        }))
    }

    fn try_begin(&self) -> Result<LoadGuard, CacheError> {
        if !self.source.is_configured() {
            return Err(CacheError::NotConfigured);
        }
        self.loading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CacheError::Conflict)?;
        Ok(LoadGuard {
            flag: Arc::clone(&self.loading),
        })
    }

    async fn load(&self, _guard: LoadGuard) -> Result<LoadOutcome, CacheError> {
        let started = Instant::now();
        info!("cache load started");

        let generation = self.build_generation().await.map_err(|e| {
            warn!(error = %format!("{:#}", e), "cache load aborted; keeping previous generation");
            CacheError::Load(format!("{:#}", e))
        })?;

        let documents = generation.documents.len();
        let collections = generation.collection_count;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(generation);

        info!(
            documents,
            collections,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cache generation installed"
        );
        Ok(LoadOutcome::Completed {
            documents,
            collections,
        })
    }

    async fn build_generation(&self) -> anyhow::Result<Generation> {
        let mut builder = GenerationBuilder::default();

        for id in &self.settings.known_collections {
            if !builder.claim(id) {
                continue;
            }
            let collection = match self.source.get_document(id).await {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(id = %id, error = %e, "known collection metadata unavailable");
                    Document::new(id.as_str(), "", DocumentKind::Collection)
                }
            };
            self.load_collection(&mut builder, collection).await;
        }

        let mut cursor: Option<String> = None;
        let mut listing_pages = 0usize;
        loop {
            let page = self
                .source
                .list_documents(DocumentFilter::All, cursor.as_deref())
                .await
                .with_context(|| format!("listing documents (page {})", listing_pages + 1))?;
            listing_pages += 1;

            for doc in page.documents {
                if !builder.claim(&doc.id) {
                    debug!(id = %doc.id, "already loaded in this pass");
                    continue;
                }
                match doc.kind {
                    DocumentKind::Page => self.load_page(&mut builder, doc).await,
                    DocumentKind::Collection => self.load_collection(&mut builder, doc).await,
                }
            }

            match page.next_cursor {
                Some(next) => {
                    cursor = Some(next);
                    if !self.settings.page_delay.is_zero() {
                        tokio::time::sleep(self.settings.page_delay).await;
                    }
                }
                None => break,
            }
        }

        debug!(listing_pages, "enumeration complete");
        Ok(builder.finish())
    }

    async fn load_page(&self, builder: &mut GenerationBuilder, mut doc: Document) {
        match flatten_document(self.source.as_ref(), &doc.id, self.settings.flatten_depth).await {
            Ok(flat) => {
                let children: Vec<String> = flat.child_documents.into_iter().map(|c| c.id).collect();
                builder.graph.record_children(&doc.id, &children);
                doc.body = flat.text;
                builder.insert(doc);
            }
            Err(e) => {
                warn!(id = %doc.id, error = %e, "skipping document");
            }
        }
    }

    async fn load_collection(&self, builder: &mut GenerationBuilder, collection: Document) {
        let collection_id = collection.id.clone();
        builder.collections += 1;
        builder.insert(collection);

        let query = CollectionQuery::default();
        let mut cursor: Option<String> = None;
        let mut item_ids: Vec<String> = Vec::new();
        let mut items: Vec<Document> = Vec::new();
        loop {
            let page = match self
                .source
                .query_collection(&collection_id, &query, cursor.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    warn!(id = %collection_id, error = %e, "collection query failed; keeping items seen so far");
                    break;
                }
            };
            for item in page.documents {
                item_ids.push(item.id.clone());
                if builder.claim(&item.id) {
                    items.push(item);
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        builder.graph.record_children(&collection_id, &item_ids);
        for item in items {
            self.load_page(builder, item).await;
        }
    }
}

#[derive(Default)]
struct GenerationBuilder {
    documents: HashMap<String, Document>,
    index: InvertedIndex,
    graph: HierarchyGraph,
    collections: usize,
    claimed: HashSet<String>,
}

impl GenerationBuilder {
    /// Mark `id` as handled in this pass. False if it already was.
    fn claim(&mut self, id: &str) -> bool {
        self.claimed.insert(id.to_string())
    }

    fn insert(&mut self, doc: Document) {
        self.index.index(Field::Title, &doc.id, &doc.title);
        if !doc.body.is_empty() {
            self.index.index(Field::Body, &doc.id, &doc.body);
        }
        self.graph.mark_parent_known(&doc.id);
        if let Some(parent) = &doc.parent_id {
            self.graph.add_edge(&doc.id, parent);
        }
        self.documents.insert(doc.id.clone(), doc);
    }

    fn finish(self) -> Generation {
        Generation {
            documents: self.documents,
            index: self.index,
            hierarchy: RwLock::new(self.graph),
            collection_count: self.collections,
            built_at: Some(Utc::now()),
        }
    }
}
