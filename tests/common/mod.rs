//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tree_harness::cache::{CacheSettings, DocumentCache};
use tree_harness::llm::LexicalModel;
use tree_harness::retrieval::{EscalationPolicy, RetrievalService, RetrievalSettings};
use tree_harness_core::models::{
    BlockKind, CollectionQuery, ContentNode, Document, DocumentFilter, DocumentKind, DocumentPage,
    NodePage,
};
use tree_harness_core::source::memory::MemorySource;
use tree_harness_core::source::ContentSource;

/// Wraps a [`MemorySource`] and sleeps before every corpus listing, so a
/// load stays in flight long enough to observe.
pub struct SlowSource {
    pub inner: MemorySource,
    pub delay: Duration,
    listings: AtomicUsize,
}

impl SlowSource {
    pub fn new(inner: MemorySource, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            listings: AtomicUsize::new(0),
        }
    }

    pub fn listings(&self) -> usize {
        self.listings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentSource for SlowSource {
    fn is_configured(&self) -> bool {
        self.inner.is_configured()
    }

    async fn list_documents(
        &self,
        filter: DocumentFilter,
        cursor: Option<&str>,
    ) -> Result<DocumentPage> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.inner.list_documents(filter, cursor).await
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        self.inner.get_document(id).await
    }

    async fn list_children(&self, id: &str, cursor: Option<&str>) -> Result<NodePage> {
        self.inner.list_children(id, cursor).await
    }

    async fn query_collection(
        &self,
        id: &str,
        query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<DocumentPage> {
        self.inner.query_collection(id, query, cursor).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        self.inner.search(query, limit).await
    }
}

pub fn para(id: &str, text: &str) -> ContentNode {
    ContentNode::new(id, BlockKind::Paragraph, text)
}

pub fn page(id: &str, title: &str) -> Document {
    Document::new(id, title, DocumentKind::Page)
}

/// A small handbook:
///
/// ```text
/// root (Handbook)
/// ├── A (People)
/// │   ├── B (Payroll)
/// │   └── C (Leave Policy)
/// └── D (Office)
///     └── E (Parking)
/// contacts (collection): alice, bob
/// ```
pub fn handbook() -> MemorySource {
    let source = MemorySource::new();
    source.add_document(page("root", "Handbook"));
    source.set_content(
        "root",
        vec![
            para("r1", "Welcome to the company handbook."),
            ContentNode::new("A", BlockKind::ChildPage, "People"),
            ContentNode::new("D", BlockKind::ChildPage, "Office"),
        ],
    );
    source.add_document(page("A", "People").with_parent("root"));
    source.set_content(
        "A",
        vec![
            ContentNode::new("B", BlockKind::ChildPage, "Payroll"),
            ContentNode::new("C", BlockKind::ChildPage, "Leave Policy"),
        ],
    );
    source.add_document(page("B", "Payroll").with_parent("A"));
    source.set_content(
        "B",
        vec![
            ContentNode::new("h", BlockKind::Heading { level: 2 }, "Schedule"),
            para("b1", "Salaries are paid on the last business day of the month.")
                .with_children(vec![para("b2", "Bonuses are paid in March.")]),
        ],
    );
    source.add_document(page("C", "Leave Policy").with_parent("A"));
    source.set_content(
        "C",
        vec![para("c1", "Employees must request annual leave two weeks ahead.")],
    );
    source.add_document(page("D", "Office").with_parent("root"));
    source.set_content("D", vec![ContentNode::new("E", BlockKind::ChildPage, "Parking")]);
    source.add_document(page("E", "Parking").with_parent("D"));
    source.set_content("E", vec![para("e1", "Parking badges are issued at reception.")]);

    source.add_document(Document::new("contacts", "Team Contacts", DocumentKind::Collection));
    for (id, name) in [("alice", "Alice Smith"), ("bob", "Bob Jones")] {
        source.add_collection_item("contacts", page(id, name));
        source.set_content(id, vec![para(&format!("{}-1", id), "Phone extension 4411.")]);
    }
    source
}

pub fn cache_settings() -> CacheSettings {
    CacheSettings {
        page_delay: Duration::ZERO,
        ..CacheSettings::default()
    }
}

pub fn service_over(source: Arc<dyn ContentSource>, policy: EscalationPolicy) -> Arc<RetrievalService> {
    let cache = Arc::new(DocumentCache::new(source, cache_settings()));
    Arc::new(RetrievalService::new(
        cache,
        Arc::new(LexicalModel::default()),
        policy,
        RetrievalSettings::default(),
    ))
}
