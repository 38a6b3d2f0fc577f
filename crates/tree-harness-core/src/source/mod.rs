//! Remote content source abstraction.
//!
//! The [`ContentSource`] trait is the boundary between Tree Harness and the
//! hierarchical content service it mirrors. Implementations normalize their
//! payloads into [`Document`] and [`ContentNode`] before returning them.
//!
//! Implementations must be `Send + Sync` to work with async runtimes. Every
//! call may fail transiently; callers decide the granularity at which a
//! failure is skipped.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CollectionQuery, Document, DocumentFilter, DocumentPage, NodePage};

/// Largest page size any listing call may request.
pub const MAX_PAGE_SIZE: usize = 100;

/// Abstract remote backend for Tree Harness.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list_documents`](ContentSource::list_documents) | Paginated corpus enumeration |
/// | [`get_document`](ContentSource::get_document) | Metadata for one document |
/// | [`list_children`](ContentSource::list_children) | Child content nodes of a node |
/// | [`query_collection`](ContentSource::query_collection) | Items of a collection |
/// | [`search`](ContentSource::search) | Remote title search |
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Whether credentials are present. Unconfigured sources are never
    /// called; the cache fails fast instead.
    fn is_configured(&self) -> bool {
        true
    }

    /// List one page of documents, starting at `cursor`.
    async fn list_documents(
        &self,
        filter: DocumentFilter,
        cursor: Option<&str>,
    ) -> Result<DocumentPage>;

    /// Fetch metadata (no body) for one document.
    async fn get_document(&self, id: &str) -> Result<Document>;

    /// List one page of the direct child nodes of `id`.
    async fn list_children(&self, id: &str, cursor: Option<&str>) -> Result<NodePage>;

    /// List one page of the items of collection `id`.
    async fn query_collection(
        &self,
        id: &str,
        query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<DocumentPage>;

    /// Search documents remotely, returning at most `limit` hits.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>>;
}
