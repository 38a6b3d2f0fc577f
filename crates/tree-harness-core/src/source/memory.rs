//! In-memory [`ContentSource`] implementation for testing and demos.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock` for thread safety.
//! Content trees are stored flattened (node ID → direct children) and served
//! one level at a time, like a real remote source. Pagination, unconfigured
//! credentials, and per-ID failures can all be simulated.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::index::tokenize;
use crate::models::{
    CollectionQuery, ContentNode, Document, DocumentFilter, DocumentPage, NodePage,
};

use super::{ContentSource, MAX_PAGE_SIZE};

/// In-memory content source.
pub struct MemorySource {
    documents: RwLock<Vec<Document>>,
    nodes: RwLock<HashMap<String, Vec<ContentNode>>>,
    items: RwLock<HashMap<String, Vec<Document>>>,
    failing: RwLock<HashSet<String>>,
    page_size: usize,
    configured: bool,
    calls: AtomicUsize,
    children_requests: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(Vec::new()),
            nodes: RwLock::new(HashMap::new()),
            items: RwLock::new(HashMap::new()),
            failing: RwLock::new(HashSet::new()),
            page_size: MAX_PAGE_SIZE,
            configured: true,
            calls: AtomicUsize::new(0),
            children_requests: Mutex::new(Vec::new()),
        }
    }

    /// A source that reports missing credentials.
    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    /// Serve listings `size` entries at a time (clamped to `1..=100`).
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Add a document to the corpus listing.
    pub fn add_document(&self, doc: Document) {
        let mut docs = self.documents.write().unwrap();
        docs.retain(|d| d.id != doc.id);
        docs.push(doc);
    }

    pub fn remove_document(&self, id: &str) {
        self.documents.write().unwrap().retain(|d| d.id != id);
    }

    /// Set the content tree of `id`. Nested children are registered under
    /// their own node IDs and served lazily.
    pub fn set_content(&self, id: &str, tree: Vec<ContentNode>) {
        let mut nodes = self.nodes.write().unwrap();
        register(&mut nodes, id, tree);
    }

    /// Add an item to a collection. Items are not part of the corpus
    /// listing unless added there too.
    pub fn add_collection_item(&self, collection_id: &str, item: Document) {
        let mut items = self.items.write().unwrap();
        let list = items.entry(collection_id.to_string()).or_default();
        list.retain(|d| d.id != item.id);
        list.push(item);
    }

    /// Make every call that names `id` fail.
    pub fn fail_on(&self, id: &str) {
        self.failing.write().unwrap().insert(id.to_string());
    }

    /// Undo [`fail_on`](Self::fail_on) for `id`.
    pub fn recover(&self, id: &str) {
        self.failing.write().unwrap().remove(id);
    }

    /// Total number of calls served (including failed ones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// IDs passed to [`list_children`](ContentSource::list_children), in
    /// call order.
    pub fn children_requests(&self) -> Vec<String> {
        self.children_requests.lock().unwrap().clone()
    }

    fn check(&self, id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.read().unwrap().contains(id) {
            bail!("simulated failure for {}", id);
        }
        Ok(())
    }

    fn page<T: Clone>(&self, all: &[T], cursor: Option<&str>) -> Result<(Vec<T>, Option<String>)> {
        let start: usize = match cursor {
            Some(c) => c.parse()?,
            None => 0,
        };
        let end = (start + self.page_size).min(all.len());
        let slice = all.get(start..end).unwrap_or_default().to_vec();
        let next = (end < all.len()).then(|| end.to_string());
        Ok((slice, next))
    }

    fn find_document(&self, id: &str) -> Option<Document> {
        let docs = self.documents.read().unwrap();
        if let Some(d) = docs.iter().find(|d| d.id == id) {
            return Some(d.clone());
        }
        let items = self.items.read().unwrap();
        items
            .values()
            .flat_map(|list| list.iter())
            .find(|d| d.id == id)
            .cloned()
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new()
    }
}

fn register(nodes: &mut HashMap<String, Vec<ContentNode>>, parent: &str, tree: Vec<ContentNode>) {
    let mut level = Vec::with_capacity(tree.len());
    for mut node in tree {
        let children = std::mem::take(&mut node.children);
        node.has_children = node.has_children || !children.is_empty();
        if !children.is_empty() {
            register(nodes, &node.id, children);
        }
        level.push(node);
    }
    nodes.insert(parent.to_string(), level);
}

#[async_trait]
impl ContentSource for MemorySource {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn list_documents(
        &self,
        filter: DocumentFilter,
        cursor: Option<&str>,
    ) -> Result<DocumentPage> {
        self.check("list_documents")?;
        let matching: Vec<Document> = self
            .documents
            .read()
            .unwrap()
            .iter()
            .filter(|d| match filter {
                DocumentFilter::All => true,
                DocumentFilter::Only(kind) => d.kind == kind,
            })
            .cloned()
            .collect();
        let (documents, next_cursor) = self.page(&matching, cursor)?;
        Ok(DocumentPage {
            documents,
            next_cursor,
        })
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        self.check(id)?;
        match self.find_document(id) {
            Some(doc) => Ok(doc),
            None => bail!("document not found: {}", id),
        }
    }

    async fn list_children(&self, id: &str, cursor: Option<&str>) -> Result<NodePage> {
        self.children_requests.lock().unwrap().push(id.to_string());
        self.check(id)?;
        let all = self
            .nodes
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default();
        let (nodes, next_cursor) = self.page(&all, cursor)?;
        Ok(NodePage { nodes, next_cursor })
    }

    async fn query_collection(
        &self,
        id: &str,
        _query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<DocumentPage> {
        self.check(id)?;
        let all = self
            .items
            .read()
            .unwrap()
            .get(id)
            .cloned()
            .unwrap_or_default();
        let (documents, next_cursor) = self.page(&all, cursor)?;
        Ok(DocumentPage {
            documents,
            next_cursor,
        })
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        self.check("search")?;
        let terms = tokenize(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.documents.read().unwrap();
        Ok(docs
            .iter()
            .filter(|d| {
                let title = d.title.to_lowercase();
                terms.iter().any(|t| title.contains(t.as_str()))
            })
            .take(limit)
            .cloned()
            .collect())
    }
}
