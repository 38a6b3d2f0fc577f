//! Lazy hierarchy discovery on top of [`HierarchyGraph`].
//!
//! The graph only knows what has been recorded. [`HierarchyResolver`] fills
//! the gaps on demand: a missing child list is fetched by listing the node's
//! children on the remote source (keeping only nested pages and
//! collections), and a missing parent is fetched from the document's
//! metadata. Both results are memoized in the graph, including "no parent"
//! for documents whose metadata names none.
//!
//! Hierarchy data is best-effort. Remote failures are logged and treated as
//! "no children" / "no parent"; they are never returned to the caller.

use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};
use tracing::{debug, warn};
use tree_harness_core::hierarchy::HierarchyGraph;
use tree_harness_core::source::ContentSource;

use crate::tree::list_all_children;

/// Upper bound on remote parent lookups during one upward walk.
const MAX_LAZY_PARENT_HOPS: usize = 8;

pub struct HierarchyResolver<'a, S: ?Sized> {
    source: &'a S,
    graph: &'a RwLock<HierarchyGraph>,
}

impl<'a, S> HierarchyResolver<'a, S>
where
    S: ContentSource + ?Sized,
{
    pub fn new(source: &'a S, graph: &'a RwLock<HierarchyGraph>) -> Self {
        Self { source, graph }
    }

    /// Known children of `id`, if its full list has been recorded.
    fn recorded_children(&self, id: &str) -> Option<Vec<String>> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        graph.is_listed(id).then(|| graph.children(id).to_vec())
    }

    /// `Some(parent)` when the graph already has the answer.
    fn recorded_parent(&self, id: &str) -> Option<Option<String>> {
        let graph = self.graph.read().unwrap_or_else(PoisonError::into_inner);
        graph
            .is_parent_known(id)
            .then(|| graph.parent(id).map(str::to_string))
    }

    /// Child documents of `id`, fetched and memoized on first use.
    pub async fn children(&self, id: &str) -> Vec<String> {
        if let Some(children) = self.recorded_children(id) {
            return children;
        }
        if !self.source.is_configured() {
            return self.graph.read().unwrap_or_else(PoisonError::into_inner).children(id).to_vec();
        }

        match list_all_children(self.source, id).await {
            Ok(nodes) => {
                let ids: Vec<String> = nodes
                    .into_iter()
                    .filter(|n| n.document_kind().is_some())
                    .map(|n| n.id)
                    .collect();
                let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
                graph.record_children(id, &ids);
                graph.children(id).to_vec()
            }
            Err(e) => {
                warn!(id, error = %e, "child discovery failed; treating as no children");
                self.graph.read().unwrap_or_else(PoisonError::into_inner).children(id).to_vec()
            }
        }
    }

    /// Parent of `id`, looked up remotely and memoized if not yet recorded.
    pub async fn parent(&self, id: &str) -> Option<String> {
        if let Some(parent) = self.recorded_parent(id) {
            return parent;
        }
        if !self.source.is_configured() {
            return None;
        }

        match self.source.get_document(id).await {
            Ok(doc) => {
                let parent = doc.parent_id.filter(|p| p != id);
                let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
                graph.mark_parent_known(id);
                if let Some(parent) = &parent {
                    graph.add_edge(id, parent);
                }
                parent
            }
            Err(e) => {
                debug!(id, error = %e, "parent lookup failed");
                None
            }
        }
    }

    /// Ancestors of `id` (outermost first) followed by `id` itself.
    ///
    /// Unknown parents at the top of the recorded path are looked up
    /// remotely, a bounded number of times.
    pub async fn path_to_root(&self, id: &str) -> Vec<String> {
        let mut tried: HashSet<String> = HashSet::new();
        loop {
            let path = self
                .graph
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .path_to_root(id);
            let Some(top) = path.first().cloned() else {
                return path;
            };
            if tried.len() >= MAX_LAZY_PARENT_HOPS || !tried.insert(top.clone()) {
                return path;
            }
            if self.parent(&top).await.is_none() {
                return path;
            }
        }
    }

    /// Siblings then cousins of `id`, at most `limit`.
    pub async fn related(&self, id: &str, limit: usize) -> Vec<String> {
        let Some(parent) = self.parent(id).await else {
            return Vec::new();
        };

        let siblings = self.children(&parent).await;
        let sibling_count = siblings.iter().filter(|s| s.as_str() != id).count();

        if sibling_count < limit {
            if let Some(grandparent) = self.parent(&parent).await {
                for aunt in self.children(&grandparent).await {
                    if aunt != parent && aunt != id {
                        self.children(&aunt).await;
                    }
                }
            }
        }

        self.graph
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .related(id, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_harness_core::models::{BlockKind, ContentNode, Document, DocumentKind};
    use tree_harness_core::source::memory::MemorySource;

    fn child_page(id: &str, title: &str) -> ContentNode {
        ContentNode::new(id, BlockKind::ChildPage, title)
    }

    #[tokio::test]
    async fn test_children_fetched_once_and_filtered() {
        let source = MemorySource::new();
        source.set_content(
            "root",
            vec![
                child_page("a", "A"),
                ContentNode::new("p", BlockKind::Paragraph, "not a document"),
                ContentNode::new("db", BlockKind::ChildCollection, "Contacts"),
            ],
        );
        let graph = RwLock::new(HierarchyGraph::new());
        let resolver = HierarchyResolver::new(&source, &graph);

        assert_eq!(resolver.children("root").await, vec!["a", "db"]);
        assert_eq!(resolver.children("root").await, vec!["a", "db"]);
        assert_eq!(source.children_requests(), vec!["root"]);
        assert_eq!(graph.read().unwrap().parent("a"), Some("root"));
    }

    #[tokio::test]
    async fn test_failure_means_no_children() {
        let source = MemorySource::new();
        source.fail_on("broken");
        let graph = RwLock::new(HierarchyGraph::new());
        let resolver = HierarchyResolver::new(&source, &graph);
        assert!(resolver.children("broken").await.is_empty());
    }

    #[tokio::test]
    async fn test_parent_backfilled_from_metadata() {
        let source = MemorySource::new();
        source.add_document(Document::new("child", "Child", DocumentKind::Page).with_parent("top"));
        source.add_document(Document::new("top", "Top", DocumentKind::Page));
        let graph = RwLock::new(HierarchyGraph::new());
        let resolver = HierarchyResolver::new(&source, &graph);

        assert_eq!(resolver.path_to_root("child").await, vec!["top", "child"]);
    }

    #[tokio::test]
    async fn test_missing_parent_is_looked_up_once() {
        let source = MemorySource::new();
        source.add_document(Document::new("top", "Top", DocumentKind::Page));
        let graph = RwLock::new(HierarchyGraph::new());
        let resolver = HierarchyResolver::new(&source, &graph);

        assert!(resolver.parent("top").await.is_none());
        assert_eq!(source.call_count(), 1);
        assert!(resolver.parent("top").await.is_none());
        assert_eq!(resolver.path_to_root("top").await, vec!["top"]);
        assert!(resolver.related("top", 3).await.is_empty());
        assert_eq!(source.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_parent_lookup_is_retried() {
        let source = MemorySource::new();
        source.add_document(Document::new("top", "Top", DocumentKind::Page));
        source.fail_on("top");
        let graph = RwLock::new(HierarchyGraph::new());
        let resolver = HierarchyResolver::new(&source, &graph);

        assert!(resolver.parent("top").await.is_none());
        assert!(!graph.read().unwrap().is_parent_known("top"));
    }

    #[tokio::test]
    async fn test_related_discovers_siblings_lazily() {
        let source = MemorySource::new();
        source.add_document(Document::new("B", "B", DocumentKind::Page).with_parent("A"));
        source.set_content("A", vec![child_page("B", "B"), child_page("C", "C")]);

        let graph = RwLock::new(HierarchyGraph::new());
        graph.write().unwrap().add_edge("A", "root");
        let resolver = HierarchyResolver::new(&source, &graph);

        assert_eq!(resolver.related("B", 3).await, vec!["C"]);
        assert_eq!(graph.read().unwrap().parent("C"), Some("A"));
    }

    #[tokio::test]
    async fn test_recorded_child_list_is_not_refetched() {
        let source = MemorySource::new();
        source.set_content("A", vec![child_page("B", "B"), child_page("C", "C")]);
        let graph = RwLock::new(HierarchyGraph::new());
        graph.write().unwrap().record_children("A", &["B".to_string()]);
        let resolver = HierarchyResolver::new(&source, &graph);

        assert!(resolver.related("B", 3).await.is_empty());
        assert!(source.children_requests().is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_source_never_called() {
        let source = MemorySource::unconfigured();
        let graph = RwLock::new(HierarchyGraph::new());
        let resolver = HierarchyResolver::new(&source, &graph);
        assert!(resolver.children("x").await.is_empty());
        assert!(resolver.parent("x").await.is_none());
        assert_eq!(source.call_count(), 0);
    }
}
