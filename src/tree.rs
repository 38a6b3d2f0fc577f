//! Recursive tree flattener.
//!
//! Fetches a document's content tree from a [`ContentSource`] one level at
//! a time, down to an explicit depth bound, then renders it into a single
//! indentation-preserving text blob with
//! [`render_tree`](tree_harness_core::render::render_tree).
//!
//! Top-level nodes are depth 1. Children of a node at depth `d` are only
//! requested when `d < max_depth`, so a node deeper than `max_depth` is
//! never fetched.
//!
//! Nested pages and collections are boundaries: their content belongs to
//! the nested document, so they are rendered as a reference line and never
//! expanded.
//!
//! A failure listing the top level is returned to the caller. A failure
//! listing a nested node's children is logged and that subtree is left
//! empty, so one bad block never loses the rest of the document.

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use tracing::warn;
use tree_harness_core::models::ContentNode;
use tree_harness_core::render::{child_documents, render_tree, ChildDocument};
use tree_harness_core::source::ContentSource;

/// The flattened text of a document plus the nested documents it references.
#[derive(Debug, Clone, Default)]
pub struct Flattened {
    pub text: String,
    pub child_documents: Vec<ChildDocument>,
}

/// Fetch, render, and collect child references for the tree under `id`.
pub async fn flatten_document<S>(source: &S, id: &str, max_depth: usize) -> Result<Flattened>
where
    S: ContentSource + ?Sized,
{
    let tree = fetch_tree(source, id, max_depth).await?;
    Ok(Flattened {
        text: render_tree(&tree, max_depth),
        child_documents: child_documents(&tree),
    })
}

/// Fetch the content tree under `id`, expanding at most `max_depth` levels.
pub async fn fetch_tree<S>(source: &S, id: &str, max_depth: usize) -> Result<Vec<ContentNode>>
where
    S: ContentSource + ?Sized,
{
    if max_depth == 0 {
        return Ok(Vec::new());
    }
    let mut top = list_all_children(source, id).await?;
    for node in &mut top {
        expand(source, node, 1, max_depth).await;
    }
    Ok(top)
}

/// Fill in `node.children` if the node sits above the depth bound.
fn expand<'a, S>(
    source: &'a S,
    node: &'a mut ContentNode,
    depth: usize,
    max_depth: usize,
) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>>
where
    S: ContentSource + ?Sized,
{
    Box::pin(async move {
        if !node.has_children || depth >= max_depth || node.document_kind().is_some() {
            return;
        }
        match list_all_children(source, &node.id).await {
            Ok(children) => {
                node.children = children;
                for child in &mut node.children {
                    expand(source, child, depth + 1, max_depth).await;
                }
            }
            Err(e) => {
                warn!(node = %node.id, error = %e, "skipping subtree");
            }
        }
    })
}

/// List every direct child of `id`, following pagination to the end.
pub async fn list_all_children<S>(source: &S, id: &str) -> Result<Vec<ContentNode>>
where
    S: ContentSource + ?Sized,
{
    let mut all = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = source.list_children(id, cursor.as_deref()).await?;
        all.extend(page.nodes);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_harness_core::models::BlockKind;
    use tree_harness_core::render::truncate_tree;
    use tree_harness_core::source::memory::MemorySource;

    fn para(id: &str, text: &str) -> ContentNode {
        ContentNode::new(id, BlockKind::Paragraph, text)
    }

    fn chain(prefix: &str, depth: usize) -> Vec<ContentNode> {
        let mut level: Vec<ContentNode> = Vec::new();
        for d in (1..=depth).rev() {
            level = vec![para(&format!("{}{}", prefix, d), &format!("level {}", d)).with_children(level)];
        }
        level
    }

    #[tokio::test]
    async fn test_bounded_traversal_never_fetches_deeper() {
        let d = 3;
        let source = MemorySource::new();
        source.set_content("doc", chain("n", d + 5));

        let flat = flatten_document(&source, "doc", d).await.unwrap();
        assert_eq!(flat.text, "level 1\n  level 2\n    level 3");

        // doc (lists depth 1), n1 (lists depth 2), n2 (lists depth 3)
        assert_eq!(source.children_requests(), vec!["doc", "n1", "n2"]);
    }

    #[tokio::test]
    async fn test_deep_tree_equals_truncated_tree() {
        let d = 2;
        let deep = MemorySource::new();
        deep.set_content("doc", chain("n", d + 5));
        let shallow = MemorySource::new();
        shallow.set_content("doc", truncate_tree(&chain("n", d + 5), d));

        let a = flatten_document(&deep, "doc", d).await.unwrap();
        let b = flatten_document(&shallow, "doc", d).await.unwrap();
        assert_eq!(a.text, b.text);
    }

    #[tokio::test]
    async fn test_pagination_is_followed() {
        let source = MemorySource::new().with_page_size(2);
        let blocks: Vec<ContentNode> = (0..5)
            .map(|i| para(&format!("b{}", i), &format!("line {}", i)))
            .collect();
        source.set_content("doc", blocks);
        let tree = fetch_tree(&source, "doc", 1).await.unwrap();
        assert_eq!(tree.len(), 5);
    }

    #[tokio::test]
    async fn test_nested_failure_skips_subtree_only() {
        let source = MemorySource::new();
        source.set_content(
            "doc",
            vec![
                para("bad", "broken parent").with_children(vec![para("x", "hidden")]),
                para("ok", "fine").with_children(vec![para("y", "visible")]),
            ],
        );
        source.fail_on("bad");
        let flat = flatten_document(&source, "doc", 3).await.unwrap();
        assert_eq!(flat.text, "broken parent\nfine\n  visible");
    }

    #[tokio::test]
    async fn test_top_level_failure_is_an_error() {
        let source = MemorySource::new();
        source.fail_on("doc");
        assert!(flatten_document(&source, "doc", 3).await.is_err());
    }

    #[tokio::test]
    async fn test_child_documents_reported() {
        let source = MemorySource::new();
        source.set_content(
            "doc",
            vec![
                ContentNode::new("child-1", BlockKind::ChildPage, "Benefits"),
                para("p", "intro"),
            ],
        );
        let flat = flatten_document(&source, "doc", 2).await.unwrap();
        assert_eq!(flat.child_documents.len(), 1);
        assert_eq!(flat.child_documents[0].id, "child-1");
        assert!(flat.text.starts_with("[Page] Benefits"));
    }

    #[tokio::test]
    async fn test_nested_page_is_not_expanded() {
        let source = MemorySource::new();
        source.set_content(
            "doc",
            vec![ContentNode::new("child-1", BlockKind::ChildPage, "Benefits")
                .with_children(vec![para("inner", "belongs to the child")])],
        );
        let flat = flatten_document(&source, "doc", 5).await.unwrap();
        assert_eq!(flat.text, "[Page] Benefits");
        assert_eq!(source.children_requests(), vec!["doc"]);
    }
}
