//! Tree renderer: a materialized content tree to one text blob.
//!
//! The renderer walks nodes in document order, calls the
//! [block extractor](crate::extract::extract_text) on each one, and
//! indents nested nodes by two spaces per level. Nodes that extract to an
//! empty string emit no line, but their children are still visited.
//!
//! # Depth
//!
//! Top-level nodes are depth 1. A node at depth `d` is rendered only when
//! `d <= max_depth`; deeper nodes are ignored even if they were fetched.
//! `max_depth = 0` renders nothing.

use crate::extract::extract_text;
use crate::models::{ContentNode, DocumentKind};

const INDENT: &str = "  ";

/// Render `nodes` (depth 1) and their descendants down to `max_depth`.
pub fn render_tree(nodes: &[ContentNode], max_depth: usize) -> String {
    let mut lines = Vec::new();
    render_level(nodes, 1, max_depth, &mut lines);
    lines.join("\n")
}

fn render_level(nodes: &[ContentNode], depth: usize, max_depth: usize, lines: &mut Vec<String>) {
    if depth > max_depth {
        return;
    }
    let indent = INDENT.repeat(depth - 1);
    for node in nodes {
        let text = extract_text(node);
        if !text.is_empty() {
            for line in text.lines() {
                lines.push(format!("{}{}", indent, line));
            }
        }
        render_level(&node.children, depth + 1, max_depth, lines);
    }
}

/// Copy of `nodes` with everything below `max_depth` removed.
pub fn truncate_tree(nodes: &[ContentNode], max_depth: usize) -> Vec<ContentNode> {
    if max_depth == 0 {
        return Vec::new();
    }
    nodes
        .iter()
        .map(|n| ContentNode {
            id: n.id.clone(),
            kind: n.kind.clone(),
            text: n.text.clone(),
            has_children: n.has_children,
            children: truncate_tree(&n.children, max_depth - 1),
        })
        .collect()
}

/// A nested page or collection referenced from inside a content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildDocument {
    pub id: String,
    pub title: String,
    pub kind: DocumentKind,
}

/// Collect every child page/collection reference in the tree, in document
/// order, without duplicates. The subtree under a reference is not searched.
pub fn child_documents(nodes: &[ContentNode]) -> Vec<ChildDocument> {
    let mut found: Vec<ChildDocument> = Vec::new();
    let mut stack: Vec<&ContentNode> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if let Some(kind) = node.document_kind() {
            if !found.iter().any(|c| c.id == node.id) {
                found.push(ChildDocument {
                    id: node.id.clone(),
                    title: node.text.trim().to_string(),
                    kind,
                });
            }
            continue;
        }
        stack.extend(node.children.iter().rev());
    }
    found
}
