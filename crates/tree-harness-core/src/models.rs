//! Core data models used throughout Tree Harness.
//!
//! These types are the canonical shapes every component works with. Remote
//! backends normalize their own payloads into [`Document`] and
//! [`ContentNode`] at the ingestion boundary; nothing downstream sees the raw
//! remote JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL used to derive a browsable link from a document ID.
pub const DOCUMENT_URL_BASE: &str = "https://www.notion.so";

/// Title shown for documents whose title is missing or blank.
pub const UNTITLED: &str = "Untitled";

/// Whether a document is an individual page or a typed collection of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Page,
    Collection,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Page => "page",
            Self::Collection => "collection",
        }
    }
}

/// A retrievable unit of content: a page or a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub kind: DocumentKind,
    /// Flattened plain text. Empty until a flattening pass fills it in.
    pub body: String,
    pub url: String,
    /// Authoritative parent reference, when the remote source supplied one.
    pub parent_id: Option<String>,
    pub last_edited: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a document with an empty body and a URL derived from `id`.
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: DocumentKind) -> Self {
        let id = id.into();
        let url = document_url(&id);
        Self {
            id,
            title: title.into(),
            kind,
            body: String::new(),
            url,
            parent_id: None,
            last_edited: None,
        }
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// The title, or [`UNTITLED`] when it is blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }
}

/// Derive the browsable URL for a document ID.
///
/// Hyphens are stripped so that both dashed and compact forms of the same
/// ID map to the same link.
pub fn document_url(id: &str) -> String {
    format!("{}/{}", DOCUMENT_URL_BASE, id.replace('-', ""))
}

/// The dispatch key of a [`ContentNode`].
///
/// Node text is normalized by the remote adapter (rich-text runs joined,
/// table cells joined with ` | `, child titles copied into `text`), so the
/// kind only has to carry what rendering needs beyond the text itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph,
    Heading { level: u8 },
    BulletedListItem,
    NumberedListItem,
    ToDo { checked: bool },
    Toggle,
    Quote,
    Callout,
    Code { language: String },
    ChildPage,
    ChildCollection,
    Bookmark,
    TableRow,
    Equation,
    Divider,
    Unknown { name: String },
}

/// One node of a document's internal content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentNode {
    pub id: String,
    #[serde(flatten)]
    pub kind: BlockKind,
    pub text: String,
    pub has_children: bool,
    /// Populated lazily, only down to the caller's depth bound.
    #[serde(default)]
    pub children: Vec<ContentNode>,
}

impl ContentNode {
    pub fn new(id: impl Into<String>, kind: BlockKind, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            text: text.into(),
            has_children: false,
            children: Vec::new(),
        }
    }

    /// Attach already-materialized children, marking the node as a parent.
    pub fn with_children(mut self, children: Vec<ContentNode>) -> Self {
        self.has_children = !children.is_empty();
        self.children = children;
        self
    }

    /// The kind of document this node points at, if it is a nested
    /// page or collection rather than an ordinary content block.
    pub fn document_kind(&self) -> Option<DocumentKind> {
        match self.kind {
            BlockKind::ChildPage => Some(DocumentKind::Page),
            BlockKind::ChildCollection => Some(DocumentKind::Collection),
            _ => None,
        }
    }
}

/// Restricts a corpus enumeration to one document kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFilter {
    All,
    Only(DocumentKind),
}

/// One page of a cursor-paginated document listing.
#[derive(Debug, Clone, Default)]
pub struct DocumentPage {
    pub documents: Vec<Document>,
    /// Cursor for the next page; `None` when the listing is exhausted.
    pub next_cursor: Option<String>,
}

/// One page of a cursor-paginated child-node listing.
#[derive(Debug, Clone, Default)]
pub struct NodePage {
    pub nodes: Vec<ContentNode>,
    pub next_cursor: Option<String>,
}

/// Optional filter and sort passed through to a collection query.
///
/// Both are opaque to the core and forwarded verbatim to the backend.
#[derive(Debug, Clone, Default)]
pub struct CollectionQuery {
    pub filter: Option<serde_json::Value>,
    pub sorts: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_strips_hyphens() {
        let doc = Document::new("abc-123-def", "Title", DocumentKind::Page);
        assert_eq!(doc.url, "https://www.notion.so/abc123def");
    }

    #[test]
    fn test_display_title_falls_back() {
        let doc = Document::new("x", "   ", DocumentKind::Page);
        assert_eq!(doc.display_title(), UNTITLED);
    }

    #[test]
    fn test_document_kind_of_child_nodes() {
        let page = ContentNode::new("n1", BlockKind::ChildPage, "Handbook");
        let para = ContentNode::new("n2", BlockKind::Paragraph, "text");
        assert_eq!(page.document_kind(), Some(DocumentKind::Page));
        assert_eq!(para.document_kind(), None);
    }
}
