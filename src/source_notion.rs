//! Notion-compatible REST content source.
//!
//! Talks to a Notion-style API (`/search`, `/pages`, `/databases`,
//! `/blocks/{id}/children`) and normalizes its heterogeneous JSON into
//! [`Document`] and [`ContentNode`] at the boundary.
//!
//! # Configuration
//!
//! ```toml
//! [source]
//! api_base = "https://api.notion.com/v1"
//! token_env = "NOTION_TOKEN"
//! api_version = "2022-06-28"
//! ```
//!
//! # Authentication
//!
//! The bearer token is read from the environment variable named by
//! `token_env`. Without it the source reports itself unconfigured and the
//! cache refuses to load rather than issuing unauthenticated requests.
//!
//! # Retry strategy
//!
//! - HTTP 429 or 5xx → retry with exponential backoff
//! - other HTTP 4xx → fail immediately
//! - network error → retry

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use tree_harness_core::models::{
    BlockKind, CollectionQuery, ContentNode, Document, DocumentFilter, DocumentKind, DocumentPage,
    NodePage,
};
use tree_harness_core::source::ContentSource;

use crate::config::SourceConfig;

pub struct NotionSource {
    client: reqwest::Client,
    api_base: String,
    api_version: String,
    token: Option<String>,
    page_size: usize,
    max_retries: u32,
}

impl NotionSource {
    /// Build a source from configuration, reading the token from the
    /// environment. A missing token is not an error here; see
    /// [`ContentSource::is_configured`].
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty());
        Self::new(config, token)
    }

    pub fn new(config: &SourceConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            token,
            page_size: config.page_size,
            max_retries: config.max_retries,
        })
    }

    async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| anyhow!("content source token not set"))?;
        let url = format!("{}{}", self.api_base, path);

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let mut req = self
                .client
                .request(method.clone(), &url)
                .header("Authorization", format!("Bearer {}", token))
                .header("Notion-Version", &self.api_version);
            if let Some(b) = body {
                req = req.json(b);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        debug!(%url, %status, attempt, "retryable content source error");
                        last_err = Some(anyhow!("content source error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("content source error {} for {}: {}", status, path, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("request to {} failed after retries", path)))
    }

    fn paging_body(&self, cursor: Option<&str>) -> serde_json::Map<String, Value> {
        let mut body = serde_json::Map::new();
        body.insert("page_size".to_string(), json!(self.page_size));
        if let Some(c) = cursor {
            body.insert("start_cursor".to_string(), json!(c));
        }
        body
    }
}

#[async_trait]
impl ContentSource for NotionSource {
    fn is_configured(&self) -> bool {
        self.token.is_some()
    }

    async fn list_documents(
        &self,
        filter: DocumentFilter,
        cursor: Option<&str>,
    ) -> Result<DocumentPage> {
        let mut body = self.paging_body(cursor);
        if let DocumentFilter::Only(kind) = filter {
            let value = match kind {
                DocumentKind::Page => "page",
                DocumentKind::Collection => "database",
            };
            body.insert(
                "filter".to_string(),
                json!({ "property": "object", "value": value }),
            );
        }
        let resp = self
            .request(Method::POST, "/search", Some(&Value::Object(body)))
            .await?;
        Ok(parse_document_page(&resp))
    }

    async fn get_document(&self, id: &str) -> Result<Document> {
        let page = self
            .request(Method::GET, &format!("/pages/{}", id), None)
            .await;
        let value = match page {
            Ok(v) => v,
            Err(page_err) => self
                .request(Method::GET, &format!("/databases/{}", id), None)
                .await
                .map_err(|_| page_err)?,
        };
        parse_document(&value).ok_or_else(|| anyhow!("unrecognized document payload for {}", id))
    }

    async fn list_children(&self, id: &str, cursor: Option<&str>) -> Result<NodePage> {
        let mut path = format!("/blocks/{}/children?page_size={}", id, self.page_size);
        if let Some(c) = cursor {
            path.push_str(&format!("&start_cursor={}", c));
        }
        let resp = self.request(Method::GET, &path, None).await?;
        let nodes = results(&resp).iter().map(parse_block).collect();
        Ok(NodePage {
            nodes,
            next_cursor: next_cursor(&resp),
        })
    }

    async fn query_collection(
        &self,
        id: &str,
        query: &CollectionQuery,
        cursor: Option<&str>,
    ) -> Result<DocumentPage> {
        let mut body = self.paging_body(cursor);
        if let Some(f) = &query.filter {
            body.insert("filter".to_string(), f.clone());
        }
        if let Some(s) = &query.sorts {
            body.insert("sorts".to_string(), s.clone());
        }
        let resp = self
            .request(
                Method::POST,
                &format!("/databases/{}/query", id),
                Some(&Value::Object(body)),
            )
            .await?;
        Ok(parse_document_page(&resp))
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Document>> {
        let body = json!({
            "query": query,
            "page_size": limit.clamp(1, self.page_size),
        });
        let resp = self.request(Method::POST, "/search", Some(&body)).await?;
        let mut docs = parse_document_page(&resp).documents;
        docs.truncate(limit);
        Ok(docs)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Normalization
// ═══════════════════════════════════════════════════════════════════════

fn results(resp: &Value) -> &[Value] {
    resp["results"].as_array().map(Vec::as_slice).unwrap_or_default()
}

fn next_cursor(resp: &Value) -> Option<String> {
    if resp["has_more"].as_bool() != Some(true) {
        return None;
    }
    resp["next_cursor"].as_str().map(str::to_string)
}

fn parse_document_page(resp: &Value) -> DocumentPage {
    DocumentPage {
        documents: results(resp).iter().filter_map(parse_document).collect(),
        next_cursor: next_cursor(resp),
    }
}

/// Normalize a page or database object. Returns `None` for anything else.
pub fn parse_document(value: &Value) -> Option<Document> {
    let kind = match value["object"].as_str()? {
        "page" => DocumentKind::Page,
        "database" => DocumentKind::Collection,
        _ => return None,
    };
    let id = value["id"].as_str()?;

    let mut doc = Document::new(id, extract_title(value), kind);
    doc.parent_id = parse_parent(&value["parent"]);
    doc.last_edited = value["last_edited_time"]
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    Some(doc)
}

/// Find a title in whichever field this payload keeps it.
///
/// Databases carry a top-level `title` array; pages keep it in whichever
/// property has type `title`, which is usually but not always `Name`.
pub fn extract_title(value: &Value) -> String {
    if let Some(arr) = value["title"].as_array() {
        let t = plain_text(arr);
        if !t.is_empty() {
            return t;
        }
    }

    if let Some(props) = value["properties"].as_object() {
        if let Some(prop) = props.values().find(|p| p["type"] == "title") {
            if let Some(arr) = prop["title"].as_array() {
                return plain_text(arr);
            }
        }
        for key in ["Name", "name", "Title", "title"] {
            let prop = &props.get(key).cloned().unwrap_or(Value::Null);
            for field in ["title", "rich_text"] {
                if let Some(arr) = prop[field].as_array() {
                    let t = plain_text(arr);
                    if !t.is_empty() {
                        return t;
                    }
                }
            }
        }
    }

    for key in ["child_page", "child_database"] {
        if let Some(t) = value[key]["title"].as_str() {
            return t.to_string();
        }
    }

    String::new()
}

fn parse_parent(parent: &Value) -> Option<String> {
    match parent["type"].as_str()? {
        "page_id" => parent["page_id"].as_str().map(str::to_string),
        "database_id" => parent["database_id"].as_str().map(str::to_string),
        _ => None,
    }
}

fn plain_text(rich_text: &[Value]) -> String {
    rich_text
        .iter()
        .filter_map(|r| r["plain_text"].as_str().or_else(|| r["text"]["content"].as_str()))
        .collect::<String>()
}

fn rich_text_of(data: &Value) -> String {
    data["rich_text"]
        .as_array()
        .map(|a| plain_text(a))
        .unwrap_or_default()
}

/// Normalize one block object into a [`ContentNode`] (children not loaded).
pub fn parse_block(value: &Value) -> ContentNode {
    let id = value["id"].as_str().unwrap_or_default().to_string();
    let block_type = value["type"].as_str().unwrap_or_default();
    let data = &value[block_type];

    let (kind, text) = match block_type {
        "paragraph" => (BlockKind::Paragraph, rich_text_of(data)),
        "heading_1" => (BlockKind::Heading { level: 1 }, rich_text_of(data)),
        "heading_2" => (BlockKind::Heading { level: 2 }, rich_text_of(data)),
        "heading_3" => (BlockKind::Heading { level: 3 }, rich_text_of(data)),
        "bulleted_list_item" => (BlockKind::BulletedListItem, rich_text_of(data)),
        "numbered_list_item" => (BlockKind::NumberedListItem, rich_text_of(data)),
        "to_do" => (
            BlockKind::ToDo {
                checked: data["checked"].as_bool().unwrap_or(false),
            },
            rich_text_of(data),
        ),
        "toggle" => (BlockKind::Toggle, rich_text_of(data)),
        "quote" => (BlockKind::Quote, rich_text_of(data)),
        "callout" => (BlockKind::Callout, rich_text_of(data)),
        "code" => (
            BlockKind::Code {
                language: data["language"].as_str().unwrap_or_default().to_string(),
            },
            rich_text_of(data),
        ),
        "child_page" => (
            BlockKind::ChildPage,
            data["title"].as_str().unwrap_or_default().to_string(),
        ),
        "child_database" => (
            BlockKind::ChildCollection,
            data["title"].as_str().unwrap_or_default().to_string(),
        ),
        "bookmark" | "embed" | "link_preview" => {
            let caption = data["caption"]
                .as_array()
                .map(|a| plain_text(a))
                .unwrap_or_default();
            let url = data["url"].as_str().unwrap_or_default();
            let text = if caption.is_empty() {
                url.to_string()
            } else {
                format!("{} ({})", caption, url)
            };
            (BlockKind::Bookmark, text)
        }
        "table_row" => {
            let cells: Vec<String> = data["cells"]
                .as_array()
                .map(|cells| {
                    cells
                        .iter()
                        .map(|c| c.as_array().map(|a| plain_text(a)).unwrap_or_default())
                        .collect()
                })
                .unwrap_or_default();
            (BlockKind::TableRow, cells.join(" | "))
        }
        "equation" => (
            BlockKind::Equation,
            data["expression"].as_str().unwrap_or_default().to_string(),
        ),
        "divider" => (BlockKind::Divider, String::new()),
        other => (
            BlockKind::Unknown {
                name: other.to_string(),
            },
            String::new(),
        ),
    };

    ContentNode {
        id,
        kind,
        text,
        has_children: value["has_children"].as_bool().unwrap_or(false),
        children: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_title() {
        let v = json!({
            "object": "database",
            "id": "db-1",
            "title": [{ "plain_text": "Team " }, { "plain_text": "Directory" }],
            "parent": { "type": "workspace", "workspace": true }
        });
        let doc = parse_document(&v).unwrap();
        assert_eq!(doc.title, "Team Directory");
        assert_eq!(doc.kind, DocumentKind::Collection);
        assert_eq!(doc.parent_id, None);
    }

    #[test]
    fn test_page_title_from_title_typed_property() {
        let v = json!({
            "object": "page",
            "id": "p-1",
            "parent": { "type": "page_id", "page_id": "root-1" },
            "last_edited_time": "2024-03-01T10:00:00.000Z",
            "properties": {
                "Status": { "type": "select", "select": null },
                "Document": { "type": "title", "title": [{ "plain_text": "Payroll Policy" }] }
            }
        });
        let doc = parse_document(&v).unwrap();
        assert_eq!(doc.title, "Payroll Policy");
        assert_eq!(doc.parent_id.as_deref(), Some("root-1"));
        assert!(doc.last_edited.is_some());
    }

    #[test]
    fn test_page_title_from_name_rich_text() {
        let v = json!({
            "object": "page",
            "id": "p-2",
            "properties": {
                "Name": { "type": "rich_text", "rich_text": [{ "text": { "content": "Office Snacks" } }] }
            }
        });
        assert_eq!(parse_document(&v).unwrap().title, "Office Snacks");
    }

    #[test]
    fn test_block_parent_is_not_a_document_parent() {
        let v = json!({
            "object": "page",
            "id": "p-3",
            "parent": { "type": "block_id", "block_id": "b-9" }
        });
        assert_eq!(parse_document(&v).unwrap().parent_id, None);
    }

    #[test]
    fn test_non_document_objects_skipped() {
        assert!(parse_document(&json!({ "object": "user", "id": "u" })).is_none());
    }

    #[test]
    fn test_parse_todo_block() {
        let v = json!({
            "id": "b1",
            "type": "to_do",
            "has_children": false,
            "to_do": { "checked": true, "rich_text": [{ "plain_text": "Sign contract" }] }
        });
        let node = parse_block(&v);
        assert_eq!(node.kind, BlockKind::ToDo { checked: true });
        assert_eq!(node.text, "Sign contract");
    }

    #[test]
    fn test_parse_child_page_block() {
        let v = json!({
            "id": "b2",
            "type": "child_page",
            "has_children": true,
            "child_page": { "title": "Benefits" }
        });
        let node = parse_block(&v);
        assert_eq!(node.document_kind(), Some(DocumentKind::Page));
        assert_eq!(node.text, "Benefits");
        assert!(node.has_children);
    }

    #[test]
    fn test_parse_table_row() {
        let v = json!({
            "id": "b3",
            "type": "table_row",
            "table_row": { "cells": [[{ "plain_text": "Alice" }], [{ "plain_text": "x101" }]] }
        });
        assert_eq!(parse_block(&v).text, "Alice | x101");
    }

    #[test]
    fn test_unknown_block_type() {
        let v = json!({ "id": "b4", "type": "synced_block", "synced_block": {} });
        let node = parse_block(&v);
        assert_eq!(
            node.kind,
            BlockKind::Unknown {
                name: "synced_block".to_string()
            }
        );
    }

    #[test]
    fn test_next_cursor_requires_has_more() {
        let done = json!({ "results": [], "has_more": false, "next_cursor": "abc" });
        let more = json!({ "results": [], "has_more": true, "next_cursor": "abc" });
        assert_eq!(next_cursor(&done), None);
        assert_eq!(next_cursor(&more).as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_token_is_unconfigured() {
        let source = NotionSource::new(&SourceConfig::default(), None).unwrap();
        assert!(!source.is_configured());
    }
}
