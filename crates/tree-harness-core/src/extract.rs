//! Block extractor: one [`ContentNode`] to plain text.
//!
//! Dispatches on [`BlockKind`] and decorates the node's text with a light
//! markdown-like prefix so that the flattened body keeps some of the
//! original structure (headings, list markers, checkboxes).
//!
//! Nodes without text (dividers) and unrecognized kinds produce an empty
//! string. The extractor never fails.

use crate::models::{BlockKind, ContentNode};

/// Return the plain-text rendering of a single node, or `""`.
pub fn extract_text(node: &ContentNode) -> String {
    let text = node.text.trim();

    match &node.kind {
        BlockKind::Divider | BlockKind::Unknown { .. } => String::new(),
        _ if text.is_empty() => String::new(),
        BlockKind::Paragraph | BlockKind::TableRow | BlockKind::Equation => text.to_string(),
        BlockKind::Heading { level } => {
            let hashes = "#".repeat((*level).clamp(1, 3) as usize);
            format!("{} {}", hashes, text)
        }
        BlockKind::BulletedListItem => format!("• {}", text),
        BlockKind::NumberedListItem => format!("1. {}", text),
        BlockKind::ToDo { checked } => {
            let mark = if *checked { "x" } else { " " };
            format!("[{}] {}", mark, text)
        }
        BlockKind::Toggle => format!("▸ {}", text),
        BlockKind::Quote => format!("> {}", text),
        BlockKind::Callout => format!("💡 {}", text),
        BlockKind::Code { language } => format!("```{}\n{}\n```", language, text),
        BlockKind::ChildPage => format!("[Page] {}", text),
        BlockKind::ChildCollection => format!("[Collection] {}", text),
        BlockKind::Bookmark => text.to_string(),
    }
}
