//! Lexical document-type tagging.
//!
//! A best-effort label derived from vocabulary in the title and body. The
//! type with the most keyword hits wins; titles count double. Nothing
//! matching yields [`DocumentType::General`].

use serde::Serialize;
use std::collections::HashSet;

use crate::index::tokenize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Policy,
    Procedure,
    Contact,
    Faq,
    MeetingNotes,
    General,
}

impl DocumentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Procedure => "procedure",
            Self::Contact => "contact",
            Self::Faq => "faq",
            Self::MeetingNotes => "meeting_notes",
            Self::General => "general",
        }
    }
}

/// Order matters on ties: earlier entries win.
const VOCABULARY: &[(DocumentType, &[&str])] = &[
    (
        DocumentType::Policy,
        &["policy", "policies", "guideline", "guidelines", "compliance", "rules", "must"],
    ),
    (
        DocumentType::Procedure,
        &["procedure", "procedures", "step", "steps", "process", "howto", "instructions", "checklist"],
    ),
    (
        DocumentType::Contact,
        &["contact", "contacts", "phone", "email", "reach", "directory", "extension"],
    ),
    (DocumentType::Faq, &["faq", "faqs", "question", "questions", "answer", "answers"]),
    (
        DocumentType::MeetingNotes,
        &["meeting", "agenda", "minutes", "attendees", "standup", "retro"],
    ),
];

pub fn classify(title: &str, body: &str) -> DocumentType {
    let title_tokens: HashSet<String> = tokenize(title).into_iter().collect();
    let body_tokens: HashSet<String> = tokenize(body).into_iter().collect();

    let mut best = (DocumentType::General, 0usize);
    for (doc_type, words) in VOCABULARY {
        let score: usize = words
            .iter()
            .map(|w| {
                let t = if title_tokens.contains(*w) { 2 } else { 0 };
                let b = usize::from(body_tokens.contains(*w));
                t + b
            })
            .sum();
        if score > best.1 {
            best = (*doc_type, score);
        }
    }
    best.0
}
