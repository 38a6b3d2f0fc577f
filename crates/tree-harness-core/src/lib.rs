//! # Tree Harness Core
//!
//! Runtime-free logic for Tree Harness: document models, the block
//! extractor and tree renderer, the inverted index, the hierarchy graph,
//! the access frequency tracker, and the [`ContentSource`](source::ContentSource)
//! trait that remote backends implement.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Everything
//! that talks to the network lives in the `tree-harness` crate.

pub mod classify;
pub mod extract;
pub mod frequency;
pub mod hierarchy;
pub mod index;
pub mod models;
pub mod render;
pub mod snippet;
pub mod source;
