//! # Tree Harness
//!
//! An in-memory cache, inverted index, and two-stage retrieval engine over a
//! hierarchical, remotely hosted document corpus (pages nested under pages,
//! some grouped into typed collections).
//!
//! The corpus is bulk-loaded into memory, flattened to text at a bounded
//! depth, and indexed by title and body. Parent/child relationships are
//! recorded during the load and discovered lazily afterwards. A periodic
//! refresh rebuilds everything and swaps it in atomically, so readers never
//! block and never see a half-built index.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌───────────────────┐
//! │ ContentSource│──▶│ Tree flatten │──▶│  DocumentCache    │
//! │ Notion / mem │   │ bounded depth│   │ index + hierarchy │
//! └──────┬───────┘   └──────────────┘   └─────────┬─────────┘
//!        │ cold path                              │ hot path
//!        └──────────────┐        ┌────────────────┘
//!                       ▼        ▼
//!                  ┌──────────────────┐
//!                  │ RetrievalService │
//!                  │ stage 1 / stage 2│
//!                  └────────┬─────────┘
//!                  ┌────────┴────────┐
//!                  ▼                 ▼
//!             ┌──────────┐     ┌──────────┐
//!             │   CLI    │     │   HTTP   │
//!             │  (th)    │     │  (axum)  │
//!             └──────────┘     └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`source_notion`] | Notion-compatible REST content source |
//! | [`tree`] | Depth-bounded tree fetching and flattening |
//! | [`hierarchy`] | Lazy parent/child discovery |
//! | [`cache`] | Bulk load, generations, refresh loop |
//! | [`retrieval`] | Two-stage retrieval and the answer flow |
//! | [`llm`] | Language-model collaborator trait |
//! | [`server`] | HTTP server |
//! | [`load`], [`search`], [`get`] | CLI commands |
//!
//! Pure data structures (models, block extraction, index, hierarchy graph,
//! frequency tracking) live in the runtime-free `tree-harness-core` crate.

pub mod cache;
pub mod config;
pub mod get;
pub mod hierarchy;
pub mod llm;
pub mod load;
pub mod retrieval;
pub mod search;
pub mod server;
pub mod source_notion;
pub mod tree;
