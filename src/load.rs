//! Service construction and the `th load` command.
//!
//! Every entry point (CLI commands and the HTTP server) builds the same
//! stack: a Notion-compatible source, a [`DocumentCache`] over it, and a
//! [`RetrievalService`] over the cache.

use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::{CacheSettings, CacheStatus, DocumentCache, LoadOutcome};
use crate::config::Config;
use crate::retrieval::RetrievalService;
use crate::source_notion::NotionSource;

/// Build the source, cache, and retrieval service described by `config`.
/// Nothing is loaded yet.
pub fn build_service(config: &Config) -> Result<Arc<RetrievalService>> {
    let source = Arc::new(NotionSource::from_config(&config.source)?);
    let cache = Arc::new(DocumentCache::new(source, CacheSettings::from_config(config)));
    Ok(Arc::new(RetrievalService::from_config(cache, config)?))
}

/// Run a full bulk load and print the resulting cache status.
pub async fn run_load(config: &Config) -> Result<()> {
    let service = build_service(config)?;
    let started = Instant::now();

    let outcome = service.cache().initialize().await?;
    if let LoadOutcome::Completed {
        documents,
        collections,
    } = outcome
    {
        println!(
            "Loaded {} documents ({} collections) in {:.1}s",
            documents,
            collections,
            started.elapsed().as_secs_f64()
        );
    }
    print_status(&service.cache().status());
    Ok(())
}

pub fn print_status(status: &CacheStatus) {
    let refreshed = status
        .last_refresh_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string());

    println!("--- Cache ---");
    println!("initialized:      {}", status.initialized);
    println!("loading:          {}", status.loading);
    println!("last refresh:     {}", refreshed);
    println!("documents:        {}", status.document_count);
    println!("collections:      {}", status.collection_count);
    println!("title terms:      {}", status.indexed_title_term_count);
    println!("body terms:       {}", status.indexed_body_term_count);
}
