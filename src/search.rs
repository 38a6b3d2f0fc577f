//! The `th search` command: stage-1 retrieval printed to stdout.
//!
//! Without `--load` the cache is empty, so candidates come from the remote
//! search fallback. With it, the corpus is bulk-loaded first and ranked
//! locally.

use anyhow::Result;

use crate::config::Config;
use crate::load::build_service;
use crate::retrieval::CandidateSet;

pub async fn run_search(config: &Config, query: &str, load_first: bool) -> Result<()> {
    let service = build_service(config)?;
    if load_first {
        service.cache().initialize().await?;
    }

    let candidates = match service.find_candidates(query).await {
        CandidateSet::NoCandidates => {
            println!("No results.");
            return Ok(());
        }
        CandidateSet::Degraded => {
            println!("No results (the content source could not be reached).");
            return Ok(());
        }
        CandidateSet::Found { candidates } => candidates,
    };

    for (i, c) in candidates.iter().enumerate() {
        println!("{}. [{}] {}", i + 1, c.score, c.title);
        println!("    path: {}", c.breadcrumb);
        println!("    url: {}", c.url);
        println!("    from: {:?}", c.origin);
        if !c.preview.is_empty() {
            println!("    preview: \"{}\"", c.preview.trim());
        }
        println!("    id: {}", c.id);
        println!();
    }
    Ok(())
}
