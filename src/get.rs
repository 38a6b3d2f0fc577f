//! The `th get` command: stage-2 retrieval printed to stdout.

use anyhow::Result;

use crate::config::Config;
use crate::load::build_service;

pub async fn run_get(config: &Config, id: &str, query: Option<&str>) -> Result<()> {
    let service = build_service(config)?;
    let detail = match service.get_detail(id, query).await {
        Some(d) => d,
        None => {
            eprintln!("Error: document not found: {}", id);
            std::process::exit(1);
        }
    };

    println!("--- Document ---");
    println!("id:       {}", detail.id);
    println!("title:    {}", detail.title);
    println!("kind:     {}", detail.kind.as_str());
    println!("type:     {}", detail.document_type.as_str());
    println!("path:     {}", detail.breadcrumb);
    println!("url:      {}", detail.url);
    println!();

    if let Some(excerpt) = &detail.excerpt {
        println!("--- Excerpt ---");
        println!("{}", excerpt);
        println!();
    }

    println!("--- Content ---");
    println!("{}", detail.content);
    println!();

    println!("--- Related ({}) ---", detail.related.len());
    for r in &detail.related {
        println!("{}  {}", r.id, r.title);
    }
    Ok(())
}
