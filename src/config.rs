//! TOML configuration parsing and validation.
//!
//! ```toml
//! [source]
//! api_base = "https://api.notion.com/v1"
//! token_env = "NOTION_TOKEN"
//! known_collections = ["1f2e3d4c-..."]
//!
//! [cache]
//! flatten_depth = 5
//! refresh_interval_secs = 3600
//!
//! [retrieval]
//! target_candidates = 5
//! escalation = "always"
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```
//!
//! Every section except `[server]` may be omitted; defaults are shown in the
//! `default_*` functions below.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tree_harness_core::source::MAX_PAGE_SIZE;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Pause between paginated listing calls, to respect rate limits.
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Collections loaded before the full enumeration starts.
    #[serde(default)]
    pub known_collections: Vec<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            token_env: default_token_env(),
            api_version: default_api_version(),
            page_size: default_page_size(),
            page_delay_ms: default_page_delay_ms(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            known_collections: Vec::new(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.notion.com/v1".to_string()
}
fn default_token_env() -> String {
    "NOTION_TOKEN".to_string()
}
fn default_api_version() -> String {
    "2022-06-28".to_string()
}
fn default_page_size() -> usize {
    MAX_PAGE_SIZE
}
fn default_page_delay_ms() -> u64 {
    100
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_flatten_depth")]
    pub flatten_depth: usize,
    /// Seconds between background refreshes. `0` disables the refresh loop.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            flatten_depth: default_flatten_depth(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

fn default_flatten_depth() -> usize {
    5
}
fn default_refresh_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_target_candidates")]
    pub target_candidates: usize,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_title_weight")]
    pub title_weight: u32,
    #[serde(default = "default_body_weight")]
    pub body_weight: u32,
    #[serde(default = "default_preview_depth")]
    pub preview_depth: usize,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_detail_depth")]
    pub detail_depth: usize,
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,
    /// `always`, `never`, `judge`, or `score_below:<n>`.
    #[serde(default = "default_escalation")]
    pub escalation: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            target_candidates: default_target_candidates(),
            max_results: default_max_results(),
            title_weight: default_title_weight(),
            body_weight: default_body_weight(),
            preview_depth: default_preview_depth(),
            preview_chars: default_preview_chars(),
            detail_depth: default_detail_depth(),
            related_limit: default_related_limit(),
            escalation: default_escalation(),
        }
    }
}

fn default_target_candidates() -> usize {
    5
}
fn default_max_results() -> usize {
    10
}
fn default_title_weight() -> u32 {
    2
}
fn default_body_weight() -> u32 {
    1
}
fn default_preview_depth() -> usize {
    1
}
fn default_preview_chars() -> usize {
    300
}
fn default_detail_depth() -> usize {
    3
}
fn default_related_limit() -> usize {
    3
}
fn default_escalation() -> String {
    "always".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Config {
    /// A configuration with every default and the given bind address.
    pub fn with_bind(bind: impl Into<String>) -> Self {
        Self {
            source: SourceConfig::default(),
            cache: CacheConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig { bind: bind.into() },
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.source.page_size == 0 || config.source.page_size > MAX_PAGE_SIZE {
        anyhow::bail!("source.page_size must be in 1..={}", MAX_PAGE_SIZE);
    }

    if config.cache.flatten_depth == 0 {
        anyhow::bail!("cache.flatten_depth must be >= 1");
    }

    let r = &config.retrieval;
    if r.max_results == 0 {
        anyhow::bail!("retrieval.max_results must be >= 1");
    }
    if r.target_candidates == 0 {
        anyhow::bail!("retrieval.target_candidates must be >= 1");
    }
    if r.preview_depth == 0 || r.detail_depth == 0 {
        anyhow::bail!("retrieval.preview_depth and retrieval.detail_depth must be >= 1");
    }

    crate::retrieval::EscalationPolicy::parse(&r.escalation)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write_config("[server]\nbind = \"127.0.0.1:0\"\n");
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.cache.flatten_depth, 5);
        assert_eq!(cfg.cache.refresh_interval_secs, 3600);
        assert_eq!(cfg.retrieval.target_candidates, 5);
        assert_eq!(cfg.retrieval.title_weight, 2);
        assert_eq!(cfg.source.page_size, 100);
        assert_eq!(cfg.source.token_env, "NOTION_TOKEN");
    }

    #[test]
    fn test_page_size_over_limit_rejected() {
        let file = write_config("[source]\npage_size = 500\n\n[server]\nbind = \"x\"\n");
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_unknown_escalation_rejected() {
        let file =
            write_config("[retrieval]\nescalation = \"sometimes\"\n\n[server]\nbind = \"x\"\n");
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_known_collections_parsed() {
        let file = write_config(
            "[source]\nknown_collections = [\"c1\", \"c2\"]\n\n[server]\nbind = \"x\"\n",
        );
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.source.known_collections, vec!["c1", "c2"]);
    }
}
