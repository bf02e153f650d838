use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub catalog_db: Option<String>,
    pub annotations_db: Option<String>,
    pub read_pool_size: Option<usize>,
    pub max_batch_items: Option<usize>,

    // Feature configs
    pub sqlite: Option<SqliteConfig>,
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SqliteConfig {
    /// Page cache per connection, in KiB
    pub cache_size_kib: Option<i64>,
    pub mmap_size_bytes: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SearchConfig {
    pub timeout_secs: Option<u64>,
    pub default_limit: Option<usize>,
    pub max_limit: Option<usize>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
