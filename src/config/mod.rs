mod file_config;

pub use file_config::{FileConfig, SearchConfig, SqliteConfig};

use crate::metadata_store::{StoreConfig, StorePragmas};
use crate::service::ServiceSettings;
use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub catalog_db: Option<PathBuf>,
    pub annotations_db: Option<PathBuf>,
    pub read_pool_size: usize,
    pub search_timeout_secs: u64,
    pub max_batch_items: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            catalog_db: None,
            annotations_db: None,
            read_pool_size: 8,
            search_timeout_secs: 10,
            max_batch_items: 400,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub catalog_db: PathBuf,
    pub annotations_db: PathBuf,
    pub read_pool_size: usize,
    pub max_batch_items: usize,
    pub pragmas: StorePragmas,
    pub search: SearchSettings,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub timeout_secs: u64,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let catalog_db = file
            .catalog_db
            .map(PathBuf::from)
            .or_else(|| cli.catalog_db.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("catalog_db must be specified via --catalog-db or in config file")
            })?;

        if !catalog_db.exists() {
            bail!("Catalog database does not exist: {:?}", catalog_db);
        }
        if !catalog_db.is_file() {
            bail!("catalog_db is not a file: {:?}", catalog_db);
        }

        // A missing annotation store is tolerated at open time, so only the
        // path is resolved here.
        let annotations_db = file
            .annotations_db
            .map(PathBuf::from)
            .or_else(|| cli.annotations_db.clone())
            .unwrap_or_else(|| StoreConfig::for_catalog(&catalog_db).annotations_path);

        let read_pool_size = file.read_pool_size.unwrap_or(cli.read_pool_size);
        if read_pool_size == 0 {
            bail!("read_pool_size must be at least 1");
        }

        let max_batch_items = file.max_batch_items.unwrap_or(cli.max_batch_items);

        let sqlite = file.sqlite.unwrap_or_default();
        let default_pragmas = StorePragmas::default();
        let pragmas = StorePragmas {
            cache_size_kib: sqlite
                .cache_size_kib
                .unwrap_or(default_pragmas.cache_size_kib),
            mmap_size_bytes: sqlite
                .mmap_size_bytes
                .unwrap_or(default_pragmas.mmap_size_bytes),
        };
        if i64::try_from(pragmas.mmap_size_bytes).is_err() {
            bail!(
                "sqlite mmap_size_bytes ({}) must not exceed {}",
                pragmas.mmap_size_bytes,
                i64::MAX
            );
        }

        let search_file = file.search.unwrap_or_default();
        let search = SearchSettings {
            timeout_secs: search_file.timeout_secs.unwrap_or(cli.search_timeout_secs),
            default_limit: search_file.default_limit.unwrap_or(20),
            max_limit: search_file.max_limit.unwrap_or(50),
        };
        if search.default_limit == 0 || search.default_limit > search.max_limit {
            bail!(
                "search default_limit ({}) must be between 1 and max_limit ({})",
                search.default_limit,
                search.max_limit
            );
        }

        Ok(Self {
            catalog_db,
            annotations_db,
            read_pool_size,
            max_batch_items,
            pragmas,
            search,
        })
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            catalog_path: self.catalog_db.clone(),
            annotations_path: self.annotations_db.clone(),
            read_pool_size: self.read_pool_size,
            pragmas: self.pragmas,
        }
    }

    pub fn service_settings(&self) -> ServiceSettings {
        ServiceSettings {
            search_timeout: Duration::from_secs(self.search.timeout_secs),
            default_search_limit: self.search.default_limit,
            max_search_limit: self.search.max_limit,
            max_batch_items: self.max_batch_items,
        }
    }
}
