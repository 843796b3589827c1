//! Stage cache maintenance.

use std::path::PathBuf;
use std::sync::Arc;

use strokelab_cache::{FsCacheStore, PipelineCache};
use strokelab_common::config::AppConfig;

pub fn clear(app_config: &AppConfig, cache_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = cache_dir.unwrap_or_else(|| app_config.cache_dir.clone());
    if !dir.exists() {
        println!("No cache at: {}", dir.display());
        return Ok(());
    }

    let store = FsCacheStore::open(&dir)
        .map_err(|e| anyhow::anyhow!("Failed to open cache {}: {e}", dir.display()))?;
    let removed = PipelineCache::new(Arc::new(store)).clear()?;
    println!("Removed {removed} cache entries from: {}", dir.display());
    Ok(())
}
