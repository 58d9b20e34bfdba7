//! Bootstrap result caching
//!
//! The bootstrap validator is the slowest stage. Its result is cached per
//! data path, keyed by a hash of the harmonized respondents and every
//! setting that influences it.

use crate::analysis::bootstrap::BootstrapReport;
use crate::config::Settings;
use crate::Dataset;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

const CACHE_VERSION: u32 = 1;
pub const CACHE_FILENAME: &str = ".surveylab-cache.json";

/// Cache entry for one analysed path
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    /// SHA256 of the harmonized dataset and bootstrap inputs
    fingerprint: String,
    result: BootstrapReport,
    /// Timestamp when cached
    cached_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheData {
    /// Cache format version
    version: u32,
    /// Map of analysed path to cache entry
    entries: HashMap<String, CacheEntry>,
}

impl Default for CacheData {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// Cache manager for bootstrap results
pub struct BootstrapCache {
    /// Path to the cache file
    cache_path: PathBuf,
    data: CacheData,
    /// Whether the cache has been modified
    dirty: bool,
    enabled: bool,
}

impl BootstrapCache {
    /// Open the cache file in `dir`. A missing, unreadable or outdated file is an empty cache.
    pub fn new(dir: &Path) -> Self {
        let cache_path = dir.join(CACHE_FILENAME);
        let data = Self::load_cache(&cache_path).unwrap_or_default();

        Self {
            cache_path,
            data,
            dirty: false,
            enabled: true,
        }
    }

    /// Create a disabled cache (no-op)
    pub fn disabled() -> Self {
        Self {
            cache_path: PathBuf::new(),
            data: CacheData::default(),
            dirty: false,
            enabled: false,
        }
    }

    fn load_cache(path: &Path) -> Option<CacheData> {
        let content = fs::read_to_string(path).ok()?;
        let data: CacheData = serde_json::from_str(&content).ok()?;

        if data.version != CACHE_VERSION {
            debug!(found = data.version, expected = CACHE_VERSION, "ignoring outdated cache");
            return None;
        }

        Some(data)
    }

    /// Save cache to disk
    pub fn save(&self) -> Result<()> {
        if !self.enabled || !self.dirty {
            return Ok(());
        }

        let content =
            serde_json::to_string_pretty(&self.data).context("Failed to serialize cache")?;
        fs::write(&self.cache_path, content)
            .with_context(|| format!("Failed to write cache to {}", self.cache_path.display()))?;

        Ok(())
    }

    /// Hash of everything the bootstrap result depends on
    pub fn fingerprint(dataset: &Dataset, settings: &Settings) -> String {
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&dataset.respondents).unwrap_or_default());
        hasher.update(serde_json::to_vec(&settings.bootstrap).unwrap_or_default());
        hasher.update(format!(
            "{:?}|{}",
            settings.population.roles, settings.population.min_visit_frequency
        ));
        hex::encode(hasher.finalize())
    }

    /// Get cached result if the fingerprint still matches
    pub fn get(&self, source: &Path, fingerprint: &str) -> Option<BootstrapReport> {
        if !self.enabled {
            return None;
        }

        let entry = self.data.entries.get(&source.to_string_lossy().to_string())?;
        if entry.fingerprint != fingerprint {
            return None;
        }
        Some(entry.result.clone())
    }

    /// Store a bootstrap result
    pub fn set(&mut self, source: &Path, fingerprint: &str, result: BootstrapReport) {
        if !self.enabled {
            return;
        }

        let entry = CacheEntry {
            fingerprint: fingerprint.to_string(),
            result,
            cached_at: SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };

        self.data
            .entries
            .insert(source.to_string_lossy().to_string(), entry);
        self.dirty = true;
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.data.entries.len(),
            enabled: self.enabled,
        }
    }

    /// Clear all cached entries
    pub fn clear(&mut self) {
        self.data.entries.clear();
        self.dirty = true;
    }
}

/// Cache statistics
#[derive(Debug)]
pub struct CacheStats {
    pub entries: usize,
    pub enabled: bool,
}
