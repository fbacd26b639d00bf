use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::Classification;

/// Cached classification of one bundle folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedClassification {
    /// Hash over configuration, folder index and every manifest the
    /// traversal read. Any change invalidates the entry.
    pub fingerprint: String,
    pub checked_at: DateTime<Utc>,
    pub classification: Classification,
}

/// Classification cache stored in `.bundleguard/cache.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationCache {
    pub bundles: HashMap<String, CachedClassification>,
}

const CACHE_DIR: &str = ".bundleguard";
const CACHE_FILE: &str = "cache.json";

impl ClassificationCache {
    pub fn new() -> Self {
        Self {
            bundles: HashMap::new(),
        }
    }

    /// Load cache from `.bundleguard/cache.json` relative to the project root.
    pub fn load(project_root: &Path) -> Result<Self> {
        let cache_path = project_root.join(CACHE_DIR).join(CACHE_FILE);
        if !cache_path.exists() {
            return Ok(Self::new());
        }
        let content =
            std::fs::read_to_string(&cache_path).context("failed to read classification cache")?;
        let cache: Self =
            serde_json::from_str(&content).context("failed to parse classification cache")?;
        Ok(cache)
    }

    /// Save cache to `.bundleguard/cache.json` relative to the project root.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let cache_dir = project_root.join(CACHE_DIR);
        std::fs::create_dir_all(&cache_dir).context("failed to create .bundleguard directory")?;
        let cache_path = cache_dir.join(CACHE_FILE);
        let content = serde_json::to_string_pretty(self)
            .context("failed to serialize classification cache")?;
        std::fs::write(&cache_path, content).context("failed to write classification cache")?;
        Ok(())
    }

    /// Previous entry for a bundle, regardless of freshness.
    pub fn entry(&self, rel_path: &str) -> Option<&CachedClassification> {
        self.bundles.get(rel_path)
    }

    /// Cached classification if its fingerprint still matches.
    pub fn get(&self, rel_path: &str, fingerprint: &str) -> Option<&Classification> {
        let cached = self.bundles.get(rel_path)?;
        if cached.fingerprint == fingerprint {
            Some(&cached.classification)
        } else {
            None
        }
    }

    /// Insert or update a bundle's cache entry.
    pub fn insert(&mut self, rel_path: String, fingerprint: String, classification: Classification) {
        self.bundles.insert(
            rel_path,
            CachedClassification {
                fingerprint,
                checked_at: Utc::now(),
                classification,
            },
        );
    }

    /// Remove entries for bundles that no longer exist.
    pub fn prune(&mut self, existing: &[String]) {
        let existing_set: HashSet<&str> = existing.iter().map(|s| s.as_str()).collect();
        self.bundles
            .retain(|path, _| existing_set.contains(path.as_str()));
    }
}

/// Incremental SHA-256 fingerprint builder.
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Add a labelled chunk. Labels keep adjacent chunks from running together.
    pub fn add(&mut self, label: &str, data: &[u8]) -> &mut Self {
        self.hasher.update(label.as_bytes());
        self.hasher.update((data.len() as u64).to_le_bytes());
        self.hasher.update(data);
        self
    }

    pub fn finish(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}
