use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::cache::{ClassificationCache, Fingerprint};
use crate::classifier::{BundleDependencyClassifier, Classification};
use crate::config::{Config, CONFIG_FILE};
use crate::manifest::{manifest_path, MANIFEST_DIR, MANIFEST_FILE};
use crate::result::{dedup_cycle_violations, BundleError, BundleReport, CheckResult};

/// Runs the layering check over one bundle or every bundle under a root.
/// Shared between the CLI subcommands.
pub struct CheckPipeline {
    config: Config,
    classifier: BundleDependencyClassifier,
    excludes: GlobSet,
}

fn build_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
            }
            Err(e) => tracing::warn!("ignoring invalid exclude pattern '{pattern}': {e}"),
        }
    }
    builder.build().unwrap_or_else(|e| {
        tracing::warn!("failed to compile exclude patterns: {e}");
        GlobSet::empty()
    })
}

/// Outcome of classifying one discovered bundle.
enum BundleOutcome {
    Classified {
        rel_path: String,
        classification: Classification,
        fingerprint: Option<String>,
        cached: bool,
    },
    Failed(BundleError),
}

impl CheckPipeline {
    pub fn new(config: Config) -> Self {
        let classifier = BundleDependencyClassifier::new(&config);
        let excludes = build_globset(&config.project.exclude_patterns);
        Self {
            config,
            classifier,
            excludes,
        }
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn classifier(&self) -> &BundleDependencyClassifier {
        &self.classifier
    }

    /// Every folder under `root` that holds `META-INF/MANIFEST.MF`, sorted.
    pub fn discover_bundles(&self, root: &Path) -> Vec<PathBuf> {
        let mut bundles: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !self.is_excluded(root, e.path()))
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().is_file()
                    && e.file_name() == MANIFEST_FILE
                    && e.path()
                        .parent()
                        .and_then(|p| p.file_name())
                        .is_some_and(|n| n == MANIFEST_DIR)
            })
            .filter_map(|e| e.path().parent()?.parent().map(Path::to_path_buf))
            .collect();
        bundles.sort();
        bundles.dedup();
        bundles
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let rel = path.strip_prefix(root).unwrap_or(path);
        if rel.as_os_str().is_empty() {
            return false;
        }
        // Match both the folder itself and anything below it
        let normalized = rel.to_string_lossy().replace('\\', "/");
        self.excludes.is_match(&normalized) || self.excludes.is_match(format!("{normalized}/"))
    }

    /// Check a single bundle folder. A broken manifest is an error.
    pub fn check_bundle(&self, folder: &Path) -> Result<CheckResult> {
        let classification = self
            .classifier
            .classify(folder)
            .with_context(|| format!("layering check failed for '{}'", folder.display()))?;
        let report = BundleReport::from_classification(
            classification.folder.clone(),
            &classification,
            &self.config.rules,
            false,
        );
        Ok(CheckResult::new(
            classification.folder.clone(),
            vec![report],
            Vec::new(),
        ))
    }

    /// Check every bundle under `root`, in parallel across bundles.
    pub fn check_all(&self, root: &Path) -> Result<CheckResult> {
        self.check_all_inner(root, false)
    }

    /// Like [`check_all`](Self::check_all), reusing cached results for
    /// bundles whose inputs did not change.
    pub fn check_all_incremental(&self, root: &Path) -> Result<CheckResult> {
        self.check_all_inner(root, true)
    }

    fn check_all_inner(&self, root: &Path, incremental: bool) -> Result<CheckResult> {
        let root = root
            .canonicalize()
            .with_context(|| format!("cannot access '{}'", root.display()))?;
        let bundles = self.discover_bundles(&root);
        tracing::info!("checking {} bundle(s) under {}", bundles.len(), root.display());

        let mut cache = if incremental {
            ClassificationCache::load(&root).unwrap_or_else(|e| {
                tracing::warn!("ignoring unreadable classification cache: {e:#}");
                ClassificationCache::new()
            })
        } else {
            ClassificationCache::new()
        };

        let outcomes: Vec<BundleOutcome> = bundles
            .par_iter()
            .map(|folder| self.check_one(&root, folder, incremental.then_some(&cache)))
            .collect();

        let mut reports = Vec::new();
        let mut errors = Vec::new();
        let mut current = Vec::new();

        for outcome in outcomes {
            match outcome {
                BundleOutcome::Classified {
                    rel_path,
                    classification,
                    fingerprint,
                    cached,
                } => {
                    reports.push(BundleReport::from_classification(
                        PathBuf::from(&rel_path),
                        &classification,
                        &self.config.rules,
                        cached,
                    ));
                    current.push(rel_path.clone());
                    if let Some(fingerprint) = fingerprint {
                        if !cached {
                            cache.insert(rel_path, fingerprint, classification);
                        }
                    }
                }
                BundleOutcome::Failed(error) => {
                    tracing::warn!("{}: {}", error.folder.display(), error.message);
                    errors.push(error);
                }
            }
        }

        if incremental {
            cache.prune(&current);
            if let Err(e) = cache.save(&root) {
                tracing::warn!("failed to save classification cache: {e:#}");
            }
        }

        dedup_cycle_violations(&mut reports);
        Ok(CheckResult::new(root, reports, errors))
    }

    fn check_one(
        &self,
        root: &Path,
        folder: &Path,
        cache: Option<&ClassificationCache>,
    ) -> BundleOutcome {
        let rel_path = folder
            .strip_prefix(root)
            .unwrap_or(folder)
            .to_string_lossy()
            .replace('\\', "/");

        let previous = cache.and_then(|c| c.entry(&rel_path));
        if let (Some(cache), Some(previous)) = (cache, previous) {
            let fingerprint = self.fingerprint(folder, Some(&previous.classification));
            if let Some(hit) = cache.get(&rel_path, &fingerprint) {
                tracing::debug!("cache hit for {rel_path}");
                return BundleOutcome::Classified {
                    rel_path,
                    classification: hit.clone(),
                    fingerprint: Some(fingerprint),
                    cached: true,
                };
            }
        }

        match self.classifier.classify(folder) {
            Ok(classification) => {
                let fingerprint = cache
                    .is_some()
                    .then(|| self.fingerprint(folder, Some(&classification)));
                BundleOutcome::Classified {
                    rel_path,
                    classification,
                    fingerprint,
                    cached: false,
                }
            }
            Err(e) => BundleOutcome::Failed(BundleError {
                folder: PathBuf::from(rel_path),
                message: format!("{:#}", anyhow::Error::from(e)),
            }),
        }
    }

    /// Fingerprint of everything a classification of `folder` depends on:
    /// configuration, the folder index (for expanded roots), and the
    /// manifests of the bundles the traversal visited.
    pub fn fingerprint(&self, folder: &Path, previous: Option<&Classification>) -> String {
        let mut f = Fingerprint::new();
        f.add("config", self.config.fingerprint_input().as_bytes());

        let root_manifest = std::fs::read(manifest_path(folder)).unwrap_or_default();
        f.add("root", &root_manifest);

        if let Some(previous) = previous {
            if previous.index_scans > 0 {
                let index = self.classifier.folder_index(folder);
                f.add("index", index.fingerprint_input().as_bytes());
            }
            for model in previous.models.iter().skip(1) {
                let content = std::fs::read(manifest_path(&model.folder)).unwrap_or_default();
                f.add(&model.folder.to_string_lossy(), &content);
            }
        }
        f.finish()
    }
}

/// Walk up from `start` looking for `.bundleguard.toml` or `.git` to find the project root.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = if start.is_file() {
        start.parent()?.to_path_buf()
    } else {
        start.to_path_buf()
    };

    loop {
        if current.join(CONFIG_FILE).exists() || current.join(".git").exists() {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}
