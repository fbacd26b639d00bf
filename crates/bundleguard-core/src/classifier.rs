use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{Config, ScanConfig};
use crate::folder_index::FolderIndex;
use crate::graph::BundleGraph;
use crate::layer::LayerRules;
use crate::manifest::{BundleManifest, ManifestError};
use crate::types::{BundleId, BundleRole};

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("failed to classify bundle '{}'", folder.display())]
    Manifest {
        folder: PathBuf,
        #[source]
        source: ManifestError,
    },
}

/// One bundle folder visited during a traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyModel {
    pub manifest: BundleManifest,
    pub folder: PathBuf,
    pub role: BundleRole,
    /// Whether the bundle's requirements were followed. Only true for
    /// non-test bundles that are Core or whose parent is Core.
    pub expanded: bool,
    /// Required ids that name UI bundles. Empty unless expanded.
    pub ui_direct_dependencies: Vec<BundleId>,
    /// Requirements that resolved to a local bundle, in `Require-Bundle` order.
    pub nested: Vec<ResolvedRequire>,
}

/// A `Require-Bundle` entry and the arena index of the folder it resolved to.
///
/// The folder is found by name, so the model's own symbolic name may differ
/// from `required`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRequire {
    pub required: BundleId,
    pub model: usize,
}

impl DependencyModel {
    pub fn bundle_id(&self) -> &BundleId {
        &self.manifest.bundle_id
    }
}

/// A UI bundle reached from a Core bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiDependency {
    pub ui_bundle: BundleId,
    /// Require chain from the checked bundle to the bundle declaring `ui_bundle`.
    pub via: Vec<BundleId>,
}

/// Outcome of classifying one bundle folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub folder: PathBuf,
    /// `None` when the folder has no manifest.
    pub bundle_id: Option<BundleId>,
    pub role: BundleRole,
    /// UI bundles reached from a Core root, first occurrence order.
    pub ui_dependencies: Vec<UiDependency>,
    pub cycles: Vec<Vec<BundleId>>,
    /// Required ids with no local bundle folder.
    pub unresolved: Vec<BundleId>,
    /// Number of folder index builds (0 or 1).
    pub index_scans: usize,
    /// Traversal arena; index 0 is the checked bundle.
    pub models: Vec<DependencyModel>,
}

impl Classification {
    fn not_a_bundle(folder: PathBuf) -> Self {
        Self {
            folder,
            bundle_id: None,
            role: BundleRole::NotABundle,
            ui_dependencies: Vec::new(),
            cycles: Vec::new(),
            unresolved: Vec::new(),
            index_scans: 0,
            models: Vec::new(),
        }
    }

    /// The violation set: UI bundle ids in traversal order.
    pub fn violation_ids(&self) -> Vec<&BundleId> {
        self.ui_dependencies.iter().map(|d| &d.ui_bundle).collect()
    }

    /// Number of distinct bundle folders visited. A folder reached both as a
    /// leaf and as an expanded bundle has two models but counts once.
    pub fn visited(&self) -> usize {
        self.models
            .iter()
            .map(|m| m.folder.as_path())
            .collect::<HashSet<_>>()
            .len()
    }
}

/// Decides whether a Core bundle transitively requires UI bundles.
#[derive(Debug)]
pub struct BundleDependencyClassifier {
    rules: LayerRules,
    limits: ScanConfig,
    marker: String,
    index_builds: AtomicUsize,
}

impl BundleDependencyClassifier {
    pub fn new(config: &Config) -> Self {
        Self {
            rules: LayerRules::new(&config.layers),
            limits: config.scan,
            marker: config.project.project_marker.clone(),
            index_builds: AtomicUsize::new(0),
        }
    }

    /// Total folder index builds performed by this classifier.
    pub fn index_builds(&self) -> usize {
        self.index_builds.load(Ordering::Relaxed)
    }

    /// Build the folder index for a traversal rooted at `folder`.
    pub fn folder_index(&self, folder: &Path) -> FolderIndex {
        self.index_builds.fetch_add(1, Ordering::Relaxed);
        FolderIndex::build(folder, self.limits, &self.marker)
    }

    /// Classify the bundle in `folder`.
    ///
    /// A folder without `META-INF/MANIFEST.MF` is not a bundle and yields an
    /// empty result. Unreadable manifests anywhere in the traversal fail the
    /// whole classification.
    pub fn classify(&self, folder: &Path) -> Result<Classification, ClassifyError> {
        let folder = folder
            .canonicalize()
            .unwrap_or_else(|_| folder.to_path_buf());

        let manifest = match BundleManifest::read(&folder) {
            Ok(Some(m)) => m,
            Ok(None) => {
                tracing::debug!("no manifest in {}, rule does not apply", folder.display());
                return Ok(Classification::not_a_bundle(folder));
            }
            Err(source) => return Err(ClassifyError::Manifest { folder, source }),
        };

        let root_id = manifest.bundle_id.clone();
        let role = self.rules.role(&root_id);
        let activated = self.rules.is_core(&root_id) && !self.rules.is_test(&root_id);

        let mut index_scans = 0;
        let index = if activated {
            index_scans += 1;
            let index = self.folder_index(&folder);
            if index.is_empty() {
                tracing::debug!(
                    "no {} project folders around {}",
                    self.marker,
                    folder.display()
                );
            }
            index
        } else {
            FolderIndex::default()
        };

        let mut traversal = Traversal {
            rules: &self.rules,
            index: &index,
            models: Vec::new(),
            expanded_at: HashMap::new(),
            leaf_at: HashMap::new(),
            unresolved: Vec::new(),
        };
        traversal.visit(&folder, manifest, false)?;

        let Traversal {
            models, unresolved, ..
        } = traversal;

        let ui_dependencies = if activated {
            aggregate_ui_dependencies(&models)
        } else {
            Vec::new()
        };

        let mut classification = Classification {
            folder,
            bundle_id: Some(root_id),
            role,
            ui_dependencies,
            cycles: Vec::new(),
            unresolved,
            index_scans,
            models,
        };
        classification.cycles = BundleGraph::from_classification(&classification).find_cycles();

        tracing::debug!(
            bundle = %classification.bundle_id.as_ref().map(|b| b.as_str()).unwrap_or_default(),
            visited = classification.visited(),
            ui = classification.ui_dependencies.len(),
            "classified bundle"
        );
        Ok(classification)
    }
}

struct Traversal<'a> {
    rules: &'a LayerRules,
    index: &'a FolderIndex,
    models: Vec<DependencyModel>,
    expanded_at: HashMap<PathBuf, usize>,
    leaf_at: HashMap<PathBuf, usize>,
    unresolved: Vec<BundleId>,
}

impl Traversal<'_> {
    /// Add the model for `folder` to the arena and return its index.
    ///
    /// Expanded folders are memoized, so each one is walked at most once and
    /// cyclic `Require-Bundle` graphs terminate.
    fn visit(
        &mut self,
        folder: &Path,
        manifest: BundleManifest,
        parent_is_core: bool,
    ) -> Result<usize, ClassifyError> {
        let id = manifest.bundle_id.clone();
        let is_core = self.rules.is_core(&id);
        let activated = (is_core || parent_is_core) && !self.rules.is_test(&id);

        let memo = if activated {
            &self.expanded_at
        } else {
            &self.leaf_at
        };
        if let Some(&idx) = memo.get(folder) {
            return Ok(idx);
        }

        let idx = self.models.len();
        self.models.push(DependencyModel {
            folder: folder.to_path_buf(),
            role: self.rules.role(&id),
            expanded: activated,
            ui_direct_dependencies: Vec::new(),
            nested: Vec::new(),
            manifest,
        });

        if !activated {
            self.leaf_at.insert(folder.to_path_buf(), idx);
            return Ok(idx);
        }
        self.expanded_at.insert(folder.to_path_buf(), idx);

        let required = self.models[idx].manifest.required_bundles.clone();
        tracing::debug!(
            "{id} requires: {}",
            required
                .iter()
                .map(BundleId::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        );

        let rules = self.rules;
        let ui: Vec<BundleId> = required
            .iter()
            .filter(|dep| rules.is_ui(dep))
            .cloned()
            .collect();
        self.models[idx].ui_direct_dependencies = ui;

        for dep in &required {
            let Some(location) = self.index.resolve(dep.as_str()) else {
                self.note_unresolved(dep);
                continue;
            };
            let location = location.to_path_buf();
            let nested_manifest = match BundleManifest::read(&location) {
                Ok(Some(m)) => m,
                Ok(None) => {
                    self.note_unresolved(dep);
                    continue;
                }
                Err(source) => {
                    return Err(ClassifyError::Manifest {
                        folder: location,
                        source,
                    })
                }
            };
            let child = self.visit(&location, nested_manifest, is_core)?;
            let nested = &mut self.models[idx].nested;
            if !nested.iter().any(|n| n.required == *dep) {
                nested.push(ResolvedRequire {
                    required: dep.clone(),
                    model: child,
                });
            }
        }

        Ok(idx)
    }

    fn note_unresolved(&mut self, dep: &BundleId) {
        tracing::debug!("no local folder for {dep}");
        if !self.unresolved.contains(dep) {
            self.unresolved.push(dep.clone());
        }
    }
}

/// Union of UI requirements over the models reachable from the root, own
/// requirements before nested ones, first occurrence wins.
fn aggregate_ui_dependencies(models: &[DependencyModel]) -> Vec<UiDependency> {
    let mut found = Vec::new();
    if models.is_empty() {
        return found;
    }
    let mut seen_models = HashSet::new();
    let mut seen_ids = HashSet::new();
    let mut chain = Vec::new();
    collect_ui(models, 0, &mut seen_models, &mut seen_ids, &mut chain, &mut found);
    found
}

fn collect_ui<'a>(
    models: &'a [DependencyModel],
    idx: usize,
    seen_models: &mut HashSet<usize>,
    seen_ids: &mut HashSet<&'a BundleId>,
    chain: &mut Vec<BundleId>,
    found: &mut Vec<UiDependency>,
) {
    if !seen_models.insert(idx) {
        return;
    }
    let model = &models[idx];
    chain.push(model.bundle_id().clone());

    for ui in &model.ui_direct_dependencies {
        if seen_ids.insert(ui) {
            found.push(UiDependency {
                ui_bundle: ui.clone(),
                via: chain.clone(),
            });
        }
    }
    for nested in &model.nested {
        collect_ui(models, nested.model, seen_models, seen_ids, chain, found);
    }

    chain.pop();
}
