use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::ScanConfig;

/// Map from simple folder name to the project folders carrying that name.
///
/// Built once per traversal root by a bounded scan around the root: up to
/// `max_parents` ancestor project folders, and up to `max_depth` levels into
/// project folders below each visited folder. Only folders containing the
/// project marker are recorded. Bundle ids are resolved by assuming the
/// bundle folder is named after the bundle.
#[derive(Debug, Clone, Default)]
pub struct FolderIndex {
    entries: HashMap<String, Vec<PathBuf>>,
    dirs_listed: usize,
}

impl FolderIndex {
    pub fn build(root: &Path, limits: ScanConfig, marker: &str) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let mut index = Self::default();
        index.scan(&root, limits.max_parents, limits.max_depth, marker);
        tracing::debug!(
            root = %root.display(),
            names = index.len(),
            dirs_listed = index.dirs_listed,
            "built folder index"
        );
        index
    }

    fn scan(&mut self, folder: &Path, max_parents: u32, max_depth: u32, marker: &str) {
        let is_project = folder.is_dir() && folder.join(marker).exists();

        if is_project {
            if let Some(name) = folder.file_name() {
                let candidates = self
                    .entries
                    .entry(name.to_string_lossy().into_owned())
                    .or_default();
                if !candidates.iter().any(|c| c == folder) {
                    candidates.push(folder.to_path_buf());
                }
            }
        }

        // Only descend into folders that are projects themselves
        if max_depth > 0 && is_project {
            for child in self.list_children(folder) {
                self.scan(&child, 0, max_depth - 1, marker);
            }
        }

        if max_parents > 0 {
            if let Some(parent) = folder.parent() {
                if parent.join(marker).exists() {
                    self.scan(parent, max_parents - 1, max_depth, marker);
                }
            }
        }
    }

    /// Child directories in lexicographic order.
    fn list_children(&mut self, folder: &Path) -> Vec<PathBuf> {
        self.dirs_listed += 1;
        let mut children: Vec<PathBuf> = match std::fs::read_dir(folder) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                // follows symlinked folders
                .filter(|p| p.is_dir())
                .collect(),
            Err(e) => {
                tracing::warn!("failed to list {}: {e}", folder.display());
                Vec::new()
            }
        };
        children.sort();
        children
    }

    /// First candidate folder for a bundle id.
    pub fn resolve(&self, bundle_id: &str) -> Option<&Path> {
        self.candidates(bundle_id).first().map(PathBuf::as_path)
    }

    /// All candidate folders for a bundle id, in scan order.
    pub fn candidates(&self, bundle_id: &str) -> &[PathBuf] {
        self.entries
            .get(bundle_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of directory listings performed while building.
    pub fn dirs_listed(&self) -> usize {
        self.dirs_listed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted `name=path` lines, stable across runs on an unchanged tree.
    pub fn fingerprint_input(&self) -> String {
        let mut lines: Vec<String> = self
            .entries
            .iter()
            .flat_map(|(name, paths)| {
                paths
                    .iter()
                    .map(move |p| format!("{name}={}", p.display()))
            })
            .collect();
        lines.sort();
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project(path: &Path) {
        std::fs::create_dir_all(path).unwrap();
        std::fs::write(path.join("pom.xml"), "<project/>").unwrap();
    }

    #[test]
    fn test_finds_siblings_through_parent_project() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        project(&root);
        project(&root.join("plugins"));
        project(&root.join("plugins/org.example.core"));
        project(&root.join("plugins/org.example.ui.views"));

        let index = FolderIndex::build(
            &root.join("plugins/org.example.core"),
            ScanConfig::default(),
            "pom.xml",
        );
        let views = index.resolve("org.example.ui.views").unwrap();
        assert!(views.ends_with("plugins/org.example.ui.views"));
        assert!(index.resolve("org.example.core").is_some());
        assert!(index.resolve("org.example.util").is_none());
    }

    #[test]
    fn test_folders_without_marker_are_not_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        project(&root);
        project(&root.join("org.example.core"));
        std::fs::create_dir_all(root.join("org.example.ui")).unwrap();

        let index = FolderIndex::build(&root.join("org.example.core"), ScanConfig::default(), "pom.xml");
        assert!(index.resolve("org.example.ui").is_none());
    }

    #[test]
    fn test_does_not_climb_past_non_project_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let outer = tmp.path().join("outer");
        project(&outer);
        project(&outer.join("org.example.elsewhere"));
        // `middle` has no pom.xml, so the scan stops there
        let middle = outer.join("middle");
        project(&middle.join("org.example.core"));

        let index = FolderIndex::build(&middle.join("org.example.core"), ScanConfig::default(), "pom.xml");
        assert!(index.resolve("org.example.elsewhere").is_none());
    }

    #[test]
    fn test_max_parents_bounds_the_climb() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        project(&a);
        project(&a.join("org.example.far"));
        project(&a.join("b"));
        project(&a.join("b/c"));
        project(&a.join("b/c/org.example.core"));

        let limits = ScanConfig {
            max_parents: 1,
            max_depth: 3,
        };
        let index = FolderIndex::build(&a.join("b/c/org.example.core"), limits, "pom.xml");
        assert!(index.resolve("c").is_some());
        assert!(index.resolve("org.example.far").is_none());

        let index = FolderIndex::build(&a.join("b/c/org.example.core"), ScanConfig::default(), "pom.xml");
        assert!(index.resolve("org.example.far").is_some());
    }

    #[test]
    fn test_max_depth_bounds_the_descent() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        project(&root.join("l1/l2/l3/l4"));
        project(&root);
        project(&root.join("l1"));
        project(&root.join("l1/l2"));
        project(&root.join("l1/l2/l3"));

        let limits = ScanConfig {
            max_parents: 0,
            max_depth: 3,
        };
        let index = FolderIndex::build(&root, limits, "pom.xml");
        assert!(index.resolve("l3").is_some());
        assert!(index.resolve("l4").is_none());
    }

    #[test]
    fn test_duplicate_names_keep_scan_order() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        project(&root);
        project(&root.join("a/org.example.util"));
        project(&root.join("a"));
        project(&root.join("b/org.example.util"));
        project(&root.join("b"));
        project(&root.join("org.example.core"));

        let index = FolderIndex::build(&root.join("org.example.core"), ScanConfig::default(), "pom.xml");
        let candidates = index.candidates("org.example.util");
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0].ends_with("a/org.example.util"));
        assert!(candidates[1].ends_with("b/org.example.util"));
        assert_eq!(index.resolve("org.example.util"), Some(candidates[0].as_path()));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        project(&root);
        project(&root.join("x"));
        project(&root.join("y"));

        let a = FolderIndex::build(&root, ScanConfig::default(), "pom.xml");
        let b = FolderIndex::build(&root, ScanConfig::default(), "pom.xml");
        assert_eq!(a.fingerprint_input(), b.fingerprint_input());
        assert!(a.dirs_listed() > 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_project_folders_are_indexed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("repo");
        project(&root);
        project(&root.join("org.example.core"));
        project(&tmp.path().join("elsewhere/org.example.ui"));
        std::os::unix::fs::symlink(
            tmp.path().join("elsewhere/org.example.ui"),
            root.join("org.example.ui"),
        )
        .unwrap();

        let index = FolderIndex::build(&root.join("org.example.core"), ScanConfig::default(), "pom.xml");
        let ui = index.resolve("org.example.ui").unwrap();
        assert!(ui.ends_with("repo/org.example.ui"));
        assert!(!index.is_empty());
    }
}
