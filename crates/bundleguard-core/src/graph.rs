use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::types::{BundleId, BundleRole};

/// Node in the bundle graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleNode {
    pub id: BundleId,
    pub role: BundleRole,
    /// `None` for required bundles with no local folder.
    pub folder: Option<PathBuf>,
    pub expanded: bool,
}

/// Edge in the bundle graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequireEdge {
    pub resolved: bool,
    /// The required bundle is a UI bundle and the requiring bundle was checked.
    pub ui: bool,
}

/// Directed `Require-Bundle` graph of the bundles visited in one classification.
pub struct BundleGraph {
    graph: DiGraph<BundleNode, RequireEdge>,
    index: HashMap<BundleId, NodeIndex>,
}

impl BundleGraph {
    pub fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Build the graph from a classification's traversal arena.
    ///
    /// Expanded bundles contribute an edge for every requirement; requirements
    /// without a local folder become unresolved leaf nodes.
    pub fn from_classification(classification: &Classification) -> Self {
        let mut graph = Self::new();
        let models = &classification.models;

        let nodes: Vec<NodeIndex> = models
            .iter()
            .map(|m| {
                graph.add_bundle(BundleNode {
                    id: m.bundle_id().clone(),
                    role: m.role,
                    folder: Some(m.folder.clone()),
                    expanded: m.expanded,
                })
            })
            .collect();

        for (i, model) in models.iter().enumerate() {
            if !model.expanded {
                continue;
            }
            let resolved: HashMap<&BundleId, usize> = model
                .nested
                .iter()
                .map(|n| (&n.required, n.model))
                .collect();

            for dep in &model.manifest.required_bundles {
                let ui = model.ui_direct_dependencies.contains(dep);
                match resolved.get(dep) {
                    Some(&n) => graph.add_require(nodes[i], nodes[n], true, ui),
                    None => {
                        let target = graph.ensure_unresolved(dep, ui);
                        graph.add_require(nodes[i], target, false, ui);
                    }
                }
            }
        }

        graph
    }

    /// Add a bundle node. Returns the existing index if the id is already
    /// present, marking it expanded if the new node is.
    pub fn add_bundle(&mut self, node: BundleNode) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node.id) {
            if node.expanded {
                self.graph[idx].expanded = true;
            }
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        idx
    }

    fn ensure_unresolved(&mut self, id: &BundleId, ui: bool) -> NodeIndex {
        self.add_bundle(BundleNode {
            id: id.clone(),
            role: if ui { BundleRole::Ui } else { BundleRole::Other },
            folder: None,
            expanded: false,
        })
    }

    /// Add a requirement edge unless one already joins the two bundles.
    pub fn add_require(&mut self, from: NodeIndex, to: NodeIndex, resolved: bool, ui: bool) {
        if self.graph.find_edge(from, to).is_none() {
            self.graph.add_edge(from, to, RequireEdge { resolved, ui });
        }
    }

    /// Iterate over all edges with their source and target nodes.
    pub fn edges_with_nodes(&self) -> Vec<(&BundleNode, &BundleNode, &RequireEdge)> {
        self.graph
            .edge_references()
            .map(|e| {
                let src = &self.graph[e.source()];
                let tgt = &self.graph[e.target()];
                (src, tgt, e.weight())
            })
            .collect()
    }

    /// Groups of bundles whose requirements form cycles, each group and the
    /// list of groups sorted by id.
    pub fn find_cycles(&self) -> Vec<Vec<BundleId>> {
        let sccs = petgraph::algo::kosaraju_scc(&self.graph);
        let mut cycles: Vec<Vec<BundleId>> = sccs
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut ids: Vec<BundleId> =
                    scc.iter().map(|&idx| self.graph[idx].id.clone()).collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Get all nodes
    pub fn nodes(&self) -> Vec<&BundleNode> {
        self.graph.node_weights().collect()
    }
}

impl Default for BundleGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{DependencyModel, ResolvedRequire};
    use crate::manifest::BundleManifest;

    /// `nested` pairs a required id with the arena index it resolved to.
    fn model(
        id: &str,
        requires: &[&str],
        nested: Vec<(&str, usize)>,
        expanded: bool,
    ) -> DependencyModel {
        let required: Vec<BundleId> = requires.iter().map(|r| BundleId::from(*r)).collect();
        let nested = nested
            .into_iter()
            .map(|(required, model)| ResolvedRequire {
                required: BundleId::from(required),
                model,
            })
            .collect();
        DependencyModel {
            ui_direct_dependencies: required
                .iter()
                .filter(|r| r.as_str().contains(".ui"))
                .cloned()
                .collect(),
            manifest: BundleManifest {
                bundle_id: BundleId::from(id),
                required_bundles: required,
            },
            folder: PathBuf::from(id),
            role: BundleRole::Core,
            expanded,
            nested,
        }
    }

    fn classification(models: Vec<DependencyModel>) -> Classification {
        Classification {
            folder: PathBuf::from("root"),
            bundle_id: Some(models[0].bundle_id().clone()),
            role: BundleRole::Core,
            ui_dependencies: vec![],
            cycles: vec![],
            unresolved: vec![],
            index_scans: 1,
            models,
        }
    }

    #[test]
    fn test_unresolved_requirements_become_leaf_nodes() {
        let c = classification(vec![
            model("a.core", &["b.util", "c.ui"], vec![("b.util", 1)], true),
            model("b.util", &[], vec![], true),
        ]);
        let graph = BundleGraph::from_classification(&c);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);

        let edges = graph.edges_with_nodes();
        let to_ui = edges
            .iter()
            .find(|(_, tgt, _)| tgt.id.as_str() == "c.ui")
            .unwrap();
        assert!(!to_ui.2.resolved);
        assert!(to_ui.2.ui);
        assert!(to_ui.1.folder.is_none());
        assert_eq!(to_ui.1.role, BundleRole::Ui);
    }

    #[test]
    fn test_leaf_models_contribute_no_edges() {
        let c = classification(vec![
            model("a.core", &["b.util"], vec![("b.util", 1)], true),
            model("b.util", &["c.ui"], vec![], false),
        ]);
        let graph = BundleGraph::from_classification(&c);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_find_cycles() {
        let c = classification(vec![
            model("a.core", &["b.core"], vec![("b.core", 1)], true),
            model("b.core", &["a.core"], vec![("a.core", 0)], true),
        ]);
        let cycles = BundleGraph::from_classification(&c).find_cycles();
        assert_eq!(
            cycles,
            vec![vec![BundleId::from("a.core"), BundleId::from("b.core")]]
        );
    }

    #[test]
    fn test_edges_follow_resolved_folder_not_symbolic_name() {
        // Folder `b.core` holds the bundle `b.core.impl`
        let c = classification(vec![
            model("a.core", &["b.core"], vec![("b.core", 1)], true),
            model("b.core.impl", &["a.core"], vec![("a.core", 0)], true),
        ]);
        let graph = BundleGraph::from_classification(&c);
        assert_eq!(graph.node_count(), 2);
        assert!(graph.edges_with_nodes().iter().all(|(_, _, e)| e.resolved));
        assert_eq!(
            graph.find_cycles(),
            vec![vec![BundleId::from("a.core"), BundleId::from("b.core.impl")]]
        );
    }

    #[test]
    fn test_no_duplicate_nodes() {
        let mut graph = BundleGraph::new();
        let node = BundleNode {
            id: BundleId::from("a.core"),
            role: BundleRole::Core,
            folder: None,
            expanded: false,
        };
        graph.add_bundle(node.clone());
        graph.add_bundle(node);
        assert_eq!(graph.node_count(), 1);
    }
}
