use bundleguard_core::graph::BundleGraph;
use bundleguard_core::types::BundleRole;

/// Generate a GraphViz DOT diagram of a bundle's `Require-Bundle` graph.
///
/// Bundles are grouped into Core, UI and other clusters. Requirements that
/// make a checked bundle reach a UI bundle are drawn red and dashed; requirements
/// with no local bundle folder are drawn dashed and grey.
pub fn generate_bundle_graph(graph: &BundleGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph bundles {\n");
    out.push_str("  rankdir=TB;\n");
    out.push_str("  node [shape=box, style=filled];\n\n");

    let mut nodes = graph.nodes();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let clusters = [
        ("core", "Core", "#e8f5e9"),
        ("ui", "UI", "#fce4ec"),
        ("other", "Other", "#f5f5f5"),
    ];

    for (key, label, color) in clusters {
        let members: Vec<_> = nodes
            .iter()
            .filter(|n| cluster_of(n.role) == key)
            .collect();
        if members.is_empty() {
            continue;
        }
        out.push_str(&format!("  subgraph cluster_{key} {{\n"));
        out.push_str(&format!("    label=\"{label}\";\n"));
        out.push_str("    style=filled;\n");
        out.push_str(&format!("    color=\"{color}\";\n"));
        out.push_str("    node [fillcolor=white];\n");
        for n in members {
            let id = sanitize_dot_id(n.id.as_str());
            if n.folder.is_none() {
                out.push_str(&format!(
                    "    {id} [label=\"{}\", style=dashed];\n",
                    n.id
                ));
            } else {
                out.push_str(&format!("    {id} [label=\"{}\"];\n", n.id));
            }
        }
        out.push_str("  }\n\n");
    }

    let mut edges = graph.edges_with_nodes();
    edges.sort_by(|a, b| (&a.0.id, &a.1.id).cmp(&(&b.0.id, &b.1.id)));

    for (src, tgt, edge) in edges {
        let from = sanitize_dot_id(src.id.as_str());
        let to = sanitize_dot_id(tgt.id.as_str());

        if edge.ui {
            out.push_str(&format!(
                "  {from} -> {to} [color=red, style=dashed, label=\"ui\"];\n"
            ));
        } else if !edge.resolved {
            out.push_str(&format!("  {from} -> {to} [color=gray, style=dashed];\n"));
        } else {
            out.push_str(&format!("  {from} -> {to};\n"));
        }
    }

    out.push_str("}\n");
    out
}

fn cluster_of(role: BundleRole) -> &'static str {
    match role {
        BundleRole::Core => "core",
        BundleRole::Ui => "ui",
        _ => "other",
    }
}

/// Sanitize a string to be a valid DOT node ID.
fn sanitize_dot_id(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // DOT IDs must start with a letter or underscore
    if cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("n_{cleaned}")
    } else {
        cleaned
    }
}
