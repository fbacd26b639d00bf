pub mod dot;
pub mod json;
pub mod markdown;
pub mod text;

use bundleguard_core::types::ViolationKind;

/// Short label for a violation kind, shared by the text and Markdown reports.
pub(crate) fn kind_label(kind: &ViolationKind) -> String {
    match kind {
        ViolationKind::UiDependency { ui_bundle, .. } => format!("ui dependency: {ui_bundle}"),
        ViolationKind::CyclicRequire { .. } => "cyclic require".to_string(),
    }
}
