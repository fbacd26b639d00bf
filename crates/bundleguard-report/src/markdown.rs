use bundleguard_core::result::CheckResult;
use bundleguard_core::types::{BundleRole, Severity};

use crate::kind_label;

/// Format a full check report as Markdown.
pub fn format_report(result: &CheckResult) -> String {
    let mut out = String::new();

    out.push_str("# bundleguard - Core/UI Layering Check\n\n");

    let s = &result.summary;
    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Count |\n");
    out.push_str("|--------|-------|\n");
    out.push_str(&format!("| Bundles | {} |\n", s.bundle_count));
    out.push_str(&format!("| Core bundles | {} |\n", s.core_bundle_count));
    out.push_str(&format!(
        "| Violating bundles | {} |\n",
        s.violating_bundle_count
    ));
    out.push_str(&format!("| Violations | {} |\n", s.violation_count));
    out.push_str(&format!("| Errors | {} |\n", s.error_count));

    let core: Vec<_> = result
        .bundles
        .iter()
        .filter(|b| b.role == BundleRole::Core)
        .collect();
    if !core.is_empty() {
        out.push_str("\n## Core Bundles\n\n");
        out.push_str("| Bundle | Visited | Unresolved | UI dependencies |\n");
        out.push_str("|--------|---------|------------|-----------------|\n");
        for b in core {
            let name = b
                .bundle_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| b.folder.display().to_string());
            let ui: Vec<String> = b.ui_bundles().iter().map(|id| format!("`{id}`")).collect();
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                name,
                b.visited,
                b.unresolved.len(),
                if ui.is_empty() {
                    "-".to_string()
                } else {
                    ui.join(", ")
                },
            ));
        }
    }

    let violations: Vec<_> = result.violations().collect();
    if violations.is_empty() {
        out.push_str("\n## Violations\n\nNo violations found.\n");
    } else {
        out.push_str(&format!("\n## Violations ({} found)\n\n", violations.len()));
        out.push_str("| Severity | Type | Location | Message |\n");
        out.push_str("|----------|------|----------|--------|\n");

        for v in violations {
            let severity = match v.severity {
                Severity::Error => "ERROR",
                Severity::Warning => "WARN",
                Severity::Info => "INFO",
            };
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                severity,
                kind_label(&v.kind),
                v.folder.display(),
                v.message
            ));
        }
    }

    if !result.errors.is_empty() {
        out.push_str(&format!("\n## Errors ({})\n\n", result.errors.len()));
        for e in &result.errors {
            out.push_str(&format!("- `{}`: {}\n", e.folder.display(), e.message));
        }
    }

    out.push('\n');
    out
}

/// Format a check result as Markdown. Returns (markdown, passed).
pub fn format_check(result: &CheckResult, fail_on: Severity) -> (String, bool) {
    let failing = result.failing_violation_count(fail_on);
    let passed = result.passed(fail_on);

    let mut out = format_report(result);

    if passed {
        out.push_str("## Result\n\n**CHECK PASSED**\n");
    } else if failing > 0 {
        out.push_str(&format!(
            "## Result\n\n**CHECK FAILED**: {failing} violation(s) at severity {fail_on} or above\n"
        ));
    } else {
        out.push_str(&format!(
            "## Result\n\n**CHECK FAILED**: {} bundle(s) could not be checked\n",
            result.errors.len()
        ));
    }

    (out, passed)
}
