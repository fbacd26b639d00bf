use colored::Colorize;

use bundleguard_core::result::CheckResult;
use bundleguard_core::types::{BundleRole, Severity};

use crate::kind_label;

/// Format a full check report for terminal output.
pub fn format_report(result: &CheckResult) -> String {
    let mut out = String::new();

    // Header
    out.push_str(&format!(
        "\n{}\n",
        "bundleguard - Core/UI Layering Check".bold()
    ));
    out.push_str(&format!("{}\n\n", "=".repeat(40)));

    // Stats
    let s = &result.summary;
    out.push_str(&format!(
        "{}: {} bundles ({} core), {} violating, {} errors\n",
        "Summary".bold(),
        s.bundle_count,
        s.core_bundle_count,
        s.violating_bundle_count,
        s.error_count,
    ));

    // Core bundles
    let core: Vec<_> = result
        .bundles
        .iter()
        .filter(|b| b.role == BundleRole::Core)
        .collect();
    if !core.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Core bundles".bold(), "-".repeat(40)));
        for b in core {
            let name = b
                .bundle_id
                .as_ref()
                .map(|id| id.to_string())
                .unwrap_or_else(|| b.folder.display().to_string());
            let status = if b.ui_bundles().is_empty() {
                "ok".green().to_string()
            } else {
                "ui".red().to_string()
            };
            out.push_str(&format!(
                "  [{status}] {name}: {} visited, {} unresolved{}\n",
                b.visited,
                b.unresolved.len(),
                if b.cached { " (cached)" } else { "" },
            ));
        }
    }

    // Violations
    let violations: Vec<_> = result.violations().collect();
    if violations.is_empty() {
        out.push_str(&format!("\n{}\n", "No violations found!".green().bold()));
    } else {
        out.push_str(&format!(
            "\n{} ({} found)\n{}\n",
            "Violations".red().bold(),
            violations.len(),
            "-".repeat(40),
        ));

        for v in violations {
            let severity_str = match v.severity {
                Severity::Error => "ERROR".red().bold().to_string(),
                Severity::Warning => "WARN".yellow().bold().to_string(),
                Severity::Info => "INFO".blue().bold().to_string(),
            };

            out.push_str(&format!(
                "\n  {} [{}] {}\n",
                severity_str,
                kind_label(&v.kind),
                v.folder.display(),
            ));
            out.push_str(&format!("    {}\n", v.message));
            if let Some(ref suggestion) = v.suggestion {
                out.push_str(&format!("    {}: {}\n", "Suggestion".cyan(), suggestion));
            }
        }
    }

    // Aggregated failure messages, one per violating bundle
    let failures: Vec<String> = result
        .bundles
        .iter()
        .filter_map(|b| b.failure_message())
        .collect();
    if !failures.is_empty() {
        out.push_str(&format!("\n{}\n{}\n", "Failures".red().bold(), "-".repeat(40)));
        for failure in failures {
            out.push_str(&format!("{failure}\n"));
        }
    }

    if !result.errors.is_empty() {
        out.push_str(&format!(
            "\n{} ({} bundles)\n{}\n",
            "Errors".red().bold(),
            result.errors.len(),
            "-".repeat(40),
        ));
        for e in &result.errors {
            out.push_str(&format!("  {}: {}\n", e.folder.display(), e.message));
        }
    }

    out.push('\n');
    out
}

/// Format a check result for CI use. Returns (text, passed).
pub fn format_check(result: &CheckResult, fail_on: Severity) -> (String, bool) {
    let failing = result.failing_violation_count(fail_on);
    let passed = result.passed(fail_on);

    let mut out = format_report(result);

    if passed {
        out.push_str(&format!("{}\n", "CHECK PASSED".green().bold()));
    } else if failing > 0 {
        out.push_str(&format!(
            "{}: {} violation(s) at severity {} or above\n",
            "CHECK FAILED".red().bold(),
            failing,
            fail_on,
        ));
    } else {
        out.push_str(&format!(
            "{}: {} bundle(s) could not be checked\n",
            "CHECK FAILED".red().bold(),
            result.errors.len(),
        ));
    }

    (out, passed)
}
