use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::classifier::Classification;
use crate::config::RulesConfig;
use crate::types::{BundleId, BundleRole, Severity, Violation, ViolationKind};

const LIST_SEPARATOR: &str = "\n     > ";

/// Check outcome for a single bundle folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleReport {
    /// Folder relative to the checked root when possible.
    pub folder: PathBuf,
    pub bundle_id: Option<BundleId>,
    pub role: BundleRole,
    pub visited: usize,
    pub unresolved: Vec<BundleId>,
    pub violations: Vec<Violation>,
    /// Result was reused from the classification cache.
    #[serde(default)]
    pub cached: bool,
}

impl BundleReport {
    pub fn from_classification(
        folder: PathBuf,
        classification: &Classification,
        rules: &RulesConfig,
        cached: bool,
    ) -> Self {
        Self {
            violations: build_violations(&folder, classification, rules),
            folder,
            bundle_id: classification.bundle_id.clone(),
            role: classification.role,
            visited: classification.visited(),
            unresolved: classification.unresolved.clone(),
            cached,
        }
    }

    /// UI bundle ids this bundle reaches, in report order.
    pub fn ui_bundles(&self) -> Vec<&BundleId> {
        self.violations
            .iter()
            .filter_map(|v| match &v.kind {
                ViolationKind::UiDependency { ui_bundle, .. } => Some(ui_bundle),
                ViolationKind::CyclicRequire { .. } => None,
            })
            .collect()
    }

    /// The single aggregated build-failure message, if this bundle reaches UI bundles.
    pub fn failure_message(&self) -> Option<String> {
        let ui = self.ui_bundles();
        if ui.is_empty() {
            return None;
        }
        let name = self
            .bundle_id
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_else(|| self.folder.display().to_string());
        let list: Vec<&str> = ui.iter().map(|b| b.as_str()).collect();
        Some(format!(
            "{name} is a Core plugin, but depends on these UI plugins directly or transitively:{LIST_SEPARATOR}{}",
            list.join(LIST_SEPARATOR)
        ))
    }
}

/// A bundle whose classification failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleError {
    pub folder: PathBuf,
    pub message: String,
}

/// Counts over a check run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckSummary {
    pub bundle_count: usize,
    pub core_bundle_count: usize,
    pub violating_bundle_count: usize,
    pub violation_count: usize,
    pub error_count: usize,
}

/// Result of checking one bundle or a whole repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub root: PathBuf,
    pub bundles: Vec<BundleReport>,
    pub errors: Vec<BundleError>,
    pub summary: CheckSummary,
}

impl CheckResult {
    pub fn new(root: PathBuf, bundles: Vec<BundleReport>, errors: Vec<BundleError>) -> Self {
        let summary = CheckSummary {
            bundle_count: bundles
                .iter()
                .filter(|b| b.role != BundleRole::NotABundle)
                .count(),
            core_bundle_count: bundles.iter().filter(|b| b.role == BundleRole::Core).count(),
            violating_bundle_count: bundles.iter().filter(|b| !b.violations.is_empty()).count(),
            violation_count: bundles.iter().map(|b| b.violations.len()).sum(),
            error_count: errors.len(),
        };
        Self {
            root,
            bundles,
            errors,
            summary,
        }
    }

    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.bundles.iter().flat_map(|b| b.violations.iter())
    }

    /// Violations at or above `fail_on`.
    pub fn failing_violation_count(&self, fail_on: Severity) -> usize {
        self.violations().filter(|v| v.severity >= fail_on).count()
    }

    /// Passed when nothing reaches `fail_on` and every bundle could be classified.
    pub fn passed(&self, fail_on: Severity) -> bool {
        self.failing_violation_count(fail_on) == 0 && self.errors.is_empty()
    }
}

/// Turn a classification into severity-tagged violations.
pub fn build_violations(
    folder: &std::path::Path,
    classification: &Classification,
    rules: &RulesConfig,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let Some(core) = classification.bundle_id.as_ref() else {
        return violations;
    };

    for dep in &classification.ui_dependencies {
        let kind = ViolationKind::UiDependency {
            core_bundle: core.clone(),
            ui_bundle: dep.ui_bundle.clone(),
            via: dep.via.clone(),
        };
        let message = if dep.via.len() > 1 {
            let chain: Vec<&str> = dep.via.iter().map(BundleId::as_str).collect();
            format!(
                "Core bundle {core} requires UI bundle {} through {}",
                dep.ui_bundle,
                chain.join(" > ")
            )
        } else {
            format!("Core bundle {core} requires UI bundle {}", dep.ui_bundle)
        };
        violations.push(Violation {
            severity: rules.severity_of(kind.rule_key()),
            kind,
            folder: folder.to_path_buf(),
            message,
            suggestion: Some(format!(
                "Move the code that needs {} into a UI bundle, or depend on a non-UI API",
                dep.ui_bundle
            )),
        });
    }

    for cycle in &classification.cycles {
        let names: Vec<&str> = cycle.iter().map(BundleId::as_str).collect();
        let kind = ViolationKind::CyclicRequire {
            cycle: cycle.clone(),
        };
        violations.push(Violation {
            severity: rules.severity_of(kind.rule_key()),
            kind,
            folder: folder.to_path_buf(),
            message: format!("Require-Bundle cycle between {}", names.join(", ")),
            suggestion: Some("Break the cycle by extracting the shared code".to_string()),
        });
    }

    violations
}

/// Keep each `Require-Bundle` cycle on one report only.
///
/// Every Core bundle on a cycle sees the same cycle. It stays with the bundle
/// named first in the cycle, or with the first report carrying it when that
/// bundle was not checked.
pub fn dedup_cycle_violations(reports: &mut [BundleReport]) {
    let mut owners: HashMap<Vec<BundleId>, usize> = HashMap::new();
    for (i, report) in reports.iter().enumerate() {
        for v in &report.violations {
            let ViolationKind::CyclicRequire { cycle } = &v.kind else {
                continue;
            };
            let named_first = report.bundle_id.as_ref() == cycle.first();
            match owners.entry(cycle.clone()) {
                Entry::Vacant(e) => {
                    e.insert(i);
                }
                Entry::Occupied(mut e) => {
                    if named_first {
                        e.insert(i);
                    }
                }
            }
        }
    }

    for (i, report) in reports.iter_mut().enumerate() {
        report.violations.retain(|v| match &v.kind {
            ViolationKind::CyclicRequire { cycle } => owners.get(cycle) == Some(&i),
            ViolationKind::UiDependency { .. } => true,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::UiDependency;

    fn classification(ui: &[(&str, &[&str])], cycles: Vec<Vec<BundleId>>) -> Classification {
        Classification {
            folder: PathBuf::from("/repo/plugins/org.example.core"),
            bundle_id: Some(BundleId::from("org.example.core")),
            role: BundleRole::Core,
            ui_dependencies: ui
                .iter()
                .map(|(id, via)| UiDependency {
                    ui_bundle: BundleId::from(*id),
                    via: via.iter().map(|v| BundleId::from(*v)).collect(),
                })
                .collect(),
            cycles,
            unresolved: vec![],
            index_scans: 1,
            models: vec![],
        }
    }

    #[test]
    fn test_build_violations_uses_configured_severities() {
        let c = classification(
            &[("org.example.ui.views", &["org.example.core"])],
            vec![vec!["a.core".into(), "b.core".into()]],
        );
        let violations = build_violations(&c.folder, &c, &RulesConfig::default());
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].severity, Severity::Error);
        assert_eq!(
            violations[0].message,
            "Core bundle org.example.core requires UI bundle org.example.ui.views"
        );
        assert_eq!(violations[1].severity, Severity::Warning);
        assert!(violations[1].message.contains("a.core, b.core"));
    }

    #[test]
    fn test_transitive_message_shows_chain() {
        let c = classification(
            &[("org.example.ui.widgets", &["org.example.core", "org.example.helper"])],
            vec![],
        );
        let violations = build_violations(&c.folder, &c, &RulesConfig::default());
        assert!(violations[0]
            .message
            .ends_with("through org.example.core > org.example.helper"));
    }

    #[test]
    fn test_failure_message_lists_every_ui_bundle() {
        let c = classification(
            &[
                ("org.example.ui.views", &["org.example.core"]),
                ("org.example.ui", &["org.example.core"]),
            ],
            vec![],
        );
        let report = BundleReport::from_classification(
            PathBuf::from("plugins/org.example.core"),
            &c,
            &RulesConfig::default(),
            false,
        );
        assert_eq!(
            report.failure_message().unwrap(),
            "org.example.core is a Core plugin, but depends on these UI plugins directly or transitively:\n     > org.example.ui.views\n     > org.example.ui"
        );
    }

    #[test]
    fn test_no_failure_message_without_ui_bundles() {
        let c = classification(&[], vec![vec!["a.core".into(), "b.core".into()]]);
        let report = BundleReport::from_classification(
            PathBuf::from("x"),
            &c,
            &RulesConfig::default(),
            false,
        );
        assert!(report.failure_message().is_none());
    }

    #[test]
    fn test_check_result_pass_fail() {
        let failing = classification(&[("org.example.ui", &["org.example.core"])], vec![]);
        let report = BundleReport::from_classification(
            PathBuf::from("a"),
            &failing,
            &RulesConfig::default(),
            false,
        );
        let result = CheckResult::new(PathBuf::from("/repo"), vec![report], vec![]);
        assert!(!result.passed(Severity::Error));
        assert_eq!(result.summary.violation_count, 1);
        assert_eq!(result.summary.core_bundle_count, 1);

        let cyclic = classification(&[], vec![vec!["a.core".into(), "b.core".into()]]);
        let report = BundleReport::from_classification(
            PathBuf::from("b"),
            &cyclic,
            &RulesConfig::default(),
            false,
        );
        let result = CheckResult::new(PathBuf::from("/repo"), vec![report], vec![]);
        assert!(result.passed(Severity::Error));
        assert!(!result.passed(Severity::Warning));
    }

    #[test]
    fn test_errors_fail_the_check() {
        let result = CheckResult::new(
            PathBuf::from("/repo"),
            vec![],
            vec![BundleError {
                folder: PathBuf::from("broken"),
                message: "bad manifest".to_string(),
            }],
        );
        assert!(!result.passed(Severity::Error));
        assert_eq!(result.summary.error_count, 1);
    }

    #[test]
    fn test_cycle_between_core_bundles_is_reported_once() {
        let cycle: Vec<BundleId> = vec!["a.core".into(), "b.core".into()];
        let report = |id: &str| {
            let mut c = classification(&[], vec![cycle.clone()]);
            c.bundle_id = Some(BundleId::from(id));
            BundleReport::from_classification(PathBuf::from(id), &c, &RulesConfig::default(), false)
        };
        let mut reports = vec![report("b.core"), report("a.core")];

        dedup_cycle_violations(&mut reports);
        assert!(reports[0].violations.is_empty());
        assert_eq!(reports[1].violations.len(), 1);

        let result = CheckResult::new(PathBuf::from("/repo"), reports, vec![]);
        assert_eq!(result.summary.violation_count, 1);
        assert_eq!(result.summary.violating_bundle_count, 1);
    }

    #[test]
    fn test_cycle_stays_with_first_report_when_first_member_unchecked() {
        let cycle: Vec<BundleId> = vec!["a.core".into(), "b.core".into(), "c.core".into()];
        let report = |id: &str| {
            let mut c = classification(&[("x.ui", &[id])], vec![cycle.clone()]);
            c.bundle_id = Some(BundleId::from(id));
            BundleReport::from_classification(PathBuf::from(id), &c, &RulesConfig::default(), false)
        };
        let mut reports = vec![report("c.core"), report("b.core")];

        dedup_cycle_violations(&mut reports);
        assert_eq!(reports[0].violations.len(), 2);
        assert_eq!(reports[1].violations.len(), 1);
        assert!(matches!(
            reports[1].violations[0].kind,
            ViolationKind::UiDependency { .. }
        ));
    }
}
