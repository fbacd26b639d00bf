use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// OSGi symbolic name of a bundle, without attributes or directives.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BundleId(pub String);

impl BundleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BundleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BundleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Role of a bundle with respect to the Core/UI layering rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BundleRole {
    /// Business-logic bundle; must not reach UI bundles.
    Core,
    /// Presentation bundle.
    Ui,
    /// Test fragment or plugin; exempt from the rule.
    Test,
    /// Neither Core nor UI.
    Other,
    /// Folder without `META-INF/MANIFEST.MF`.
    NotABundle,
}

impl fmt::Display for BundleRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleRole::Core => write!(f, "core"),
            BundleRole::Ui => write!(f, "ui"),
            BundleRole::Test => write!(f, "test"),
            BundleRole::Other => write!(f, "other"),
            BundleRole::NotABundle => write!(f, "not-a-bundle"),
        }
    }
}

/// Severity of a violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warning" | "warn" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            _ => Err(anyhow::anyhow!("unknown severity: {s}")),
        }
    }
}

/// Kind of layering violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViolationKind {
    /// A Core bundle reaches a UI bundle. `via` is the require chain from the
    /// Core bundle down to (and including) the bundle that declares the UI one.
    UiDependency {
        core_bundle: BundleId,
        ui_bundle: BundleId,
        via: Vec<BundleId>,
    },
    /// `Require-Bundle` entries form a cycle.
    CyclicRequire { cycle: Vec<BundleId> },
}

impl ViolationKind {
    /// Key used for `[rules.severities]` lookups.
    pub fn rule_key(&self) -> &'static str {
        match self {
            ViolationKind::UiDependency { .. } => "ui_dependency",
            ViolationKind::CyclicRequire { .. } => "cyclic_require",
        }
    }
}

/// A layering violation found while checking one bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub folder: PathBuf,
    pub message: String,
    pub suggestion: Option<String>,
}
