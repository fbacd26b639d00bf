use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::types::Severity;

pub const CONFIG_FILE: &str = ".bundleguard.toml";

/// Top-level configuration from `.bundleguard.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub layers: LayersConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub rules: RulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// File whose presence marks a folder as a build project.
    #[serde(default = "default_project_marker")]
    pub project_marker: String,
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,
}

fn default_project_marker() -> String {
    "pom.xml".to_string()
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/target/**".to_string(),
        "**/bin/**".to_string(),
        "**/.git/**".to_string(),
    ]
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_marker: default_project_marker(),
            exclude_patterns: default_exclude_patterns(),
        }
    }
}

/// Substring markers mapping bundle ids to layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayersConfig {
    /// An id containing any of these is a Core bundle.
    #[serde(default = "default_core_markers")]
    pub core_markers: Vec<String>,
    /// An id containing any of these is a UI bundle.
    #[serde(default = "default_ui_markers")]
    pub ui_markers: Vec<String>,
    /// An id ending with any of these is a UI bundle.
    #[serde(default = "default_ui_suffixes")]
    pub ui_suffixes: Vec<String>,
    /// An id ending with any of these is a test plugin.
    #[serde(default = "default_test_suffixes")]
    pub test_suffixes: Vec<String>,
}

fn default_core_markers() -> Vec<String> {
    vec![".core".to_string()]
}

fn default_ui_markers() -> Vec<String> {
    vec![".ui.".to_string()]
}

fn default_ui_suffixes() -> Vec<String> {
    vec![".ui".to_string()]
}

fn default_test_suffixes() -> Vec<String> {
    vec![".test".to_string()]
}

impl Default for LayersConfig {
    fn default() -> Self {
        Self {
            core_markers: default_core_markers(),
            ui_markers: default_ui_markers(),
            ui_suffixes: default_ui_suffixes(),
            test_suffixes: default_test_suffixes(),
        }
    }
}

/// Bounds of the folder index scan around the checked bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default = "default_max_parents")]
    pub max_parents: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_max_parents() -> u32 {
    3
}

fn default_max_depth() -> u32 {
    3
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_parents: default_max_parents(),
            max_depth: default_max_depth(),
        }
    }
}

/// Rule configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_severities")]
    pub severities: HashMap<String, Severity>,
    #[serde(default = "default_fail_on")]
    pub fail_on: Severity,
}

fn default_severities() -> HashMap<String, Severity> {
    let mut m = HashMap::new();
    m.insert("ui_dependency".to_string(), Severity::Error);
    m.insert("cyclic_require".to_string(), Severity::Warning);
    m
}

fn default_fail_on() -> Severity {
    Severity::Error
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            severities: default_severities(),
            fail_on: default_fail_on(),
        }
    }
}

impl RulesConfig {
    /// Severity for a rule key, falling back to the built-in default.
    pub fn severity_of(&self, rule_key: &str) -> Severity {
        self.severities
            .get(rule_key)
            .copied()
            .or_else(|| default_severities().get(rule_key).copied())
            .unwrap_or(Severity::Error)
    }
}

impl Config {
    /// Load configuration from a `.bundleguard.toml` file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config: Config = toml::from_str(&content).with_context(|| {
            format!(
                "failed to parse '{}'. Run `bundleguard init` to create a valid config file",
                path.display()
            )
        })?;
        Ok(config)
    }

    /// Load from `.bundleguard.toml` in the given directory or any ancestor, or return defaults.
    pub fn load_or_default(dir: &Path) -> Self {
        let start = dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf());
        let mut current = start.as_path();
        loop {
            let config_path = current.join(CONFIG_FILE);
            if config_path.exists() {
                return match Self::load(&config_path) {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!(
                            "failed to load config from '{}': {e:#}. Using defaults.",
                            config_path.display()
                        );
                        Self::default()
                    }
                };
            }
            match current.parent() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        Self::default()
    }

    /// Stable textual form used when fingerprinting cached results.
    pub fn fingerprint_input(&self) -> String {
        let mut severities: Vec<_> = self.rules.severities.iter().collect();
        severities.sort();
        format!(
            "marker={};core={:?};ui={:?};ui_suffix={:?};test={:?};parents={};depth={};sev={:?}",
            self.project.project_marker,
            self.layers.core_markers,
            self.layers.ui_markers,
            self.layers.ui_suffixes,
            self.layers.test_suffixes,
            self.scan.max_parents,
            self.scan.max_depth,
            severities,
        )
    }

    /// Generate default TOML content for `bundleguard init`.
    pub fn default_toml() -> String {
        r#"# bundleguard - Core/UI layering configuration

[project]
# A folder containing this file is treated as a build project
project_marker = "pom.xml"
exclude_patterns = ["**/target/**", "**/bin/**", "**/.git/**"]

[layers]
# Bundle ids containing a core marker are Core bundles
core_markers = [".core"]
# Bundle ids containing a ui marker, or ending in a ui suffix, are UI bundles
ui_markers = [".ui."]
ui_suffixes = [".ui"]
# Bundle ids ending in a test suffix are exempt
test_suffixes = [".test"]

[scan]
# How many parent project folders to climb, and how deep to descend,
# when looking for the folders of required bundles
max_parents = 3
max_depth = 3

[rules]
# Severity levels: "error", "warning", "info"
fail_on = "error"

[rules.severities]
ui_dependency = "error"
cyclic_require = "warning"
"#
        .to_string()
    }
}
