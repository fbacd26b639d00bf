use crate::config::LayersConfig;
use crate::types::{BundleId, BundleRole};

/// Classifies bundle ids into layers using substring markers.
///
/// Matching is literal and case-sensitive: `org.example.core` and
/// `org.example.core.model` are Core, `org.example.ui.views` and
/// `org.example.ui` are UI, `org.example.core.test` is a test plugin.
#[derive(Debug, Clone)]
pub struct LayerRules {
    core_markers: Vec<String>,
    ui_markers: Vec<String>,
    ui_suffixes: Vec<String>,
    test_suffixes: Vec<String>,
}

impl LayerRules {
    pub fn new(config: &LayersConfig) -> Self {
        Self {
            core_markers: config.core_markers.clone(),
            ui_markers: config.ui_markers.clone(),
            ui_suffixes: config.ui_suffixes.clone(),
            test_suffixes: config.test_suffixes.clone(),
        }
    }

    pub fn is_core(&self, id: &BundleId) -> bool {
        self.core_markers.iter().any(|m| id.as_str().contains(m.as_str()))
    }

    pub fn is_ui(&self, id: &BundleId) -> bool {
        let s = id.as_str();
        self.ui_markers.iter().any(|m| s.contains(m.as_str()))
            || self.ui_suffixes.iter().any(|m| s.ends_with(m.as_str()))
    }

    pub fn is_test(&self, id: &BundleId) -> bool {
        self.test_suffixes
            .iter()
            .any(|m| id.as_str().ends_with(m.as_str()))
    }

    /// Reporting role. Test wins over Core, Core wins over UI.
    pub fn role(&self, id: &BundleId) -> BundleRole {
        if self.is_test(id) {
            BundleRole::Test
        } else if self.is_core(id) {
            BundleRole::Core
        } else if self.is_ui(id) {
            BundleRole::Ui
        } else {
            BundleRole::Other
        }
    }
}

impl Default for LayerRules {
    fn default() -> Self {
        Self::new(&LayersConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> BundleId {
        BundleId::from(s)
    }

    #[test]
    fn test_core_detection() {
        let rules = LayerRules::default();
        assert!(rules.is_core(&id("org.example.core")));
        assert!(rules.is_core(&id("org.example.core.model")));
        assert!(rules.is_core(&id("org.example.corext")));
        assert!(!rules.is_core(&id("org.example.feature")));
        assert!(!rules.is_core(&id("org.example.Core")));
    }

    #[test]
    fn test_ui_detection() {
        let rules = LayerRules::default();
        assert!(rules.is_ui(&id("org.example.ui")));
        assert!(rules.is_ui(&id("org.example.ui.views")));
        assert!(!rules.is_ui(&id("org.example.uikit")));
        assert!(!rules.is_ui(&id("org.example.builder")));
        assert!(!rules.is_ui(&id("org.example.UI")));
    }

    #[test]
    fn test_test_plugin_detection() {
        let rules = LayerRules::default();
        assert!(rules.is_test(&id("org.example.core.test")));
        assert!(!rules.is_test(&id("org.example.core.tests")));
        assert!(!rules.is_test(&id("org.example.test.util")));
    }

    #[test]
    fn test_role_precedence() {
        let rules = LayerRules::default();
        assert_eq!(rules.role(&id("org.example.core.test")), BundleRole::Test);
        assert_eq!(rules.role(&id("org.example.core.ui")), BundleRole::Core);
        assert_eq!(rules.role(&id("org.example.ui.views")), BundleRole::Ui);
        assert_eq!(rules.role(&id("org.example.feature")), BundleRole::Other);
    }

    #[test]
    fn test_custom_markers() {
        let config = LayersConfig {
            core_markers: vec![".model".to_string()],
            ui_markers: vec![".swt.".to_string()],
            ui_suffixes: vec![".swt".to_string()],
            test_suffixes: vec![".tests".to_string()],
        };
        let rules = LayerRules::new(&config);
        assert!(rules.is_core(&id("org.example.model")));
        assert!(!rules.is_core(&id("org.example.core")));
        assert!(rules.is_ui(&id("org.example.swt")));
        assert!(rules.is_test(&id("org.example.model.tests")));
    }
}
