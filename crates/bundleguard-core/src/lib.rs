pub mod cache;
pub mod classifier;
pub mod config;
pub mod folder_index;
pub mod graph;
pub mod layer;
pub mod manifest;
pub mod pipeline;
pub mod result;
pub mod types;

pub use classifier::{BundleDependencyClassifier, Classification, ClassifyError, DependencyModel};
pub use config::Config;
pub use folder_index::FolderIndex;
pub use graph::BundleGraph;
pub use layer::LayerRules;
pub use manifest::{BundleManifest, ManifestError};
pub use pipeline::CheckPipeline;
pub use result::{BundleReport, CheckResult};
pub use types::*;
