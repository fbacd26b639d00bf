use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::BundleId;

pub const MANIFEST_DIR: &str = "META-INF";
pub const MANIFEST_FILE: &str = "MANIFEST.MF";

const SYMBOLIC_NAME: &str = "Bundle-SymbolicName";
const REQUIRE_BUNDLE: &str = "Require-Bundle";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest '{}' has no Bundle-SymbolicName header", path.display())]
    MissingSymbolicName { path: PathBuf },
}

/// The parts of an OSGi bundle manifest the layering rule looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleManifest {
    pub bundle_id: BundleId,
    /// `Require-Bundle` ids in declaration order.
    pub required_bundles: Vec<BundleId>,
}

/// `<folder>/META-INF/MANIFEST.MF`
pub fn manifest_path(folder: &Path) -> PathBuf {
    folder.join(MANIFEST_DIR).join(MANIFEST_FILE)
}

impl BundleManifest {
    /// Read the manifest of a bundle folder. `Ok(None)` when the folder has none.
    pub fn read(folder: &Path) -> Result<Option<Self>, ManifestError> {
        let path = manifest_path(folder);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|source| ManifestError::Io {
            path: path.clone(),
            source,
        })?;
        let content = String::from_utf8_lossy(&bytes);
        Self::parse(&content, &path).map(Some)
    }

    /// Parse manifest text. `path` is only used for error messages.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let headers = main_section_headers(content);

        let symbolic_name = header(&headers, SYMBOLIC_NAME)
            .map(|v| first_segment(v).to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ManifestError::MissingSymbolicName {
                path: path.to_path_buf(),
            })?;

        let required_bundles = header(&headers, REQUIRE_BUNDLE)
            .map(parse_require_bundle)
            .unwrap_or_default();

        Ok(Self {
            bundle_id: BundleId(symbolic_name),
            required_bundles,
        })
    }
}

/// Collect `(name, value)` pairs of the main section, joining continuation lines.
fn main_section_headers(content: &str) -> Vec<(String, String)> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut headers: Vec<(String, String)> = Vec::new();

    for raw in content.lines() {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            // End of the main section
            break;
        }
        if let Some(rest) = line.strip_prefix(' ') {
            if let Some((_, value)) = headers.last_mut() {
                value.push_str(rest);
            }
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let value = value.strip_prefix(' ').unwrap_or(value);
            headers.push((name.trim().to_string(), value.to_string()));
        }
    }

    headers
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Text before the first `;`, trimmed.
fn first_segment(clause: &str) -> &str {
    clause.split(';').next().unwrap_or_default().trim()
}

/// Split a `Require-Bundle` value into bundle ids.
///
/// Clauses are separated by commas outside double quotes, so version ranges
/// like `bundle-version="[1.0.0,2.0.0)"` stay inside their clause. A value
/// with unbalanced quotes is split on every comma instead. Empty clauses are
/// skipped.
pub fn parse_require_bundle(value: &str) -> Vec<BundleId> {
    split_clauses(value)
        .into_iter()
        .map(first_segment)
        .filter(|id| !id.is_empty())
        .map(BundleId::from)
        .collect()
}

fn split_clauses(value: &str) -> Vec<&str> {
    if value.matches('"').count() % 2 != 0 {
        tracing::debug!("unbalanced quotes in Require-Bundle, splitting on every comma");
        return value.split(',').collect();
    }

    let mut clauses = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                clauses.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    clauses.push(&value[start..]);
    clauses
}
