//! Building registered extensions from descriptor files.
//!
//! Hosts point the loader at descriptor text, a single `.vex` file, or
//! a whole directory. Each well-formed descriptor becomes one
//! registered extension; a broken descriptor never aborts a directory
//! scan.

use std::fs;
use std::path::Path;

use crate::error::{ExtensionError, Result};
use crate::extension::Extension;
use crate::implementation::Implementation;
use crate::inx::InxNode;
use crate::registry::{Registry, SharedExtension};

/// File suffix of extension descriptors.
pub const DESCRIPTOR_SUFFIX: &str = "vex";

/// Required root element of a descriptor.
const ROOT_TAG: &str = "vexel-extension";

/// Parse descriptor text, validate the root element, construct and
/// register the extension.
pub fn build_from_str(
    xml: &str,
    implementation: Option<Box<dyn Implementation>>,
    registry: &Registry,
) -> Result<SharedExtension> {
    let root = InxNode::parse(xml)?;
    if root.local_name() != ROOT_TAG {
        return Err(ExtensionError::NotAnExtension(root.local_name().to_string()));
    }
    Extension::build(root, implementation, registry)
}

/// Load one descriptor file.
pub fn build_from_file(
    path: &Path,
    implementation: Option<Box<dyn Implementation>>,
    registry: &Registry,
) -> Result<SharedExtension> {
    let xml = fs::read_to_string(path)?;
    build_from_str(&xml, implementation, registry)
}

/// Whether a path looks like an extension descriptor.
pub fn is_descriptor_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| ext == DESCRIPTOR_SUFFIX)
        .unwrap_or(false)
}

/// Scan a directory for `*.vex` descriptors and register each one.
///
/// Descriptors that fail to parse or register are skipped with a
/// warning; the scan continues. Files are visited in path order so
/// repeated scans behave the same.
pub fn discover(dir: &Path, registry: &Registry) -> Vec<SharedExtension> {
    let mut paths = Vec::new();
    match fs::read_dir(dir) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if is_descriptor_file(&path) {
                    paths.push(path);
                }
            }
        }
        Err(err) => {
            tracing::warn!(dir = %dir.display(), %err, "extension directory not readable");
            return Vec::new();
        }
    }
    paths.sort();

    let mut loaded = Vec::new();
    for path in paths {
        match build_from_file(&path, None, registry) {
            Ok(ext) => {
                tracing::debug!(path = %path.display(), id = ext.read().id(), "extension discovered");
                loaded.push(ext);
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "skipping extension descriptor");
            }
        }
    }
    loaded
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_is_descriptor_file() {
        assert!(is_descriptor_file(&PathBuf::from("blur.vex")));
        assert!(!is_descriptor_file(&PathBuf::from("blur.svg")));
        assert!(!is_descriptor_file(&PathBuf::from("vex")));
    }

    #[test]
    fn test_root_element_required() {
        let registry = Registry::new();
        let err = build_from_str("<something-else/>", None, &registry).unwrap_err();
        assert!(matches!(err, ExtensionError::NotAnExtension(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_namespaced_root_accepted() {
        let registry = Registry::new();
        build_from_str(
            r#"<ve:vexel-extension xmlns:ve="http://vexel.org/namespace/extension">
                 <ve:id>org.vexel.ns</ve:id>
                 <ve:name>Namespaced</ve:name>
               </ve:vexel-extension>"#,
            None,
            &registry,
        )
        .unwrap();
        assert!(registry.contains("org.vexel.ns"));
    }
}
