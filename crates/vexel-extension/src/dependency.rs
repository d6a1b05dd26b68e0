//! External-resource requirements of an extension.
//!
//! A dependency names one thing that must exist on the host for the
//! extension to function: an interpreter on the search path, a helper
//! file shipped with the extension, an absolute path. Each dependency
//! is independently checkable and printable, so a failed [`check`]
//! leaves a useful line in the diagnostic log.
//!
//! [`check`]: Dependency::check

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::inx::InxNode;

/// Environment variable naming the installed-extensions directory,
/// used to resolve `location="extensions"` dependencies.
pub const EXTENSIONS_DIR_ENV: &str = "VEXEL_EXTENSIONS_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Executable,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyLocation {
    /// Search the `PATH` environment.
    Path,
    /// Relative to the installed-extensions directory.
    Extensions,
    /// An absolute filesystem path.
    Absolute,
}

/// One checkable external requirement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    kind: DependencyKind,
    location: DependencyLocation,
    string: String,
}

impl Dependency {
    /// Build a dependency from a `<dependency>` element (or, for the
    /// legacy `<script>` form, from the script's command element).
    pub fn make(node: &InxNode) -> Dependency {
        let kind = match node.attribute("type") {
            Some("file") => DependencyKind::File,
            _ => DependencyKind::Executable,
        };
        let location = match node.attribute("location") {
            Some("extensions") => DependencyLocation::Extensions,
            Some("absolute") => DependencyLocation::Absolute,
            _ => DependencyLocation::Path,
        };
        Dependency {
            kind,
            location,
            string: node.text_content().unwrap_or("").to_string(),
        }
    }

    pub fn kind(&self) -> DependencyKind {
        self.kind
    }

    pub fn location(&self) -> DependencyLocation {
        self.location
    }

    pub fn string(&self) -> &str {
        &self.string
    }

    /// Whether the required resource is present on this host.
    pub fn check(&self) -> bool {
        if self.string.is_empty() {
            return false;
        }
        match self.location {
            DependencyLocation::Absolute => Path::new(&self.string).is_file(),
            DependencyLocation::Extensions => extensions_dir().join(&self.string).is_file(),
            DependencyLocation::Path => self.search_path(),
        }
    }

    fn search_path(&self) -> bool {
        let Some(path) = env::var_os("PATH") else {
            return false;
        };
        for dir in env::split_paths(&path) {
            let candidate = dir.join(&self.string);
            if candidate.is_file() {
                return true;
            }
            if cfg!(windows) && dir.join(format!("{}.exe", self.string)).is_file() {
                return true;
            }
        }
        false
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            DependencyKind::Executable => "executable",
            DependencyKind::File => "file",
        };
        let location = match self.location {
            DependencyLocation::Path => "path",
            DependencyLocation::Extensions => "extensions",
            DependencyLocation::Absolute => "absolute",
        };
        write!(
            f,
            "  dependency: {} \"{}\" (location: {})",
            kind, self.string, location
        )
    }
}

/// The installed-extensions directory, from [`EXTENSIONS_DIR_ENV`] or
/// `./extensions`.
pub fn extensions_dir() -> PathBuf {
    env::var_os(EXTENSIONS_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("extensions"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(xml: &str) -> Dependency {
        let root = InxNode::parse(xml).unwrap();
        Dependency::make(&root)
    }

    #[test]
    fn test_make_defaults() {
        let d = dep("<dependency>python3</dependency>");
        assert_eq!(d.kind(), DependencyKind::Executable);
        assert_eq!(d.location(), DependencyLocation::Path);
        assert_eq!(d.string(), "python3");
    }

    #[test]
    fn test_absolute_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("helper.py");
        std::fs::write(&file, "pass").unwrap();

        let d = dep(&format!(
            r#"<dependency type="file" location="absolute">{}</dependency>"#,
            file.display()
        ));
        assert!(d.check());

        let missing = dep(&format!(
            r#"<dependency type="file" location="absolute">{}</dependency>"#,
            dir.path().join("gone.py").display()
        ));
        assert!(!missing.check());
    }

    #[test]
    fn test_empty_string_fails() {
        let d = dep("<dependency></dependency>");
        assert!(!d.check());
    }

    #[test]
    fn test_path_search() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vexel-helper"), "").unwrap();
        let old = env::var_os("PATH");
        env::set_var("PATH", dir.path());

        let found = dep("<dependency>vexel-helper</dependency>").check();
        let missing = dep("<dependency>vexel-absent</dependency>").check();

        match old {
            Some(p) => env::set_var("PATH", p),
            None => env::remove_var("PATH"),
        }
        assert!(found);
        assert!(!missing);
    }

    #[test]
    fn test_display() {
        let d = dep(r#"<dependency type="file" location="extensions">palettes/x.gpl</dependency>"#);
        let line = d.to_string();
        assert!(line.contains("file"));
        assert!(line.contains("palettes/x.gpl"));
        assert!(line.contains("extensions"));
    }
}
