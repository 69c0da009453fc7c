// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module path resolution.
//!
//! Two tiers are tried in order:
//!
//! 1. Package-aware resolution (Node.js algorithm): relative and absolute
//!    specifiers are files, bare specifiers are looked up in `node_modules`
//!    directories walking up from the base directory.
//! 2. Raw path search: the specifier is a plain path under the base directory
//!    and then under each configured search root.
//!
//! Resolution is a probing operation, so failures are logged, never returned.

use crate::error::{Result, ScriptError};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Module resolver implementing the two-tier lookup
#[derive(Debug, Clone)]
pub struct ModuleResolver {
    /// File extensions to try
    extensions: Vec<String>,
    /// Roots for the raw path-search tier, after the base directory
    search_paths: Vec<PathBuf>,
}

impl ModuleResolver {
    /// Create a resolver with the default extensions and no extra roots
    pub fn new() -> Self {
        Self {
            extensions: vec![".js".to_string(), ".cjs".to_string(), ".json".to_string()],
            search_paths: Vec::new(),
        }
    }

    /// Create a resolver with explicit extensions and search roots
    pub fn with_options(extensions: Vec<String>, search_paths: Vec<PathBuf>) -> Self {
        Self {
            extensions,
            search_paths,
        }
    }

    /// Resolve a module specifier to an absolute file path.
    ///
    /// Returns `None` when neither tier can locate the module.
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        match self.resolve_package_aware(specifier, base_dir) {
            Ok(path) => return Some(path),
            Err(e) => debug!("Package-aware resolution of '{}' failed: {}", specifier, e),
        }

        match self.resolve_search_paths(specifier, base_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                debug!(
                    "Cannot resolve '{}' from {}: {}",
                    specifier,
                    base_dir.display(),
                    e
                );
                None
            }
        }
    }

    /// Tier 1: Node.js-style resolution rooted at `base_dir`
    fn resolve_package_aware(&self, specifier: &str, base_dir: &Path) -> Result<PathBuf> {
        if is_path_specifier(specifier) {
            return self.resolve_path(&base_dir.join(specifier), specifier);
        }

        self.resolve_node_modules(specifier, base_dir)
    }

    /// Tier 2: treat the specifier as a path under each search root
    fn resolve_search_paths(&self, specifier: &str, base_dir: &Path) -> Result<PathBuf> {
        let roots = std::iter::once(base_dir).chain(self.search_paths.iter().map(PathBuf::as_path));

        for root in roots {
            if let Ok(path) = self.resolve_path(&root.join(specifier), specifier) {
                return Ok(path);
            }
        }

        Err(ScriptError::module_not_found(specifier))
    }

    /// Resolve a candidate path as a file, then as a directory
    fn resolve_path(&self, path: &Path, specifier: &str) -> Result<PathBuf> {
        if let Some(file) = self.find_file(path) {
            return Ok(file);
        }

        if path.is_dir() {
            return self.resolve_directory(path);
        }

        Err(ScriptError::module_not_found(specifier))
    }

    /// Try the exact path, then the path with each extension appended
    fn find_file(&self, path: &Path) -> Option<PathBuf> {
        if path.is_file() {
            return Some(canonical(path));
        }

        let file_name = path.file_name()?.to_string_lossy().to_string();
        self.extensions.iter().find_map(|ext| {
            let candidate = path.with_file_name(format!("{}{}", file_name, ext));
            candidate.is_file().then(|| canonical(&candidate))
        })
    }

    /// Resolve a directory (package.json main, then index file)
    fn resolve_directory(&self, dir: &Path) -> Result<PathBuf> {
        if let Some(pkg) = read_package_json(dir) {
            if let Some(main) = pkg.main.filter(|m| !m.is_empty()) {
                let main_path = dir.join(&main);
                if let Some(file) = self.find_file(&main_path) {
                    return Ok(file);
                }
                if main_path.is_dir() {
                    if let Some(file) = self.find_index(&main_path) {
                        return Ok(file);
                    }
                }
                debug!("package.json main '{}' in {} does not exist", main, dir.display());
            }
        }

        self.find_index(dir)
            .ok_or_else(|| ScriptError::module_not_found(dir.display().to_string()))
    }

    fn find_index(&self, dir: &Path) -> Option<PathBuf> {
        self.extensions.iter().find_map(|ext| {
            let index = dir.join(format!("index{}", ext));
            index.is_file().then(|| canonical(&index))
        })
    }

    /// Resolve a package from node_modules, walking up from `base_dir`
    fn resolve_node_modules(&self, specifier: &str, base_dir: &Path) -> Result<PathBuf> {
        let (package_name, subpath) = parse_package_specifier(specifier);

        for dir in base_dir.ancestors() {
            if dir.file_name().is_some_and(|name| name == "node_modules") {
                continue;
            }
            let package_dir = dir.join("node_modules").join(package_name);
            if !package_dir.is_dir() {
                continue;
            }

            if let Some(target) = read_package_json(&package_dir)
                .and_then(|pkg| pkg.exports)
                .and_then(|exports| package_export(&exports, subpath))
            {
                return self.resolve_path(&package_dir.join(target), specifier);
            }

            return match subpath {
                Some(sub) => self.resolve_path(&package_dir.join(sub), specifier),
                None => self.resolve_directory(&package_dir),
            };
        }

        Err(ScriptError::module_not_found(specifier))
    }
}

impl Default for ModuleResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimal package.json structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    main: Option<String>,
    #[serde(default)]
    exports: Option<serde_json::Value>,
}

fn read_package_json(dir: &Path) -> Option<PackageJson> {
    let path = dir.join("package.json");
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(pkg) => Some(pkg),
        Err(e) => {
            debug!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

/// Pick the `exports` target for a subpath, preferring `require` conditions
fn package_export(exports: &serde_json::Value, subpath: Option<&str>) -> Option<String> {
    let key = subpath.map_or_else(|| ".".to_string(), |sub| format!("./{}", sub));

    match exports {
        serde_json::Value::String(target) if key == "." => Some(target.clone()),
        serde_json::Value::Object(map) if map.keys().any(|k| k.starts_with('.')) => {
            map.get(&key).and_then(export_condition)
        }
        serde_json::Value::Object(_) if key == "." => export_condition(exports),
        _ => None,
    }
}

fn export_condition(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(target) => Some(target.clone()),
        serde_json::Value::Object(conditions) => ["require", "node", "default"]
            .iter()
            .find_map(|cond| conditions.get(*cond).and_then(export_condition)),
        serde_json::Value::Array(candidates) => candidates.iter().find_map(export_condition),
        _ => None,
    }
}

/// Whether a specifier names a file path rather than a package
fn is_path_specifier(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

/// Parse a package specifier into name and optional subpath
fn parse_package_specifier(specifier: &str) -> (&str, Option<&str>) {
    let name_end = if specifier.starts_with('@') {
        // Scoped package: @scope/name or @scope/name/subpath
        specifier
            .find('/')
            .and_then(|scope_end| {
                specifier[scope_end + 1..]
                    .find('/')
                    .map(|pos| scope_end + 1 + pos)
            })
    } else {
        specifier.find('/')
    };

    match name_end {
        Some(end) => (&specifier[..end], Some(&specifier[end + 1..])),
        None => (specifier, None),
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_package_specifier() {
        assert_eq!(parse_package_specifier("lodash"), ("lodash", None));
        assert_eq!(parse_package_specifier("lodash/get"), ("lodash", Some("get")));
        assert_eq!(parse_package_specifier("@types/node"), ("@types/node", None));
        assert_eq!(
            parse_package_specifier("@babel/core/lib/index"),
            ("@babel/core", Some("lib/index"))
        );
    }

    #[test]
    fn test_relative_with_extension_search() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("lib/util.js"), "");

        let resolver = ModuleResolver::new();
        let resolved = resolver.resolve("./lib/util", dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("lib/util.js").canonicalize().unwrap());
    }

    #[test]
    fn test_extension_is_appended_not_replaced() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("data.v2.js"), "");

        let resolver = ModuleResolver::new();
        assert!(resolver.resolve("./data.v2", dir.path()).is_some());
    }

    #[test]
    fn test_directory_index_and_main() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("plain/index.js"), "");
        write(&dir.path().join("pkg/package.json"), r#"{ "main": "src/entry" }"#);
        write(&dir.path().join("pkg/src/entry.js"), "");

        let resolver = ModuleResolver::new();
        assert!(resolver.resolve("./plain", dir.path()).unwrap().ends_with("plain/index.js"));
        assert!(resolver.resolve("./pkg", dir.path()).unwrap().ends_with("src/entry.js"));
    }

    #[test]
    fn test_node_modules_walks_up() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("node_modules/helper/index.js"), "");
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();

        let resolver = ModuleResolver::new();
        let resolved = resolver.resolve("helper", &nested).unwrap();
        assert!(resolved.ends_with("node_modules/helper/index.js"));
    }

    #[test]
    fn test_package_exports() {
        let dir = tempdir().unwrap();
        write(
            &dir.path().join("node_modules/@scope/tool/package.json"),
            r#"{ "main": "wrong.js", "exports": { ".": { "import": "./esm.mjs", "require": "./cjs.js" }, "./extra": "./lib/extra.js" } }"#,
        );
        write(&dir.path().join("node_modules/@scope/tool/cjs.js"), "");
        write(&dir.path().join("node_modules/@scope/tool/lib/extra.js"), "");

        let resolver = ModuleResolver::new();
        assert!(resolver.resolve("@scope/tool", dir.path()).unwrap().ends_with("cjs.js"));
        assert!(resolver
            .resolve("@scope/tool/extra", dir.path())
            .unwrap()
            .ends_with("lib/extra.js"));
    }

    #[test]
    fn test_search_path_fallback() {
        let dir = tempdir().unwrap();
        write(&dir.path().join("helpers/auth.js"), "");
        let shared = tempdir().unwrap();
        write(&shared.path().join("common/sign.js"), "");

        let resolver = ModuleResolver::with_options(
            vec![".js".to_string()],
            vec![shared.path().to_path_buf()],
        );
        // Bare specifiers that are not packages fall through to the path search
        assert!(resolver.resolve("helpers/auth", dir.path()).is_some());
        assert!(resolver.resolve("common/sign", dir.path()).is_some());
    }

    #[test]
    fn test_not_found_is_none() {
        let dir = tempdir().unwrap();
        let resolver = ModuleResolver::new();
        assert!(resolver.resolve("does-not-exist", dir.path()).is_none());
        assert!(resolver.resolve("./missing", dir.path()).is_none());
    }
}
