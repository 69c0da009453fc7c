// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script units and loading hook files from disk

use crate::reporter::Reporter;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A piece of script source ready for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptUnit {
    /// Script body
    pub source: String,
    /// Path the script is identified by; relative requires resolve from its directory
    pub identity: PathBuf,
    /// Lines preceding the script in its hosting document
    pub line_offset: u32,
}

impl ScriptUnit {
    /// Create a unit from inline source embedded at `line_offset` in `identity`
    pub fn inline(source: impl Into<String>, identity: impl Into<PathBuf>, line_offset: u32) -> Self {
        Self {
            source: source.into(),
            identity: identity.into(),
            line_offset,
        }
    }

    /// Absolute form of the identity
    pub fn filename(&self) -> PathBuf {
        std::path::absolute(&self.identity).unwrap_or_else(|_| self.identity.clone())
    }
}

/// Load a hook script referenced from the document at `referrer`.
///
/// Relative paths resolve against the referrer's directory. Problems are
/// reported through `reporter` and yield `None`.
pub fn load_script(file: &str, referrer: &Path, reporter: &dyn Reporter) -> Option<ScriptUnit> {
    let path = Path::new(file);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        referrer.parent().unwrap_or(Path::new(".")).join(path)
    };

    if !path.is_file() {
        reporter.error(&format!("File not found: {}", file));
        return None;
    }

    match std::fs::read_to_string(&path) {
        Ok(source) => {
            debug!("Loaded script {}", path.display());
            Some(ScriptUnit::inline(source, path, 0))
        }
        Err(e) => {
            debug!("Reading {} failed: {}", path.display(), e);
            reporter.error(&format!("error loading script {}", file));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::MemoryReporter;
    use tempfile::tempdir;

    #[test]
    fn test_load_relative_to_referrer() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("hooks")).unwrap();
        std::fs::write(dir.path().join("hooks/check.js"), "exports.ok = true;").unwrap();
        let referrer = dir.path().join("requests.http");
        let reporter = MemoryReporter::new();

        let unit = load_script("hooks/check.js", &referrer, &reporter).unwrap();
        assert_eq!(unit.source, "exports.ok = true;");
        assert_eq!(unit.identity, dir.path().join("hooks/check.js"));
        assert_eq!(unit.line_offset, 0);
        assert!(reporter.errors().is_empty());
    }

    #[test]
    fn test_load_missing_file_reports() {
        let dir = tempdir().unwrap();
        let reporter = MemoryReporter::new();

        let unit = load_script("nope.js", &dir.path().join("requests.http"), &reporter);
        assert!(unit.is_none());
        assert_eq!(reporter.errors(), vec!["File not found: nope.js".to_string()]);
    }

    #[test]
    fn test_load_absolute_path() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("abs.js");
        std::fs::write(&script, "1;").unwrap();
        let reporter = MemoryReporter::new();

        let unit = load_script(script.to_str().unwrap(), Path::new("/elsewhere/doc.http"), &reporter);
        assert_eq!(unit.unwrap().identity, script);
    }

    #[test]
    fn test_inline_filename_is_absolute() {
        let unit = ScriptUnit::inline("1;", "requests.http", 12);
        assert!(unit.filename().is_absolute());
        assert_eq!(unit.line_offset, 12);
    }
}
