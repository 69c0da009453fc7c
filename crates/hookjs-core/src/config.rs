// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine configuration.
//!
//! Sources are applied in order, later ones overriding earlier ones:
//! built-in defaults, `hookjs.toml` in the working directory (or an explicit
//! file), `HOOKJS_*` environment variables, and `NODE_PATH`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

/// Name of the project-level configuration file
pub const CONFIG_FILE: &str = "hookjs.toml";

/// Configuration for a [`ScriptEngine`](crate::ScriptEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// File extensions tried when a specifier has none, in order
    pub extensions: Vec<String>,

    /// Extra roots for the raw path-search resolution tier
    pub search_paths: Vec<PathBuf>,

    /// Interpreter heap limit in bytes
    pub memory_limit: Option<usize>,

    /// Interpreter stack limit in bytes
    pub max_stack_size: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            extensions: vec![".js".to_string(), ".cjs".to_string(), ".json".to_string()],
            search_paths: global_search_paths(),
            memory_limit: None,
            max_stack_size: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from default locations.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        let project_config = PathBuf::from(CONFIG_FILE);
        if project_config.is_file() {
            config.merge_from_file(&project_config)?;
        }

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from an explicit file, then apply the environment.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::default();
        config.merge_from_file(path)?;
        config.load_from_env();
        Ok(config)
    }

    /// Merge configuration from a TOML file.
    fn merge_from_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;
        debug!("Loading configuration from {}", path.display());

        for (key, value) in table {
            match value {
                toml::Value::String(s) => self.set(&key, &s),
                toml::Value::Integer(n) => self.set(&key, &n.to_string()),
                toml::Value::Array(items) => {
                    let joined: Vec<String> = items
                        .iter()
                        .filter_map(|item| item.as_str().map(str::to_string))
                        .collect();
                    self.set_list(&key, joined);
                }
                other => debug!("Ignoring configuration key '{}' = {}", key, other),
            }
        }

        Ok(())
    }

    /// Load configuration from environment variables.
    fn load_from_env(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("HOOKJS_") {
                let config_key = config_key.to_lowercase().replace('-', "_");
                self.set(&config_key, &value);
            }
        }

        if let Some(node_path) = std::env::var_os("NODE_PATH") {
            let mut paths: Vec<PathBuf> = std::env::split_paths(&node_path)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            paths.append(&mut self.search_paths);
            self.search_paths = paths;
        }
    }

    /// Set a configuration value from its textual form.
    pub fn set(&mut self, key: &str, value: &str) {
        match key {
            "memory_limit" => {
                if let Ok(n) = value.parse() {
                    self.memory_limit = Some(n);
                }
            }
            "max_stack_size" => {
                if let Ok(n) = value.parse() {
                    self.max_stack_size = Some(n);
                }
            }
            "extensions" | "search_paths" => {
                let items = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                self.set_list(key, items);
            }
            _ => debug!("Unknown configuration key '{}'", key),
        }
    }

    fn set_list(&mut self, key: &str, items: Vec<String>) {
        match key {
            "extensions" => {
                self.extensions = items
                    .into_iter()
                    .map(|ext| {
                        if ext.starts_with('.') {
                            ext
                        } else {
                            format!(".{}", ext)
                        }
                    })
                    .collect();
            }
            "search_paths" => {
                self.search_paths = items.into_iter().map(PathBuf::from).collect();
            }
            _ => debug!("Unknown configuration list '{}'", key),
        }
    }
}

/// Global folders consulted by the raw path-search tier
fn global_search_paths() -> Vec<PathBuf> {
    dirs::home_dir()
        .map(|home| vec![home.join(".node_modules"), home.join(".node_libraries")])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.extensions, vec![".js", ".cjs", ".json"]);
        assert!(config.memory_limit.is_none());
    }

    #[test]
    fn test_set_values() {
        let mut config = EngineConfig::default();
        config.set("memory_limit", "1048576");
        config.set("extensions", "js, json");
        config.set("max_stack_size", "not-a-number");

        assert_eq!(config.memory_limit, Some(1_048_576));
        assert_eq!(config.extensions, vec![".js", ".json"]);
        assert!(config.max_stack_size.is_none());
    }

    #[test]
    fn test_merge_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            "memory_limit = 4096\nsearch_paths = [\"/opt/scripts\"]\nextensions = [\"js\"]\n",
        )
        .unwrap();

        let mut config = EngineConfig::default();
        config.merge_from_file(&path).unwrap();

        assert_eq!(config.memory_limit, Some(4096));
        assert_eq!(config.search_paths, vec![PathBuf::from("/opt/scripts")]);
        assert_eq!(config.extensions, vec![".js"]);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "memory_limit = [").unwrap();

        let mut config = EngineConfig::default();
        assert!(config.merge_from_file(&path).is_err());
    }
}
