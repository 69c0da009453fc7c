// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for hook-script execution

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for script engine operations
pub type Result<T> = std::result::Result<T, ScriptError>;

/// Errors that can occur while loading or executing scripts
#[derive(Debug, Error)]
pub enum ScriptError {
    /// The script body threw, failed to compile, or an awaited export rejected
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// Module not found
    #[error("Cannot find module '{0}'")]
    ModuleNotFound(String),

    /// A dependency module failed while being evaluated
    #[error("Error loading module '{module}': {reason}")]
    ModuleLoad {
        /// Resolved module path
        module: PathBuf,
        /// Reason for failure
        reason: String,
    },

    /// Interpreter error that did not originate from script code
    #[error("Engine error: {0}")]
    Engine(String),

    /// File system error
    #[error("File system error: {0}")]
    Fs(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ScriptError {
    /// Create a module not found error
    pub fn module_not_found(module: impl Into<String>) -> Self {
        Self::ModuleNotFound(module.into())
    }

    /// The execution error carried by this error, if any
    pub fn as_execution(&self) -> Option<&ExecutionError> {
        match self {
            Self::Execution(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rquickjs::Error> for ScriptError {
    fn from(err: rquickjs::Error) -> Self {
        Self::Engine(err.to_string())
    }
}

impl From<toml::de::Error> for ScriptError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// A failure raised by script code.
///
/// `line` and `column` refer to the caller-visible source: the envelope's
/// leading blank line and the unit's line offset are already included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionError {
    /// Identity of the failing script
    pub file: PathBuf,
    /// Error constructor name (`Error`, `SyntaxError`, ...) when known
    pub name: Option<String>,
    /// Error message
    pub message: String,
    /// 1-based line of the throw site
    pub line: Option<u32>,
    /// 1-based column of the throw site
    pub column: Option<u32>,
    /// Raw interpreter stack trace
    pub stack: Option<String>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file.display())?;
        if let Some(line) = self.line {
            write!(f, ":{}", line)?;
            if let Some(column) = self.column {
                write!(f, ":{}", column)?;
            }
        }
        match &self.name {
            Some(name) => write!(f, ": {}: {}", name, self.message),
            None => write!(f, ": {}", self.message),
        }
    }
}

impl std::error::Error for ExecutionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError {
            file: PathBuf::from("/tmp/hook.js"),
            name: Some("Error".to_string()),
            message: "boom".to_string(),
            line: Some(14),
            column: Some(7),
            stack: None,
        };
        assert_eq!(err.to_string(), "/tmp/hook.js:14:7: Error: boom");

        let bare = ExecutionError {
            name: None,
            line: None,
            column: None,
            ..err
        };
        assert_eq!(bare.to_string(), "/tmp/hook.js: boom");
    }

    #[test]
    fn test_as_execution() {
        let err = ScriptError::module_not_found("lodash");
        assert!(err.as_execution().is_none());
        assert_eq!(err.to_string(), "Cannot find module 'lodash'");
    }
}
