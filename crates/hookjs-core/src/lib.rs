// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # hookjs-core
//!
//! Embedded CommonJS script execution for HTTP request and response hooks.
//!
//! Scripts run inside an isolated QuickJS context with a Node.js-style
//! `require`, a dependency cache that can be invalidated transitively, and
//! caller-injected capabilities such as `client` and `response`.
//!
//! ## Usage
//!
//! ```ignore
//! use hookjs_core::{EngineConfig, ExecutionContext, ScriptEngine, ScriptUnit};
//!
//! let engine = ScriptEngine::new(EngineConfig::default())?;
//! let unit = ScriptUnit::inline("exports.answer = 42;", "/work/requests.http", 10);
//! let result = engine.execute(&unit, &ExecutionContext::new())?;
//! assert_eq!(result.value["answer"], 42);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod globals;
pub mod module_system;
pub mod reporter;
pub mod runtime;
pub mod script;

pub use config::EngineConfig;
pub use error::{ExecutionError, Result, ScriptError};
pub use globals::{
    Binding, Capability, ContentType, ExecutionContext, HttpClient, ResponseSnapshot, TestResult,
    TestStatus, Variables,
};
pub use reporter::{MemoryReporter, Reporter, TracingReporter};
pub use runtime::{ExecutionResult, ExecutionState, ScriptEngine};
pub use script::{ScriptUnit, load_script};

/// hookjs version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
