// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bindings placed into a script's namespace
//!
//! Implements:
//! - `process`, `console`, `global`, `Buffer` and the timer functions - ambient
//!   bindings present in every context
//! - [`Binding`] / [`Capability`] - caller-supplied values and native objects
//! - [`ExecutionContext`] - the per-invocation capability set
//! - `client` ([`HttpClient`]) and `response` ([`ResponseSnapshot`])

pub mod buffer;
pub mod client;
pub mod console;
pub mod process;
pub mod response;
pub mod timers;

pub use client::{HttpClient, TestResult, TestStatus, Variables};
pub use response::{ContentType, ResponseSnapshot};
pub use timers::TimerQueue;

use rquickjs::{Ctx, Exception, Function, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// A native object that installs itself into a script context.
///
/// The returned value is bound under the name the caller chose; it is
/// constructed fresh for every execution and dropped with the context.
pub trait Capability: Send + Sync {
    /// Build the JavaScript value for this capability
    fn install<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>>;
}

/// A value the caller injects into a script context
#[derive(Clone)]
pub enum Binding {
    /// Plain data, converted through JSON
    Json(serde_json::Value),
    /// A native capability
    Native(Arc<dyn Capability>),
}

impl Binding {
    /// Wrap a capability
    pub fn capability(capability: impl Capability + 'static) -> Self {
        Self::Native(Arc::new(capability))
    }

    /// Materialise the binding inside `ctx`
    pub fn to_js<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        match self {
            Self::Json(value) => json_to_js(ctx, value),
            Self::Native(capability) => capability.install(ctx),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Native(_) => f.write_str("Native(..)"),
        }
    }
}

impl From<serde_json::Value> for Binding {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl From<HttpClient> for Binding {
    fn from(client: HttpClient) -> Self {
        Self::capability(client)
    }
}

impl From<ResponseSnapshot> for Binding {
    fn from(response: ResponseSnapshot) -> Self {
        Self::capability(response)
    }
}

/// Injected bindings and require overrides for one execution
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    bindings: BTreeMap<String, Binding>,
    overrides: BTreeMap<String, Binding>,
}

impl ExecutionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` under `name` in the script namespace
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.bindings.insert(name.into(), value.into());
        self
    }

    /// Make `require(specifier)` return `value` without resolving anything
    pub fn override_module(mut self, specifier: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.overrides.insert(specifier.into(), value.into());
        self
    }

    /// Injected bindings
    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        &self.bindings
    }

    /// Override-require table
    pub fn overrides(&self) -> &BTreeMap<String, Binding> {
        &self.overrides
    }
}

/// Install the ambient bindings every script sees; timers go to `timers`
pub fn install_ambient<'js>(ctx: &Ctx<'js>, timers: &Rc<TimerQueue<'js>>) -> rquickjs::Result<()> {
    let globals = ctx.globals();
    globals.set("process", process::create_process_object(ctx)?)?;
    globals.set("console", console::create_console_object(ctx)?)?;
    globals.set("Buffer", buffer::create_buffer_class(ctx)?)?;
    timers::install_timer_functions(ctx, &globals, timers)?;
    globals.set("global", globals.clone())?;
    Ok(())
}

/// Convert a JSON value into a script value
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &serde_json::Value) -> rquickjs::Result<Value<'js>> {
    ctx.json_parse(value.to_string())
}

/// Project a script value onto JSON.
///
/// Members holding `undefined` are kept as `null`; functions and symbols are
/// dropped, and a top-level value without a JSON form becomes `null`.
pub fn js_to_json<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<serde_json::Value> {
    let keep_undefined = Function::new(ctx.clone(), |key: Value<'js>, member: Value<'js>| {
        let nested = key
            .as_string()
            .and_then(|key| key.to_string().ok())
            .is_some_and(|key| !key.is_empty());
        if nested && member.is_undefined() {
            Value::new_null(member.ctx().clone())
        } else {
            member
        }
    })?;
    let Some(text) = ctx.json_stringify_replacer(value, keep_undefined)? else {
        return Ok(serde_json::Value::Null);
    };
    let text = text.to_string()?;
    serde_json::from_str(&text).map_err(|e| Exception::throw_type(ctx, &e.to_string()))
}
