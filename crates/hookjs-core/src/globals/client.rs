// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `client` capability: test registration, assertions and shared variables

use super::console::format_value;
use super::{Capability, js_to_json, json_to_js};
use crate::reporter::Reporter;
use crate::runtime::diagnostics::caught_message;
use parking_lot::{Mutex, RwLock};
use rquickjs::convert::Coerced;
use rquickjs::function::{Opt, Rest};
use rquickjs::{CatchResultExt, Ctx, Exception, Function, Object, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of a single `client.test` block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The block returned normally
    Passed,
    /// The block threw
    Failed,
}

/// Result recorded by `client.test`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Test name
    pub name: String,
    /// Pass or fail
    pub status: TestStatus,
    /// Failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    /// Whether the test passed
    pub fn passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

/// Thread-safe global variable store shared between scripts and the host
#[derive(Debug, Clone, Default)]
pub struct Variables {
    inner: Arc<RwLock<BTreeMap<String, serde_json::Value>>>,
}

impl Variables {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<serde_json::Value> {
        self.inner.read().get(name).cloned()
    }

    /// Set a variable
    pub fn set(&self, name: impl Into<String>, value: serde_json::Value) {
        self.inner.write().insert(name.into(), value);
    }

    /// Remove a variable
    pub fn clear(&self, name: &str) {
        self.inner.write().remove(name);
    }

    /// Remove every variable
    pub fn clear_all(&self) {
        self.inner.write().clear();
    }

    /// Whether the store is empty
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        self.inner.read().clone()
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Variables {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(map.into_iter().collect())),
        }
    }
}

/// The `client` object handed to response-handler scripts.
///
/// Clones share the same variables and result list, so the host keeps one
/// copy and reads results back after execution.
#[derive(Clone)]
pub struct HttpClient {
    variables: Variables,
    results: Arc<Mutex<Vec<TestResult>>>,
    reporter: Arc<dyn Reporter>,
}

impl HttpClient {
    /// Create a client backed by `variables`, logging through `reporter`
    pub fn new(variables: Variables, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            variables,
            results: Arc::new(Mutex::new(Vec::new())),
            reporter,
        }
    }

    /// Shared variable store
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Tests recorded so far, in execution order
    pub fn results(&self) -> Vec<TestResult> {
        self.results.lock().clone()
    }

    fn record(&self, name: String, failure: Option<String>) {
        let status = if failure.is_some() {
            TestStatus::Failed
        } else {
            TestStatus::Passed
        };
        tracing::debug!("client.test '{}': {:?}", name, status);
        self.results.lock().push(TestResult {
            name,
            status,
            message: failure,
        });
    }
}

impl Capability for HttpClient {
    fn install<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Value<'js>> {
        let client = Object::new(ctx.clone())?;

        // client.test(name, fn)
        let this = self.clone();
        let test = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, name: Coerced<String>, body: Function<'js>| -> rquickjs::Result<()> {
                let failure = match body.call::<_, Value>(()).catch(&ctx) {
                    Ok(_) => None,
                    Err(caught) => Some(caught_message(&ctx, caught)),
                };
                this.record(name.0, failure);
                Ok(())
            },
        )?
        .with_name("test")?;
        client.set("test", test)?;

        // client.assert(condition, message?)
        let assert = Function::new(
            ctx.clone(),
            |ctx: Ctx<'js>, condition: Coerced<bool>, message: Opt<Coerced<String>>| -> rquickjs::Result<()> {
                if condition.0 {
                    return Ok(());
                }
                let message = message.0.map(|m| m.0).unwrap_or_else(|| "Assertion failed".to_string());
                throw_assertion(&ctx, &message)
            },
        )?
        .with_name("assert")?;
        client.set("assert", assert)?;

        // client.log(...args)
        let reporter = self.reporter.clone();
        let log = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                let mut parts = Vec::with_capacity(args.0.len());
                for arg in args.0 {
                    parts.push(format_value(&ctx, arg)?);
                }
                reporter.info(&parts.join(" "));
                Ok(())
            },
        )?
        .with_name("log")?;
        client.set("log", log)?;

        client.set("global", create_global_object(ctx, &self.variables)?)?;

        Ok(client.into_value())
    }
}

fn create_global_object<'js>(ctx: &Ctx<'js>, variables: &Variables) -> rquickjs::Result<Object<'js>> {
    let global = Object::new(ctx.clone())?;

    let vars = variables.clone();
    let get = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, name: Coerced<String>| -> rquickjs::Result<Value<'js>> {
            match vars.get(&name.0) {
                Some(value) => json_to_js(&ctx, &value),
                None => Ok(Value::new_undefined(ctx)),
            }
        },
    )?
    .with_name("get")?;
    global.set("get", get)?;

    let vars = variables.clone();
    let set = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, name: Coerced<String>, value: Value<'js>| -> rquickjs::Result<()> {
            let value = js_to_json(&ctx, value)?;
            vars.set(name.0, value);
            Ok(())
        },
    )?
    .with_name("set")?;
    global.set("set", set)?;

    let vars = variables.clone();
    let clear = Function::new(ctx.clone(), move |name: Coerced<String>| {
        vars.clear(&name.0);
    })?
    .with_name("clear")?;
    global.set("clear", clear)?;

    let vars = variables.clone();
    let clear_all = Function::new(ctx.clone(), move || {
        vars.clear_all();
    })?
    .with_name("clearAll")?;
    global.set("clearAll", clear_all)?;

    let vars = variables.clone();
    let is_empty = Function::new(ctx.clone(), move || vars.is_empty())?.with_name("isEmpty")?;
    global.set("isEmpty", is_empty)?;

    Ok(global)
}

/// Throw an `AssertionError` carrying `message`
fn throw_assertion<'js>(ctx: &Ctx<'js>, message: &str) -> rquickjs::Result<()> {
    let err = Exception::from_message(ctx.clone(), message)?;
    err.as_object().set("name", "AssertionError")?;
    Err(ctx.throw(err.into_object().into_value()))
}
