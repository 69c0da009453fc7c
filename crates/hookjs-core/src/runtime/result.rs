// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Execution results and exported-promise settlement

use super::state::{ExecutionState, ExecutionTracker};
use crate::globals::TimerQueue;
use rquickjs::{Promise, Value};
use serde::Serialize;
use std::path::PathBuf;

/// Value produced by a successful execution
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    /// Exported names mapped to resolved values, or the single exported value
    pub value: serde_json::Value,
    /// Modules the script required, in first-require order
    pub dependencies: Vec<PathBuf>,
}

impl ExecutionResult {
    /// Look up an exported name
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.value.get(name)
    }
}

/// Settle the exported value.
///
/// A promise is awaited as a whole; otherwise every own property holding a
/// promise is awaited and replaced by its value. Settling drives the job
/// queue and the script's timers, and fails with `WouldBlock` when a promise
/// can never settle.
pub(crate) fn settle<'js>(
    value: Value<'js>,
    timers: &TimerQueue<'js>,
    tracker: &mut ExecutionTracker,
) -> rquickjs::Result<Value<'js>> {
    if let Some(promise) = value.as_promise() {
        tracker.advance(ExecutionState::AwaitingResult);
        return await_promise(promise, timers);
    }

    if value.is_function() {
        return Ok(value);
    }
    let Some(object) = value.as_object() else {
        return Ok(value);
    };

    let keys = object.keys::<String>().collect::<rquickjs::Result<Vec<_>>>()?;
    for key in keys {
        let member: Value = object.get(&key)?;
        if let Some(promise) = member.as_promise() {
            tracker.advance(ExecutionState::AwaitingResult);
            let settled = await_promise(promise, timers)?;
            object.set(&key, settled)?;
        }
    }

    Ok(value)
}

fn await_promise<'js>(promise: &Promise<'js>, timers: &TimerQueue<'js>) -> rquickjs::Result<Value<'js>> {
    loop {
        if let Some(result) = promise.result() {
            return result;
        }
        if promise.ctx().execute_pending_job() {
            continue;
        }
        if !timers.run_next()? {
            return Err(rquickjs::Error::WouldBlock);
        }
    }
}
