// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script execution runtime

pub(crate) mod diagnostics;
mod engine;
mod result;
mod state;

pub use engine::ScriptEngine;
pub use result::ExecutionResult;
pub use state::{ExecutionState, ExecutionTracker};
