// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! User-facing notification sink

use parking_lot::Mutex;

/// Receives messages meant for the person running the hooks.
///
/// Scripts reach it through `client.log`; the engine uses it to surface
/// failures that happen before any script code runs.
pub trait Reporter: Send + Sync {
    /// Informational output produced by a script
    fn info(&self, message: &str);

    /// A failure the user should see
    fn error(&self, message: &str);
}

/// Reporter that forwards everything to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        tracing::info!(target: "hookjs::script", "{}", message);
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "hookjs::script", "{}", message);
    }
}

/// Reporter that keeps every message in memory
#[derive(Debug, Default)]
pub struct MemoryReporter {
    infos: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryReporter {
    /// Create an empty reporter
    pub fn new() -> Self {
        Self::default()
    }

    /// Informational messages received so far
    pub fn infos(&self) -> Vec<String> {
        self.infos.lock().clone()
    }

    /// Error messages received so far
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }
}

impl Reporter for MemoryReporter {
    fn info(&self, message: &str) {
        self.infos.lock().push(message.to_string());
    }

    fn error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }
}
