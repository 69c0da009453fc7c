// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script execution engine

use super::diagnostics;
use super::result::{ExecutionResult, settle};
use super::state::{ExecutionState, ExecutionTracker};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::globals::{self, ExecutionContext, TimerQueue, js_to_json};
use crate::module_system::{
    ModuleLoader, ModuleResolver, RequireScope, create_require, create_require_uncached, wrapper,
};
use crate::script::ScriptUnit;
use rquickjs::function::This;
use rquickjs::{CatchResultExt, Context, Ctx, Object, Runtime, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// Runs hook scripts inside an embedded QuickJS runtime.
///
/// Each [`execute`](Self::execute) call gets a fresh context, so globals never
/// leak between scripts; dependency modules are shared through the engine's
/// module cache until invalidated.
pub struct ScriptEngine {
    loader: Rc<ModuleLoader>,
    // Declared last so it outlives every cached handle
    runtime: Runtime,
}

impl ScriptEngine {
    /// Create an engine
    pub fn new(config: EngineConfig) -> Result<Self> {
        let runtime = Runtime::new()?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(size) = config.max_stack_size {
            runtime.set_max_stack_size(size);
        }

        let resolver = ModuleResolver::with_options(config.extensions, config.search_paths);
        debug!("Script engine created");

        Ok(Self {
            loader: Rc::new(ModuleLoader::new(resolver)),
            runtime,
        })
    }

    /// Execute a script and return its settled exports.
    ///
    /// Failures raised by script code, including rejected exported promises,
    /// come back as [`ScriptError::Execution`](crate::ScriptError::Execution).
    pub fn execute(&self, unit: &ScriptUnit, context: &ExecutionContext) -> Result<ExecutionResult> {
        let filename = unit.filename();
        let mut tracker = ExecutionTracker::new(filename.clone());
        let dependencies = Rc::new(RefCell::new(Vec::new()));
        let scope = Rc::new(RequireScope::script(filename.clone(), dependencies.clone()));

        let js_context = Context::full(&self.runtime)?;
        let outcome = js_context.with(|ctx| {
            let timers = Rc::new(TimerQueue::new());
            let run = self.run(&ctx, unit, context, scope, &timers, &mut tracker).catch(&ctx);
            let dropped = timers.close();
            if dropped > 0 {
                debug!("Dropped {} pending timers", dropped);
            }
            match run {
                Ok(value) => Ok(value),
                Err(caught) => Err(diagnostics::execution_error(&ctx, &filename, caught)),
            }
        });
        self.drain_jobs();
        drop(js_context);

        match outcome {
            Ok(value) => {
                tracker.advance(ExecutionState::Succeeded);
                Ok(ExecutionResult {
                    value,
                    dependencies: dependencies.take(),
                })
            }
            Err(err) => {
                tracker.advance(ExecutionState::Failed);
                debug!("Script failed: {}", err);
                Err(err.into())
            }
        }
    }

    fn run<'js>(
        &self,
        ctx: &Ctx<'js>,
        unit: &ScriptUnit,
        context: &ExecutionContext,
        scope: Rc<RequireScope>,
        timers: &Rc<TimerQueue<'js>>,
        tracker: &mut ExecutionTracker,
    ) -> rquickjs::Result<serde_json::Value> {
        let global = ctx.globals();
        globals::install_ambient(ctx, timers)?;

        let mut overrides = HashMap::new();
        for (specifier, binding) in context.overrides() {
            overrides.insert(specifier.clone(), binding.to_js(ctx)?);
        }
        let require = create_require(ctx, self.loader.clone(), scope.clone(), overrides)?;
        global.set(
            "requireUncached",
            create_require_uncached(ctx, self.loader.clone(), scope.clone())?,
        )?;

        // Injected bindings shadow the ambient ones
        for (name, binding) in context.bindings() {
            global.set(name.as_str(), binding.to_js(ctx)?)?;
        }

        tracker.advance(ExecutionState::Compiling);
        let function = wrapper::compile(
            ctx,
            &format!("\n{}", unit.source),
            unit.line_offset,
            scope.id(),
        )?;

        let exports = Object::new(ctx.clone())?;
        let module = wrapper::create_module_object(ctx, scope.id(), &exports)?;

        tracker.advance(ExecutionState::Running);
        let returned: Value = function.call((
            This(exports.clone()),
            exports,
            require,
            module.clone(),
            scope.id().display().to_string(),
            scope.dir().display().to_string(),
        ))?;
        module.set("loaded", true)?;

        if !returned.is_undefined() {
            module.set("exports", returned)?;
        }
        let exported: Value = module.get("exports")?;

        let settled = settle(exported, timers, tracker)?;
        js_to_json(ctx, settled)
    }

    fn drain_jobs(&self) {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => break,
                Err(err) => warn!("Pending job failed after execution: {:?}", err),
            }
        }
    }

    /// Purge a dependency and its transitive children from the module cache
    pub fn invalidate(&self, specifier: &str, base_dir: &Path) -> Vec<PathBuf> {
        self.loader.invalidate(specifier, base_dir)
    }

    /// Drop every cached dependency module
    pub fn clear_cache(&self) {
        self.loader.clear();
    }

    /// Module loader shared by every execution
    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        self.loader.clear();
    }
}
