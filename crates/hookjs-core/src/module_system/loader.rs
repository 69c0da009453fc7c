// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module loader - reads, evaluates and caches dependency modules

use crate::error::{Result, ScriptError};
use crate::module_system::cache::{ModuleCache, ModuleRecord};
use crate::module_system::require::{RequireScope, create_require};
use crate::module_system::resolver::ModuleResolver;
use crate::module_system::wrapper;
use crate::runtime::diagnostics;
use rquickjs::function::This;
use rquickjs::{CatchResultExt, Ctx, Object, Persistent, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, trace};

/// Exports as stored in the cache, detached from any single context
pub type CachedExports = Persistent<Value<'static>>;

/// Module loader
pub struct ModuleLoader {
    /// Module resolver
    resolver: ModuleResolver,
    /// Module cache
    cache: ModuleCache<CachedExports>,
}

impl ModuleLoader {
    /// Create a loader around `resolver` with an empty cache
    pub fn new(resolver: ModuleResolver) -> Self {
        Self {
            resolver,
            cache: ModuleCache::new(),
        }
    }

    /// Resolve a specifier without loading it
    pub fn resolve(&self, specifier: &str, base_dir: &Path) -> Option<PathBuf> {
        self.resolver.resolve(specifier, base_dir)
    }

    /// Load a module and return its id and exports.
    ///
    /// Yields `Ok(None)` when the specifier cannot be resolved. With `force`
    /// the module and its transitive children are purged first.
    pub fn load<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        specifier: &str,
        base_dir: &Path,
        parent: Option<&Path>,
        force: bool,
    ) -> Result<Option<(PathBuf, Value<'js>)>> {
        if force {
            self.invalidate(specifier, base_dir);
        }

        let Some(path) = self.resolve(specifier, base_dir) else {
            debug!("Could not resolve '{}' from {}", specifier, base_dir.display());
            return Ok(None);
        };

        let exports = self.load_path(ctx, &path, parent)?;
        Ok(Some((path, exports)))
    }

    /// Load an already resolved module
    fn load_path<'js>(self: &Rc<Self>, ctx: &Ctx<'js>, path: &Path, parent: Option<&Path>) -> Result<Value<'js>> {
        // A record that is still loading is a circular require and yields the
        // partially populated exports
        if let Some(cached) = self.cache.exports(path) {
            trace!("Module cache hit: {}", path.display());
            return Ok(cached.restore(ctx)?);
        }

        let source = std::fs::read_to_string(path)?;

        if path.extension().is_some_and(|ext| ext == "json") {
            return self.load_json(ctx, path, &source, parent);
        }

        debug!("Evaluating module {}", path.display());
        let exports = Object::new(ctx.clone())?;
        let module = wrapper::create_module_object(ctx, path, &exports)?;
        self.cache.set(ModuleRecord::new(
            path.to_path_buf(),
            Persistent::save(ctx, exports.clone().into_value()),
            parent.map(Path::to_path_buf),
        ));

        let evaluated = self.evaluate(ctx, path, &source, exports, &module).catch(ctx);
        match evaluated {
            Ok(exports) => {
                self.cache.finish(path, Persistent::save(ctx, exports.clone()));
                Ok(exports)
            }
            Err(caught) => {
                self.cache.delete(path);
                Err(ScriptError::ModuleLoad {
                    module: path.to_path_buf(),
                    reason: diagnostics::describe(ctx, caught),
                })
            }
        }
    }

    fn evaluate<'js>(
        self: &Rc<Self>,
        ctx: &Ctx<'js>,
        path: &Path,
        source: &str,
        exports: Object<'js>,
        module: &Object<'js>,
    ) -> rquickjs::Result<Value<'js>> {
        let scope = Rc::new(RequireScope::module(path.to_path_buf()));
        let dirname = scope.dir().display().to_string();
        let require = create_require(ctx, self.clone(), scope, HashMap::new())?;

        let function = wrapper::compile(ctx, source, 0, path)?;
        function.call::<_, Value>((
            This(exports.clone()),
            exports,
            require,
            module.clone(),
            path.display().to_string(),
            dirname,
        ))?;

        module.set("loaded", true)?;
        module.get("exports")
    }

    fn load_json<'js>(&self, ctx: &Ctx<'js>, path: &Path, source: &str, parent: Option<&Path>) -> Result<Value<'js>> {
        let value = ctx
            .json_parse(source)
            .catch(ctx)
            .map_err(|caught| ScriptError::ModuleLoad {
                module: path.to_path_buf(),
                reason: diagnostics::describe(ctx, caught),
            })?;

        let mut record = ModuleRecord::new(
            path.to_path_buf(),
            Persistent::save(ctx, value.clone()),
            parent.map(Path::to_path_buf),
        );
        record.loaded = true;
        self.cache.set(record);

        Ok(value)
    }

    /// Purge a module and everything it transitively required.
    ///
    /// Returns the purged ids; an unresolvable or uncached module purges nothing.
    pub fn invalidate(&self, specifier: &str, base_dir: &Path) -> Vec<PathBuf> {
        match self.resolve(specifier, base_dir) {
            Some(path) => self.cache.invalidate(&path),
            None => Vec::new(),
        }
    }

    /// Drop every cached module
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get the module cache
    pub fn cache(&self) -> &ModuleCache<CachedExports> {
        &self.cache
    }
}
