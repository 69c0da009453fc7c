// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS require() implementation

use crate::error::ScriptError;
use crate::module_system::loader::ModuleLoader;
use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Exception, Function, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// The module a `require` function belongs to
#[derive(Debug)]
pub struct RequireScope {
    id: PathBuf,
    dir: PathBuf,
    /// Set for the top-level script, whose record is never cached
    dependencies: Option<Rc<RefCell<Vec<PathBuf>>>>,
}

impl RequireScope {
    /// Scope of a cached dependency module
    pub fn module(id: PathBuf) -> Self {
        let dir = parent_dir(&id);
        Self {
            id,
            dir,
            dependencies: None,
        }
    }

    /// Scope of a top-level script; required ids are appended to `dependencies`
    pub fn script(id: PathBuf, dependencies: Rc<RefCell<Vec<PathBuf>>>) -> Self {
        let dir = parent_dir(&id);
        Self {
            id,
            dir,
            dependencies: Some(dependencies),
        }
    }

    /// Id of the requiring module
    pub fn id(&self) -> &Path {
        &self.id
    }

    /// Directory specifiers are resolved against
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_child(&self, loader: &ModuleLoader, child: &Path) {
        match &self.dependencies {
            Some(dependencies) => {
                let mut dependencies = dependencies.borrow_mut();
                if !dependencies.iter().any(|d| d == child) {
                    dependencies.push(child.to_path_buf());
                }
            }
            None => loader.cache().add_child(&self.id, child),
        }
    }
}

fn parent_dir(id: &Path) -> PathBuf {
    id.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."))
}

/// Create the `require` function for `scope`.
///
/// `overrides` are consulted before resolution and returned verbatim.
pub fn create_require<'js>(
    ctx: &Ctx<'js>,
    loader: Rc<ModuleLoader>,
    scope: Rc<RequireScope>,
    overrides: HashMap<String, Value<'js>>,
) -> rquickjs::Result<Function<'js>> {
    let resolve_loader = loader.clone();
    let resolve_scope = scope.clone();

    let require = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, id: Coerced<String>| -> rquickjs::Result<Value<'js>> {
            if let Some(value) = overrides.get(&id.0) {
                return Ok(value.clone());
            }
            require_from(&ctx, &loader, &scope, &id.0, false)
        },
    )?
    .with_name("require")?;

    // require.resolve(id)
    let resolve = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, id: Coerced<String>| -> rquickjs::Result<String> {
            match resolve_loader.resolve(&id.0, resolve_scope.dir()) {
                Some(path) => Ok(path.display().to_string()),
                None => Err(Exception::throw_message(
                    &ctx,
                    &ScriptError::module_not_found(id.0).to_string(),
                )),
            }
        },
    )?
    .with_name("resolve")?;
    require.set("resolve", resolve)?;

    Ok(require)
}

/// Create `requireUncached`: purge the module subtree, then require it afresh
pub fn create_require_uncached<'js>(
    ctx: &Ctx<'js>,
    loader: Rc<ModuleLoader>,
    scope: Rc<RequireScope>,
) -> rquickjs::Result<Function<'js>> {
    Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, id: Coerced<String>| -> rquickjs::Result<Value<'js>> {
            require_from(&ctx, &loader, &scope, &id.0, true)
        },
    )?
    .with_name("requireUncached")
}

/// Load `id` on behalf of `scope`, throwing into the script on failure
pub fn require_from<'js>(
    ctx: &Ctx<'js>,
    loader: &Rc<ModuleLoader>,
    scope: &RequireScope,
    id: &str,
    force: bool,
) -> rquickjs::Result<Value<'js>> {
    match loader.load(ctx, id, scope.dir(), Some(scope.id()), force) {
        Ok(Some((path, exports))) => {
            scope.record_child(loader, &path);
            Ok(exports)
        }
        Ok(None) => Err(Exception::throw_message(
            ctx,
            &ScriptError::module_not_found(id).to_string(),
        )),
        Err(err) => Err(Exception::throw_message(ctx, &err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_dir() {
        let scope = RequireScope::module(PathBuf::from("/proj/lib/util.js"));
        assert_eq!(scope.dir(), Path::new("/proj/lib"));
        assert_eq!(scope.id(), Path::new("/proj/lib/util.js"));
    }

    #[test]
    fn test_script_scope_records_dependencies_once() {
        let deps = Rc::new(RefCell::new(Vec::new()));
        let scope = RequireScope::script(PathBuf::from("/proj/hook.js"), deps.clone());
        let loader = ModuleLoader::new(Default::default());

        scope.record_child(&loader, Path::new("/proj/a.js"));
        scope.record_child(&loader, Path::new("/proj/b.js"));
        scope.record_child(&loader, Path::new("/proj/a.js"));

        assert_eq!(
            *deps.borrow(),
            vec![PathBuf::from("/proj/a.js"), PathBuf::from("/proj/b.js")]
        );
        assert!(loader.cache().is_empty());
    }
}
