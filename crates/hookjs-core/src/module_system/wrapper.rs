// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! CommonJS function envelope

use rquickjs::{Ctx, Error, FromJs, Function, Object, Value, qjs};
use std::ffi::CString;
use std::path::Path;

/// Header of the envelope every module body is placed in
const HEADER: &str = "(function (exports, require, module, __filename, __dirname) {";

/// Wrap `source` in the CommonJS envelope.
///
/// `leading_lines` blank lines precede the header, so line numbers reported
/// by the interpreter are shifted by that amount.
pub fn wrap(source: &str, leading_lines: u32) -> String {
    let padding = "\n".repeat(leading_lines as usize);
    format!("{padding}{HEADER}{source}\n}})")
}

/// Evaluate the envelope around `source` and return the module function.
///
/// The code is compiled non-strict under `filename`, which is the file name
/// its stack frames carry.
pub fn compile<'js>(
    ctx: &Ctx<'js>,
    source: &str,
    leading_lines: u32,
    filename: &Path,
) -> rquickjs::Result<Function<'js>> {
    let code = CString::new(wrap(source, leading_lines))?;
    let filename = CString::new(filename.display().to_string())?;
    let len = code.as_bytes().len();

    // SAFETY: both strings are NUL-terminated and outlive the call, and the
    // context pointer comes from a live `Ctx`
    let raw = unsafe {
        qjs::JS_Eval(
            ctx.as_raw().as_ptr(),
            code.as_ptr(),
            len as _,
            filename.as_ptr(),
            qjs::JS_EVAL_TYPE_GLOBAL as i32,
        )
    };
    // SAFETY: the exception stays pending on the context for `catch`
    if unsafe { qjs::JS_IsException(raw) } {
        return Err(Error::Exception);
    }
    // SAFETY: `JS_Eval` returned an owned reference, which `Value` takes over
    let value = unsafe { Value::from_raw(ctx.clone(), raw) };
    Function::from_js(ctx, value)
}

/// Create the `module` object handed to a module body
pub fn create_module_object<'js>(
    ctx: &Ctx<'js>,
    id: &Path,
    exports: &Object<'js>,
) -> rquickjs::Result<Object<'js>> {
    let module = Object::new(ctx.clone())?;
    let filename = id.display().to_string();
    module.set("exports", exports.clone())?;
    module.set("id", filename.clone())?;
    module.set("filename", filename)?;
    module.set("loaded", false)?;
    module.set("paths", node_module_paths(id.parent().unwrap_or(id)))?;
    Ok(module)
}

/// `node_modules` lookup directories for a module living in `dir`
pub fn node_module_paths(dir: &Path) -> Vec<String> {
    dir.ancestors()
        .filter(|ancestor| ancestor.file_name().is_none_or(|name| name != "node_modules"))
        .map(|ancestor| ancestor.join("node_modules").display().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_without_offset() {
        assert_eq!(
            wrap("return 1;", 0),
            "(function (exports, require, module, __filename, __dirname) {return 1;\n})"
        );
    }

    #[test]
    fn test_wrap_with_offset() {
        let wrapped = wrap("\nthrow new Error('x');", 3);
        let lines: Vec<&str> = wrapped.lines().collect();
        assert_eq!(&lines[..3], &["", "", ""]);
        assert!(lines[3].starts_with("(function"));
        // Source line 1 lands on line offset + 2
        assert_eq!(lines[4], "throw new Error('x');");
    }

    #[test]
    fn test_node_module_paths() {
        let paths = node_module_paths(Path::new("/proj/node_modules/pkg/lib"));
        assert_eq!(
            paths,
            vec![
                "/proj/node_modules/pkg/lib/node_modules",
                "/proj/node_modules/pkg/node_modules",
                "/proj/node_modules",
                "/node_modules",
            ]
        );
    }
}
