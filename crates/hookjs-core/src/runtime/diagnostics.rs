// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Turning caught interpreter errors into [`ExecutionError`]s

use crate::error::ExecutionError;
use crate::globals::console::format_value;
use regex::Regex;
use rquickjs::{CaughtError, Ctx, Exception};
use std::path::Path;
use std::sync::LazyLock;

/// Location of a stack frame, `file:line` or `file:line:column`
static FRAME_LOCATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*):(\d+)(?::(\d+))?$").expect("valid frame regex"));

/// Build an [`ExecutionError`] for `file` from a caught error
pub fn execution_error<'js>(ctx: &Ctx<'js>, file: &Path, caught: CaughtError<'js>) -> ExecutionError {
    let mut error = ExecutionError {
        file: file.to_path_buf(),
        name: None,
        message: String::new(),
        line: None,
        column: None,
        stack: None,
    };

    match caught {
        CaughtError::Exception(exception) => {
            error.name = exception_name(&exception);
            error.message = exception.message().unwrap_or_default();
            error.stack = exception.stack().filter(|s| !s.is_empty());
            let filename = file.display().to_string();
            let position = match error.stack.as_deref() {
                Some(stack) => stack_position(stack, &filename),
                None => property_position(&exception, &filename),
            };
            if let Some((line, column)) = position {
                error.line = Some(line);
                error.column = column;
            }
        }
        CaughtError::Value(value) => {
            error.message = format_value(ctx, value).unwrap_or_default();
        }
        CaughtError::Error(rquickjs::Error::WouldBlock) => {
            error.message = "Exported promise never settled".to_string();
        }
        CaughtError::Error(err) => {
            error.message = err.to_string();
        }
    }

    error
}

/// `Name: message` summary of a caught error
pub fn describe<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> String {
    match caught {
        CaughtError::Exception(exception) => {
            let message = exception.message().unwrap_or_default();
            match exception_name(&exception) {
                Some(name) => format!("{name}: {message}"),
                None => message,
            }
        }
        other => caught_message(ctx, other),
    }
}

/// Message of a caught error, without the error name
pub fn caught_message<'js>(ctx: &Ctx<'js>, caught: CaughtError<'js>) -> String {
    match caught {
        CaughtError::Exception(exception) => exception.message().unwrap_or_default(),
        CaughtError::Value(value) => format_value(ctx, value).unwrap_or_default(),
        CaughtError::Error(err) => err.to_string(),
    }
}

fn exception_name(exception: &Exception<'_>) -> Option<String> {
    exception.as_object().get::<_, Option<String>>("name").ok().flatten()
}

/// Position of the innermost frame of `stack` that runs code from `file`.
///
/// Frames from other modules and native frames are skipped, so an error
/// thrown inside a dependency is placed at the script's call into it.
pub fn stack_position(stack: &str, file: &str) -> Option<(u32, Option<u32>)> {
    stack.lines().find_map(|frame| {
        let location = frame_location(frame)?;
        let captures = FRAME_LOCATION.captures(location)?;
        if captures.get(1)?.as_str() != file {
            return None;
        }
        let line = captures.get(2)?.as_str().parse().ok()?;
        let column = captures.get(3).and_then(|c| c.as_str().parse().ok());
        Some((line, column))
    })
}

/// `file:line:column` part of an `at fn (location)` or `at location` frame
fn frame_location(frame: &str) -> Option<&str> {
    let frame = frame.trim().strip_prefix("at ")?;
    match frame.strip_suffix(')') {
        Some(inner) => inner.split_once(" (").map(|(_, location)| location),
        None => Some(frame),
    }
}

fn property_position(exception: &Exception<'_>, file: &str) -> Option<(u32, Option<u32>)> {
    let object = exception.as_object();
    let origin = object.get::<_, Option<String>>("fileName").ok().flatten();
    if origin.is_some_and(|origin| origin != file) {
        return None;
    }
    let line = object.get::<_, Option<u32>>("lineNumber").ok().flatten()?;
    let column = object.get::<_, Option<u32>>("columnNumber").ok().flatten();
    Some((line, column))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = "/work/requests.http";

    #[test]
    fn test_position_with_column() {
        let stack = "    at <anonymous> (/work/requests.http:14:11)\n    at <eval> (/work/requests.http:20:1)\n";
        assert_eq!(stack_position(stack, FILE), Some((14, Some(11))));
    }

    #[test]
    fn test_position_without_column() {
        let stack = "    at <anonymous> (/work/requests.http:7)\n";
        assert_eq!(stack_position(stack, FILE), Some((7, None)));
    }

    #[test]
    fn test_skips_native_frames() {
        let stack = "    at assert (native)\n    at <anonymous> (/work/requests.http:3:5)\n";
        assert_eq!(stack_position(stack, FILE), Some((3, Some(5))));
    }

    #[test]
    fn test_skips_dependency_frames() {
        let stack = "    at fail (/work/lib/dep.js:2:11)\n    at <anonymous> (/work/requests.http:14:5)\n";
        assert_eq!(stack_position(stack, FILE), Some((14, Some(5))));
        assert_eq!(stack_position("    at fail (/work/lib/dep.js:2:11)\n", FILE), None);
    }

    #[test]
    fn test_file_name_with_parentheses() {
        let stack = "    at run (/work/a (copy)/requests.http:4:2)\n";
        assert_eq!(stack_position(stack, "/work/a (copy)/requests.http"), Some((4, Some(2))));
    }

    #[test]
    fn test_syntax_error_frame() {
        assert_eq!(stack_position("    at /work/requests.http:5:9\n", FILE), Some((5, Some(9))));
        assert_eq!(stack_position("", FILE), None);
    }
}
