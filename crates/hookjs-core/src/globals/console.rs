// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `console` global routed to `tracing`

use rquickjs::convert::Coerced;
use rquickjs::function::Rest;
use rquickjs::{CatchResultExt, Ctx, Function, Object, Value};

/// Log level a console method maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

/// Create the console object
pub fn create_console_object<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let console = Object::new(ctx.clone())?;

    for (name, level) in [
        ("log", Level::Info),
        ("info", Level::Info),
        ("debug", Level::Debug),
        ("trace", Level::Debug),
        ("warn", Level::Warn),
        ("error", Level::Error),
    ] {
        let method = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<()> {
                let line = format_args_line(&ctx, args.0)?;
                emit(level, &line);
                Ok(())
            },
        )?
        .with_name(name)?;
        console.set(name, method)?;
    }

    Ok(console)
}

fn emit(level: Level, line: &str) {
    match level {
        Level::Debug => tracing::debug!(target: "hookjs::script", "{}", line),
        Level::Info => tracing::info!(target: "hookjs::script", "{}", line),
        Level::Warn => tracing::warn!(target: "hookjs::script", "{}", line),
        Level::Error => tracing::error!(target: "hookjs::script", "{}", line),
    }
}

/// Join console arguments the way Node prints them: strings verbatim,
/// everything else as JSON when it has a JSON form.
fn format_args_line<'js>(ctx: &Ctx<'js>, args: Vec<Value<'js>>) -> rquickjs::Result<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(format_value(ctx, arg)?);
    }
    Ok(parts.join(" "))
}

pub(crate) fn format_value<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    if value.is_symbol() {
        return Ok("Symbol()".to_string());
    }
    if value.is_string() || value.is_function() || value.is_undefined() {
        return value.get::<Coerced<String>>().map(|s| s.0);
    }
    // Cyclic values make JSON.stringify throw; fall back to ToString
    match ctx.json_stringify(value.clone()).catch(ctx) {
        Ok(Some(json)) => json.to_string(),
        _ => value.get::<Coerced<String>>().map(|s| s.0),
    }
}
