// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! `process` global object

use rquickjs::{Ctx, Function, Object};

/// Create the process object
pub fn create_process_object<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
    let process = Object::new(ctx.clone())?;

    // process.argv - scripts run embedded, so only the host name is present
    process.set("argv", vec!["hookjs".to_string()])?;

    // process.env - snapshot of the environment at execution start
    let env = Object::new(ctx.clone())?;
    for (key, value) in std::env::vars() {
        env.set(key, value)?;
    }
    process.set("env", env)?;

    process.set("pid", std::process::id())?;
    process.set("platform", get_platform())?;
    process.set("arch", get_arch())?;
    process.set("version", format!("v{}", crate::VERSION))?;
    process.set("title", "hookjs")?;

    let versions = Object::new(ctx.clone())?;
    versions.set("hookjs", crate::VERSION)?;
    versions.set("engine", "quickjs")?;
    process.set("versions", versions)?;

    // process.cwd()
    let cwd = Function::new(ctx.clone(), || -> String {
        std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| ".".to_string())
    })?
    .with_name("cwd")?;
    process.set("cwd", cwd)?;

    Ok(process)
}

/// Get the platform string
fn get_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "win32"
    } else if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else if cfg!(target_os = "freebsd") {
        "freebsd"
    } else {
        "unknown"
    }
}

/// Get the architecture string
fn get_arch() -> &'static str {
    if cfg!(target_arch = "x86_64") {
        "x64"
    } else if cfg!(target_arch = "x86") {
        "ia32"
    } else if cfg!(target_arch = "aarch64") {
        "arm64"
    } else if cfg!(target_arch = "arm") {
        "arm"
    } else {
        "unknown"
    }
}
