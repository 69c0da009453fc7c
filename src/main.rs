// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! hookjs CLI - run an HTTP hook script outside the request runner

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use hookjs_core::{
    EngineConfig, ExecutionContext, HttpClient, Reporter, ResponseSnapshot, ScriptEngine,
    ScriptError, VERSION, Variables, load_script,
};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "hookjs",
    about = "Run JavaScript request and response hooks",
    version = VERSION,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a hook script and print its exports
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Hook script to execute
    script: PathBuf,

    /// Lines preceding the script in its hosting document
    #[arg(long, default_value_t = 0)]
    line_offset: u32,

    /// Inject a global binding, `name=<json>`
    #[arg(long = "binding", value_name = "NAME=JSON", value_parser = parse_assignment)]
    bindings: Vec<(String, serde_json::Value)>,

    /// Make `require(spec)` return a fixed value, `spec=<json>`
    #[arg(long = "override", value_name = "SPEC=JSON", value_parser = parse_assignment)]
    overrides: Vec<(String, serde_json::Value)>,

    /// Response snapshot to expose as `response`
    #[arg(long, value_name = "FILE")]
    response: Option<PathBuf>,

    /// JSON object with the initial `client.global` variables
    #[arg(long, value_name = "FILE")]
    variables: Option<PathBuf>,

    /// Abort the script after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Configuration file (defaults to ./hookjs.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

/// Prints script output and load failures on the terminal
struct TerminalReporter;

impl Reporter for TerminalReporter {
    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("{}: {}", "Error".red().bold(), message);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("hookjs=debug,hookjs_core=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("hookjs=warn,hookjs_core=warn")
            .init();
    }

    match cli.command {
        Command::Run(args) => run(args, cli.verbose).await,
    }
}

async fn run(args: RunArgs, verbose: bool) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load()?,
    };

    let reporter: Arc<dyn Reporter> = Arc::new(TerminalReporter);
    let script = std::path::absolute(&args.script)?;
    let Some(mut unit) = load_script(&script.display().to_string(), &script, reporter.as_ref()) else {
        std::process::exit(1);
    };
    unit.line_offset = args.line_offset;

    let variables = match &args.variables {
        Some(path) => read_variables(path)?,
        None => Variables::new(),
    };
    let client = HttpClient::new(variables.clone(), reporter);

    let mut context = ExecutionContext::new().bind("client", client.clone());
    if let Some(path) = &args.response {
        context = context.bind("response", read_json::<ResponseSnapshot>(path)?);
    }
    for (name, value) in args.bindings {
        context = context.bind(name, value);
    }
    for (specifier, value) in args.overrides {
        context = context.override_module(specifier, value);
    }

    // The engine is single-threaded, so it lives entirely on the blocking thread
    let task = tokio::task::spawn_blocking(move || {
        let engine = ScriptEngine::new(config)?;
        engine.execute(&unit, &context)
    });

    let outcome = match args.timeout {
        Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), task).await {
            Ok(joined) => joined?,
            Err(_) => {
                eprintln!("{}: script timed out after {}s", "Error".red().bold(), secs);
                std::process::exit(1);
            }
        },
        None => task.await?,
    };

    let result = match outcome {
        Ok(result) => result,
        Err(e) => {
            print_script_error(&e, verbose);
            std::process::exit(1);
        }
    };

    for dependency in &result.dependencies {
        tracing::debug!("Required {}", dependency.display());
    }
    println!("{}", serde_json::to_string_pretty(&result.value)?);

    let mut failed = false;
    for test in client.results() {
        if test.passed() {
            println!("{} {}", "✓".green().bold(), test.name);
        } else {
            failed = true;
            match &test.message {
                Some(message) => println!("{} {}: {}", "✗".red().bold(), test.name, message.dimmed()),
                None => println!("{} {}", "✗".red().bold(), test.name),
            }
        }
    }

    if !variables.is_empty() {
        tracing::debug!("Globals after run: {:?}", variables.snapshot());
    }

    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn print_script_error(error: &ScriptError, verbose: bool) {
    eprintln!("{}: {}", "Error".red().bold(), error);
    if verbose {
        if let Some(stack) = error.as_execution().and_then(|e| e.stack.as_deref()) {
            eprintln!("{}", stack.dimmed());
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn read_variables(path: &Path) -> anyhow::Result<Variables> {
    match read_json::<serde_json::Value>(path)? {
        serde_json::Value::Object(map) => Ok(Variables::from(map)),
        _ => anyhow::bail!("{} must contain a JSON object", path.display()),
    }
}

/// Parse `name=<json>`; a value that is not JSON is taken as a string
fn parse_assignment(arg: &str) -> Result<(String, serde_json::Value), String> {
    let (name, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=JSON, got '{}'", arg))?;
    if name.is_empty() {
        return Err(format!("missing name in '{}'", arg));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
    Ok((name.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_assignment() {
        assert_eq!(parse_assignment("n=42").unwrap(), ("n".to_string(), json!(42)));
        assert_eq!(
            parse_assignment("user={\"id\":1}").unwrap(),
            ("user".to_string(), json!({"id": 1}))
        );
        assert_eq!(parse_assignment("s=plain").unwrap(), ("s".to_string(), json!("plain")));
        assert!(parse_assignment("novalue").is_err());
        assert!(parse_assignment("=1").is_err());
    }

    #[test]
    fn test_read_variables_requires_object() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("vars.json");
        std::fs::write(&good, r#"{"token": "abc"}"#).unwrap();
        assert_eq!(read_variables(&good).unwrap().get("token"), Some(json!("abc")));

        let bad = dir.path().join("list.json");
        std::fs::write(&bad, "[1]").unwrap();
        assert!(read_variables(&bad).is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "hookjs",
            "run",
            "hook.js",
            "--line-offset",
            "4",
            "--binding",
            "a=1",
            "--override",
            "x={}",
            "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        let Command::Run(args) = cli.command;
        assert_eq!(args.line_offset, 4);
        assert_eq!(args.bindings.len(), 1);
        assert_eq!(args.overrides[0].0, "x");
    }
}
