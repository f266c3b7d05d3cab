//! Build, watch and dev command implementations.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use super::{TaskArg, EXIT_ERROR, EXIT_INVALID_ARGS, EXIT_SUCCESS};
use crate::config::loader::{find_config, load_config, merge_cli_overrides, CliOverrides};
use crate::context::TaskContext;
use crate::pipeline::TaskResult;
use crate::serve::{self, ReloadChannel, ServeOptions};
use crate::tasks::{self, Task};
use crate::watch;

/// Load configuration and set up the task context.
///
/// The project root is the directory containing the discovered assets.toml,
/// or the current directory when building on defaults.
fn load_context(
    config_path: Option<&Path>,
    out: Option<PathBuf>,
    src: Option<PathBuf>,
    port: Option<u16>,
    verbose: bool,
) -> Result<TaskContext, ExitCode> {
    let discovered = match config_path {
        Some(p) => Some(p.to_path_buf()),
        None => find_config(),
    };

    if verbose {
        match &discovered {
            Some(p) => println!("Using config: {}", p.display()),
            None => println!("No assets.toml found, using defaults"),
        }
    }

    let mut config = match load_config(discovered.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Err(ExitCode::from(EXIT_INVALID_ARGS));
        }
    };

    merge_cli_overrides(&mut config, &CliOverrides { out, styles_src: src, port });

    let project_root = discovered
        .as_deref()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));

    Ok(TaskContext::new(config, project_root).with_verbose(verbose))
}

/// Print a one-off build summary and compute the exit code.
///
/// Failures surface in the exit code for dry runs too.
fn report(results: &[TaskResult], dry_run: bool) -> ExitCode {
    let mut succeeded = 0;
    let mut failed = 0;

    for result in results {
        succeeded += result.files.iter().filter(|f| f.is_success()).count();
        failed += result.error_count();
        for (path, message) in result.failures() {
            eprintln!("Error in {}: {}", path.display(), message);
        }
    }

    if failed > 0 {
        eprintln!("Build finished with {} error{}", failed, if failed == 1 { "" } else { "s" });
        ExitCode::from(EXIT_ERROR)
    } else if dry_run {
        println!(
            "Dry run: {} file{} would be built",
            succeeded,
            if succeeded == 1 { "" } else { "s" }
        );
        ExitCode::from(EXIT_SUCCESS)
    } else {
        println!("Built {} file{}", succeeded, if succeeded == 1 { "" } else { "s" });
        ExitCode::from(EXIT_SUCCESS)
    }
}

/// Run the build command
pub fn run_build(
    task: Option<TaskArg>,
    dry_run: bool,
    out: Option<PathBuf>,
    src: Option<PathBuf>,
    config: Option<&Path>,
    verbose: bool,
) -> ExitCode {
    let ctx = match load_context(config, out, src, None, verbose) {
        Ok(ctx) => ctx.with_dry_run(dry_run),
        Err(code) => return code,
    };

    let batch: &[Task] = match task {
        Some(arg) => arg.tasks(),
        None => &Task::ALL,
    };

    let results = tasks::run_many(&ctx, batch);
    if dry_run {
        println!("Dry run - would write:");
        for output in results.iter().flat_map(TaskResult::outputs) {
            println!("  {}", output.display());
        }
    }
    report(&results, dry_run)
}

/// Run the watch command (no server)
pub fn run_watch(
    out: Option<PathBuf>,
    src: Option<PathBuf>,
    config: Option<&Path>,
    verbose: bool,
) -> ExitCode {
    let ctx = match load_context(config, out, src, None, verbose) {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    let bindings = watch::default_bindings(&ctx);
    println!("Press Ctrl+C to stop");

    match watch::watch_and_rebuild(&ctx, &bindings, None) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the dev command (watch + static server + live reload)
pub fn run_dev(
    port: Option<u16>,
    out: Option<PathBuf>,
    src: Option<PathBuf>,
    config: Option<&Path>,
    verbose: bool,
) -> ExitCode {
    let ctx = match load_context(config, out, src, port, verbose) {
        Ok(ctx) => ctx,
        Err(code) => return code,
    };

    let reload = ReloadChannel::new();
    let serve_options = ServeOptions {
        host: ctx.config().serve.host.clone(),
        port: ctx.config().serve.port,
        root: ctx.out_dir(),
    };

    // A bind failure kills only the server; watching still works.
    let reload_for_watch = match serve::spawn(serve_options, reload.clone()) {
        Ok(_handle) => Some(reload),
        Err(e) => {
            eprintln!("Dev server disabled: {}", e);
            None
        }
    };

    let bindings = watch::default_bindings(&ctx);
    println!("Press Ctrl+C to stop");

    match watch::watch_and_rebuild(&ctx, &bindings, reload_for_watch.as_ref()) {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Watch error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
