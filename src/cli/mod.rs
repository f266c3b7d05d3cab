//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to the build,
//! watch and dev command implementations.

mod build;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::tasks::Task;

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Assetmill - build, watch and serve front-end assets
#[derive(Parser)]
#[command(name = "mill")]
#[command(about = "Assetmill - compile styles, bundle scripts, compress images; watch and live-reload")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Single-task selectors for `mill build <task>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TaskArg {
    /// Compile top-level style sheets
    Css,
    /// Compile the style module subtree
    CssModules,
    /// Concatenate and minify the script bundle
    Js,
    /// Compress images
    Images,
}

impl TaskArg {
    /// The tasks a selector expands to.
    pub fn tasks(self) -> &'static [Task] {
        match self {
            TaskArg::Css => &[Task::Styles],
            TaskArg::CssModules => &[Task::StyleModules],
            TaskArg::Js => &[Task::Scripts],
            TaskArg::Images => &[Task::Images],
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run pipelines once and exit
    Build {
        /// Build a single task instead of everything
        #[arg(value_enum)]
        task: Option<TaskArg>,

        /// List would-be outputs without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Destination root (overrides assets.toml)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Styles source root (overrides assets.toml)
        #[arg(long)]
        src: Option<PathBuf>,

        /// Path to assets.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Build everything, then rebuild on change (no server)
    Watch {
        /// Destination root (overrides assets.toml)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Styles source root (overrides assets.toml)
        #[arg(long)]
        src: Option<PathBuf>,

        /// Path to assets.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Watch plus static server and live browser reload
    Dev {
        /// Port for the dev server (overrides assets.toml)
        #[arg(short, long)]
        port: Option<u16>,

        /// Destination root (overrides assets.toml)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Styles source root (overrides assets.toml)
        #[arg(long)]
        src: Option<PathBuf>,

        /// Path to assets.toml
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

/// Run the CLI application
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { task, dry_run, out, src, config, verbose } => {
            build::run_build(task, dry_run, out, src, config.as_deref(), verbose)
        }
        Commands::Watch { out, src, config, verbose } => {
            build::run_watch(out, src, config.as_deref(), verbose)
        }
        Commands::Dev { port, out, src, config, verbose } => {
            build::run_dev(port, out, src, config.as_deref(), verbose)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_build() {
        let cli = Cli::try_parse_from(["mill", "build"]).unwrap();
        assert!(matches!(cli.command, Commands::Build { task: None, .. }));
    }

    #[test]
    fn test_cli_parses_single_task_variants() {
        let cli = Cli::try_parse_from(["mill", "build", "css"]).unwrap();
        match cli.command {
            Commands::Build { task: Some(TaskArg::Css), .. } => {}
            _ => panic!("expected build css"),
        }

        let cli = Cli::try_parse_from(["mill", "build", "css-modules"]).unwrap();
        match cli.command {
            Commands::Build { task: Some(TaskArg::CssModules), .. } => {}
            _ => panic!("expected build css-modules"),
        }
    }

    #[test]
    fn test_cli_parses_dev_port() {
        let cli = Cli::try_parse_from(["mill", "dev", "--port", "8080"]).unwrap();
        match cli.command {
            Commands::Dev { port: Some(8080), .. } => {}
            _ => panic!("expected dev with port"),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_task() {
        assert!(Cli::try_parse_from(["mill", "build", "fonts"]).is_err());
    }

    #[test]
    fn test_task_arg_expansion() {
        assert_eq!(TaskArg::Css.tasks(), &[Task::Styles]);
        assert_eq!(TaskArg::Js.tasks(), &[Task::Scripts]);
    }
}
