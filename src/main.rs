//! Assetmill - command-line tool for building, watching and serving front-end assets

use std::process::ExitCode;

use assetmill::cli;

fn main() -> ExitCode {
    cli::run()
}
