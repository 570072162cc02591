// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # nn2plan
//!
//! Compiles a trained network into a serialized inference engine.
//!
//! ## Usage
//! ```bash
//! # Caffe deploy description + weights, batch 4, one output
//! nn2plan compile caffe net.prototxt net.caffemodel 4 prob
//!
//! # Custom workspace and calibration settings
//! nn2plan -c build.toml compile caffe net.prototxt net.caffemodel 16 prob fc7
//! ```
//!
//! The engine is written to `<weights>.<max-batch>.tensorcache` in the
//! current directory.
//!
//! Exit codes: 0 on success, 1 on a usage error, 2 when compilation fails.

mod commands;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

const EXIT_USAGE: u8 = 1;
const EXIT_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "nn2plan",
    about = "Compiles trained networks into serialized inference engines",
    version,
    author
)]
struct Cli {
    /// Path to a TOML file with build settings.
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a model and write the engine next to its weights.
    Compile {
        #[command(subcommand)]
        source: Source,
    },
}

#[derive(Subcommand, Debug)]
enum Source {
    /// A Caffe deploy description and its trained weights.
    Caffe(commands::compile::CaffeArgs),

    /// A UFF graph (not implemented).
    Uff,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return usage_exit(&e),
    };

    commands::init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Compile { source } => match source {
            Source::Caffe(args) => commands::compile::execute_caffe(cli.config.as_deref(), cli.verbose, &args),
            Source::Uff => commands::compile::execute_uff(cli.verbose),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// Prints clap's message to standard output and picks the exit code.
fn usage_exit(err: &clap::Error) -> ExitCode {
    print!("{}", err.render());
    ExitCode::from(usage_code(err.kind()))
}

fn usage_code(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => EXIT_USAGE,
    }
}
