// Copyright 2025 STARGA Inc.
// Licensed under the Apache License, Version 2.0 (the “License”);
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at:
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an “AS IS” BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Part of the fwdiff project (forward-mode differentiation by tree rewriting).

//! fwdiff CLI: differentiate functions defined in a source file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fwdiff::autodiff::{rewrite, AutodiffError};
use fwdiff::diagnostics;
use fwdiff::parser;
use fwdiff::pipeline::{Program, ProgramError};

/// Forward-mode differentiation by tree rewriting.
#[derive(Parser, Debug)]
#[command(name = "fwdiff")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. warn, debug, fwdiff=trace)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate the derivative of a function at a point
    Eval {
        /// Input file path
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Function to differentiate
        #[arg(short, long)]
        func: String,

        /// Point to evaluate at, one value per argument
        #[arg(long, num_args = 1.., allow_negative_numbers = true, required = true)]
        at: Vec<f64>,

        /// Index of the argument to differentiate with respect to
        #[arg(short, long, default_value = "0")]
        select: usize,
    },

    /// Print the rewritten source of every function in a file
    Rewrite {
        /// Input file path
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Check a source file for parse errors
    Check {
        /// Input file path
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn parse_failure(src: &str, diags: &[diagnostics::Diagnostic]) -> anyhow::Error {
    anyhow::anyhow!("{}", diagnostics::render_all(src, diags))
}

fn run_eval(input: &Path, func: &str, at: &[f64], select: usize) -> Result<()> {
    let src = read_source(input)?;
    let program = match Program::load(&src) {
        Ok(program) => program,
        Err(ProgramError::Parse(diags)) => return Err(parse_failure(&src, &diags)),
        Err(err) => return Err(err).context("failed to load program"),
    };

    // Registered derivatives are reused; anything else is differentiated now.
    let value = match program.derivative(func) {
        Ok(d) => d.call(at, select),
        Err(ProgramError::NotRegistered(_)) => program.differentiate(func)?.call(at, select),
        Err(err) => return Err(err.into()),
    };
    let value = value.map_err(|err| match err {
        AutodiffError::SelectOutOfRange { .. } | AutodiffError::ArityMismatch { .. } => {
            anyhow::Error::new(err).context(format!("bad arguments for '{func}'"))
        }
        other => anyhow::Error::new(other).context(format!("failed to differentiate '{func}'")),
    })?;

    println!("{value}");
    Ok(())
}

fn run_rewrite(input: &Path) -> Result<()> {
    let src = read_source(input)?;
    let module = parser::parse_with_diagnostics(&src).map_err(|diags| parse_failure(&src, &diags))?;
    if module.functions().next().is_none() {
        bail!("{} defines no functions", input.display());
    }
    let rewritten = rewrite::differentiate_calls(&rewrite::detach(&module));
    print!("{rewritten}");
    Ok(())
}

fn run_check(input: &Path) -> Result<bool> {
    let src = read_source(input)?;
    match parser::parse_with_diagnostics(&src) {
        Ok(module) => {
            println!(
                "{}: ok ({} item(s), {} function(s))",
                input.display(),
                module.items.len(),
                module.functions().count()
            );
            Ok(true)
        }
        Err(diags) => {
            eprintln!("{}", diagnostics::render_all(&src, &diags));
            Ok(false)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let result = match cli.command {
        Commands::Eval {
            input,
            func,
            at,
            select,
        } => run_eval(&input, &func, &at, select).map(|()| true),
        Commands::Rewrite { input } => run_rewrite(&input).map(|()| true),
        Commands::Check { input } => run_check(&input),
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
