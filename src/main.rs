//! Podar CLI
//!
//! Command-line entry point for the podar library.
//!
//! # Usage
//!
//! ```bash
//! # Run a sparsify-then-quantize workflow
//! podar run workflow.yaml
//!
//! # Run with overrides
//! podar run workflow.yaml --steps 8 --output-dir ./artifacts
//!
//! # Validate a workflow file
//! podar validate workflow.yaml --detailed
//!
//! # Show workflow info
//! podar info workflow.yaml --format json
//! ```

use clap::Parser;
use podar::cli::{run_command, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
