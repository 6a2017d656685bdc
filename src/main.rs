//! # Systole Entry Point
//!
//! Binary entry point for the build pipeline.
//!
//! ## Application Flow
//!
//! ```text
//! main()
//!   │
//!   ├─> Initialize logging (stdout + rolling files)
//!   │
//!   ├─> Parse CLI arguments (clap)
//!   │
//!   ├─> If a subcommand was provided:
//!   │   └─> Execute it on a Tokio runtime
//!   │
//!   └─> Otherwise:
//!       └─> Run the full pipeline with the default config
//! ```
//!
//! ```bash
//! systole                  # full pipeline run with systole.json
//! systole run --force      # re-run every stage
//! systole status           # show what the next run would do
//! ```

#![warn(clippy::all, rust_2018_idioms)]
#![expect(clippy::print_stdout)]

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    systole::logging::init()?;

    let args = cli::Cli::parse();
    let command = args.command.unwrap_or_else(cli::default_command);

    tokio::runtime::Runtime::new()?.block_on(cli::run_command(command))?;
    Ok(())
}
