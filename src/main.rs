//! CLI binary for taskminder.
//!
//! This binary is a thin wrapper that parses arguments and delegates to the library.

use clap::Parser;
use std::io;
use std::process::ExitCode;

use taskminder::cli::{run, Cli};
use taskminder::config::AppConfig;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_filter = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .ok()
    .and_then(|c| c.log_filter);
    taskminder::logging::init(log_filter.as_deref());

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            return ExitCode::from(1);
        }
    };

    let mut stdout = io::stdout();
    let output = runtime.block_on(run(cli, &mut stdout));

    for msg in output.stdout {
        println!("{msg}");
    }
    for msg in output.stderr {
        eprintln!("{msg}");
    }

    output.exit_code
}
