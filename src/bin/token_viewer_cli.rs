//!
//! token-viewer CLI binary
//! -----------------------
//! Prints the raw table, the token list and the chart spec for one selection
//! without starting a server.

use std::env;
use std::io::{self, Write};

use anyhow::Result;

use token_viewer::cli::{self, CliOptions};
use token_viewer::config::{has_flag, ViewerConfig};
use token_viewer::viewer::ViewerState;

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays clean for the page output.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .try_init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("token-viewer-cli");
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        eprintln!("{}", cli::usage(program));
        return Ok(());
    }

    let config = ViewerConfig::from_env_and_args(&args);
    let opts = CliOptions::from_args(&args);
    let state = ViewerState::new(config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    cli::run(&state, &opts, &mut out)?;
    out.flush()?;
    Ok(())
}
