//!
//! token-viewer server binary
//! --------------------------
//! Starts the HTTP viewer. Configuration comes from CLI flags and
//! environment variables, flags taking precedence.

use std::env;

use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use token_viewer::config::{has_flag, ViewerConfig, DEFAULT_HTTP_PORT, ENV_HTTP_PORT, ENV_STORE_PATH, ENV_TABLE_NAME};

fn print_usage() {
    println!(
        "token-viewer\n\nUSAGE:\n  token-viewer [--db PATH] [--table NAME] [--http-port N]\n\nOPTIONS:\n  --db PATH        DuckDB store file (env: {ENV_STORE_PATH}, default Token_data.duckdb)\n  --table NAME     Table to display (env: {ENV_TABLE_NAME}, default token_status)\n  --http-port N    HTTP port (env: {ENV_HTTP_PORT}, default {DEFAULT_HTTP_PORT})\n"
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage();
        return Ok(());
    }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let config = ViewerConfig::from_env_and_args(&args);
    info!(target: "token_viewer", "RUST_LOG='{}'", rust_log);
    token_viewer::server::run(config).await
}
