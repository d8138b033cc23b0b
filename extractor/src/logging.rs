//! Tracing subscriber setup

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over the `--debug` flag.
pub fn env_filter(debug: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if debug { "debug" } else { "info" }))
}

/// Log to `log_file`, truncating it.
pub fn init(log_file: &Path, debug: bool) -> std::io::Result<()> {
    let file = File::create(log_file)?;

    fmt()
        .with_env_filter(env_filter(debug))
        .with_target(true)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}
