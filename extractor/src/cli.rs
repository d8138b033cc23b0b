use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Default)]
#[command(name = "nmc-extractor")]
#[command(about = "Decomposes Namecoin block messages into relational storage", long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "extractor.toml")]
    pub config: PathBuf,

    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    pub debug: bool,

    /// Print statements instead of executing them
    #[arg(long)]
    pub dry_run: bool,

    /// Read block snapshots from this directory instead of the stream
    #[arg(long, value_name = "DIR")]
    pub load_snapshots: Option<PathBuf>,
}

pub fn parse_args() -> Args {
    Args::parse()
}
