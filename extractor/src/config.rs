//! Extractor configuration, read from a TOML file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::Args;
use crate::error::{ExtractorError, Result};

pub const DEFAULT_LOG_FILE: &str = "blockchain_to_storage.log";
pub const DEFAULT_DB_URL: &str = "sqlite:namecoin.db";
pub const STDIN_INPUT: &str = "-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub logging: LoggingConfig,
    pub db: DbConfig,
    /// Absent when blocks come from a snapshot directory.
    pub stream: Option<StreamConfig>,
    #[serde(skip)]
    pub dry_run: bool,
    #[serde(skip)]
    pub snapshot_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub log_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// `-` for stdin, otherwise a file or FIFO.
    #[serde(default)]
    pub input: String,
}

/// File layout; every section is optional here so that a missing one can be
/// reported by name.
#[derive(Debug, Deserialize)]
struct RawConfig {
    logging: Option<LoggingConfig>,
    db: Option<DbConfig>,
    stream: Option<StreamConfig>,
}

impl Config {
    /// Load the file named on the command line and apply CLI overrides.
    pub fn from_args(args: &Args) -> Result<Self> {
        let mut config = Self::load(&args.config, args.load_snapshots.is_none())?;
        config.apply_cli_overrides(args);
        Ok(config)
    }

    pub fn load(path: &Path, require_stream: bool) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ExtractorError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&content, require_stream)
    }

    pub fn parse(content: &str, require_stream: bool) -> Result<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| ExtractorError::Config(format!("Failed to parse config: {}", e)))?;

        let mut logging = raw.logging.ok_or_else(|| missing("logging"))?;
        let mut db = raw.db.ok_or_else(|| missing("db"))?;
        let mut stream = raw.stream;
        if require_stream && stream.is_none() {
            return Err(missing("stream"));
        }

        if logging.log_file.trim().is_empty() {
            logging.log_file = DEFAULT_LOG_FILE.to_string();
        }
        if db.url.trim().is_empty() {
            db.url = DEFAULT_DB_URL.to_string();
        }
        if let Some(stream) = stream.as_mut() {
            if stream.input.trim().is_empty() {
                stream.input = STDIN_INPUT.to_string();
            }
        }

        Ok(Self {
            logging,
            db,
            stream,
            dry_run: false,
            snapshot_dir: None,
        })
    }

    pub fn apply_cli_overrides(&mut self, args: &Args) {
        self.dry_run = args.dry_run;
        if let Some(dir) = &args.load_snapshots {
            self.snapshot_dir = Some(dir.clone());
        }
    }

    pub fn stream_input(&self) -> &str {
        self.stream
            .as_ref()
            .map(|s| s.input.as_str())
            .unwrap_or(STDIN_INPUT)
    }
}

fn missing(section: &str) -> ExtractorError {
    ExtractorError::Config(format!("Missing [{}] section", section))
}
