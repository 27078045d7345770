//! ChromaFlux command-line front end.
//!
//! Each subcommand lives in its own `*_cmd` module and returns a process
//! exit code:
//!
//! - 0: success
//! - 1: partial failure (some documents or group members failed)
//! - 2: hard failure (bad input, conversion failure, configuration error)

use std::path::Path;
use std::path::PathBuf;

use chromaflux_core::ChromaConfig;
use clap::Parser;
use clap::Subcommand;

pub mod backup_cmd;
pub mod recolor_cmd;
pub mod scan_cmd;

pub const EXIT_OK: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Bulk recoloring of particle color-over-life values in Unreal assets
#[derive(Debug, Parser)]
#[command(name = "chromaflux", version, about)]
pub struct Cli {
    /// Config file (default: $CHROMAFLUX_CONFIG, then ~/.config/chromaflux/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load assets and list their color groups
    Scan(scan_cmd::ScanArgs),

    /// Recolor one group and write the assets back
    Recolor(recolor_cmd::RecolorArgs),

    /// Save a byte copy of an asset
    Backup(backup_cmd::BackupArgs),

    /// Overwrite an asset with a saved byte copy
    Restore(backup_cmd::RestoreArgs),
}

impl Cli {
    pub async fn run(self) -> i32 {
        match self.command {
            Command::Scan(args) => match load_config(self.config.as_deref()) {
                Ok(config) => scan_cmd::run_scan(args, config).await,
                Err(code) => code,
            },
            Command::Recolor(args) => match load_config(self.config.as_deref()) {
                Ok(config) => recolor_cmd::run_recolor(args, config).await,
                Err(code) => code,
            },
            Command::Backup(args) => backup_cmd::run_backup(args),
            Command::Restore(args) => backup_cmd::run_restore(args),
        }
    }
}

/// Explicit `--config` path, else the default resolution.
fn load_config(path: Option<&Path>) -> Result<ChromaConfig, i32> {
    let loaded = match path {
        Some(path) => ChromaConfig::load_from_path(path),
        None => ChromaConfig::load(),
    };
    loaded.map_err(|err| {
        eprintln!("error: {err}");
        EXIT_ERROR
    })
}
