//! `chromaflux backup` / `chromaflux restore`: byte copies of single assets.

use std::path::PathBuf;

use anyhow::Context;
use chromaflux_core::AssetBackup;
use chromaflux_core::backup;
use clap::Parser;

use crate::EXIT_ERROR;
use crate::EXIT_OK;

#[derive(Debug, Parser)]
pub struct BackupArgs {
    /// Asset to copy
    #[arg(value_name = "ASSET")]
    pub asset: PathBuf,

    /// Where to write the copy
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,
}

#[derive(Debug, Parser)]
pub struct RestoreArgs {
    /// Asset to overwrite
    #[arg(value_name = "ASSET")]
    pub asset: PathBuf,

    /// Copy previously written by `chromaflux backup`
    #[arg(long = "from", value_name = "FILE")]
    pub from: PathBuf,
}

pub fn run_backup(args: BackupArgs) -> i32 {
    let result = backup::backup(&args.asset)
        .and_then(|snapshot| {
            snapshot.save_to(&args.out)?;
            Ok(snapshot)
        })
        .with_context(|| format!("backing up {}", args.asset.display()));
    match result {
        Ok(snapshot) => {
            println!(
                "Saved {} bytes of {} to {}",
                snapshot.len(),
                args.asset.display(),
                args.out.display()
            );
            EXIT_OK
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_ERROR
        }
    }
}

pub fn run_restore(args: RestoreArgs) -> i32 {
    let result = AssetBackup::load_from(&args.asset, &args.from)
        .and_then(|snapshot| {
            backup::restore(&args.asset, &snapshot)?;
            Ok(snapshot)
        })
        .with_context(|| format!("restoring {}", args.asset.display()));
    match result {
        Ok(snapshot) => {
            println!(
                "Restored {} bytes to {}",
                snapshot.len(),
                args.asset.display()
            );
            EXIT_OK
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_ERROR
        }
    }
}
