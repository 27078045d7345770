//! `chromaflux recolor`: recolor one color group (or one MIN/MAX side of it)
//! and commit the result.

use std::path::PathBuf;

use anyhow::Context;
use anyhow::bail;
use chromaflux_core::ChromaConfig;
use chromaflux_core::ColorGroup;
use chromaflux_core::ColorVector;
use chromaflux_core::CommitReport;
use chromaflux_core::ModeSelection;
use chromaflux_core::Session;
use chromaflux_core::SyncPolicy;
use chromaflux_core::mutation::GroupRecolor;
use clap::Parser;
use clap::ValueEnum;
use serde_json::Value;
use serde_json::json;

use crate::EXIT_ERROR;
use crate::EXIT_OK;
use crate::EXIT_PARTIAL;
use crate::scan_cmd::group_json;
use crate::scan_cmd::log_progress;
use crate::scan_cmd::print_group;
use crate::scan_cmd::print_load_summary;

/// Which vectors of the group's members to recolor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Every member
    All,
    /// MIN and START vectors only
    Min,
    /// MAX vectors only
    Max,
}

impl From<ModeArg> for ModeSelection {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::All => ModeSelection::All,
            ModeArg::Min => ModeSelection::Min,
            ModeArg::Max => ModeSelection::Max,
        }
    }
}

#[derive(Debug, Parser)]
pub struct RecolorArgs {
    /// Asset files or directories to search for `.uasset` files
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Group to recolor, by its position in `scan` output
    #[arg(long, value_name = "N", conflicts_with = "from", required_unless_present = "from")]
    pub group: Option<usize>,

    /// Group to recolor, by its current color (#RRGGBB, RRGGBB or r,g,b)
    #[arg(long, value_name = "COLOR")]
    pub from: Option<ColorVector>,

    /// New color (#RRGGBB, RRGGBB or r,g,b)
    #[arg(long, value_name = "COLOR")]
    pub to: ColorVector,

    /// Restrict the recolor to one side of the MIN/MAX split
    #[arg(long, value_enum, default_value_t = ModeArg::All)]
    pub mode: ModeArg,

    /// Also recolor the opposite MIN/MAX vector of each module
    #[arg(long, conflicts_with = "no_sync")]
    pub sync: bool,

    /// Never recolor the opposite MIN/MAX vector
    #[arg(long)]
    pub no_sync: bool,

    /// Apply the edit in memory only; nothing is written back
    #[arg(long)]
    pub dry_run: bool,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

impl RecolorArgs {
    fn sync_policy(&self, session: &Session) -> SyncPolicy {
        if self.sync {
            SyncPolicy::Enabled
        } else if self.no_sync {
            SyncPolicy::Disabled
        } else {
            session.default_sync()
        }
    }
}

pub async fn run_recolor(args: RecolorArgs, config: ChromaConfig) -> i32 {
    let mut session = Session::from_config(config);
    match execute(&args, &mut session).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            if let Err(err) = session.discard() {
                tracing::warn!(error = %err, "could not clean up intermediate JSON");
            }
            EXIT_ERROR
        }
    }
}

async fn execute(args: &RecolorArgs, session: &mut Session) -> anyhow::Result<i32> {
    let report = session
        .load(&args.paths, log_progress)
        .await
        .context("loading assets")?;
    if !args.json {
        print_load_summary(&report);
    }

    let mut groups = session.regroup();
    let index = select_group(args, &groups)?;
    let group = &mut groups[index];
    let original = group.color();
    let sync = args.sync_policy(session);

    let recolor = session.recolor_group_side(group, args.mode.into(), args.to, sync)?;
    for failure in recolor.failures() {
        if let Err(err) = &failure.result {
            tracing::warn!(entry = %failure.entry, error = %err, "member not recolored");
        }
    }

    if args.dry_run {
        emit(args, index, original, group, &recolor, None);
        session.discard().context("cleaning up intermediate JSON")?;
        return Ok(if recolor.is_complete() { EXIT_OK } else { EXIT_PARTIAL });
    }

    let commit = session.commit().await;
    emit(args, index, original, group, &recolor, Some(&commit));
    let success = commit.is_success() && recolor.is_complete();

    session.close().context("cleaning up intermediate JSON")?;

    Ok(if success { EXIT_OK } else { EXIT_PARTIAL })
}

fn select_group(args: &RecolorArgs, groups: &[ColorGroup]) -> anyhow::Result<usize> {
    if let Some(index) = args.group {
        if index >= groups.len() {
            bail!("group {index} does not exist ({} groups found)", groups.len());
        }
        return Ok(index);
    }
    if let Some(from) = args.from {
        return groups
            .iter()
            .position(|g| from.quantize(g.key().decimals()) == g.key())
            .with_context(|| format!("no group has color {} {from}", from.to_hex()));
    }
    bail!("either --group or --from is required")
}

fn emit(
    args: &RecolorArgs,
    index: usize,
    original: ColorVector,
    group: &ColorGroup,
    recolor: &GroupRecolor,
    commit: Option<&CommitReport>,
) {
    if args.json {
        let failed_members: Vec<Value> = recolor
            .failures()
            .map(|o| {
                json!({
                    "entry": o.entry.index(),
                    "error": o.result.as_ref().err().map(ToString::to_string),
                })
            })
            .collect();
        let documents: Vec<Value> = commit
            .map(|report| report.documents.iter().map(document_json).collect())
            .unwrap_or_default();
        let output = json!({
            "group": index,
            "from": original.to_hex(),
            "to": args.to.to_hex(),
            "mode": args.mode.to_possible_value().map(|v| v.get_name().to_string()),
            "dry_run": args.dry_run,
            "members": recolor.outcomes.len(),
            "touched": recolor.touched().len(),
            "failed_members": failed_members,
            "result": group_json(index, group),
            "documents": documents,
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
        return;
    }

    println!(
        "Recolored group {index} {} -> {}: {} entries changed, {} failed",
        original.to_hex(),
        args.to.to_hex(),
        recolor.touched().len(),
        recolor.failures().count()
    );
    print_group(index, group);
    match commit {
        None => println!("Dry run: nothing written"),
        Some(report) => {
            for doc in &report.documents {
                match &doc.result {
                    Ok(()) => println!("  committed  {}", doc.asset_path.display()),
                    Err(err) => println!("  FAILED     {}: {err}", doc.asset_path.display()),
                }
            }
            println!(
                "{} committed, {} failed",
                report.committed().count(),
                report.failed().count()
            );
        }
    }
}

fn document_json(doc: &chromaflux_core::commit::DocumentReport) -> Value {
    json!({
        "asset": doc.asset_path.display().to_string(),
        "json": doc.json_path.display().to_string(),
        "status": if doc.is_committed() { "committed" } else { "failed" },
        "error": doc.result.as_ref().err().map(ToString::to_string),
    })
}
