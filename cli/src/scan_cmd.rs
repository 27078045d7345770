//! `chromaflux scan`: load assets and list their color groups.

use std::path::PathBuf;

use chromaflux_core::ChromaConfig;
use chromaflux_core::ColorGroup;
use chromaflux_core::ColorVector;
use chromaflux_core::color::DEFAULT_HUE_TOLERANCE;
use chromaflux_core::LoadReport;
use chromaflux_core::Progress;
use chromaflux_core::Session;
use clap::Parser;
use serde_json::Value;
use serde_json::json;

use crate::EXIT_ERROR;
use crate::EXIT_OK;

#[derive(Debug, Parser)]
pub struct ScanArgs {
    /// Asset files or directories to search for `.uasset` files
    #[arg(required = true, value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Only list groups whose hue is close to this color (#RRGGBB, RRGGBB or r,g,b)
    #[arg(long, value_name = "COLOR")]
    pub similar_to: Option<ColorVector>,

    /// Hue distance allowed by --similar-to, as a fraction of the color wheel
    #[arg(long, value_name = "T", default_value_t = DEFAULT_HUE_TOLERANCE, requires = "similar_to")]
    pub tolerance: f64,

    /// Output as JSON for automation
    #[arg(long)]
    pub json: bool,
}

impl ScanArgs {
    /// Groups to list, with their index in the unfiltered list so that
    /// `recolor --group` still finds them.
    fn listed<'a>(&self, groups: &'a [ColorGroup]) -> Vec<(usize, &'a ColorGroup)> {
        groups
            .iter()
            .enumerate()
            .filter(|(_, group)| {
                self.similar_to
                    .is_none_or(|target| group.color().is_similar(&target, self.tolerance))
            })
            .collect()
    }
}

pub async fn run_scan(args: ScanArgs, config: ChromaConfig) -> i32 {
    let mut session = Session::from_config(config);
    let report = match session.load(&args.paths, log_progress).await {
        Ok(report) => report,
        Err(err) => {
            eprintln!("error: {err}");
            return EXIT_ERROR;
        }
    };

    let groups = session.regroup();
    let listed = args.listed(&groups);
    if args.json {
        let output = json!({
            "loaded": report.loaded.len(),
            "excluded": paths_json(&report.excluded),
            "entries": report.entries,
            "groups": listed
                .iter()
                .map(|(index, group)| group_json(*index, group))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output).unwrap_or_default());
    } else {
        print_load_summary(&report);
        for (index, group) in &listed {
            print_group(*index, group);
        }
    }

    if let Err(err) = session.close() {
        tracing::warn!(error = %err, "could not clean up intermediate JSON");
    }
    EXIT_OK
}

pub(crate) fn log_progress(progress: Progress) {
    tracing::info!(
        index = progress.index,
        total = progress.total,
        asset = %progress.asset.display(),
        "asset loaded"
    );
}

pub(crate) fn print_load_summary(report: &LoadReport) {
    println!(
        "Loaded {} assets ({} excluded), {} color entries ({} MIN, {} MAX)",
        report.loaded.len(),
        report.excluded_count(),
        report.entries,
        report.min_entries,
        report.max_entries
    );
    for path in &report.excluded {
        println!("  excluded: {}", path.display());
    }
}

fn flags(group: &ColorGroup) -> &'static str {
    match (group.affects_min(), group.affects_max()) {
        (true, true) => "MIN+MAX",
        (true, false) => "MIN",
        (false, true) => "MAX",
        (false, false) => "-",
    }
}

pub(crate) fn print_group(index: usize, group: &ColorGroup) {
    let color = group.color();
    println!(
        "[{index:>3}] {} {} x{} {} {}",
        color.to_hex(),
        color,
        group.count(),
        flags(group),
        color.family().as_str()
    );
    for asset in group.assets() {
        println!("        {}", asset.display());
    }
}

pub(crate) fn group_json(index: usize, group: &ColorGroup) -> Value {
    let color = group.color();
    json!({
        "index": index,
        "key": group.key().to_string(),
        "hex": color.to_hex(),
        "rgb": color.channels(),
        "family": color.family(),
        "count": group.count(),
        "affects_min": group.affects_min(),
        "affects_max": group.affects_max(),
        "assets": group
            .assets()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>(),
    })
}

pub(crate) fn paths_json(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}
