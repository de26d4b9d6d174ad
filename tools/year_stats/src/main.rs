//! Per-year land-cover statistics and the cross-year comparison, computed
//! from a directory of classification GeoTIFFs.
//!
//! Years whose raster is missing or unreadable are reported and skipped.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use landcover_core::{aggregate, decode_geotiff, ClassStat, DashboardConfig, DirRasterSource, StatsHistory};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "year_stats", about = "Per-class area and coverage statistics for each configured year")]
struct Args {
    /// Directory containing one raster per year.
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Dashboard config JSON (years, file pattern, classes). Defaults apply if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only these years (comma separated), overriding the config.
    #[arg(short, long, value_delimiter = ',')]
    years: Vec<i32>,

    /// Emit JSON instead of text tables.
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct Report<'a> {
    years: Vec<YearReport<'a>>,
    comparison: landcover_core::YearComparison,
    failed: Vec<FailedYear>,
}

#[derive(Serialize)]
struct YearReport<'a> {
    year: i32,
    stats: &'a [ClassStat],
}

#[derive(Serialize)]
struct FailedYear {
    year: i32,
    error: String,
}

fn load_year(source: &DirRasterSource, year: i32) -> Result<Vec<ClassStat>> {
    let path = source.path_for(year);
    let bytes = fs::read(&path).with_context(|| format!("Cannot read {}", path.display()))?;
    let ds = decode_geotiff(&bytes).with_context(|| format!("Cannot decode {}", path.display()))?;
    info!(year, width = ds.width(), height = ds.height(), "decoded");
    Ok(aggregate(&ds))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => DashboardConfig::load(path).with_context(|| format!("Cannot load {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    let years = if args.years.is_empty() { config.years.clone() } else { args.years.clone() };
    let source = DirRasterSource::with_pattern(&args.data_dir, &config.file_pattern);

    let results: Vec<(i32, Result<Vec<ClassStat>>)> =
        years.par_iter().map(|&year| (year, load_year(&source, year))).collect();

    let mut history = StatsHistory::new();
    let mut failed = Vec::new();
    for (year, res) in results {
        match res {
            Ok(stats) => history.record(year, stats),
            Err(e) => {
                warn!(year, error = format!("{e:#}"), "skipping year");
                failed.push(FailedYear { year, error: format!("{e:#}") });
            }
        }
    }

    if args.json {
        let report = Report {
            years: history
                .years()
                .filter_map(|year| history.get(year).map(|stats| YearReport { year, stats }))
                .collect(),
            comparison: history.comparison(&config.classes),
            failed,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for year in history.years() {
        let Some(rows) = history.table_rows(year, &config.classes) else {
            continue;
        };
        println!("── {year} ──");
        println!("{:<20} {:>12} {:>10}", "Class", "Area (km²)", "Percent");
        for row in rows {
            println!("{:<20} {:>12.2} {:>9.2}%", row.label, row.area_km2, row.percent);
        }
        println!();
    }

    let cmp = history.comparison(&config.classes);
    if !cmp.rows.is_empty() {
        print!("{:<8}", "Year");
        for label in &cmp.classes {
            print!(" {label:>16}");
        }
        println!();
        for row in &cmp.rows {
            print!("{:<8}", row.year);
            for label in &cmp.classes {
                match row.values.get(label) {
                    Some(p) => print!(" {p:>15.2}%"),
                    None => print!(" {:>16}", "-"),
                }
            }
            println!();
        }
    }

    for f in &failed {
        eprintln!("{}: {}", f.year, f.error);
    }
    Ok(())
}
