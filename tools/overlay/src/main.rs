//! Render one year's classification raster as a transparent PNG overlay
//! with a JSON sidecar holding its map bounds and legend.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use landcover_core::{
    decode_geotiff, encode_png, raster_bounds, render_overlay, DashboardConfig, DirRasterSource, GeoBounds,
    LegendEntry,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "overlay", about = "Colorize a year's land-cover raster into a PNG map overlay")]
struct Args {
    /// Year to render.
    #[arg(short, long)]
    year: i32,

    /// Directory containing one raster per year.
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Dashboard config JSON. Defaults apply if omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output directory for `overlay_{year}.png` and `overlay_{year}.json`.
    #[arg(short, long, default_value = "data/overlays")]
    output: PathBuf,
}

#[derive(Serialize)]
struct Sidecar {
    year: i32,
    width: u32,
    height: u32,
    bounds: GeoBounds,
    opacity: f32,
    legend: Vec<LegendEntry>,
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

    let source = DirRasterSource::with_pattern(&args.data_dir, &config.file_pattern);
    let path = source.path_for(args.year);
    let bytes = fs::read(&path).with_context(|| format!("Cannot read {}", path.display()))?;
    let ds = decode_geotiff(&bytes).with_context(|| format!("Cannot decode {}", path.display()))?;

    let img = render_overlay(&ds, &config.classes.color_lut())?;
    let bounds = raster_bounds(ds.origin(), ds.resolution(), ds.width(), ds.height());

    fs::create_dir_all(&args.output)?;
    let png_path = args.output.join(format!("overlay_{}.png", args.year));
    fs::write(&png_path, encode_png(&img)?).with_context(|| format!("Write failed: {}", png_path.display()))?;

    let sidecar = Sidecar {
        year: args.year,
        width: img.width(),
        height: img.height(),
        bounds,
        opacity: config.overlay_opacity,
        legend: config.classes.legend_entries(args.year),
    };
    let json_path = args.output.join(format!("overlay_{}.json", args.year));
    fs::write(&json_path, serde_json::to_string_pretty(&sidecar)?)
        .with_context(|| format!("Write failed: {}", json_path.display()))?;

    info!(year = args.year, png = %png_path.display(), json = %json_path.display(), "overlay written");
    Ok(())
}
