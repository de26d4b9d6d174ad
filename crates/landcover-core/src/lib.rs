//! Land-cover classification rasters: decoding, per-class statistics,
//! colorized overlays and the lifecycle of the overlay shown on a map.
//!
//! Pipeline for one selected year:
//!
//! ```text
//! RasterSource::fetch → decode_geotiff → aggregate ─────────────┐
//!                                      → render_overlay          ├→ OverlayManager publishes
//!                                      → raster_bounds ─────────┘
//! ```
pub mod config;
pub mod error;
pub mod geo;
pub mod history;
pub mod legend;
pub mod overlay;
pub mod raster;
pub mod render;
pub mod source;
pub mod stats;

pub use config::DashboardConfig;
pub use error::{ConfigError, DecodeError, FetchError, LoadError, RenderError};
pub use geo::{raster_bounds, GeoBounds, LatLng};
pub use history::{StatsHistory, YearComparison};
pub use legend::{ClassInfo, ClassTable, ColorLut, LegendEntry, Rgb};
pub use overlay::{
    FitOptions, LoadOutcome, LoadState, MapDisplay, OverlayManager, OverlayOptions, StatsSink, YearOverlay,
};
pub use raster::{decode_geotiff, ClassId, RasterDataset, NO_DATA};
pub use render::{encode_png, render_overlay};
pub use source::{DirRasterSource, MemoryRasterSource, RasterSource};
pub use stats::{aggregate, class_histogram, ClassStat};
