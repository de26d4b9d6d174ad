//! Where per-year rasters come from.
//!
//! A [`RasterSource`] resolves a year to the raw bytes of its GeoTIFF. The
//! fetch is the pipeline's first suspension point, so it is async even for
//! local files.
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::FetchError;

/// Placeholder substituted by the year in file patterns.
pub const YEAR_PLACEHOLDER: &str = "{year}";

/// Default per-year file name, e.g. `lc_2017.tif`.
pub const DEFAULT_FILE_PATTERN: &str = "lc_{year}.tif";

/// Expand a file pattern for `year`.
pub fn year_file_name(pattern: &str, year: i32) -> String {
    pattern.replace(YEAR_PLACEHOLDER, &year.to_string())
}

/// Resolves a year to raster bytes.
#[allow(async_fn_in_trait)]
pub trait RasterSource {
    async fn fetch(&self, year: i32) -> Result<Vec<u8>, FetchError>;

    /// Human-readable location of `year`'s raster, for logs and errors.
    fn describe(&self, year: i32) -> String;
}

impl<S: RasterSource + ?Sized> RasterSource for &S {
    async fn fetch(&self, year: i32) -> Result<Vec<u8>, FetchError> {
        (**self).fetch(year).await
    }

    fn describe(&self, year: i32) -> String {
        (**self).describe(year)
    }
}

// ── Directory source ──────────────────────────────────────────────────────────

/// Rasters stored as files under one directory, named by a year pattern.
#[derive(Debug, Clone)]
pub struct DirRasterSource {
    root: PathBuf,
    pattern: String,
}

impl DirRasterSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self::with_pattern(root, DEFAULT_FILE_PATTERN)
    }

    pub fn with_pattern<P: AsRef<Path>>(root: P, pattern: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            pattern: pattern.to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, year: i32) -> PathBuf {
        self.root.join(year_file_name(&self.pattern, year))
    }
}

impl RasterSource for DirRasterSource {
    async fn fetch(&self, year: i32) -> Result<Vec<u8>, FetchError> {
        let path = self.path_for(year);
        match std::fs::read(&path) {
            Ok(bytes) => {
                debug!(year, path = %path.display(), bytes = bytes.len(), "read raster file");
                Ok(bytes)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound {
                year,
                location: path.display().to_string(),
            }),
            Err(source) => Err(FetchError::Io { path, source }),
        }
    }

    fn describe(&self, year: i32) -> String {
        self.path_for(year).display().to_string()
    }
}

// ── In-memory source ──────────────────────────────────────────────────────────

/// Rasters preloaded into memory, keyed by year.
#[derive(Debug, Clone, Default)]
pub struct MemoryRasterSource {
    rasters: HashMap<i32, Vec<u8>>,
}

impl MemoryRasterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, year: i32, bytes: Vec<u8>) {
        self.rasters.insert(year, bytes);
    }

    pub fn with(mut self, year: i32, bytes: Vec<u8>) -> Self {
        self.insert(year, bytes);
        self
    }

    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.rasters.keys().copied().collect();
        years.sort_unstable();
        years
    }
}

impl RasterSource for MemoryRasterSource {
    async fn fetch(&self, year: i32) -> Result<Vec<u8>, FetchError> {
        self.rasters.get(&year).cloned().ok_or_else(|| FetchError::NotFound {
            year,
            location: self.describe(year),
        })
    }

    fn describe(&self, year: i32) -> String {
        format!("memory:{year}")
    }
}
