//! Dashboard configuration: which years exist, where their rasters live and
//! how overlays are placed on the map.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::legend::ClassTable;
use crate::overlay::{FitOptions, OverlayOptions};
use crate::source::{DEFAULT_FILE_PATTERN, YEAR_PLACEHOLDER};

/// Top-level configuration. Every field has a default, so a partial JSON
/// file (or none at all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Years with a classification raster, in display order.
    pub years: Vec<i32>,
    /// Per-year file name; `{year}` is substituted.
    pub file_pattern: String,
    /// Overlay opacity in [0, 1].
    pub overlay_opacity: f32,
    /// Padding in pixels applied when fitting the viewport to an overlay.
    pub fit_padding_px: [u32; 2],
    /// Maximum zoom used when fitting the viewport.
    pub fit_max_zoom: u8,
    pub classes: ClassTable,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            years: vec![2007, 2012, 2017, 2022, 2025],
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            overlay_opacity: 0.8,
            fit_padding_px: [20, 20],
            fit_max_zoom: 16,
            classes: ClassTable::default(),
        }
    }
}

impl DashboardConfig {
    /// Read and validate a JSON config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.years.is_empty() {
            return Err(ConfigError::Invalid("no years configured".into()));
        }
        if !(0.0..=1.0).contains(&self.overlay_opacity) {
            return Err(ConfigError::Invalid(format!(
                "overlay_opacity {} outside [0, 1]",
                self.overlay_opacity
            )));
        }
        if !self.file_pattern.contains(YEAR_PLACEHOLDER) {
            return Err(ConfigError::Invalid(format!(
                "file_pattern {:?} has no {YEAR_PLACEHOLDER} placeholder",
                self.file_pattern
            )));
        }
        Ok(())
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            padding_px: self.fit_padding_px,
            max_zoom: self.fit_max_zoom,
        }
    }
}

impl From<&DashboardConfig> for OverlayOptions {
    fn from(cfg: &DashboardConfig) -> Self {
        Self {
            opacity: cfg.overlay_opacity,
            fit: cfg.fit_options(),
        }
    }
}
