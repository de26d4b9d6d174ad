//! Error kinds raised along the raster load pipeline.
//!
//! Each stage has its own enum so callers can tell a missing file from a
//! malformed one; [`LoadError`] is what the overlay manager catches.

use std::path::PathBuf;

use thiserror::Error;

/// The raster resource for a year could not be retrieved.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no raster for year {year} at {location}")]
    NotFound { year: i32, location: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failure reported by a host environment (e.g. a browser fetch).
    #[error("fetch for year {year} failed: {message}")]
    Remote { year: i32, message: String },
}

/// The fetched bytes are not a usable single-band classification raster.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("not a readable TIFF: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("unsupported band layout: {0}")]
    UnsupportedBands(String),

    #[error("raster is missing georeferencing ({0})")]
    MissingGeoreference(&'static str),

    #[error("malformed georeferencing tag {tag}: {reason}")]
    MalformedGeoreference { tag: &'static str, reason: String },

    #[error("invalid dimensions {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("expected {expected} pixel values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("pixel value {0} is not a class id")]
    InvalidClassValue(f64),
}

/// The colorized image could not be produced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("raster of {width}x{height} does not fit an image surface")]
    SurfaceTooLarge { width: usize, height: usize },

    #[error("pixel buffer does not match {width}x{height}")]
    BufferMismatch { width: u32, height: u32 },

    #[error("image encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    /// The map's drawing surface refused the overlay.
    #[error("map surface rejected the overlay: {0}")]
    Surface(String),
}

/// A configuration file or class table could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid color {0:?}, expected #rrggbb")]
    Color(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Any failure of a single year selection.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl LoadError {
    /// Short stage name used in log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            LoadError::Fetch(_) => "fetch",
            LoadError::Decode(_) => "decode",
            LoadError::Render(_) => "render",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_reports_stage() {
        let err: LoadError = FetchError::NotFound { year: 2007, location: "lc_2007.tif".into() }.into();
        assert_eq!(err.stage(), "fetch");
        assert_eq!(err.to_string(), "no raster for year 2007 at lc_2007.tif");

        let err: LoadError = DecodeError::UnsupportedBands("RGB(8)".into()).into();
        assert_eq!(err.stage(), "decode");
    }
}
