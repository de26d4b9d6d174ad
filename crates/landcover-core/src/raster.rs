//! Raster decoding: GeoTIFF bytes → [`RasterDataset`].
//!
//! Only single-band classification rasters are accepted. Georeferencing comes
//! from the GeoTIFF `ModelPixelScale` + `ModelTiepoint` pair, or from a
//! `ModelTransformation` matrix when the pair is absent.
use std::io::Cursor;

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::error::DecodeError;

/// A land-cover class encoded as a pixel value. 0 means no data.
pub type ClassId = u16;

/// The reserved "no data / unclassified" class.
pub const NO_DATA: ClassId = 0;

/// A decoded single-band classification raster. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDataset {
    width: usize,
    height: usize,
    origin: (f64, f64),
    resolution: (f64, f64),
    /// True when the source declared a negative vertical resolution
    /// (rows stored top-to-bottom) and it was normalized to a magnitude.
    y_flipped: bool,
    values: Vec<ClassId>,
}

impl RasterDataset {
    /// Build a dataset from raw parts.
    ///
    /// `origin` is the top-left corner `(x, y)`. `resolution` may carry the
    /// usual negative vertical component; both components are stored as
    /// magnitudes.
    pub fn new(
        width: usize,
        height: usize,
        origin: (f64, f64),
        resolution: (f64, f64),
        values: Vec<ClassId>,
    ) -> Result<Self, DecodeError> {
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }
        let expected = width
            .checked_mul(height)
            .ok_or(DecodeError::InvalidDimensions { width, height })?;
        if values.len() != expected {
            return Err(DecodeError::LengthMismatch { expected, actual: values.len() });
        }
        let (res_x, res_y) = resolution;
        if !res_x.is_finite() || !res_y.is_finite() || !origin.0.is_finite() || !origin.1.is_finite() {
            return Err(DecodeError::MalformedGeoreference {
                tag: "resolution/origin",
                reason: "non-finite value".into(),
            });
        }

        Ok(Self {
            width,
            height,
            origin,
            resolution: (res_x.abs(), res_y.abs()),
            y_flipped: res_y < 0.0,
            values,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Top-left corner `(x, y)` in the raster's native coordinates.
    pub fn origin(&self) -> (f64, f64) {
        self.origin
    }

    /// Pixel size `(rx, ry)`, both non-negative.
    pub fn resolution(&self) -> (f64, f64) {
        self.resolution
    }

    pub fn y_flipped(&self) -> bool {
        self.y_flipped
    }

    /// Row-major class values, `width * height` long.
    pub fn values(&self) -> &[ClassId] {
        &self.values
    }

    pub fn pixel_count(&self) -> usize {
        self.values.len()
    }

    /// Class at `(row, col)`, `None` outside the grid.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<ClassId> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.values.get(row * self.width + col).copied()
    }

    /// Area of one pixel in the resolution's squared unit.
    pub fn pixel_area(&self) -> f64 {
        (self.resolution.0 * self.resolution.1).abs()
    }
}

// ── GeoTIFF decoding ──────────────────────────────────────────────────────────

/// Decode a GeoTIFF into a [`RasterDataset`].
pub fn decode_geotiff(bytes: &[u8]) -> Result<RasterDataset, DecodeError> {
    let mut decoder = Decoder::new(Cursor::new(bytes))?;

    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    match decoder.colortype()? {
        ColorType::Gray(_) => {}
        other => return Err(DecodeError::UnsupportedBands(format!("{other:?}"))),
    }

    let (origin, resolution) = read_georeference(&mut decoder)?;
    let nodata = read_nodata(&mut decoder)?;

    let values = match decoder.read_image()? {
        DecodingResult::U8(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::U16(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::U32(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::U64(v) => to_class_ids(&v, nodata, |x| x as f64)?,
        DecodingResult::I8(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::I16(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::I32(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::I64(v) => to_class_ids(&v, nodata, |x| x as f64)?,
        DecodingResult::F32(v) => to_class_ids(&v, nodata, f64::from)?,
        DecodingResult::F64(v) => to_class_ids(&v, nodata, |x| x)?,
        #[allow(unreachable_patterns)]
        _ => return Err(DecodeError::UnsupportedBands("unknown sample format".into())),
    };

    debug!(width, height, res_x = resolution.0, res_y = resolution.1, "decoded raster");
    RasterDataset::new(width, height, origin, resolution, values)
}

/// Returns `(origin, resolution)` with the vertical resolution in the
/// "negative means top-to-bottom" convention.
fn read_georeference<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<((f64, f64), (f64, f64)), DecodeError> {
    let scale = read_f64_tag(decoder, Tag::ModelPixelScaleTag)?;
    let tiepoint = read_f64_tag(decoder, Tag::ModelTiepointTag)?;

    if let (Some(scale), Some(tie)) = (scale, tiepoint) {
        if scale.len() < 2 {
            return Err(DecodeError::MalformedGeoreference {
                tag: "ModelPixelScale",
                reason: format!("expected at least 2 values, got {}", scale.len()),
            });
        }
        if tie.len() < 6 {
            return Err(DecodeError::MalformedGeoreference {
                tag: "ModelTiepoint",
                reason: format!("expected at least 6 values, got {}", tie.len()),
            });
        }
        // Tiepoint (i, j, k, x, y, z) maps raster (i, j) to world (x, y).
        let (sx, sy) = (scale[0], scale[1]);
        let origin_x = tie[3] - tie[0] * sx;
        let origin_y = tie[4] + tie[1] * sy;
        return Ok(((origin_x, origin_y), (sx, -sy)));
    }

    if let Some(m) = read_f64_tag(decoder, Tag::ModelTransformationTag)? {
        if m.len() < 8 {
            return Err(DecodeError::MalformedGeoreference {
                tag: "ModelTransformation",
                reason: format!("expected 16 values, got {}", m.len()),
            });
        }
        if m[1] != 0.0 || m[4] != 0.0 {
            return Err(DecodeError::MalformedGeoreference {
                tag: "ModelTransformation",
                reason: "rotated rasters are not supported".into(),
            });
        }
        return Ok(((m[3], m[7]), (m[0], m[5])));
    }

    Err(DecodeError::MissingGeoreference("no ModelPixelScale/ModelTiepoint or ModelTransformation"))
}

fn read_f64_tag<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
    tag: Tag,
) -> Result<Option<Vec<f64>>, DecodeError> {
    match decoder.find_tag(tag)? {
        Some(value) => Ok(Some(value.into_f64_vec()?)),
        None => Ok(None),
    }
}

/// GDAL stores the nodata value as an ASCII string.
fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Option<f64>, DecodeError> {
    let Some(value) = decoder.find_tag(Tag::GdalNodata)? else {
        return Ok(None);
    };
    let text = value.into_string()?;
    let trimmed = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    trimmed.parse::<f64>().map(Some).map_err(|e| DecodeError::MalformedGeoreference {
        tag: "GdalNodata",
        reason: format!("{trimmed:?}: {e}"),
    })
}

/// Convert raw samples to class ids. Samples equal to `nodata` become
/// [`NO_DATA`]; non-integral or out-of-range samples are rejected.
fn to_class_ids<T: Copy>(
    samples: &[T],
    nodata: Option<f64>,
    widen: impl Fn(T) -> f64,
) -> Result<Vec<ClassId>, DecodeError> {
    let mut out = Vec::with_capacity(samples.len());
    for &s in samples {
        let v = widen(s);
        if nodata.is_some_and(|nd| nd == v || (nd.is_nan() && v.is_nan())) {
            out.push(NO_DATA);
            continue;
        }
        if !v.is_finite() || v.fract() != 0.0 || v < 0.0 || v > f64::from(ClassId::MAX) {
            return Err(DecodeError::InvalidClassValue(v));
        }
        out.push(v as ClassId);
    }
    Ok(out)
}
