//! Classified raster → RGBA overlay image.
//!
//! Pixel order is the raster's row-major order, so the image lines up with
//! the bounds from [`crate::geo::raster_bounds`] without any transform.
use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::error::RenderError;
use crate::legend::ColorLut;
use crate::raster::RasterDataset;

/// Colorize every pixel through `lut`. Class 0 is fully transparent, all
/// other classes fully opaque.
pub fn render_overlay(ds: &RasterDataset, lut: &ColorLut) -> Result<RgbaImage, RenderError> {
    let too_large = || RenderError::SurfaceTooLarge { width: ds.width(), height: ds.height() };
    let width = u32::try_from(ds.width()).map_err(|_| too_large())?;
    let height = u32::try_from(ds.height()).map_err(|_| too_large())?;
    let n_bytes = ds.pixel_count().checked_mul(4).ok_or_else(too_large)?;

    let mut buf = vec![0u8; n_bytes];

    #[cfg(feature = "threading")]
    buf.par_chunks_exact_mut(4)
        .zip(ds.values().par_iter())
        .for_each(|(px, &v)| px.copy_from_slice(&lut.rgba(v)));

    #[cfg(not(feature = "threading"))]
    for (px, &v) in buf.chunks_exact_mut(4).zip(ds.values()) {
        px.copy_from_slice(&lut.rgba(v));
    }

    RgbaImage::from_raw(width, height, buf).ok_or(RenderError::BufferMismatch { width, height })
}

/// Encode an overlay as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, RenderError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}
