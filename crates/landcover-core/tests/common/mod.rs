//! In-memory GeoTIFF fixtures for integration tests.
#![allow(dead_code)]

use std::io::Cursor;

use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

/// Georeferencing written into fixtures: top-left `origin` and positive
/// `pixel_scale`, as GeoTIFF's ModelPixelScale expects.
#[derive(Debug, Clone, Copy)]
pub struct GeoRef {
    pub origin: (f64, f64),
    pub pixel_scale: (f64, f64),
}

impl GeoRef {
    pub fn new(origin: (f64, f64), pixel_scale: (f64, f64)) -> Self {
        Self { origin, pixel_scale }
    }
}


/// Single-band 8-bit GeoTIFF.
pub fn geotiff_u8(width: u32, height: u32, geo: GeoRef, values: &[u8]) -> Vec<u8> {
    geotiff_u8_with_nodata(width, height, geo, values, None)
}

pub fn geotiff_u8_with_nodata(width: u32, height: u32, geo: GeoRef, values: &[u8], nodata: Option<&str>) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<colortype::Gray8>(width, height).unwrap();
        write_georef(image.encoder(), geo);
        if let Some(nd) = nodata {
            image.encoder().write_tag(Tag::GdalNodata, nd).unwrap();
        }
        image.write_data(values).unwrap();
    }
    buf.into_inner()
}

/// Single-band 16-bit GeoTIFF.
pub fn geotiff_u16(width: u32, height: u32, geo: GeoRef, values: &[u16]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<colortype::Gray16>(width, height).unwrap();
        write_georef(image.encoder(), geo);
        image.write_data(values).unwrap();
    }
    buf.into_inner()
}

/// Single-band float GeoTIFF.
pub fn geotiff_f32(width: u32, height: u32, geo: GeoRef, values: &[f32]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<colortype::Gray32Float>(width, height).unwrap();
        write_georef(image.encoder(), geo);
        image.write_data(values).unwrap();
    }
    buf.into_inner()
}

/// Three-band RGB GeoTIFF, which the decoder must reject.
pub fn geotiff_rgb8(width: u32, height: u32, geo: GeoRef) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<colortype::RGB8>(width, height).unwrap();
        write_georef(image.encoder(), geo);
        let data = vec![0u8; (width * height * 3) as usize];
        image.write_data(&data).unwrap();
    }
    buf.into_inner()
}

/// Plain TIFF without any georeferencing tags.
pub fn plain_tiff_u8(width: u32, height: u32, values: &[u8]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    TiffEncoder::new(&mut buf)
        .unwrap()
        .write_image::<colortype::Gray8>(width, height, values)
        .unwrap();
    buf.into_inner()
}

/// GeoTIFF georeferenced by a ModelTransformation matrix instead of the
/// scale/tiepoint pair.
pub fn geotiff_u8_transform(width: u32, height: u32, geo: GeoRef, values: &[u8]) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    {
        let mut enc = TiffEncoder::new(&mut buf).unwrap();
        let mut image = enc.new_image::<colortype::Gray8>(width, height).unwrap();
        let (sx, sy) = geo.pixel_scale;
        let (x, y) = geo.origin;
        let matrix = [
            sx, 0.0, 0.0, x, //
            0.0, -sy, 0.0, y, //
            0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        image.encoder().write_tag(Tag::ModelTransformationTag, &matrix[..]).unwrap();
        image.write_data(values).unwrap();
    }
    buf.into_inner()
}

fn write_georef<W: std::io::Write + std::io::Seek, K: tiff::encoder::TiffKind>(
    dir: &mut tiff::encoder::DirectoryEncoder<W, K>,
    geo: GeoRef,
) {
    let (sx, sy) = geo.pixel_scale;
    let (x, y) = geo.origin;
    dir.write_tag(Tag::ModelPixelScaleTag, &[sx, sy, 0.0][..]).unwrap();
    dir.write_tag(Tag::ModelTiepointTag, &[0.0, 0.0, 0.0, x, y, 0.0][..]).unwrap();
}

/// The 4×4 example scene: three classes of three pixels each, seven no-data.
pub const SCENE_4X4: [u8; 16] = [1, 1, 2, 0, 1, 3, 3, 0, 2, 2, 3, 0, 0, 0, 0, 0];

/// Route `tracing` output through the test harness; honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
