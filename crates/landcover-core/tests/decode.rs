mod common;

use approx::assert_relative_eq;
use common::*;
use landcover_core::{aggregate, decode_geotiff, raster_bounds, DecodeError};

#[test]
fn decodes_scene_and_georeference() {
    let bytes = geotiff_u8(4, 4, GeoRef::new((500_000.0, 9_900_000.0), (10.0, 10.0)), &SCENE_4X4);
    let ds = decode_geotiff(&bytes).unwrap();

    assert_eq!((ds.width(), ds.height()), (4, 4));
    assert_eq!(ds.origin(), (500_000.0, 9_900_000.0));
    assert_eq!(ds.resolution(), (10.0, 10.0));
    assert!(ds.y_flipped(), "north-up GeoTIFF stores rows top-to-bottom");
    assert_eq!(ds.values(), &SCENE_4X4.map(u16::from)[..]);
}

#[test]
fn scene_statistics_end_to_end() {
    let bytes = geotiff_u8(4, 4, GeoRef::new((0.0, 0.0), (10.0, 10.0)), &SCENE_4X4);
    let stats = aggregate(&decode_geotiff(&bytes).unwrap());

    assert_eq!(stats.iter().map(|s| s.class_id).collect::<Vec<_>>(), vec![1, 2, 3]);
    for s in &stats {
        assert_eq!(s.pixel_count, 3);
        assert_relative_eq!(s.area_km2, 0.0003, epsilon = 1e-12);
        assert_eq!(s.percent, 18.75);
    }
}

#[test]
fn bounds_extend_south_and_east_of_origin() {
    let bytes = geotiff_u8(4, 2, GeoRef::new((39.5, -1.0), (0.25, 0.5)), &[1; 8]);
    let ds = decode_geotiff(&bytes).unwrap();
    let b = raster_bounds(ds.origin(), ds.resolution(), ds.width(), ds.height());
    assert_relative_eq!(b.north_east.lat, -1.0);
    assert_relative_eq!(b.south_west.lat, -2.0);
    assert_relative_eq!(b.south_west.lng, 39.5);
    assert_relative_eq!(b.north_east.lng, 40.5);
}

#[test]
fn sixteen_bit_and_float_classes() {
    let geo = GeoRef::new((0.0, 0.0), (30.0, 30.0));
    let ds = decode_geotiff(&geotiff_u16(2, 2, geo, &[0, 300, 300, 7])).unwrap();
    assert_eq!(ds.values(), &[0, 300, 300, 7]);

    let ds = decode_geotiff(&geotiff_f32(2, 1, geo, &[2.0, 0.0])).unwrap();
    assert_eq!(ds.values(), &[2, 0]);

    let err = decode_geotiff(&geotiff_f32(2, 1, geo, &[2.5, 0.0])).unwrap_err();
    assert!(matches!(err, DecodeError::InvalidClassValue(_)));
}

#[test]
fn gdal_nodata_maps_to_class_zero() {
    let geo = GeoRef::new((0.0, 0.0), (1.0, 1.0));
    let bytes = geotiff_u8_with_nodata(3, 1, geo, &[255, 1, 2], Some("255"));
    let ds = decode_geotiff(&bytes).unwrap();
    assert_eq!(ds.values(), &[0, 1, 2]);
}

#[test]
fn transformation_matrix_is_accepted() {
    let bytes = geotiff_u8_transform(2, 2, GeoRef::new((10.0, 20.0), (2.0, 3.0)), &[1, 2, 3, 4]);
    let ds = decode_geotiff(&bytes).unwrap();
    assert_eq!(ds.origin(), (10.0, 20.0));
    assert_eq!(ds.resolution(), (2.0, 3.0));
    assert!(ds.y_flipped());
}

#[test]
fn multi_band_is_rejected() {
    let bytes = geotiff_rgb8(2, 2, GeoRef::new((0.0, 0.0), (1.0, 1.0)));
    assert!(matches!(decode_geotiff(&bytes), Err(DecodeError::UnsupportedBands(_))));
}

#[test]
fn missing_georeference_is_rejected() {
    let bytes = plain_tiff_u8(2, 2, &[1, 1, 1, 1]);
    assert!(matches!(decode_geotiff(&bytes), Err(DecodeError::MissingGeoreference(_))));
}
