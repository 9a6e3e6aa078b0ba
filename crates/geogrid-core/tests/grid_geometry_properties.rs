use std::sync::Arc;

use approx::assert_relative_eq;
use geogrid_core::{
    CoordinateReferenceSystem, Envelope, GridGeometry, GridGeometryAttribute, GridGeometryError,
    GridRange, MapperParams, PixelInCell, ROUNDING_FACTOR,
};
use geogrid_transform::{AffineMatrix, LinearTransform, MathTransform};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn affine(m: AffineMatrix) -> Arc<dyn MathTransform> {
    Arc::new(LinearTransform::from(m))
}

fn transform(t: &dyn MathTransform, p: [f64; 2]) -> [f64; 2] {
    let mut out = [0.0; 2];
    t.transform_point(&p, &mut out).unwrap();
    out
}

fn sample_geometries() -> Vec<GridGeometry> {
    let wgs84 = Arc::new(CoordinateReferenceSystem::wgs84());
    let range = GridRange::new(vec![-3, 7], vec![96, 56]).unwrap();
    let mut out = Vec::new();
    for m in [
        AffineMatrix::new(0.25, 0.0, 0.0, -0.25, -180.0, 90.0),
        AffineMatrix::new(0.3, 0.05, -0.02, 0.4, 12.5, -7.25),
        AffineMatrix::rotation(0.3),
    ] {
        for anchor in [PixelInCell::CellCenter, PixelInCell::CellCorner] {
            out.push(
                GridGeometry::new(
                    Some(range.clone()),
                    anchor,
                    Some(affine(m)),
                    Some(Arc::clone(&wgs84)),
                )
                .unwrap(),
            );
        }
    }
    out
}

#[test]
fn envelope_matches_transformed_grid_range() {
    init_logging();
    for gg in sample_geometries() {
        let range = gg.grid_range().unwrap();
        let center = gg.grid_to_crs().unwrap();
        let mut lower = [f64::INFINITY; 2];
        let mut upper = [f64::NEG_INFINITY; 2];
        for x in [range.low(0) as f64 - 0.5, range.high(0) as f64 + 0.5] {
            for y in [range.low(1) as f64 - 0.5, range.high(1) as f64 + 0.5] {
                let p = transform(center.as_ref(), [x, y]);
                for i in 0..2 {
                    lower[i] = lower[i].min(p[i]);
                    upper[i] = upper[i].max(p[i]);
                }
            }
        }
        let env = gg.envelope().unwrap();
        for i in 0..2 {
            let tol = 16.0 * f64::EPSILON * ROUNDING_FACTOR * lower[i].abs().max(upper[i].abs()).max(1.0);
            assert_relative_eq!(env.minimum(i), lower[i], epsilon = tol);
            assert_relative_eq!(env.maximum(i), upper[i], epsilon = tol);
        }
    }
}

#[test]
fn corner_and_center_differ_by_half_a_cell() {
    for gg in sample_geometries() {
        let center = gg.grid_to_crs_anchor(PixelInCell::CellCenter).unwrap();
        let corner = gg.grid_to_crs_anchor(PixelInCell::CellCorner).unwrap();
        for p in [[0.0, 0.0], [10.0, -4.0], [-2.5, 33.0]] {
            let a = transform(corner.as_ref(), p);
            let b = transform(center.as_ref(), [p[0] - 0.5, p[1] - 0.5]);
            assert_relative_eq!(a[0], b[0], epsilon = 1e-9);
            assert_relative_eq!(a[1], b[1], epsilon = 1e-9);
        }
    }
}

#[test]
fn is_defined_agrees_with_accessors() {
    let wgs84 = Arc::new(CoordinateReferenceSystem::wgs84());
    let t = affine(AffineMatrix::scale(2.0, 2.0));
    let range = GridRange::from_shape(&[8, 8]).unwrap();
    let mut geometries = Vec::new();
    for with_range in [false, true] {
        for with_transform in [false, true] {
            for with_crs in [false, true] {
                geometries.push(
                    GridGeometry::new(
                        with_range.then(|| range.clone()),
                        PixelInCell::CellCenter,
                        with_transform.then(|| Arc::clone(&t)),
                        with_crs.then(|| Arc::clone(&wgs84)),
                    )
                    .unwrap(),
                );
            }
        }
    }

    for gg in &geometries {
        for mask in 0..16u32 {
            let expected = GridGeometryAttribute::ALL
                .iter()
                .filter(|a| mask & a.bit() != 0)
                .all(|a| match a {
                    GridGeometryAttribute::Crs => gg.coordinate_reference_system().is_ok(),
                    GridGeometryAttribute::Envelope => gg.envelope().is_ok(),
                    GridGeometryAttribute::GridRange => gg.grid_range().is_ok(),
                    GridGeometryAttribute::GridToCrs => gg.grid_to_crs().is_ok(),
                });
            assert_eq!(gg.is_defined(mask).unwrap(), expected, "mask {mask:#x} on {gg}");
        }
        assert!(gg.is_defined(32).is_err());
    }
}

#[test]
fn half_millimetre_grid_scenario() {
    let range = GridRange::new(vec![0, 0], vec![511, 511]).unwrap();
    let t = affine(AffineMatrix::new(0.1, 0.0, 0.0, 0.1, 10.0, 20.0));
    let gg = GridGeometry::new(Some(range), PixelInCell::CellCorner, Some(t), None).unwrap();

    let env = gg.envelope().unwrap();
    assert_eq!(env.lower_corner(), &[10.0, 20.0]);
    assert_eq!(env.upper_corner(), &[61.2, 71.2]);
    assert!(gg.is_defined(GridGeometry::ENVELOPE).unwrap());
    assert!(!gg.is_defined(GridGeometry::CRS).unwrap());
    assert_eq!(
        gg.coordinate_reference_system().unwrap_err(),
        GridGeometryError::Undefined {
            attribute: GridGeometryAttribute::Crs,
            cause: geogrid_core::UndefinedCause::NoCrs,
        }
    );
    let res = gg.resolution().unwrap();
    assert_relative_eq!(res[0], 0.1);
    assert_relative_eq!(res[1], 0.1);
}

#[test]
fn heuristic_constructor_round_trips_through_inverse_constructor() {
    init_logging();
    let crs = Arc::new(CoordinateReferenceSystem::wgs84());
    let range = GridRange::from_shape(&[720, 360]).unwrap();
    let env = Envelope::new(vec![-180.0, -90.0], vec![180.0, 90.0], Some(crs)).unwrap();
    let gg = GridGeometry::from_envelope(range.clone(), env.clone()).unwrap();
    assert_eq!(gg.envelope().unwrap(), env);

    let t = gg.grid_to_crs().unwrap();
    let first = transform(t.as_ref(), [0.0, 0.0]);
    assert_relative_eq!(first[0], -179.75);
    assert_relative_eq!(first[1], 89.75);

    let back = GridGeometry::from_transform_and_envelope(PixelInCell::CellCenter, Some(t), Some(env))
        .unwrap();
    assert_eq!(back.grid_range().unwrap(), range);
    assert_eq!(back, gg);

    let unflipped = GridGeometry::from_envelope_with(
        range,
        gg.envelope().unwrap(),
        MapperParams {
            reverse_axis: Some(vec![false, false]),
            swap_xy: None,
        },
    )
    .unwrap();
    let p = transform(unflipped.grid_to_crs().unwrap().as_ref(), [0.0, 0.0]);
    assert_relative_eq!(p[1], -89.75);
}
