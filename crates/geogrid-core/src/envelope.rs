//! CRS-tagged bounding boxes.

use std::fmt;
use std::sync::Arc;

use geogrid_transform::MathTransform;
use serde::{Deserialize, Serialize};

use crate::crs::CoordinateReferenceSystem;
use crate::error::GridGeometryError;
use crate::grid_range::GridRange;
use crate::pixel::{pixel_translation, PixelInCell};

/// Scale at which envelope ordinates are snapped: multiples of 1/360 degree.
pub const ROUNDING_FACTOR: f64 = 360.0;
/// Maximum distance, in ULPs of the scaled ordinate, that is snapped.
pub const ROUNDING_MAX_ULPS: u32 = 16;

/// An N-dimensional box in real coordinates.
///
/// A "null" envelope has NaN ordinates: the CRS is known but the extent is
/// not.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crs: Option<Arc<CoordinateReferenceSystem>>,
}

#[derive(Deserialize)]
struct RawEnvelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
    #[serde(default)]
    crs: Option<Arc<CoordinateReferenceSystem>>,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = GridGeometryError;

    fn try_from(raw: RawEnvelope) -> Result<Self, Self::Error> {
        Envelope::new(raw.lower, raw.upper, raw.crs)
    }
}

impl Envelope {
    pub fn new(
        lower: Vec<f64>,
        upper: Vec<f64>,
        crs: Option<Arc<CoordinateReferenceSystem>>,
    ) -> Result<Self, GridGeometryError> {
        if upper.len() != lower.len() {
            return Err(GridGeometryError::dimension_mismatch(
                "upper",
                upper.len(),
                lower.len(),
            ));
        }
        if let Some(crs) = &crs {
            if crs.dimension() != lower.len() {
                return Err(GridGeometryError::dimension_mismatch(
                    "crs",
                    crs.dimension(),
                    lower.len(),
                ));
            }
        }
        Ok(Self { lower, upper, crs })
    }

    /// An envelope with unknown extent in the given CRS.
    pub fn null(crs: Arc<CoordinateReferenceSystem>) -> Self {
        let dim = crs.dimension();
        Self {
            lower: vec![f64::NAN; dim],
            upper: vec![f64::NAN; dim],
            crs: Some(crs),
        }
    }

    /// Envelope covering every cell of `grid`, through a transform anchored
    /// at `anchor`.
    ///
    /// Cells are taken at their full extent, so a cell-center transform is
    /// evaluated half a cell outside the index range on each side. The result
    /// is snapped with [`Envelope::round_if_almost_integer`].
    pub fn from_grid(
        grid: &GridRange,
        anchor: PixelInCell,
        transform: &dyn MathTransform,
        crs: Option<Arc<CoordinateReferenceSystem>>,
    ) -> Result<Self, GridGeometryError> {
        if grid.dimension() != transform.source_dimensions() {
            return Err(GridGeometryError::dimension_mismatch(
                "grid_range",
                grid.dimension(),
                transform.source_dimensions(),
            ));
        }
        let offset = pixel_translation(anchor) + 0.5;
        let lower = grid.lows().iter().map(|&l| l as f64 - offset).collect();
        let upper = grid
            .highs()
            .iter()
            .map(|&h| h as f64 + 1.0 - offset)
            .collect();
        let grid_box = Envelope {
            lower,
            upper,
            crs: None,
        };
        let mut envelope = grid_box.transform(transform)?;
        if let Some(crs) = crs {
            envelope = envelope.with_crs(crs)?;
        }
        envelope.round_if_almost_integer(ROUNDING_FACTOR, ROUNDING_MAX_ULPS);
        Ok(envelope)
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn minimum(&self, dim: usize) -> f64 {
        self.lower[dim]
    }

    pub fn maximum(&self, dim: usize) -> f64 {
        self.upper[dim]
    }

    pub fn median(&self, dim: usize) -> f64 {
        0.5 * (self.lower[dim] + self.upper[dim])
    }

    pub fn span(&self, dim: usize) -> f64 {
        self.upper[dim] - self.lower[dim]
    }

    pub fn lower_corner(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper_corner(&self) -> &[f64] {
        &self.upper
    }

    pub fn crs(&self) -> Option<&Arc<CoordinateReferenceSystem>> {
        self.crs.as_ref()
    }

    /// `true` when every ordinate is NaN.
    pub fn is_null(&self) -> bool {
        self.lower.iter().chain(&self.upper).all(|v| v.is_nan())
    }

    /// Copy of this envelope tagged with another CRS.
    pub fn with_crs(&self, crs: Arc<CoordinateReferenceSystem>) -> Result<Self, GridGeometryError> {
        Self::new(self.lower.clone(), self.upper.clone(), Some(crs))
    }

    /// Snap ordinates that lie within `max_ulps` of a multiple of
    /// `1 / factor`. Ordinates farther away are left untouched.
    pub fn round_if_almost_integer(&mut self, factor: f64, max_ulps: u32) {
        let mut snapped = 0usize;
        for v in self.lower.iter_mut().chain(self.upper.iter_mut()) {
            let scaled = *v * factor;
            let target = scaled.round_ties_even();
            if scaled != target && (scaled - target).abs() <= f64::from(max_ulps) * ulp(scaled) {
                *v = target / factor;
                snapped += 1;
            }
        }
        if snapped > 0 {
            log::debug!("snapped {snapped} envelope ordinates to multiples of 1/{factor}");
        }
    }

    /// Bounding box of this envelope after `transform`.
    ///
    /// Linear transforms map the box corners. Other transforms are sampled
    /// at the minimum, median and maximum of every axis. The result has no
    /// CRS.
    pub fn transform(&self, transform: &dyn MathTransform) -> Result<Envelope, GridGeometryError> {
        let sd = transform.source_dimensions();
        if self.dimension() != sd {
            return Err(GridGeometryError::dimension_mismatch(
                "envelope",
                self.dimension(),
                sd,
            ));
        }
        let td = transform.target_dimensions();
        let steps: usize = if transform.matrix().is_some() { 2 } else { 3 };
        let mut lower = vec![f64::INFINITY; td];
        let mut upper = vec![f64::NEG_INFINITY; td];
        let mut src = vec![0.0; sd];
        let mut dst = vec![0.0; td];
        let count = u32::try_from(sd)
            .ok()
            .and_then(|e| steps.checked_pow(e))
            .ok_or_else(|| GridGeometryError::IllegalArgument {
                name: "envelope",
                value: format!("too many dimensions ({sd}) to sample"),
            })?;
        for n in 0..count {
            let mut k = n;
            for (i, s) in src.iter_mut().enumerate() {
                *s = match (k % steps, steps) {
                    (0, _) => self.lower[i],
                    (1, 3) => self.median(i),
                    _ => self.upper[i],
                };
                k /= steps;
            }
            transform.transform_point(&src, &mut dst)?;
            for (j, &v) in dst.iter().enumerate() {
                lower[j] = lower[j].min(v);
                upper[j] = upper[j].max(v);
            }
        }
        Ok(Envelope {
            lower,
            upper,
            crs: None,
        })
    }
}

/// Distance to the next representable value away from zero.
fn ulp(v: f64) -> f64 {
    let a = v.abs();
    if !a.is_finite() {
        return f64::NAN;
    }
    f64::from_bits(a.to_bits() + 1) - a
}

fn same_ordinates(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x == y || (x.is_nan() && y.is_nan()))
}

/// NaN ordinates compare equal so that two null envelopes in the same CRS
/// are equal.
impl PartialEq for Envelope {
    fn eq(&self, other: &Self) -> bool {
        same_ordinates(&self.lower, &other.lower)
            && same_ordinates(&self.upper, &other.upper)
            && self.crs == other.crs
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Envelope[")?;
        for i in 0..self.dimension() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} : {}", self.lower[i], self.upper[i])?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geogrid_transform::{LinearTransform, PowerTransform1D};

    #[test]
    fn snapping_only_touches_near_multiples() {
        let near = 61.2 + 2.0 * f64::EPSILON * 61.2;
        let mut env = Envelope::new(vec![10.0000000000001, 0.1], vec![near, 0.3], None).unwrap();
        env.round_if_almost_integer(ROUNDING_FACTOR, ROUNDING_MAX_ULPS);
        assert_eq!(env.maximum(0), 61.2);
        assert_eq!(env.minimum(0), 10.0000000000001);
        assert_eq!(env.minimum(1), 0.1);
    }

    #[test]
    fn null_envelopes_compare_equal() {
        let crs = Arc::new(CoordinateReferenceSystem::wgs84());
        let a = Envelope::null(Arc::clone(&crs));
        assert!(a.is_null());
        assert_eq!(a, Envelope::null(crs));
        assert_ne!(a, Envelope::null(Arc::new(CoordinateReferenceSystem::image())));
    }

    #[test]
    fn crs_dimension_is_checked() {
        let crs = Arc::new(CoordinateReferenceSystem::wgs84());
        assert_eq!(
            Envelope::new(vec![0.0], vec![1.0], Some(crs)),
            Err(GridGeometryError::DimensionMismatch {
                argument: "crs",
                actual: 2,
                expected: 1
            })
        );
    }

    #[test]
    fn grid_cells_cover_full_extent() {
        let grid = GridRange::from_shape(&[10, 20]).unwrap();
        let t = LinearTransform::scale_translate(&[2.0, -1.0], &[100.0, 50.0]).unwrap();
        let env = Envelope::from_grid(&grid, PixelInCell::CellCenter, &t, None).unwrap();
        assert_eq!(env.lower_corner(), &[99.0, 30.5]);
        assert_eq!(env.upper_corner(), &[119.0, 50.5]);

        let env = Envelope::from_grid(&grid, PixelInCell::CellCorner, &t, None).unwrap();
        assert_eq!(env.lower_corner(), &[100.0, 30.0]);
        assert_eq!(env.upper_corner(), &[120.0, 50.0]);
    }

    #[test]
    fn deserialization_validates() {
        let ok: Envelope =
            serde_json::from_str(r#"{"lower":[0,0],"upper":[1,2],"crs":{"name":"WGS 84","axes":["east","north"]}}"#)
                .unwrap();
        assert_eq!(ok.span(1), 2.0);
        assert!(ok.crs().is_some());
        assert!(serde_json::from_str::<Envelope>(r#"{"lower":[0,0],"upper":[1]}"#).is_err());
        assert!(serde_json::from_str::<Envelope>(
            r#"{"lower":[0],"upper":[1],"crs":{"name":"WGS 84","axes":["east","north"]}}"#
        )
        .is_err());
    }

    #[test]
    fn too_many_dimensions_to_sample() {
        let n = 64;
        let t = LinearTransform::scale_translate(&vec![1.0; n], &vec![0.0; n]).unwrap();
        let env = Envelope::new(vec![0.0; n], vec![1.0; n], None).unwrap();
        assert!(matches!(
            env.transform(&t),
            Err(GridGeometryError::IllegalArgument { name: "envelope", .. })
        ));
    }

    #[test]
    fn extreme_grid_indices_do_not_overflow() {
        let grid = GridRange::new(vec![i64::MAX - 9], vec![i64::MAX]).unwrap();
        let t = LinearTransform::scale_translate(&[1.0], &[0.0]).unwrap();
        let env = Envelope::from_grid(&grid, PixelInCell::CellCorner, &t, None).unwrap();
        assert!(env.maximum(0).is_finite());
        assert!(env.maximum(0) >= env.minimum(0));
    }

    #[test]
    fn non_linear_transform_is_sampled() {
        let env = Envelope::new(vec![-2.0], vec![1.0], None).unwrap();
        let square = PowerTransform1D::create(2.0);
        let out = env.transform(&square).unwrap();
        // The median -0.5 is sampled, the minimum at 0 is not.
        assert_relative_eq!(out.minimum(0), 0.25);
        assert_relative_eq!(out.maximum(0), 4.0);
    }
}
