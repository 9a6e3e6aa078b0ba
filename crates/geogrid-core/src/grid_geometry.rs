//! The grid geometry aggregate: grid range, grid-to-CRS transform and the
//! envelope they imply.

use std::fmt;
use std::sync::{Arc, OnceLock};

use geogrid_transform::{same_transform, LinearTransform, MathTransform, TransformError};

use crate::crs::CoordinateReferenceSystem;
use crate::envelope::Envelope;
use crate::error::{GridGeometryAttribute, GridGeometryError, UndefinedCause};
use crate::grid_range::GridRange;
use crate::mapper::{GridToEnvelopeMapper, MapperParams};
use crate::pixel::{translate, translate_orientation, PixelInCell, PixelOrientation};

/// Describes how a grid of cells maps onto real-world coordinates.
///
/// Every part is optional. When both the grid range and the transform are
/// known the envelope is derived from them; a CRS alone yields a null
/// envelope carrying only that CRS. The transform is stored in its
/// cell-center form; the cell-corner form is derived on first use and
/// cached.
///
/// Instances are immutable and can be shared between threads.
#[derive(Clone, Debug)]
pub struct GridGeometry {
    grid_range: Option<GridRange>,
    envelope: Option<Envelope>,
    grid_to_crs: Option<Arc<dyn MathTransform>>,
    corner_to_crs: OnceLock<Result<Arc<dyn MathTransform>, TransformError>>,
    resolution: OnceLock<Option<Vec<f64>>>,
}

impl GridGeometry {
    /// Bit for [`is_defined`](Self::is_defined): the CRS is known.
    pub const CRS: u32 = GridGeometryAttribute::Crs.bit();
    /// Bit for [`is_defined`](Self::is_defined): the envelope has an extent.
    pub const ENVELOPE: u32 = GridGeometryAttribute::Envelope.bit();
    /// Bit for [`is_defined`](Self::is_defined): the grid range is known.
    pub const GRID_RANGE: u32 = GridGeometryAttribute::GridRange.bit();
    /// Bit for [`is_defined`](Self::is_defined): the transform is known.
    pub const GRID_TO_CRS: u32 = GridGeometryAttribute::GridToCrs.bit();

    const ALL_BITS: u32 = Self::CRS | Self::ENVELOPE | Self::GRID_RANGE | Self::GRID_TO_CRS;

    /// Build from a grid range and a transform anchored at `anchor`.
    ///
    /// The grid range must have as many dimensions as the transform source,
    /// and the CRS as many as its target.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(anchor = ?anchor)))]
    pub fn new(
        grid_range: Option<GridRange>,
        anchor: PixelInCell,
        grid_to_crs: Option<Arc<dyn MathTransform>>,
        crs: Option<Arc<CoordinateReferenceSystem>>,
    ) -> Result<Self, GridGeometryError> {
        if let Some(t) = &grid_to_crs {
            if let Some(range) = &grid_range {
                check_dimension("grid_range", range.dimension(), t.source_dimensions())?;
            }
            if let Some(crs) = &crs {
                check_dimension("crs", crs.dimension(), t.target_dimensions())?;
            }
        }

        let envelope = match (&grid_range, &grid_to_crs) {
            (Some(range), Some(t)) => Some(Envelope::from_grid(range, anchor, t.as_ref(), crs)?),
            _ => crs.map(Envelope::null),
        };
        Self::assemble(grid_range, envelope, grid_to_crs, anchor)
    }

    /// Build from a transform and the envelope it should cover; the grid
    /// range is recovered by mapping the envelope back through the inverse
    /// transform.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all, fields(anchor = ?anchor)))]
    pub fn from_transform_and_envelope(
        anchor: PixelInCell,
        grid_to_crs: Option<Arc<dyn MathTransform>>,
        envelope: Option<Envelope>,
    ) -> Result<Self, GridGeometryError> {
        let grid_range = match (&grid_to_crs, &envelope) {
            (Some(t), Some(env)) => {
                check_dimension("envelope", env.dimension(), t.target_dimensions())?;
                Some(grid_range_of(t.as_ref(), env, anchor)?)
            }
            _ => None,
        };
        Self::assemble(grid_range, envelope, grid_to_crs, anchor)
    }

    /// Build from a grid range and the envelope it covers, guessing the
    /// transform.
    ///
    /// This is a heuristic: axis order and direction are inferred from the
    /// envelope CRS by [`GridToEnvelopeMapper`]. Use
    /// [`from_envelope_with`](Self::from_envelope_with) to override it.
    pub fn from_envelope(grid_range: GridRange, envelope: Envelope) -> Result<Self, GridGeometryError> {
        Self::from_envelope_with(grid_range, envelope, MapperParams::default())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip_all))]
    pub fn from_envelope_with(
        grid_range: GridRange,
        envelope: Envelope,
        params: MapperParams,
    ) -> Result<Self, GridGeometryError> {
        let mapper = GridToEnvelopeMapper::new(grid_range, envelope)?.with_params(params);
        let transform: Arc<dyn MathTransform> = Arc::new(mapper.create_transform()?);
        Self::assemble(
            Some(mapper.grid_range().clone()),
            Some(mapper.envelope().clone()),
            Some(transform),
            PixelInCell::CellCenter,
        )
    }

    fn assemble(
        grid_range: Option<GridRange>,
        envelope: Option<Envelope>,
        grid_to_crs: Option<Arc<dyn MathTransform>>,
        anchor: PixelInCell,
    ) -> Result<Self, GridGeometryError> {
        let corner_to_crs = OnceLock::new();
        let grid_to_crs = match grid_to_crs {
            Some(t) => {
                if anchor == PixelInCell::CellCorner {
                    let _ = corner_to_crs.set(Ok(Arc::clone(&t)));
                }
                Some(translate(&t, anchor, PixelInCell::CellCenter)?)
            }
            None => None,
        };
        Ok(Self {
            grid_range,
            envelope,
            grid_to_crs,
            corner_to_crs,
            resolution: OnceLock::new(),
        })
    }

    /// A copy in another CRS. Grid range and transforms are shared; only the
    /// envelope tag changes.
    pub fn with_crs(&self, crs: Arc<CoordinateReferenceSystem>) -> Result<Self, GridGeometryError> {
        if let Some(t) = &self.grid_to_crs {
            check_dimension("crs", crs.dimension(), t.target_dimensions())?;
        }
        let envelope = match &self.envelope {
            Some(env) => env.with_crs(crs)?,
            None => Envelope::null(crs),
        };
        Ok(Self {
            envelope: Some(envelope),
            ..self.clone()
        })
    }

    /// Number of grid dimensions.
    pub fn dimension(&self) -> Result<usize, GridGeometryError> {
        match (&self.grid_to_crs, &self.grid_range) {
            (Some(t), _) => Ok(t.source_dimensions()),
            (None, Some(range)) => Ok(range.dimension()),
            (None, None) => Err(GridGeometryError::undefined(
                GridGeometryAttribute::GridRange,
                UndefinedCause::NoGridRange,
            )),
        }
    }

    pub fn coordinate_reference_system(
        &self,
    ) -> Result<Arc<CoordinateReferenceSystem>, GridGeometryError> {
        self.envelope
            .as_ref()
            .and_then(|e| e.crs())
            .cloned()
            .ok_or_else(|| {
                GridGeometryError::undefined(GridGeometryAttribute::Crs, UndefinedCause::NoCrs)
            })
    }

    /// The envelope covered by the grid. Fails when only a CRS is known.
    pub fn envelope(&self) -> Result<Envelope, GridGeometryError> {
        match &self.envelope {
            Some(env) if !env.is_null() => Ok(env.clone()),
            _ => {
                let cause = if self.grid_to_crs.is_none() {
                    UndefinedCause::NoTransform
                } else {
                    UndefinedCause::NoExtent
                };
                Err(GridGeometryError::undefined(
                    GridGeometryAttribute::Envelope,
                    cause,
                ))
            }
        }
    }

    pub fn grid_range(&self) -> Result<GridRange, GridGeometryError> {
        self.grid_range.clone().ok_or_else(|| {
            GridGeometryError::undefined(
                GridGeometryAttribute::GridRange,
                UndefinedCause::NoGridRange,
            )
        })
    }

    /// The cell-center grid-to-CRS transform.
    pub fn grid_to_crs(&self) -> Result<Arc<dyn MathTransform>, GridGeometryError> {
        self.grid_to_crs.clone().ok_or_else(no_transform)
    }

    /// The transform anchored at `anchor`. The cell-corner form is computed
    /// once.
    pub fn grid_to_crs_anchor(
        &self,
        anchor: PixelInCell,
    ) -> Result<Arc<dyn MathTransform>, GridGeometryError> {
        let center = self.grid_to_crs.as_ref().ok_or_else(no_transform)?;
        match anchor {
            PixelInCell::CellCenter => Ok(Arc::clone(center)),
            PixelInCell::CellCorner => self
                .corner_to_crs
                .get_or_init(|| translate(center, PixelInCell::CellCenter, PixelInCell::CellCorner))
                .clone()
                .map_err(GridGeometryError::from),
        }
    }

    /// The transform anchored at a two-dimensional cell orientation.
    ///
    /// Orientations other than the center and the upper-left corner are
    /// recomputed on each call.
    pub fn grid_to_crs_at(
        &self,
        orientation: PixelOrientation,
    ) -> Result<Arc<dyn MathTransform>, GridGeometryError> {
        match orientation {
            PixelOrientation::Center => self.grid_to_crs_anchor(PixelInCell::CellCenter),
            PixelOrientation::UpperLeft => self.grid_to_crs_anchor(PixelInCell::CellCorner),
            other => {
                let center = self.grid_to_crs.as_ref().ok_or_else(no_transform)?;
                Ok(translate_orientation(center, PixelOrientation::Center, other)?)
            }
        }
    }

    /// Size of a grid cell along each CRS axis, or `None` when the transform
    /// is missing or not linear.
    pub fn resolution(&self) -> Option<Vec<f64>> {
        self.resolution
            .get_or_init(|| {
                let t = self.grid_to_crs.as_ref()?;
                LinearTransform::from_transform(t.as_ref()).map(|l| l.row_magnitudes())
            })
            .clone()
    }

    /// `true` when every attribute named in `bitmask` is available.
    ///
    /// `bitmask` is an OR of [`CRS`](Self::CRS), [`ENVELOPE`](Self::ENVELOPE),
    /// [`GRID_RANGE`](Self::GRID_RANGE) and [`GRID_TO_CRS`](Self::GRID_TO_CRS).
    pub fn is_defined(&self, bitmask: u32) -> Result<bool, GridGeometryError> {
        if bitmask & !Self::ALL_BITS != 0 {
            return Err(GridGeometryError::IllegalArgument {
                name: "bitmask",
                value: format!("{bitmask:#x}"),
            });
        }
        Ok(GridGeometryAttribute::ALL
            .iter()
            .filter(|a| bitmask & a.bit() != 0)
            .all(|&a| self.has(a)))
    }

    fn has(&self, attribute: GridGeometryAttribute) -> bool {
        match attribute {
            GridGeometryAttribute::Crs => self.envelope.as_ref().is_some_and(|e| e.crs().is_some()),
            GridGeometryAttribute::Envelope => {
                self.envelope.as_ref().is_some_and(|e| !e.is_null())
            }
            GridGeometryAttribute::GridRange => self.grid_range.is_some(),
            GridGeometryAttribute::GridToCrs => self.grid_to_crs.is_some(),
        }
    }
}

fn no_transform() -> GridGeometryError {
    GridGeometryError::undefined(
        GridGeometryAttribute::GridToCrs,
        UndefinedCause::NoTransform,
    )
}

fn check_dimension(
    argument: &'static str,
    actual: usize,
    expected: usize,
) -> Result<(), GridGeometryError> {
    if actual != expected {
        return Err(GridGeometryError::dimension_mismatch(argument, actual, expected));
    }
    Ok(())
}

/// Grid range covered by `envelope` under the inverse of `grid_to_crs`.
fn grid_range_of(
    grid_to_crs: &dyn MathTransform,
    envelope: &Envelope,
    anchor: PixelInCell,
) -> Result<GridRange, GridGeometryError> {
    let wrap = |source: TransformError| GridGeometryError::InvalidArgument {
        message: format!(
            "cannot map the envelope back to grid coordinates through {}",
            grid_to_crs.type_name()
        ),
        source,
    };
    let inverse = grid_to_crs.inverse().map_err(wrap)?;
    let grid_envelope = envelope.transform(inverse.as_ref()).map_err(|e| match e {
        GridGeometryError::Transform(source) => wrap(source),
        other => other,
    })?;
    GridRange::from_envelope(&grid_envelope, anchor)
}

/// Equal when grid range, cell-center transform and envelope are equal.
/// Cached derived values are ignored.
impl PartialEq for GridGeometry {
    fn eq(&self, other: &Self) -> bool {
        let transforms = match (&self.grid_to_crs, &other.grid_to_crs) {
            (Some(a), Some(b)) => same_transform(a, b),
            (None, None) => true,
            _ => false,
        };
        transforms && self.grid_range == other.grid_range && self.envelope == other.envelope
    }
}

impl fmt::Display for GridGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GridGeometry[")?;
        match &self.grid_range {
            Some(r) => write!(f, "{r}")?,
            None => f.write_str("no grid range")?,
        }
        match &self.envelope {
            Some(e) if !e.is_null() => write!(f, ", {e}")?,
            _ => f.write_str(", no envelope")?,
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geogrid_transform::{AffineMatrix, PowerTransform1D};

    fn affine(m: AffineMatrix) -> Arc<dyn MathTransform> {
        Arc::new(LinearTransform::from(m))
    }

    fn grid(w: u32, h: u32) -> GridRange {
        GridRange::from_shape(&[w, h]).unwrap()
    }

    #[test]
    fn huge_envelope_cannot_become_a_grid_range() {
        let env = Envelope::new(vec![-1e30, 0.0], vec![-1e29, 10.0], None).unwrap();
        let err = GridGeometry::from_transform_and_envelope(
            PixelInCell::CellCenter,
            Some(affine(AffineMatrix::IDENTITY)),
            Some(env),
        )
        .unwrap_err();
        assert!(matches!(err, GridGeometryError::IllegalArgument { name: "envelope", .. }));
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        let t = affine(AffineMatrix::IDENTITY);
        let err = GridGeometry::new(
            Some(GridRange::from_shape(&[4]).unwrap()),
            PixelInCell::CellCenter,
            Some(t.clone()),
            None,
        )
        .unwrap_err();
        assert_eq!(
            err,
            GridGeometryError::DimensionMismatch {
                argument: "grid_range",
                actual: 1,
                expected: 2
            }
        );

        let crs = CoordinateReferenceSystem::new("height", vec![crate::AxisDirection::Up]);
        let err = GridGeometry::new(Some(grid(4, 4)), PixelInCell::CellCenter, Some(t), Some(Arc::new(crs)))
            .unwrap_err();
        assert!(matches!(
            err,
            GridGeometryError::DimensionMismatch { argument: "crs", actual: 1, expected: 2 }
        ));
    }

    #[test]
    fn crs_without_transform_gives_null_envelope() {
        let crs = Arc::new(CoordinateReferenceSystem::wgs84());
        let gg = GridGeometry::new(Some(grid(4, 4)), PixelInCell::CellCenter, None, Some(crs.clone()))
            .unwrap();
        assert_eq!(gg.coordinate_reference_system().unwrap(), crs);
        assert_eq!(
            gg.envelope().unwrap_err(),
            GridGeometryError::Undefined {
                attribute: GridGeometryAttribute::Envelope,
                cause: UndefinedCause::NoTransform
            }
        );
        assert!(gg.is_defined(GridGeometry::CRS | GridGeometry::GRID_RANGE).unwrap());
        assert!(!gg.is_defined(GridGeometry::GRID_TO_CRS).unwrap());
        assert_eq!(gg.dimension().unwrap(), 2);
    }

    #[test]
    fn transform_without_range_has_no_extent() {
        let gg = GridGeometry::new(
            None,
            PixelInCell::CellCenter,
            Some(affine(AffineMatrix::scale(2.0, 2.0))),
            None,
        )
        .unwrap();
        assert!(matches!(
            gg.envelope(),
            Err(GridGeometryError::Undefined { cause: UndefinedCause::NoExtent, .. })
        ));
        assert!(gg.grid_range().is_err());
        assert_eq!(gg.resolution(), Some(vec![2.0, 2.0]));
    }

    #[test]
    fn corner_anchor_is_cached_and_center_is_derived() {
        let corner = affine(AffineMatrix::new(0.1, 0.0, 0.0, 0.1, 10.0, 20.0));
        let gg = GridGeometry::new(
            Some(grid(512, 512)),
            PixelInCell::CellCorner,
            Some(Arc::clone(&corner)),
            None,
        )
        .unwrap();
        let cached = gg.grid_to_crs_anchor(PixelInCell::CellCorner).unwrap();
        assert!(Arc::ptr_eq(&cached, &corner));

        let center = gg.grid_to_crs().unwrap();
        let mut p = [0.0; 2];
        center.transform_point(&[0.0, 0.0], &mut p).unwrap();
        assert_relative_eq!(p[0], 10.05, epsilon = 1e-12);
        assert_relative_eq!(p[1], 20.05, epsilon = 1e-12);

        let env = gg.envelope().unwrap();
        assert_eq!(env.lower_corner(), &[10.0, 20.0]);
        assert_relative_eq!(env.maximum(0), 61.2, epsilon = 1e-12);
        assert_relative_eq!(env.maximum(1), 71.2, epsilon = 1e-12);
    }

    #[test]
    fn other_orientations_are_recomputed() {
        let gg = GridGeometry::new(
            Some(grid(2, 2)),
            PixelInCell::CellCenter,
            Some(affine(AffineMatrix::IDENTITY)),
            None,
        )
        .unwrap();
        let a = gg.grid_to_crs_at(PixelOrientation::LowerLeft).unwrap();
        let b = gg.grid_to_crs_at(PixelOrientation::LowerLeft).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        let mut p = [0.0; 2];
        a.transform_point(&[0.0, 0.0], &mut p).unwrap();
        assert_eq!(p, [-0.5, 0.5]);
        let ul = gg.grid_to_crs_at(PixelOrientation::UpperLeft).unwrap();
        assert!(Arc::ptr_eq(&ul, &gg.grid_to_crs_anchor(PixelInCell::CellCorner).unwrap()));
    }

    #[test]
    fn inverse_construction_recovers_grid_range() {
        let t = affine(AffineMatrix::new(0.5, 0.0, 0.0, -0.5, 100.0, 50.0));
        let env = Envelope::new(vec![100.0, 40.0], vec![110.0, 50.0], None).unwrap();
        let gg = GridGeometry::from_transform_and_envelope(
            PixelInCell::CellCorner,
            Some(t),
            Some(env.clone()),
        )
        .unwrap();
        let range = gg.grid_range().unwrap();
        assert_eq!(range.lows(), &[0, 0]);
        assert_eq!(range.highs(), &[19, 19]);
        assert_eq!(gg.envelope().unwrap(), env);
    }

    #[test]
    fn inverse_construction_reports_singular_transform() {
        let t = affine(AffineMatrix::new(1.0, 2.0, 2.0, 4.0, 0.0, 0.0));
        let env = Envelope::new(vec![0.0, 0.0], vec![1.0, 1.0], None).unwrap();
        match GridGeometry::from_transform_and_envelope(PixelInCell::CellCenter, Some(t), Some(env)) {
            Err(GridGeometryError::InvalidArgument { message, source }) => {
                assert!(message.contains("LinearTransform"), "{message}");
                assert!(matches!(source, TransformError::NonInvertible(_)));
            }
            other => panic!("expected InvalidArgument, got {other:?}"),
        }
    }

    #[test]
    fn non_linear_transform_has_no_resolution() {
        let gg = GridGeometry::new(
            Some(GridRange::from_shape(&[10]).unwrap()),
            PixelInCell::CellCenter,
            Some(Arc::new(PowerTransform1D::create(2.0))),
            None,
        )
        .unwrap();
        assert_eq!(gg.resolution(), None);
        assert!(gg.is_defined(GridGeometry::ENVELOPE).unwrap());
    }

    #[test]
    fn unknown_mask_bits_are_rejected() {
        let gg = GridGeometry::new(None, PixelInCell::CellCenter, None, None).unwrap();
        assert!(matches!(
            gg.is_defined(16),
            Err(GridGeometryError::IllegalArgument { name: "bitmask", .. })
        ));
        assert!(gg.is_defined(0).unwrap());
        assert!(gg.dimension().is_err());
    }

    #[test]
    fn equality_ignores_caches_and_with_crs_copies_envelope() {
        let t = affine(AffineMatrix::scale(1.0, -1.0));
        let a = GridGeometry::new(Some(grid(3, 3)), PixelInCell::CellCenter, Some(t.clone()), None)
            .unwrap();
        let b = GridGeometry::new(Some(grid(3, 3)), PixelInCell::CellCenter, Some(t), None).unwrap();
        let _ = a.grid_to_crs_anchor(PixelInCell::CellCorner).unwrap();
        let _ = a.resolution();
        assert_eq!(a, b);

        let tagged = a.with_crs(Arc::new(CoordinateReferenceSystem::image())).unwrap();
        assert_ne!(tagged, a);
        assert!(tagged.is_defined(GridGeometry::CRS).unwrap());
        assert!(a.coordinate_reference_system().is_err());
        assert_eq!(
            tagged.envelope().unwrap().lower_corner(),
            a.envelope().unwrap().lower_corner()
        );
    }
}
