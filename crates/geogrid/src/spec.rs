//! JSON-friendly descriptions of grid geometries and warp fits, and the
//! reports produced from them.

use std::sync::Arc;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use geogrid_core::{
    CoordinateReferenceSystem, Envelope, GridGeometry, GridGeometryError, GridRange, MapperParams,
    PixelInCell,
};
use geogrid_transform::{
    AffineMatrix, LinearTransform, MathTransform, TransformError, WarpFitParams, WarpParameters,
    WarpTransform2D,
};

#[derive(thiserror::Error, Debug)]
pub enum SpecError {
    #[error(transparent)]
    Geometry(#[from] GridGeometryError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("grid geometry needs at least one of grid_range, grid_to_crs or envelope")]
    Empty,
}

/// A grid geometry as written in a configuration file.
///
/// Which constructor is used depends on the fields present:
/// - `grid_range` and `grid_to_crs`: the envelope is derived;
/// - `grid_to_crs` and `envelope`: the grid range is derived;
/// - `grid_range` and `envelope`: the transform is guessed, honoring `mapper`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridGeometrySpec {
    pub grid_range: Option<GridRange>,
    /// Two-dimensional affine grid-to-CRS coefficients.
    pub grid_to_crs: Option<AffineMatrix>,
    pub anchor: PixelInCell,
    pub envelope: Option<Envelope>,
    pub crs: Option<CoordinateReferenceSystem>,
    pub mapper: MapperParams,
}

impl GridGeometrySpec {
    pub fn build(&self) -> Result<GridGeometry, SpecError> {
        let crs = self.crs.clone().map(Arc::new);
        let transform = self
            .grid_to_crs
            .map(|m| Arc::new(LinearTransform::from(m)) as Arc<dyn MathTransform>);
        let envelope = match (&self.envelope, &crs) {
            (Some(env), Some(crs)) => Some(env.with_crs(Arc::clone(crs))?),
            (env, _) => env.clone(),
        };

        let geometry = match (&self.grid_range, transform, envelope) {
            (range, Some(t), _) if range.is_some() => {
                GridGeometry::new(range.clone(), self.anchor, Some(t), crs)?
            }
            (None, Some(t), Some(env)) => {
                GridGeometry::from_transform_and_envelope(self.anchor, Some(t), Some(env))?
            }
            (Some(range), None, Some(env)) => {
                GridGeometry::from_envelope_with(range.clone(), env, self.mapper.clone())?
            }
            (None, None, None) if crs.is_none() => return Err(SpecError::Empty),
            (range, t, _) => GridGeometry::new(range.clone(), self.anchor, t, crs)?,
        };
        Ok(geometry)
    }
}

/// Which attributes of a grid geometry are available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definedness {
    pub crs: bool,
    pub envelope: bool,
    pub grid_range: bool,
    pub grid_to_crs: bool,
}

/// Everything derivable from a [`GridGeometry`], for printing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeometryReport {
    pub dimension: Option<usize>,
    pub grid_range: Option<GridRange>,
    pub envelope: Option<Envelope>,
    /// Rows of the augmented cell-center matrix, when linear.
    pub grid_to_crs: Option<Vec<Vec<f64>>>,
    pub resolution: Option<Vec<f64>>,
    pub defined: Definedness,
}

impl GeometryReport {
    pub fn from_geometry(gg: &GridGeometry) -> Result<Self, SpecError> {
        let defined = Definedness {
            crs: gg.is_defined(GridGeometry::CRS)?,
            envelope: gg.is_defined(GridGeometry::ENVELOPE)?,
            grid_range: gg.is_defined(GridGeometry::GRID_RANGE)?,
            grid_to_crs: gg.is_defined(GridGeometry::GRID_TO_CRS)?,
        };
        let grid_to_crs = gg.grid_to_crs().ok().and_then(|t| t.matrix()).map(|m| {
            m.row_iter()
                .map(|row| row.iter().copied().collect())
                .collect()
        });
        Ok(Self {
            dimension: gg.dimension().ok(),
            grid_range: gg.grid_range().ok(),
            envelope: gg.envelope().ok(),
            grid_to_crs,
            resolution: gg.resolution(),
            defined,
        })
    }
}

/// Point correspondences for a polynomial warp fit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarpFitRequest {
    pub source: Vec<[f64; 2]>,
    pub destination: Vec<[f64; 2]>,
    #[serde(default)]
    pub params: WarpFitParams,
}

/// Fitted warp coefficients and how well they reproduce the input pairs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarpReport {
    pub parameters: WarpParameters,
    pub points: usize,
    pub rms_residual: f64,
}

impl WarpFitRequest {
    pub fn fit(&self) -> Result<(WarpTransform2D, WarpReport), SpecError> {
        let src = to_points(&self.source);
        let dst = to_points(&self.destination);
        let warp = WarpTransform2D::with_params(&src, &dst, &self.params)?;
        let report = WarpReport {
            parameters: warp.parameters(),
            points: src.len(),
            rms_residual: warp.rms_residual(&src, &dst)?,
        };
        Ok((warp, report))
    }
}

fn to_points(pts: &[[f64; 2]]) -> Vec<Point2<f64>> {
    pts.iter().map(|&[x, y]| Point2::new(x, y)).collect()
}
