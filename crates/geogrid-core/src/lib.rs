//! Grid geometries: binding integer grid indices to world coordinates.
//!
//! A [`GridGeometry`] combines an optional [`GridRange`], an optional
//! grid-to-CRS transform and the [`Envelope`] they imply. Transforms come
//! from [`geogrid_transform`].
//!
//! ```
//! use std::sync::Arc;
//! use geogrid_core::{GridGeometry, GridRange, PixelInCell};
//! use geogrid_transform::{AffineMatrix, LinearTransform, MathTransform};
//!
//! let range = GridRange::from_shape(&[512, 512]).unwrap();
//! let t: Arc<dyn MathTransform> =
//!     Arc::new(LinearTransform::from(AffineMatrix::new(0.1, 0.0, 0.0, 0.1, 10.0, 20.0)));
//! let gg = GridGeometry::new(Some(range), PixelInCell::CellCorner, Some(t), None).unwrap();
//! assert!(gg.is_defined(GridGeometry::ENVELOPE).unwrap());
//! assert!(!gg.is_defined(GridGeometry::CRS).unwrap());
//! ```

mod crs;
mod envelope;
mod error;
mod grid_geometry;
mod grid_range;
mod logger;
mod mapper;
mod pixel;

pub use crs::{AxisDirection, CoordinateReferenceSystem};
pub use envelope::{Envelope, ROUNDING_FACTOR, ROUNDING_MAX_ULPS};
pub use error::{GridGeometryAttribute, GridGeometryError, UndefinedCause};
pub use grid_geometry::GridGeometry;
pub use grid_range::GridRange;
#[cfg(feature = "tracing")]
pub use logger::init_tracing;
pub use logger::{init_from_env, init_with_level, parse_level, LOG_ENV};
pub use mapper::{
    AxisMapping, AxisMappingPolicy, GreedyAxisMatcher, GridToEnvelopeMapper, MapperParams,
};
pub use pixel::{
    pixel_translation, translate, translate_orientation, PixelInCell, PixelOrientation,
};
