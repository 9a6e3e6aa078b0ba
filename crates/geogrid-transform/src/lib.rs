//! Coordinate transforms for georeferenced grids.
//!
//! The crate has no notion of grids or envelopes. It provides the
//! [`MathTransform`] contract and its implementations: N-dimensional
//! [`LinearTransform`]s, the 2-D [`AffineMatrix`] with its decomposition
//! helpers, one-dimensional [`Transform1D`] chains, and polynomial warps
//! fitted from point correspondences ([`WarpTransform2D`]).
//!
//! ```
//! use geogrid_transform::{AffineMatrix, MathTransform};
//!
//! let m = AffineMatrix::new(0.1, 0.0, 0.0, -0.1, 10.0, 20.0);
//! let mut out = [0.0; 2];
//! m.transform_point(&[100.0, 100.0], &mut out).unwrap();
//! assert!((out[0] - 20.0).abs() < 1e-12);
//! assert!((out[1] - 10.0).abs() < 1e-12);
//! ```

mod affine;
mod concat;
mod error;
mod iteration;
mod linear;
mod math_transform;
mod power;
mod shape;
mod transform1d;
mod warp;
mod warp_transform;

pub use affine::AffineMatrix;
pub use concat::{translate_source, ConcatenatedTransform};
pub use error::TransformError;
pub use iteration::IterationStrategy;
pub use linear::LinearTransform;
pub use math_transform::{ensure_dimension_match, same_transform, MathTransform};
pub use power::PowerTransform1D;
pub use shape::{transform_shape, transform_shape_mut, PathSegment, Rect, Shape};
pub use transform1d::Transform1D;
pub use warp::{PolynomialWarp, MAX_DEGREE};
pub use warp_transform::{WarpFitParams, WarpParameters, WarpTransform2D};

pub use nalgebra::{Point2, Vector2};
