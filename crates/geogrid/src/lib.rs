//! Facade crate for the `geogrid-*` workspace.
//!
//! This crate provides:
//! - re-exports of the grid layer ([`core`]) and the transform layer
//!   ([`transform`]);
//! - serde descriptions of grid geometries and warp fits ([`spec`]) used by
//!   the `geogrid` command-line tool (feature `cli`).
//!
//! ## Quickstart
//!
//! ```
//! use geogrid::spec::{GeometryReport, GridGeometrySpec};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let spec = GridGeometrySpec {
//!     grid_range: Some(geogrid::GridRange::from_shape(&[100, 50])?),
//!     grid_to_crs: Some(geogrid::AffineMatrix::new(0.5, 0.0, 0.0, -0.5, 100.0, 50.0)),
//!     ..Default::default()
//! };
//! let report = GeometryReport::from_geometry(&spec.build()?)?;
//! assert!(report.defined.envelope);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `geogrid::core`: grid ranges, envelopes, CRS axes, grid geometries and
//!   the heuristic grid-to-envelope mapper.
//! - `geogrid::transform`: the `MathTransform` trait, affine matrices, 1-D
//!   transforms and polynomial warps.

pub use geogrid_core as core;
pub use geogrid_transform as transform;

pub use geogrid_core::{
    CoordinateReferenceSystem, Envelope, GridGeometry, GridGeometryError, GridRange, PixelInCell,
};
pub use geogrid_transform::{AffineMatrix, MathTransform, TransformError, WarpTransform2D};

pub mod spec;

/// Install a `tracing` subscriber filtered by `RUST_LOG` and route `log`
/// records through it.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    geogrid_core::init_tracing(json);
    // Already done by the subscriber when its `tracing-log` feature is on.
    let _ = tracing_log::LogTracer::init();
}
