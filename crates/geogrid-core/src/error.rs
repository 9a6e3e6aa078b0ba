use std::fmt;

use geogrid_transform::TransformError;
use serde::{Deserialize, Serialize};

/// The optional attributes of a grid geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GridGeometryAttribute {
    Crs,
    Envelope,
    GridRange,
    GridToCrs,
}

impl GridGeometryAttribute {
    pub const ALL: [GridGeometryAttribute; 4] = [
        GridGeometryAttribute::Crs,
        GridGeometryAttribute::Envelope,
        GridGeometryAttribute::GridRange,
        GridGeometryAttribute::GridToCrs,
    ];

    /// The bit used for this attribute by `GridGeometry::is_defined`.
    pub const fn bit(self) -> u32 {
        match self {
            GridGeometryAttribute::Crs => 1,
            GridGeometryAttribute::Envelope => 2,
            GridGeometryAttribute::GridRange => 4,
            GridGeometryAttribute::GridToCrs => 8,
        }
    }
}

impl fmt::Display for GridGeometryAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GridGeometryAttribute::Crs => "CRS",
            GridGeometryAttribute::Envelope => "ENVELOPE",
            GridGeometryAttribute::GridRange => "GRID_RANGE",
            GridGeometryAttribute::GridToCrs => "GRID_TO_CRS",
        })
    }
}

/// Why an attribute could not be provided.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UndefinedCause {
    /// No grid-to-CRS transform was supplied.
    NoTransform,
    /// A transform exists but the grid extent is unknown.
    NoExtent,
    /// The envelope carries no coordinate reference system.
    NoCrs,
    /// No grid range was supplied or derived.
    NoGridRange,
}

impl fmt::Display for UndefinedCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UndefinedCause::NoTransform => "the grid to CRS transform is unspecified",
            UndefinedCause::NoExtent => "the grid extent is unspecified",
            UndefinedCause::NoCrs => "the coordinate reference system is unspecified",
            UndefinedCause::NoGridRange => "the grid range is unspecified",
        })
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GridGeometryError {
    #[error("argument `{argument}` has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        argument: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("{attribute} is undefined: {cause}")]
    Undefined {
        attribute: GridGeometryAttribute,
        cause: UndefinedCause,
    },
    #[error("{message}")]
    InvalidArgument {
        message: String,
        #[source]
        source: TransformError,
    },
    #[error("illegal value for `{name}`: {value}")]
    IllegalArgument { name: &'static str, value: String },
    #[error("invalid grid range in dimension {dimension}: low {low} > high {high}")]
    InvalidGridRange { dimension: usize, low: i64, high: i64 },
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl GridGeometryError {
    pub(crate) fn undefined(attribute: GridGeometryAttribute, cause: UndefinedCause) -> Self {
        GridGeometryError::Undefined { attribute, cause }
    }

    pub(crate) fn dimension_mismatch(argument: &'static str, actual: usize, expected: usize) -> Self {
        GridGeometryError::DimensionMismatch {
            argument,
            actual,
            expected,
        }
    }
}
