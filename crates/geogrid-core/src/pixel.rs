//! Where inside a grid cell a grid-to-CRS transform is anchored.
//!
//! Integer grid coordinates may denote either the center of a cell
//! (the OGC convention) or its upper-left corner (the imaging convention).
//! The two forms of a transform differ by half a cell on every axis.

use std::sync::Arc;

use geogrid_transform::{translate_source, MathTransform, TransformError};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelInCell {
    #[default]
    CellCenter,
    CellCorner,
}

/// Offset of the anchor relative to the cell center, in cells.
pub fn pixel_translation(anchor: PixelInCell) -> f64 {
    match anchor {
        PixelInCell::CellCenter => 0.0,
        PixelInCell::CellCorner => -0.5,
    }
}

/// A two-dimensional anchor point within a cell. Rows grow downwards, so
/// `Upper` has a negative `y` offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelOrientation {
    Center,
    UpperLeft,
    UpperRight,
    LowerLeft,
    LowerRight,
    Upper,
    Lower,
    Left,
    Right,
}

impl PixelOrientation {
    /// `(dx, dy)` offset from the cell center, in cells.
    pub fn offset(self) -> (f64, f64) {
        match self {
            PixelOrientation::Center => (0.0, 0.0),
            PixelOrientation::UpperLeft => (-0.5, -0.5),
            PixelOrientation::UpperRight => (0.5, -0.5),
            PixelOrientation::LowerLeft => (-0.5, 0.5),
            PixelOrientation::LowerRight => (0.5, 0.5),
            PixelOrientation::Upper => (0.0, -0.5),
            PixelOrientation::Lower => (0.0, 0.5),
            PixelOrientation::Left => (-0.5, 0.0),
            PixelOrientation::Right => (0.5, 0.0),
        }
    }
}

impl From<PixelInCell> for PixelOrientation {
    fn from(anchor: PixelInCell) -> Self {
        match anchor {
            PixelInCell::CellCenter => PixelOrientation::Center,
            PixelInCell::CellCorner => PixelOrientation::UpperLeft,
        }
    }
}

/// Convert a grid-to-CRS transform anchored at `current` into the same
/// mapping anchored at `expected`.
///
/// Returns `transform` itself when both anchors are equal.
pub fn translate(
    transform: &Arc<dyn MathTransform>,
    current: PixelInCell,
    expected: PixelInCell,
) -> Result<Arc<dyn MathTransform>, TransformError> {
    if current == expected {
        return Ok(Arc::clone(transform));
    }
    let offset = pixel_translation(expected) - pixel_translation(current);
    let offsets = vec![offset; transform.source_dimensions()];
    translate_source(transform, &offsets)
}

/// Like [`translate`] for two-dimensional orientations. Only the first two
/// source axes are shifted.
pub fn translate_orientation(
    transform: &Arc<dyn MathTransform>,
    current: PixelOrientation,
    expected: PixelOrientation,
) -> Result<Arc<dyn MathTransform>, TransformError> {
    if current == expected {
        return Ok(Arc::clone(transform));
    }
    let (cx, cy) = current.offset();
    let (ex, ey) = expected.offset();
    let mut offsets = vec![0.0; transform.source_dimensions()];
    for (o, d) in offsets.iter_mut().zip([ex - cx, ey - cy]) {
        *o = d;
    }
    translate_source(transform, &offsets)
}
