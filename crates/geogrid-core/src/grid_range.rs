use std::fmt;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::GridGeometryError;
use crate::pixel::{pixel_translation, PixelInCell};

/// Integer bounding box of the valid cells of a grid. Both `low` and `high`
/// are inclusive.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGridRange")]
pub struct GridRange {
    low: Vec<i64>,
    high: Vec<i64>,
}

#[derive(Deserialize)]
struct RawGridRange {
    low: Vec<i64>,
    high: Vec<i64>,
}

impl TryFrom<RawGridRange> for GridRange {
    type Error = GridGeometryError;

    fn try_from(raw: RawGridRange) -> Result<Self, Self::Error> {
        GridRange::new(raw.low, raw.high)
    }
}

impl GridRange {
    pub fn new(low: Vec<i64>, high: Vec<i64>) -> Result<Self, GridGeometryError> {
        if low.len() != high.len() {
            return Err(GridGeometryError::dimension_mismatch(
                "high",
                high.len(),
                low.len(),
            ));
        }
        for (dimension, (&l, &h)) in low.iter().zip(&high).enumerate() {
            if l > h {
                return Err(GridGeometryError::InvalidGridRange {
                    dimension,
                    low: l,
                    high: h,
                });
            }
            if h.checked_sub(l).and_then(|d| d.checked_add(1)).is_none() {
                return Err(GridGeometryError::IllegalArgument {
                    name: "high",
                    value: format!("{l}..={h} in dimension {dimension} has too many cells"),
                });
            }
        }
        Ok(Self { low, high })
    }

    /// A range starting at zero with `shape[i]` cells along axis `i`.
    pub fn from_shape(shape: &[u32]) -> Result<Self, GridGeometryError> {
        let low = vec![0; shape.len()];
        let high = shape.iter().map(|&n| i64::from(n) - 1).collect();
        Self::new(low, high)
    }

    /// Grid cells covered by `envelope`, given in grid coordinates.
    ///
    /// Each side is shifted so that the anchor lands on the cell corner and
    /// rounded to the nearest integer; the upper side is exclusive.
    pub fn from_envelope(
        envelope: &Envelope,
        anchor: PixelInCell,
    ) -> Result<Self, GridGeometryError> {
        let offset = pixel_translation(anchor) + 0.5;
        let mut low = Vec::with_capacity(envelope.dimension());
        let mut high = Vec::with_capacity(envelope.dimension());
        for i in 0..envelope.dimension() {
            let lo = round_half_up(envelope.minimum(i) + offset);
            let hi = round_half_up(envelope.maximum(i) + offset);
            if !lo.is_finite() || !hi.is_finite() {
                return Err(GridGeometryError::IllegalArgument {
                    name: "envelope",
                    value: format!("non-finite extent in dimension {i}"),
                });
            }
            match (to_index(lo), to_index(hi).and_then(|h| h.checked_sub(1))) {
                (Some(l), Some(h)) => {
                    low.push(l);
                    high.push(h);
                }
                _ => {
                    return Err(GridGeometryError::IllegalArgument {
                        name: "envelope",
                        value: format!("extent {lo}..{hi} in dimension {i} overflows grid indices"),
                    })
                }
            }
        }
        Self::new(low, high)
    }

    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    pub fn low(&self, dim: usize) -> i64 {
        self.low[dim]
    }

    pub fn high(&self, dim: usize) -> i64 {
        self.high[dim]
    }

    /// Number of cells along `dim`.
    pub fn span(&self, dim: usize) -> i64 {
        self.high[dim] - self.low[dim] + 1
    }

    pub fn lows(&self) -> &[i64] {
        &self.low
    }

    pub fn highs(&self) -> &[i64] {
        &self.high
    }

    pub fn contains(&self, index: &[i64]) -> bool {
        index.len() == self.dimension()
            && index
                .iter()
                .zip(self.low.iter().zip(&self.high))
                .all(|(&v, (&l, &h))| l <= v && v <= h)
    }
}

fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// `v` as a grid index when it lies in the `i64` range.
fn to_index(v: f64) -> Option<i64> {
    // 2^63, exactly representable.
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    (-LIMIT..LIMIT).contains(&v).then_some(v as i64)
}

impl fmt::Display for GridRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("GridRange[")?;
        for (i, (l, h)) in self.low.iter().zip(&self.high).enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{l}..={h}")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_bounds() {
        assert_eq!(
            GridRange::new(vec![0, 5], vec![9, 4]),
            Err(GridGeometryError::InvalidGridRange {
                dimension: 1,
                low: 5,
                high: 4
            })
        );
        assert!(GridRange::from_shape(&[4, 0]).is_err());
    }

    #[test]
    fn span_and_contains() {
        let r = GridRange::from_shape(&[512, 256]).unwrap();
        assert_eq!(r.span(0), 512);
        assert_eq!(r.high(1), 255);
        assert!(r.contains(&[511, 0]));
        assert!(!r.contains(&[512, 0]));
        assert_eq!(r.to_string(), "GridRange[0..=511, 0..=255]");
    }

    #[test]
    fn from_envelope_rounds_each_side() {
        let env = Envelope::new(vec![-0.5, 9.6], vec![99.5, 20.4], None).unwrap();
        let r = GridRange::from_envelope(&env, PixelInCell::CellCenter).unwrap();
        assert_eq!(r.lows(), &[0, 10]);
        assert_eq!(r.highs(), &[99, 20]);

        let corner = Envelope::new(vec![0.0, 0.0], vec![100.0, 50.0], None).unwrap();
        let r = GridRange::from_envelope(&corner, PixelInCell::CellCorner).unwrap();
        assert_eq!(r.highs(), &[99, 49]);
    }

    #[test]
    fn out_of_range_extents_are_rejected() {
        let env = Envelope::new(vec![-1e30, 0.0], vec![-1e29, 10.0], None).unwrap();
        assert!(matches!(
            GridRange::from_envelope(&env, PixelInCell::CellCenter),
            Err(GridGeometryError::IllegalArgument { name: "envelope", .. })
        ));
        // An exclusive upper bound at i64::MIN leaves no room for `high`.
        let edge = Envelope::new(vec![i64::MIN as f64], vec![i64::MIN as f64], None).unwrap();
        assert!(GridRange::from_envelope(&edge, PixelInCell::CellCorner).is_err());

        assert!(matches!(
            GridRange::new(vec![i64::MIN], vec![i64::MAX]),
            Err(GridGeometryError::IllegalArgument { name: "high", .. })
        ));
        let wide = GridRange::new(vec![i64::MIN], vec![-2]).unwrap();
        assert_eq!(wide.span(0), i64::MAX);
    }

    #[test]
    fn deserialization_validates() {
        let ok: GridRange = serde_json::from_str(r#"{"low":[0,0],"high":[3,3]}"#).unwrap();
        assert_eq!(ok.span(1), 4);
        assert!(serde_json::from_str::<GridRange>(r#"{"low":[4],"high":[3]}"#).is_err());
    }
}
