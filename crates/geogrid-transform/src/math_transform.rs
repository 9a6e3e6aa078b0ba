//! The coordinate transform contract shared by every transform in this crate.

use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::TransformError;
use crate::iteration::IterationStrategy;

/// A mapping between two coordinate spaces of fixed dimensions.
///
/// Only [`MathTransform::transform_point`] is required; every batch and
/// mixed-precision variant is derived from it with identical numeric
/// semantics, modulo what `f32` can represent.
pub trait MathTransform: Debug + Send + Sync {
    /// Number of ordinates in an input point.
    fn source_dimensions(&self) -> usize;

    /// Number of ordinates in an output point.
    fn target_dimensions(&self) -> usize;

    /// Transform a single point.
    ///
    /// `src` holds [`source_dimensions`](Self::source_dimensions) ordinates
    /// and `dst` receives [`target_dimensions`](Self::target_dimensions).
    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError>;

    /// The inverse transform.
    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError>;

    /// The augmented `(target + 1) × (source + 1)` matrix for linear transforms.
    fn matrix(&self) -> Option<DMatrix<f64>> {
        None
    }

    fn is_identity(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    /// Value equality across trait objects. Linear transforms compare by matrix.
    fn equals(&self, other: &dyn MathTransform) -> bool {
        match (self.matrix(), other.matrix()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Short type name used in diagnostics.
    fn type_name(&self) -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Transform `num_pts` packed points from `src` into `dst`.
    fn transform_f64(
        &self,
        src: &[f64],
        dst: &mut [f64],
        num_pts: usize,
    ) -> Result<(), TransformError> {
        let (sd, td) = (self.source_dimensions(), self.target_dimensions());
        check_len(src.len(), sd * num_pts)?;
        check_len(dst.len(), td * num_pts)?;
        for (s, d) in src.chunks_exact(sd).zip(dst.chunks_exact_mut(td)).take(num_pts) {
            self.transform_point(s, d)?;
        }
        Ok(())
    }

    /// Single-precision variant of [`transform_f64`](Self::transform_f64).
    fn transform_f32(
        &self,
        src: &[f32],
        dst: &mut [f32],
        num_pts: usize,
    ) -> Result<(), TransformError> {
        let (sd, td) = (self.source_dimensions(), self.target_dimensions());
        check_len(src.len(), sd * num_pts)?;
        check_len(dst.len(), td * num_pts)?;
        let mut a = vec![0.0; sd];
        let mut b = vec![0.0; td];
        for (s, d) in src.chunks_exact(sd).zip(dst.chunks_exact_mut(td)).take(num_pts) {
            widen(s, &mut a);
            self.transform_point(&a, &mut b)?;
            narrow(&b, d);
        }
        Ok(())
    }

    /// Double-precision source, single-precision destination.
    fn transform_f64_to_f32(
        &self,
        src: &[f64],
        dst: &mut [f32],
        num_pts: usize,
    ) -> Result<(), TransformError> {
        let (sd, td) = (self.source_dimensions(), self.target_dimensions());
        check_len(src.len(), sd * num_pts)?;
        check_len(dst.len(), td * num_pts)?;
        let mut b = vec![0.0; td];
        for (s, d) in src.chunks_exact(sd).zip(dst.chunks_exact_mut(td)).take(num_pts) {
            self.transform_point(s, &mut b)?;
            narrow(&b, d);
        }
        Ok(())
    }

    /// Single-precision source, double-precision destination.
    fn transform_f32_to_f64(
        &self,
        src: &[f32],
        dst: &mut [f64],
        num_pts: usize,
    ) -> Result<(), TransformError> {
        let (sd, td) = (self.source_dimensions(), self.target_dimensions());
        check_len(src.len(), sd * num_pts)?;
        check_len(dst.len(), td * num_pts)?;
        let mut a = vec![0.0; sd];
        for (s, d) in src.chunks_exact(sd).zip(dst.chunks_exact_mut(td)).take(num_pts) {
            widen(s, &mut a);
            self.transform_point(&a, d)?;
        }
        Ok(())
    }

    /// Transform `num_pts` points within a single buffer, reading from
    /// `src_off` and writing at `dst_off`. The two ranges may overlap.
    fn transform_in_place(
        &self,
        pts: &mut [f64],
        src_off: usize,
        dst_off: usize,
        num_pts: usize,
    ) -> Result<(), TransformError> {
        let sd = self.source_dimensions();
        let td = self.target_dimensions();
        check_len(pts.len(), src_off + sd * num_pts)?;
        check_len(pts.len(), dst_off + td * num_pts)?;

        let mut a = vec![0.0; sd];
        let mut b = vec![0.0; td];
        match IterationStrategy::suggest(src_off, sd, dst_off, td, num_pts) {
            IterationStrategy::Ascending => {
                for i in 0..num_pts {
                    a.copy_from_slice(&pts[src_off + i * sd..src_off + (i + 1) * sd]);
                    self.transform_point(&a, &mut b)?;
                    pts[dst_off + i * td..dst_off + (i + 1) * td].copy_from_slice(&b);
                }
            }
            IterationStrategy::Descending => {
                for i in (0..num_pts).rev() {
                    a.copy_from_slice(&pts[src_off + i * sd..src_off + (i + 1) * sd]);
                    self.transform_point(&a, &mut b)?;
                    pts[dst_off + i * td..dst_off + (i + 1) * td].copy_from_slice(&b);
                }
            }
            IterationStrategy::BufferSource => {
                let copy = pts[src_off..src_off + sd * num_pts].to_vec();
                self.transform_f64(&copy, &mut pts[dst_off..dst_off + td * num_pts], num_pts)?;
            }
        }
        Ok(())
    }

    /// Single-precision variant of [`transform_in_place`](Self::transform_in_place).
    fn transform_in_place_f32(
        &self,
        pts: &mut [f32],
        src_off: usize,
        dst_off: usize,
        num_pts: usize,
    ) -> Result<(), TransformError> {
        let sd = self.source_dimensions();
        let td = self.target_dimensions();
        check_len(pts.len(), src_off + sd * num_pts)?;
        check_len(pts.len(), dst_off + td * num_pts)?;

        let mut a = vec![0.0; sd];
        let mut b = vec![0.0; td];
        let mut step = |pts: &mut [f32], i: usize| -> Result<(), TransformError> {
            widen(&pts[src_off + i * sd..src_off + (i + 1) * sd], &mut a);
            self.transform_point(&a, &mut b)?;
            narrow(&b, &mut pts[dst_off + i * td..dst_off + (i + 1) * td]);
            Ok(())
        };
        match IterationStrategy::suggest(src_off, sd, dst_off, td, num_pts) {
            IterationStrategy::Ascending => {
                for i in 0..num_pts {
                    step(pts, i)?;
                }
            }
            IterationStrategy::Descending => {
                for i in (0..num_pts).rev() {
                    step(pts, i)?;
                }
            }
            IterationStrategy::BufferSource => {
                let copy = pts[src_off..src_off + sd * num_pts].to_vec();
                self.transform_f32(&copy, &mut pts[dst_off..dst_off + td * num_pts], num_pts)?;
            }
        }
        Ok(())
    }
}

/// Compare two shared transforms by identity first, then by value.
pub fn same_transform(a: &Arc<dyn MathTransform>, b: &Arc<dyn MathTransform>) -> bool {
    Arc::ptr_eq(a, b) || a.equals(b.as_ref())
}

/// Fail with [`TransformError::DimensionMismatch`] unless `actual == expected`.
pub fn ensure_dimension_match(
    argument: &'static str,
    actual: usize,
    expected: usize,
) -> Result<(), TransformError> {
    if actual != expected {
        return Err(TransformError::DimensionMismatch {
            argument,
            actual,
            expected,
        });
    }
    Ok(())
}

/// Fail with [`TransformError::BufferTooSmall`] unless `src` holds a full
/// source point and `dst` has room for a full target point.
pub(crate) fn check_point_buffers(
    transform: &dyn MathTransform,
    src: &[f64],
    dst: &[f64],
) -> Result<(), TransformError> {
    check_len(src.len(), transform.source_dimensions())?;
    check_len(dst.len(), transform.target_dimensions())
}

fn check_len(actual: usize, required: usize) -> Result<(), TransformError> {
    if actual < required {
        return Err(TransformError::BufferTooSmall { required, actual });
    }
    Ok(())
}

#[inline]
fn widen(src: &[f32], dst: &mut [f64]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f64;
    }
}

#[inline]
fn narrow(src: &[f64], dst: &mut [f32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = s as f32;
    }
}
