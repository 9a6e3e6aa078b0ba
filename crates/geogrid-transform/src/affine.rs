//! Two-dimensional affine matrix and the estimators built on its coefficients.
//!
//! The matrix maps `(x, y)` to:
//!
//! ```text
//! x' = scale_x * x + shear_x * y + translate_x
//! y' = shear_y * x + scale_y * y + translate_y
//! ```
//!
//! Flip, rotation and axis-swap estimators assume the matrix is built from
//! translations, scales and rotations only (no shear). They inspect the
//! signs of the coefficients and return an "unknown" value when the signs
//! cannot tell the cases apart.

use std::any::Any;
use std::sync::Arc;

use nalgebra::{DMatrix, Point2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::math_transform::{check_point_buffers, MathTransform};
use crate::shape::Rect;

/// Smallest positive subnormal `f64`. A determinant not greater than this
/// makes the matrix non-invertible.
const MIN_DETERMINANT: f64 = 4.9e-324;

/// A 2×3 homogeneous affine matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AffineMatrix {
    pub scale_x: f64,
    pub shear_y: f64,
    pub shear_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl AffineMatrix {
    pub const IDENTITY: AffineMatrix = AffineMatrix {
        scale_x: 1.0,
        shear_y: 0.0,
        shear_x: 0.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// Coefficients in column order `m00, m10, m01, m11, m02, m12`.
    pub fn new(
        scale_x: f64,
        shear_y: f64,
        shear_x: f64,
        scale_y: f64,
        translate_x: f64,
        translate_y: f64,
    ) -> Self {
        Self {
            scale_x,
            shear_y,
            shear_x,
            scale_y,
            translate_x,
            translate_y,
        }
    }

    pub fn from_array(m: [f64; 6]) -> Self {
        Self::new(m[0], m[1], m[2], m[3], m[4], m[5])
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.scale_x,
            self.shear_y,
            self.shear_x,
            self.scale_y,
            self.translate_x,
            self.translate_y,
        ]
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, 0.0, 0.0)
    }

    /// Counter-clockwise rotation by `theta` radians.
    pub fn rotation(theta: f64) -> Self {
        let (sin, cos) = theta.sin_cos();
        Self::new(cos, sin, -sin, cos, 0.0, 0.0)
    }

    /// A zoom around `(anchor_x, anchor_y)` which leaves the anchor unchanged.
    pub fn scale_about(sx: f64, sy: f64, anchor_x: f64, anchor_y: f64) -> Self {
        Self::new(sx, 0.0, 0.0, sy, (1.0 - sx) * anchor_x, (1.0 - sy) * anchor_y)
    }

    #[inline]
    pub fn determinant(&self) -> f64 {
        self.scale_x * self.scale_y - self.shear_x * self.shear_y
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.scale_x * p.x + self.shear_x * p.y + self.translate_x,
            self.shear_y * p.x + self.scale_y * p.y + self.translate_y,
        )
    }

    /// Apply the linear part only, ignoring the translation.
    #[inline]
    pub fn delta_apply(&self, v: Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.scale_x * v.x + self.shear_x * v.y,
            self.shear_y * v.x + self.scale_y * v.y,
        )
    }

    /// `self` followed by `other`.
    pub fn then(&self, other: &AffineMatrix) -> AffineMatrix {
        AffineMatrix {
            scale_x: other.scale_x * self.scale_x + other.shear_x * self.shear_y,
            shear_y: other.shear_y * self.scale_x + other.scale_y * self.shear_y,
            shear_x: other.scale_x * self.shear_x + other.shear_x * self.scale_y,
            scale_y: other.shear_y * self.shear_x + other.scale_y * self.scale_y,
            translate_x: other.scale_x * self.translate_x
                + other.shear_x * self.translate_y
                + other.translate_x,
            translate_y: other.shear_y * self.translate_x
                + other.scale_y * self.translate_y
                + other.translate_y,
        }
    }

    pub fn inverse(&self) -> Result<AffineMatrix, TransformError> {
        let det = self.determinant();
        if !(det.abs() > MIN_DETERMINANT) || !det.is_finite() {
            return Err(TransformError::NonInvertible(format!(
                "affine matrix determinant is {det}"
            )));
        }
        Ok(AffineMatrix {
            scale_x: self.scale_y / det,
            shear_y: -self.shear_y / det,
            shear_x: -self.shear_x / det,
            scale_y: self.scale_x / det,
            translate_x: (self.shear_x * self.translate_y - self.scale_y * self.translate_x)
                / det,
            translate_y: (self.shear_y * self.translate_x - self.scale_x * self.translate_y)
                / det,
        })
    }

    /// Exact identity test.
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// `true` if every coefficient differs from the identity matrix by at
    /// most `|tolerance|`.
    pub fn is_identity_within(&self, tolerance: f64) -> bool {
        if self.is_identity() {
            return true;
        }
        let tolerance = tolerance.abs();
        (self.scale_x - 1.0).abs() <= tolerance
            && (self.scale_y - 1.0).abs() <= tolerance
            && self.shear_x.abs() <= tolerance
            && self.shear_y.abs() <= tolerance
            && self.translate_x.abs() <= tolerance
            && self.translate_y.abs() <= tolerance
    }

    /// `true` if rectangles stay axis-aligned: scale/flip/translation only,
    /// or a quadrant rotation.
    pub fn is_axis_aligned(&self) -> bool {
        (self.shear_x == 0.0 && self.shear_y == 0.0) || (self.scale_x == 0.0 && self.scale_y == 0.0)
    }

    /// Bounding box of the four transformed corners of `bounds`.
    ///
    /// The result always encloses the transformed rectangle, which may itself
    /// be rotated. For a grid-to-CRS matrix, `bounds` must be expressed in
    /// cell-corner coordinates to obtain the grid envelope.
    pub fn transform_rect(&self, bounds: &Rect) -> Rect {
        bounding_box(bounds, |p| self.apply(p))
    }

    /// Bounding box of the four inverse-transformed corners of `bounds`.
    pub fn inverse_transform_rect(&self, bounds: &Rect) -> Result<Rect, TransformError> {
        let inv = self.inverse()?;
        Ok(inv.transform_rect(bounds))
    }

    /// Inverse-transform a vector, ignoring the translation terms.
    ///
    /// Uses the closed-form 2×2 inverse, falling back to a full matrix
    /// inversion when the determinant is not greater than the smallest
    /// positive double.
    pub fn inverse_delta_transform(&self, v: Vector2<f64>) -> Result<Vector2<f64>, TransformError> {
        let det = self.determinant();
        if !(det.abs() > MIN_DETERMINANT) {
            return Ok(self.inverse()?.delta_apply(v));
        }
        Ok(Vector2::new(
            (v.x * self.scale_y - v.y * self.shear_x) / det,
            (v.y * self.scale_x - v.x * self.shear_y) / det,
        ))
    }

    /// Estimate whether an axis is flipped: `+1` for no flip, `-1` for one
    /// flipped axis, `0` when unknown.
    ///
    /// Which axis is flipped cannot be determined. A pure quadrant rotation
    /// (both scale terms zero) is reported as unknown because a flip cannot
    /// be told apart from the rotation by signs alone.
    pub fn flip(&self) -> i32 {
        let scale_x = signum(self.scale_x);
        let scale_y = signum(self.scale_y);
        let shear_x = signum(self.shear_x);
        let shear_y = signum(self.shear_y);
        if scale_x == 0 && scale_y == 0 {
            return 0;
        }
        if scale_x == scale_y && shear_x == -shear_y {
            return 1;
        }
        if scale_x == -scale_y && shear_x == shear_y {
            return -1;
        }
        0
    }

    /// Estimated rotation angle in radians, or NaN when [`flip`](Self::flip)
    /// is unknown. A flip is assumed to apply to the `y` source axis.
    pub fn rotation_angle(&self) -> f64 {
        let flip = self.flip();
        if flip == 0 {
            return f64::NAN;
        }
        let scale_x = self.scale_x0();
        let scale_y = self.scale_y0() * flip as f64;
        (self.shear_y / scale_y - self.shear_x / scale_x)
            .atan2(self.scale_y / scale_y + self.scale_x / scale_x)
    }

    /// Estimate whether the matrix swaps axes: `+1` if the `(x, y)` order
    /// seems preserved, `-1` if it seems swapped, `0` when unknown.
    pub fn swap_xy(&self) -> i32 {
        let flip = self.flip();
        if flip != 0 {
            let scale_x = self.scale_x0();
            let scale_y = self.scale_y0() * flip as f64;
            let y = (self.shear_y / scale_y - self.shear_x / scale_x).abs();
            let x = (self.scale_y / scale_y + self.scale_x / scale_x).abs();
            if x > y {
                return 1;
            }
            if x < y {
                return -1;
            }
        }
        0
    }

    /// Magnitude of the `x` scale factor with flip and rotation cancelled.
    pub fn scale_x0(&self) -> f64 {
        magnitude(self.scale_x, self.shear_x)
    }

    /// Magnitude of the `y` scale factor with flip and rotation cancelled.
    pub fn scale_y0(&self) -> f64 {
        magnitude(self.scale_y, self.shear_y)
    }

    /// Mean of [`scale_x0`](Self::scale_x0) and [`scale_y0`](Self::scale_y0).
    pub fn scale_magnitude(&self) -> f64 {
        0.5 * (self.scale_x0() + self.scale_y0())
    }

    /// Snap near-integer coefficients to integers.
    ///
    /// Scale and shear terms are rounded all together or not at all, and
    /// only when the rounded matrix keeps a non-zero entry in each row.
    /// When they are, each translation term is snapped independently.
    /// Otherwise `self` is returned unchanged.
    pub fn round(&self, tolerance: f64) -> AffineMatrix {
        let near = |v: f64| {
            let r = v.round_ties_even();
            ((r - v).abs() <= tolerance).then_some(r)
        };
        let (Some(m00), Some(m01), Some(m11), Some(m10)) = (
            near(self.scale_x),
            near(self.shear_x),
            near(self.scale_y),
            near(self.shear_y),
        ) else {
            return *self;
        };
        if (m00 == 0.0 && m01 == 0.0) || (m10 == 0.0 && m11 == 0.0) {
            log::debug!("integer rounding of {self:?} rejected: a row would vanish");
            return *self;
        }
        AffineMatrix {
            scale_x: m00,
            shear_y: m10,
            shear_x: m01,
            scale_y: m11,
            translate_x: near(self.translate_x).unwrap_or(self.translate_x),
            translate_y: near(self.translate_y).unwrap_or(self.translate_y),
        }
    }

    /// The augmented 3×3 matrix.
    pub fn to_matrix3(&self) -> DMatrix<f64> {
        DMatrix::from_row_slice(
            3,
            3,
            &[
                self.scale_x,
                self.shear_x,
                self.translate_x,
                self.shear_y,
                self.scale_y,
                self.translate_y,
                0.0,
                0.0,
                1.0,
            ],
        )
    }
}

impl MathTransform for AffineMatrix {
    fn source_dimensions(&self) -> usize {
        2
    }

    fn target_dimensions(&self) -> usize {
        2
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_point_buffers(self, src, dst)?;
        let p = self.apply(Point2::new(src[0], src[1]));
        dst[0] = p.x;
        dst[1] = p.y;
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        Ok(Arc::new(AffineMatrix::inverse(self)?))
    }

    fn matrix(&self) -> Option<DMatrix<f64>> {
        Some(self.to_matrix3())
    }

    fn is_identity(&self) -> bool {
        AffineMatrix::is_identity(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn bounding_box(bounds: &Rect, f: impl Fn(Point2<f64>) -> Point2<f64>) -> Rect {
    let mut xmin = f64::INFINITY;
    let mut ymin = f64::INFINITY;
    let mut xmax = f64::NEG_INFINITY;
    let mut ymax = f64::NEG_INFINITY;
    for i in 0..4 {
        let x = if i & 1 == 0 { bounds.min_x() } else { bounds.max_x() };
        let y = if i & 2 == 0 { bounds.min_y() } else { bounds.max_y() };
        let p = f(Point2::new(x, y));
        xmin = xmin.min(p.x);
        xmax = xmax.max(p.x);
        ymin = ymin.min(p.y);
        ymax = ymax.max(p.y);
    }
    Rect::new(xmin, ymin, xmax - xmin, ymax - ymin)
}

#[inline]
fn signum(v: f64) -> i32 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

#[inline]
fn magnitude(scale: f64, shear: f64) -> f64 {
    if shear == 0.0 {
        return scale.abs();
    }
    if scale == 0.0 {
        return shear.abs();
    }
    scale.hypot(shear)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn short_point_buffers_are_rejected() {
        let m = AffineMatrix::new(2.0, 0.0, 0.0, 2.0, 1.0, 1.0);
        let mut out = [0.0; 2];
        assert_eq!(
            m.transform_point(&[1.0], &mut out),
            Err(TransformError::BufferTooSmall {
                required: 2,
                actual: 1
            })
        );
        let mut short = [0.0; 1];
        assert!(m.transform_point(&[1.0, 1.0], &mut short).is_err());
        assert!(m.transform_point(&[1.0, 1.0], &mut out).is_ok());
        assert_eq!(out, [3.0, 3.0]);
    }

    #[test]
    fn identity_within_tolerance() {
        let m = AffineMatrix::new(1.0 + 1e-12, 0.0, 1e-13, 1.0 - 1e-12, 0.0, 2e-12);
        assert!(!m.is_identity());
        assert!(m.is_identity_within(1e-10));
        assert!(m.is_identity_within(-1e-10));
        assert!(!m.is_identity_within(1e-13));
    }

    #[test]
    fn inverse_round_trips_points() {
        let m = AffineMatrix::new(10.0, 0.5, -0.25, -10.0, 500000.0, 6000000.0);
        let inv = m.inverse().expect("invertible");
        let p = Point2::new(120.0, -30.0);
        let back = inv.apply(m.apply(p));
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn singular_matrix_is_not_invertible() {
        let m = AffineMatrix::new(1.0, 2.0, 2.0, 4.0, 0.0, 0.0);
        assert!(matches!(
            m.inverse(),
            Err(TransformError::NonInvertible(_))
        ));
        assert!(m
            .inverse_transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0))
            .is_err());
        assert!(m.inverse_delta_transform(Vector2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn transform_rect_encloses_rotated_box() {
        let m = AffineMatrix::rotation(std::f64::consts::FRAC_PI_4);
        let r = m.transform_rect(&Rect::new(0.0, 0.0, 1.0, 1.0));
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert_relative_eq!(r.min_x(), -h, epsilon = 1e-12);
        assert_relative_eq!(r.max_x(), h, epsilon = 1e-12);
        assert_relative_eq!(r.min_y(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(r.max_y(), 2.0 * h, epsilon = 1e-12);
    }

    #[test]
    fn inverse_transform_rect_undoes_transform_rect() {
        let m = AffineMatrix::new(0.1, 0.0, 0.0, -0.1, 10.0, 20.0);
        let grid = Rect::new(0.0, 0.0, 512.0, 256.0);
        let world = m.transform_rect(&grid);
        let back = m.inverse_transform_rect(&world).expect("invertible");
        assert_relative_eq!(back.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, 0.0, epsilon = 1e-9);
        assert_relative_eq!(back.width, 512.0, epsilon = 1e-9);
        assert_relative_eq!(back.height, 256.0, epsilon = 1e-9);
    }

    #[test]
    fn inverse_delta_ignores_translation() {
        let m = AffineMatrix::new(2.0, 0.0, 0.0, 4.0, 100.0, -50.0);
        let v = m
            .inverse_delta_transform(Vector2::new(2.0, 8.0))
            .expect("invertible");
        assert_relative_eq!(v.x, 1.0);
        assert_relative_eq!(v.y, 2.0);
    }

    #[test]
    fn flip_of_plain_and_flipped_scales() {
        assert_eq!(AffineMatrix::scale(2.0, 3.0).flip(), 1);
        assert_eq!(AffineMatrix::scale(2.0, -3.0).flip(), -1);
        assert_eq!(AffineMatrix::rotation(0.3).flip(), 1);
    }

    #[test]
    fn flip_of_quadrant_rotation_is_unknown() {
        let ccw = AffineMatrix::new(0.0, 1.0, -1.0, 0.0, 0.0, 0.0);
        let swap = AffineMatrix::new(0.0, 1.0, 1.0, 0.0, 0.0, 0.0);
        assert_eq!(ccw.flip(), 0);
        assert_eq!(swap.flip(), 0);
        assert!(ccw.rotation_angle().is_nan());
        assert_eq!(ccw.swap_xy(), 0);
    }

    #[test]
    fn rotation_angle_recovers_theta() {
        for theta in [0.0, 0.2, -0.7, 1.2] {
            let m = AffineMatrix::rotation(theta).then(&AffineMatrix::scale(3.0, 3.0));
            assert_relative_eq!(m.rotation_angle(), theta, epsilon = 1e-12);
        }
        let flipped = AffineMatrix::scale(1.0, -1.0).then(&AffineMatrix::rotation(0.4));
        assert_relative_eq!(flipped.rotation_angle(), 0.4, epsilon = 1e-12);
    }

    #[test]
    fn swap_xy_on_small_and_large_rotations() {
        assert_eq!(AffineMatrix::rotation(0.1).swap_xy(), 1);
        assert_eq!(AffineMatrix::rotation(FRAC_PI_2 - 0.1).swap_xy(), -1);
    }

    #[test]
    fn scale_magnitudes_ignore_rotation() {
        let m = AffineMatrix::rotation(0.9).then(&AffineMatrix::scale(5.0, 5.0));
        assert_relative_eq!(m.scale_x0(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(m.scale_y0(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(m.scale_magnitude(), 5.0, epsilon = 1e-12);
        assert_relative_eq!(AffineMatrix::scale(-2.0, 4.0).scale_x0(), 2.0);
    }

    #[test]
    fn round_snaps_all_or_nothing() {
        let near = AffineMatrix::new(2.0 + 1e-9, 1e-10, -1e-10, -3.0 - 1e-9, 10.0 + 1e-9, 7.4);
        let r = near.round(1e-6);
        assert_eq!(r.scale_x, 2.0);
        assert_eq!(r.shear_y, 0.0);
        assert_eq!(r.shear_x, 0.0);
        assert_eq!(r.scale_y, -3.0);
        assert_eq!(r.translate_x, 10.0);
        assert_eq!(r.translate_y, 7.4);

        let partial = AffineMatrix::new(2.0 + 1e-9, 0.0, 0.0, 3.5, 10.0 + 1e-9, 0.0);
        assert_eq!(partial.round(1e-6), partial);
    }

    #[test]
    fn round_refuses_to_make_matrix_singular() {
        let tiny = AffineMatrix::new(1e-9, 0.0, 0.0, 1.0, 0.3, 0.0);
        assert_eq!(tiny.round(1e-6), tiny);
    }

    #[test]
    fn round_is_idempotent() {
        let samples = [
            AffineMatrix::new(2.0 + 1e-9, 1e-10, -1e-10, -3.0 - 1e-9, 10.0 + 1e-9, 7.4),
            AffineMatrix::new(0.1, 0.0, 0.0, -0.1, 10.0, 20.0),
            AffineMatrix::new(1e-9, 0.0, 0.0, 1.0, 0.3, 0.0),
        ];
        for m in samples {
            let once = m.round(1e-6);
            assert_eq!(once.round(1e-6), once);
        }
    }

    #[test]
    fn scale_about_keeps_anchor_fixed() {
        let m = AffineMatrix::scale_about(2.0, 3.0, 5.0, -4.0);
        let p = m.apply(Point2::new(5.0, -4.0));
        assert_relative_eq!(p.x, 5.0);
        assert_relative_eq!(p.y, -4.0);
    }
}
