//! N-dimensional affine transforms stored as augmented matrices.

use std::any::Any;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::affine::AffineMatrix;
use crate::error::TransformError;
use crate::math_transform::{check_point_buffers, ensure_dimension_match, MathTransform};

/// Affine transform from `source_dimensions` to `target_dimensions`, held as
/// a `(target + 1) × (source + 1)` matrix whose last row is `[0, …, 0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct LinearTransform {
    matrix: DMatrix<f64>,
}

impl LinearTransform {
    pub fn new(matrix: DMatrix<f64>) -> Result<Self, TransformError> {
        let (rows, cols) = matrix.shape();
        if rows < 2 || cols < 2 {
            return Err(TransformError::illegal(
                "matrix",
                format!("{rows}×{cols} is too small for an affine transform"),
            ));
        }
        let last = matrix.row(rows - 1);
        let affine = last
            .iter()
            .enumerate()
            .all(|(j, &v)| v == if j + 1 == cols { 1.0 } else { 0.0 });
        if !affine {
            return Err(TransformError::illegal(
                "matrix",
                "last row must be [0, …, 0, 1]",
            ));
        }
        Ok(Self { matrix })
    }

    pub fn identity(dim: usize) -> Self {
        Self {
            matrix: DMatrix::identity(dim + 1, dim + 1),
        }
    }

    pub fn translation(offsets: &[f64]) -> Self {
        let n = offsets.len();
        let mut matrix = DMatrix::identity(n + 1, n + 1);
        for (i, &t) in offsets.iter().enumerate() {
            matrix[(i, n)] = t;
        }
        Self { matrix }
    }

    pub fn scale(factors: &[f64]) -> Self {
        let n = factors.len();
        let mut matrix = DMatrix::identity(n + 1, n + 1);
        for (i, &s) in factors.iter().enumerate() {
            matrix[(i, i)] = s;
        }
        Self { matrix }
    }

    /// Build from per-axis scales and translations: `y[i] = scale[i] * x[i] + offset[i]`.
    pub fn scale_translate(scales: &[f64], offsets: &[f64]) -> Result<Self, TransformError> {
        ensure_dimension_match("offsets", offsets.len(), scales.len())?;
        let n = scales.len();
        let mut matrix = DMatrix::identity(n + 1, n + 1);
        for i in 0..n {
            matrix[(i, i)] = scales[i];
            matrix[(i, n)] = offsets[i];
        }
        Ok(Self { matrix })
    }

    pub fn as_matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Reinterpret any transform exposing a matrix as a `LinearTransform`.
    pub fn from_transform(transform: &dyn MathTransform) -> Option<Self> {
        if let Some(linear) = transform.as_any().downcast_ref::<LinearTransform>() {
            return Some(linear.clone());
        }
        transform.matrix().and_then(|m| Self::new(m).ok())
    }

    /// `self` followed by `next`.
    pub fn then(&self, next: &LinearTransform) -> Result<LinearTransform, TransformError> {
        ensure_dimension_match(
            "next",
            next.source_dimensions(),
            self.target_dimensions(),
        )?;
        Ok(Self {
            matrix: &next.matrix * &self.matrix,
        })
    }

    /// Pre-concatenate a translation of the source coordinates, giving
    /// `x ↦ self(x + offsets)`.
    pub fn translate_source(&self, offsets: &[f64]) -> Result<LinearTransform, TransformError> {
        ensure_dimension_match("offsets", offsets.len(), self.source_dimensions())?;
        LinearTransform::translation(offsets).then(self)
    }

    /// Euclidean norm of each target row, excluding the translation column.
    pub fn row_magnitudes(&self) -> Vec<f64> {
        let sd = self.source_dimensions();
        (0..self.target_dimensions())
            .map(|i| {
                (0..sd)
                    .map(|j| self.matrix[(i, j)] * self.matrix[(i, j)])
                    .sum::<f64>()
                    .sqrt()
            })
            .collect()
    }

    /// The equivalent [`AffineMatrix`] when the transform is 2-D.
    pub fn to_affine_2d(&self) -> Option<AffineMatrix> {
        if self.matrix.shape() != (3, 3) {
            return None;
        }
        let m = &self.matrix;
        Some(AffineMatrix::new(
            m[(0, 0)],
            m[(1, 0)],
            m[(0, 1)],
            m[(1, 1)],
            m[(0, 2)],
            m[(1, 2)],
        ))
    }
}

impl From<AffineMatrix> for LinearTransform {
    fn from(a: AffineMatrix) -> Self {
        Self {
            matrix: a.to_matrix3(),
        }
    }
}

impl MathTransform for LinearTransform {
    fn source_dimensions(&self) -> usize {
        self.matrix.ncols() - 1
    }

    fn target_dimensions(&self) -> usize {
        self.matrix.nrows() - 1
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_point_buffers(self, src, dst)?;
        let sd = self.source_dimensions();
        for (i, out) in dst.iter_mut().take(self.target_dimensions()).enumerate() {
            let mut acc = self.matrix[(i, sd)];
            for (j, &x) in src.iter().take(sd).enumerate() {
                acc += self.matrix[(i, j)] * x;
            }
            *out = acc;
        }
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        if !self.matrix.is_square() {
            return Err(TransformError::NonInvertible(format!(
                "{}×{} matrix is not square",
                self.matrix.nrows(),
                self.matrix.ncols()
            )));
        }
        let inv = self
            .matrix
            .clone()
            .try_inverse()
            .ok_or_else(|| TransformError::NonInvertible("singular matrix".to_string()))?;
        if inv.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::NonInvertible(
                "inverse has non-finite coefficients".to_string(),
            ));
        }
        Ok(Arc::new(LinearTransform { matrix: inv }))
    }

    fn matrix(&self) -> Option<DMatrix<f64>> {
        Some(self.matrix.clone())
    }

    fn is_identity(&self) -> bool {
        self.matrix.is_square() && self.matrix == DMatrix::identity(self.matrix.nrows(), self.matrix.ncols())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rejects_non_affine_matrix() {
        let m = DMatrix::from_row_slice(3, 3, &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.5, 0.0, 1.0]);
        assert!(matches!(
            LinearTransform::new(m),
            Err(TransformError::IllegalArgument { name: "matrix", .. })
        ));
        assert!(LinearTransform::new(DMatrix::identity(1, 1)).is_err());
    }

    #[test]
    fn transforms_three_dimensional_points() {
        let t = LinearTransform::scale_translate(&[2.0, 3.0, 4.0], &[1.0, 1.0, 1.0]).unwrap();
        let mut out = [0.0; 3];
        t.transform_point(&[1.0, 1.0, 1.0], &mut out).unwrap();
        assert_eq!(out, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn non_square_matrix_projects_and_is_not_invertible() {
        // 3-D to 2-D: drop the third axis.
        let m = DMatrix::from_row_slice(
            3,
            4,
            &[1.0, 0.0, 0.0, 5.0, 0.0, 1.0, 0.0, 6.0, 0.0, 0.0, 0.0, 1.0],
        );
        let t = LinearTransform::new(m).unwrap();
        assert_eq!(t.source_dimensions(), 3);
        assert_eq!(t.target_dimensions(), 2);
        let mut out = [0.0; 2];
        t.transform_point(&[1.0, 2.0, 3.0], &mut out).unwrap();
        assert_eq!(out, [6.0, 8.0]);
        assert!(matches!(t.inverse(), Err(TransformError::NonInvertible(_))));
    }

    #[test]
    fn inverse_undoes_transform() {
        let t = LinearTransform::from(AffineMatrix::new(0.5, 0.1, -0.2, 2.0, 10.0, -4.0));
        let inv = t.inverse().unwrap();
        let mut a = [0.0; 2];
        let mut b = [0.0; 2];
        t.transform_point(&[3.0, 7.0], &mut a).unwrap();
        inv.transform_point(&a, &mut b).unwrap();
        assert_relative_eq!(b[0], 3.0, epsilon = 1e-12);
        assert_relative_eq!(b[1], 7.0, epsilon = 1e-12);
    }

    #[test]
    fn translate_source_shifts_grid_coordinates() {
        let t = LinearTransform::scale_translate(&[0.1, 0.1], &[10.0, 20.0]).unwrap();
        let shifted = t.translate_source(&[0.5, 0.5]).unwrap();
        let mut out = [0.0; 2];
        shifted.transform_point(&[0.0, 0.0], &mut out).unwrap();
        assert_relative_eq!(out[0], 10.05);
        assert_relative_eq!(out[1], 20.05);
    }

    #[test]
    fn then_checks_dimensions() {
        let a = LinearTransform::identity(2);
        let b = LinearTransform::identity(3);
        assert!(matches!(
            a.then(&b),
            Err(TransformError::DimensionMismatch { argument: "next", actual: 3, expected: 2 })
        ));
    }

    #[test]
    fn affine_round_trip_and_row_magnitudes() {
        let a = AffineMatrix::new(3.0, 4.0, 0.0, 2.0, 1.0, 2.0);
        let t = LinearTransform::from(a);
        assert_eq!(t.to_affine_2d(), Some(a));
        assert_eq!(t.row_magnitudes(), vec![3.0, 4.0f64.hypot(2.0)]);
        assert!(LinearTransform::from_transform(&a).is_some());
        assert!(LinearTransform::identity(2).is_identity());
    }
}
