//! Two-dimensional polynomial warps fitted from point correspondences.
//!
//! A warp follows the imaging convention: it maps a point of the
//! *destination* image back to the *source* image it samples from. Inputs
//! are multiplied by the pre-scale factors before the polynomial is
//! evaluated and the result is multiplied by the post-scale factors, so the
//! fit itself runs on coordinates of order one.

use nalgebra::{DMatrix, DVector, Point2};
use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// Highest supported polynomial degree.
pub const MAX_DEGREE: usize = 7;

/// Relative singular-value threshold below which a fit is rank-deficient.
const RANK_EPS: f64 = 1e-12;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolynomialWarp {
    degree: usize,
    x_coeffs: Vec<f64>,
    y_coeffs: Vec<f64>,
    pre_scale: [f64; 2],
    post_scale: [f64; 2],
}

impl PolynomialWarp {
    /// Number of coefficients per axis, which is also the minimal number of
    /// point pairs, for a polynomial of the given degree.
    pub const fn required_points(degree: usize) -> usize {
        (degree + 1) * (degree + 2) / 2
    }

    /// Build a warp from known coefficients.
    ///
    /// Coefficients follow the term order `1, x, y, x², xy, y², x³, …`.
    pub fn new(
        degree: usize,
        x_coeffs: Vec<f64>,
        y_coeffs: Vec<f64>,
        pre_scale: [f64; 2],
        post_scale: [f64; 2],
    ) -> Result<Self, TransformError> {
        check_degree(degree)?;
        let terms = Self::required_points(degree);
        if x_coeffs.len() != terms {
            return Err(TransformError::DimensionMismatch {
                argument: "x_coeffs",
                actual: x_coeffs.len(),
                expected: terms,
            });
        }
        if y_coeffs.len() != terms {
            return Err(TransformError::DimensionMismatch {
                argument: "y_coeffs",
                actual: y_coeffs.len(),
                expected: terms,
            });
        }
        Ok(Self {
            degree,
            x_coeffs,
            y_coeffs,
            pre_scale,
            post_scale,
        })
    }

    /// Least-squares fit of a warp mapping each `dest_pts[i]` to `source_pts[i]`.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(source_pts, dest_pts), fields(n = dest_pts.len()))
    )]
    pub fn fit(
        source_pts: &[Point2<f64>],
        dest_pts: &[Point2<f64>],
        pre_scale: [f64; 2],
        post_scale: [f64; 2],
        degree: usize,
    ) -> Result<Self, TransformError> {
        check_degree(degree)?;
        if source_pts.len() != dest_pts.len() {
            return Err(TransformError::DimensionMismatch {
                argument: "source_pts",
                actual: source_pts.len(),
                expected: dest_pts.len(),
            });
        }
        let terms = Self::required_points(degree);
        let n = dest_pts.len();
        if n < terms {
            return Err(TransformError::InsufficientCorrespondence {
                degree,
                required: terms,
                actual: n,
            });
        }
        if let Some(p) = source_pts
            .iter()
            .chain(dest_pts)
            .find(|p| !(p.x.is_finite() && p.y.is_finite()))
        {
            return Err(TransformError::InvalidPoint(format!(
                "non-finite coordinate ({}, {})",
                p.x, p.y
            )));
        }

        let mut a = DMatrix::<f64>::zeros(n, terms);
        let mut bx = DVector::<f64>::zeros(n);
        let mut by = DVector::<f64>::zeros(n);
        let mut row = vec![0.0; terms];
        for (k, (d, s)) in dest_pts.iter().zip(source_pts).enumerate() {
            monomials(d.x * pre_scale[0], d.y * pre_scale[1], degree, &mut row);
            for (j, &m) in row.iter().enumerate() {
                a[(k, j)] = m;
            }
            bx[k] = s.x / post_scale[0];
            by[k] = s.y / post_scale[1];
        }

        let svd = a.svd(true, true);
        let max_sv = svd.singular_values.max();
        let eps = RANK_EPS * max_sv.max(1.0);
        let rank = svd.rank(eps);
        if rank < terms {
            log::warn!("polynomial warp of degree {degree}: rank {rank} < {terms} terms");
            return Err(TransformError::DegenerateCorrespondence {
                degree,
                rank,
                terms,
            });
        }
        let degenerate = |_| TransformError::DegenerateCorrespondence {
            degree,
            rank,
            terms,
        };
        let x_coeffs = svd.solve(&bx, eps).map_err(degenerate)?;
        let y_coeffs = svd.solve(&by, eps).map_err(degenerate)?;

        Ok(Self {
            degree,
            x_coeffs: x_coeffs.iter().copied().collect(),
            y_coeffs: y_coeffs.iter().copied().collect(),
            pre_scale,
            post_scale,
        })
    }

    pub fn degree(&self) -> usize {
        self.degree
    }

    pub fn x_coeffs(&self) -> &[f64] {
        &self.x_coeffs
    }

    pub fn y_coeffs(&self) -> &[f64] {
        &self.y_coeffs
    }

    pub fn pre_scale(&self) -> [f64; 2] {
        self.pre_scale
    }

    pub fn post_scale(&self) -> [f64; 2] {
        self.post_scale
    }

    /// Map a destination pixel position to the source position it samples.
    ///
    /// Positions are pixel-corner based: the pixel at index 0 covers `[0, 1)`.
    /// The polynomial works on pixel centers, hence the half-pixel shift on
    /// both sides.
    pub fn map_dest_point(&self, p: Point2<f64>) -> Point2<f64> {
        let u = (p.x + 0.5) * self.pre_scale[0];
        let v = (p.y + 0.5) * self.pre_scale[1];
        let (sx, sy) = self.evaluate(u, v);
        Point2::new(
            sx * self.post_scale[0] - 0.5,
            sy * self.post_scale[1] - 0.5,
        )
    }

    fn evaluate(&self, u: f64, v: f64) -> (f64, f64) {
        let mut u_pow = [1.0; MAX_DEGREE + 1];
        let mut v_pow = [1.0; MAX_DEGREE + 1];
        for i in 1..=self.degree {
            u_pow[i] = u_pow[i - 1] * u;
            v_pow[i] = v_pow[i - 1] * v;
        }
        let mut sx = 0.0;
        let mut sy = 0.0;
        let mut k = 0;
        for i in 0..=self.degree {
            for j in 0..=i {
                let m = u_pow[i - j] * v_pow[j];
                sx += self.x_coeffs[k] * m;
                sy += self.y_coeffs[k] * m;
                k += 1;
            }
        }
        (sx, sy)
    }
}

fn check_degree(degree: usize) -> Result<(), TransformError> {
    if !(1..=MAX_DEGREE).contains(&degree) {
        return Err(TransformError::illegal(
            "degree",
            format!("{degree} is outside 1..={MAX_DEGREE}"),
        ));
    }
    Ok(())
}

/// Fill `out` with `x^(i-j) * y^j` for `i` in `0..=degree`, `j` in `0..=i`.
fn monomials(x: f64, y: f64, degree: usize, out: &mut [f64]) {
    let mut k = 0;
    for i in 0..=degree {
        for j in 0..=i {
            out[k] = x.powi((i - j) as i32) * y.powi(j as i32);
            k += 1;
        }
    }
}
