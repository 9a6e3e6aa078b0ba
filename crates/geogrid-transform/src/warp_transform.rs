use std::any::Any;
use std::sync::{Arc, OnceLock};

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::math_transform::{check_point_buffers, MathTransform};
use crate::shape::Rect;
use crate::warp::PolynomialWarp;

/// Options for fitting a [`WarpTransform2D`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpFitParams {
    /// Polynomial degree, `1..=7`.
    pub degree: usize,
    /// Extent used to normalize source coordinates. Computed from the
    /// points when absent.
    pub src_bounds: Option<Rect>,
    /// Extent used to normalize destination coordinates.
    pub dst_bounds: Option<Rect>,
}

impl Default for WarpFitParams {
    fn default() -> Self {
        Self {
            degree: 1,
            src_bounds: None,
            dst_bounds: None,
        }
    }
}

/// Polynomial coefficients and the non-unit scale factors of a warp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarpParameters {
    pub degree: usize,
    pub x_coeffs: Vec<f64>,
    pub y_coeffs: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_scale_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pre_scale_y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_scale_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_scale_y: Option<f64>,
}

/// Point pairs kept to fit the inverse warp on demand.
#[derive(Debug)]
struct Correspondences {
    src: Vec<Point2<f64>>,
    dst: Vec<Point2<f64>>,
    src_span: [f64; 2],
    dst_span: [f64; 2],
    degree: usize,
}

/// A two-dimensional transform backed by a fitted [`PolynomialWarp`].
///
/// The stored warp keeps the imaging direction: it is fitted with the
/// destination points as its "source" so that `map_dest_point` yields the
/// forward mapping. The inverse is fitted from the swapped point lists the
/// first time it is requested.
#[derive(Debug)]
pub struct WarpTransform2D {
    warp: PolynomialWarp,
    correspondences: Option<Arc<Correspondences>>,
    inverse: OnceLock<Result<PolynomialWarp, TransformError>>,
}

impl WarpTransform2D {
    /// Fit a warp of `degree` mapping every `src[i]` to `dst[i]`.
    pub fn new(
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
        degree: usize,
    ) -> Result<Self, TransformError> {
        Self::with_params(
            src,
            dst,
            &WarpFitParams {
                degree,
                ..WarpFitParams::default()
            },
        )
    }

    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip(src, dst), fields(n = src.len()))
    )]
    pub fn with_params(
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
        params: &WarpFitParams,
    ) -> Result<Self, TransformError> {
        if src.len() != dst.len() {
            return Err(TransformError::DimensionMismatch {
                argument: "dst",
                actual: dst.len(),
                expected: src.len(),
            });
        }
        let src_span = span(params.src_bounds.as_ref(), src, "source");
        let dst_span = span(params.dst_bounds.as_ref(), dst, "destination");

        let warp = PolynomialWarp::fit(
            dst,
            src,
            [1.0 / src_span[0], 1.0 / src_span[1]],
            dst_span,
            params.degree,
        )?;
        log::debug!(
            "fitted degree {} warp from {} point pairs",
            params.degree,
            src.len()
        );
        Ok(Self {
            warp,
            correspondences: Some(Arc::new(Correspondences {
                src: src.to_vec(),
                dst: dst.to_vec(),
                src_span,
                dst_span,
                degree: params.degree,
            })),
            inverse: OnceLock::new(),
        })
    }

    /// Wrap an already fitted warp. Without an `inverse` warp the transform
    /// is not invertible.
    pub fn from_warp(warp: PolynomialWarp, inverse: Option<PolynomialWarp>) -> Self {
        let cell = OnceLock::new();
        if let Some(inv) = inverse {
            let _ = cell.set(Ok(inv));
        }
        Self {
            warp,
            correspondences: None,
            inverse: cell,
        }
    }

    pub fn warp(&self) -> &PolynomialWarp {
        &self.warp
    }

    pub fn parameters(&self) -> WarpParameters {
        let w = &self.warp;
        let non_unit = |v: f64| (v != 1.0).then_some(v);
        WarpParameters {
            degree: w.degree(),
            x_coeffs: w.x_coeffs().to_vec(),
            y_coeffs: w.y_coeffs().to_vec(),
            pre_scale_x: non_unit(w.pre_scale()[0]),
            pre_scale_y: non_unit(w.pre_scale()[1]),
            post_scale_x: non_unit(w.post_scale()[0]),
            post_scale_y: non_unit(w.post_scale()[1]),
        }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        let r = self.warp.map_dest_point(Point2::new(p.x - 0.5, p.y - 0.5));
        Point2::new(r.x + 0.5, r.y + 0.5)
    }

    /// Root-mean-square distance between `apply(src[i])` and `dst[i]`.
    pub fn rms_residual(
        &self,
        src: &[Point2<f64>],
        dst: &[Point2<f64>],
    ) -> Result<f64, TransformError> {
        if src.len() != dst.len() {
            return Err(TransformError::DimensionMismatch {
                argument: "dst",
                actual: dst.len(),
                expected: src.len(),
            });
        }
        if src.is_empty() {
            return Ok(0.0);
        }
        let sum: f64 = src
            .iter()
            .zip(dst)
            .map(|(s, d)| (self.apply(*s) - *d).norm_squared())
            .sum();
        Ok((sum / src.len() as f64).sqrt())
    }

    fn inverse_warp(&self) -> Result<PolynomialWarp, TransformError> {
        self.inverse
            .get_or_init(|| match &self.correspondences {
                Some(c) => PolynomialWarp::fit(
                    &c.src,
                    &c.dst,
                    [1.0 / c.dst_span[0], 1.0 / c.dst_span[1]],
                    c.src_span,
                    c.degree,
                ),
                None => Err(TransformError::NonInvertible(
                    "warp was created without an inverse".to_string(),
                )),
            })
            .clone()
    }

    /// The inverse as a concrete `WarpTransform2D`. Inverting it again gives
    /// a transform equal to `self`.
    pub fn inverse_warp_transform(&self) -> Result<WarpTransform2D, TransformError> {
        let inv = self.inverse_warp()?;
        let back = OnceLock::new();
        let _ = back.set(Ok(self.warp.clone()));
        let correspondences = self.correspondences.as_ref().map(|c| {
            Arc::new(Correspondences {
                src: c.dst.clone(),
                dst: c.src.clone(),
                src_span: c.dst_span,
                dst_span: c.src_span,
                degree: c.degree,
            })
        });
        Ok(WarpTransform2D {
            warp: inv,
            correspondences,
            inverse: back,
        })
    }
}

impl PartialEq for WarpTransform2D {
    fn eq(&self, other: &Self) -> bool {
        self.warp == other.warp
    }
}

impl MathTransform for WarpTransform2D {
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
        Ok(Arc::new(self.inverse_warp_transform()?))
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        other
            .as_any()
            .downcast_ref::<WarpTransform2D>()
            .is_some_and(|o| o == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Width and height from `bounds`, or from the extent of `pts`. A zero or
/// non-finite extent is replaced by `1`.
fn span(bounds: Option<&Rect>, pts: &[Point2<f64>], what: &str) -> [f64; 2] {
    let raw = match bounds {
        Some(r) => [r.width, r.height],
        None => {
            let mut min = [f64::INFINITY; 2];
            let mut max = [f64::NEG_INFINITY; 2];
            for p in pts {
                min[0] = min[0].min(p.x);
                min[1] = min[1].min(p.y);
                max[0] = max[0].max(p.x);
                max[1] = max[1].max(p.y);
            }
            [max[0] - min[0], max[1] - min[1]]
        }
    };
    raw.map(|s| {
        if s != 0.0 && s.is_finite() {
            s
        } else {
            log::warn!("{what} points have a degenerate extent ({s}); using unit scale");
            1.0
        }
    })
}
