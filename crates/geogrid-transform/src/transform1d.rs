//! One-dimensional transforms and their concatenation rules.

use std::any::Any;
use std::sync::Arc;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::error::TransformError;
use crate::math_transform::{check_point_buffers, MathTransform};
use crate::power::PowerTransform1D;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Transform1D {
    Identity,
    /// Every input maps to the same value.
    Constant(f64),
    /// `y = scale * x + offset`
    Linear { scale: f64, offset: f64 },
    /// `y = x^p`
    Power(PowerTransform1D),
    /// `y = scale * base^x`
    Exponential { base: f64, scale: f64 },
    /// `y = log_base(x) + offset`
    Logarithmic { base: f64, offset: f64 },
    /// Applied first to last.
    Concatenated(Vec<Transform1D>),
}

impl Transform1D {
    pub fn linear(scale: f64, offset: f64) -> Self {
        if scale == 1.0 && offset == 0.0 {
            return Transform1D::Identity;
        }
        if scale == 0.0 {
            return Transform1D::Constant(offset);
        }
        Transform1D::Linear { scale, offset }
    }

    pub fn transform(&self, x: f64) -> f64 {
        match self {
            Transform1D::Identity => x,
            Transform1D::Constant(c) => *c,
            Transform1D::Linear { scale, offset } => scale * x + offset,
            Transform1D::Power(p) => p.transform(x),
            Transform1D::Exponential { base, scale } => scale * base.powf(x),
            Transform1D::Logarithmic { base, offset } => x.ln() / base.ln() + offset,
            Transform1D::Concatenated(steps) => steps.iter().fold(x, |v, t| t.transform(v)),
        }
    }

    pub fn derivative(&self, x: f64) -> f64 {
        match self {
            Transform1D::Identity => 1.0,
            Transform1D::Constant(_) => 0.0,
            Transform1D::Linear { scale, .. } => *scale,
            Transform1D::Power(p) => p.derivative(x),
            Transform1D::Exponential { base, scale } => scale * base.powf(x) * base.ln(),
            Transform1D::Logarithmic { base, .. } => 1.0 / (x * base.ln()),
            Transform1D::Concatenated(steps) => {
                let mut v = x;
                let mut d = 1.0;
                for t in steps {
                    d *= t.derivative(v);
                    v = t.transform(v);
                }
                d
            }
        }
    }

    pub fn inverse(&self) -> Result<Transform1D, TransformError> {
        Ok(match self {
            Transform1D::Identity => Transform1D::Identity,
            Transform1D::Constant(c) => {
                return Err(TransformError::NonInvertible(format!(
                    "constant transform y = {c}"
                )))
            }
            Transform1D::Linear { scale, offset } => {
                if *scale == 0.0 {
                    return Err(TransformError::NonInvertible(
                        "linear transform with zero scale".to_string(),
                    ));
                }
                Transform1D::Linear {
                    scale: 1.0 / scale,
                    offset: -offset / scale,
                }
            }
            Transform1D::Power(p) => Transform1D::Power(p.inverse()),
            Transform1D::Exponential { base, scale } => {
                if *scale == 0.0 {
                    return Err(TransformError::NonInvertible(
                        "exponential transform with zero scale".to_string(),
                    ));
                }
                Transform1D::Logarithmic {
                    base: *base,
                    offset: -scale.ln() / base.ln(),
                }
            }
            Transform1D::Logarithmic { base, offset } => Transform1D::Exponential {
                base: *base,
                scale: base.powf(-offset),
            },
            Transform1D::Concatenated(steps) => Transform1D::Concatenated(
                steps
                    .iter()
                    .rev()
                    .map(Transform1D::inverse)
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// `self` followed by `next`, simplified where a closed form exists.
    pub fn concatenate(&self, next: &Transform1D) -> Transform1D {
        use Transform1D::*;
        match (self, next) {
            (Identity, t) | (t, Identity) => t.clone(),
            (_, Constant(c)) => Constant(*c),
            (Constant(c), t) => Constant(t.transform(*c)),
            (Linear { scale: s1, offset: o1 }, Linear { scale: s2, offset: o2 }) => {
                Transform1D::linear(s1 * s2, s2 * o1 + o2)
            }
            (Power(a), Power(b)) => a.concatenate(b),
            // log_b1(x) + o, then s * b2^y  ==  (s * b2^o) * x^(ln b2 / ln b1)
            (Logarithmic { base: b1, offset }, Exponential { base: b2, scale }) => {
                let power = PowerTransform1D::create(b2.ln() / b1.ln());
                power.concatenate(&Transform1D::linear(scale * b2.powf(*offset), 0.0))
            }
            // s * b1^x, then log_b2(y) + o  ==  x * ln b1 / ln b2 + log_b2(s) + o
            (Exponential { base: b1, scale }, Logarithmic { base: b2, offset }) => {
                Transform1D::linear(b1.ln() / b2.ln(), scale.ln() / b2.ln() + offset)
            }
            (Concatenated(a), Concatenated(b)) => {
                let mut steps = a.clone();
                steps.extend(b.iter().cloned());
                chain(steps)
            }
            (Concatenated(a), t) => {
                let mut steps = a.clone();
                match steps.pop() {
                    Some(last) => match last.concatenate(t) {
                        Concatenated(tail) => steps.extend(tail),
                        merged => steps.push(merged),
                    },
                    None => steps.push(t.clone()),
                }
                chain(steps)
            }
            (t, Concatenated(b)) => {
                let mut steps = vec![t.clone()];
                steps.extend(b.iter().cloned());
                chain(steps)
            }
            (a, b) => Concatenated(vec![a.clone(), b.clone()]),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Transform1D::Identity)
    }
}

/// Drop identity steps and unwrap single-step chains.
fn chain(steps: Vec<Transform1D>) -> Transform1D {
    let mut steps: Vec<_> = steps.into_iter().filter(|t| !t.is_identity()).collect();
    match steps.len() {
        0 => Transform1D::Identity,
        1 => steps.remove(0),
        _ => Transform1D::Concatenated(steps),
    }
}

impl MathTransform for Transform1D {
    fn source_dimensions(&self) -> usize {
        1
    }

    fn target_dimensions(&self) -> usize {
        1
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        check_point_buffers(self, src, dst)?;
        dst[0] = self.transform(src[0]);
        Ok(())
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        Ok(Arc::new(Transform1D::inverse(self)?))
    }

    fn matrix(&self) -> Option<DMatrix<f64>> {
        match self {
            Transform1D::Identity => Some(DMatrix::identity(2, 2)),
            Transform1D::Linear { scale, offset } => {
                Some(DMatrix::from_row_slice(2, 2, &[*scale, *offset, 0.0, 1.0]))
            }
            _ => None,
        }
    }

    fn is_identity(&self) -> bool {
        Transform1D::is_identity(self)
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        other
            .as_any()
            .downcast_ref::<Transform1D>()
            .is_some_and(|o| o == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
