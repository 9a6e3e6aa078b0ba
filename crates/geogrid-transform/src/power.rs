use serde::{Deserialize, Serialize};

use crate::transform1d::Transform1D;

/// The one-dimensional transform `y = x^power`.
///
/// Built through [`PowerTransform1D::create`], which never returns a power
/// of `0` or `1`. The exponent of the inverse is kept alongside the forward
/// one, so inverting twice gives back the same exponent bits.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct PowerTransform1D {
    power: f64,
    inverse_power: f64,
}

impl PowerTransform1D {
    /// Transform for `x^power`.
    ///
    /// A power of `1` is [`Transform1D::Identity`] and a power of `0` is
    /// [`Transform1D::Constant`] with value `1`.
    pub fn create(power: f64) -> Transform1D {
        if power == 1.0 {
            return Transform1D::Identity;
        }
        if power == 0.0 {
            return Transform1D::Constant(1.0);
        }
        Transform1D::Power(PowerTransform1D {
            power,
            inverse_power: 1.0 / power,
        })
    }

    pub fn power(&self) -> f64 {
        self.power
    }

    #[inline]
    pub fn transform(&self, x: f64) -> f64 {
        x.powf(self.power)
    }

    #[inline]
    pub fn derivative(&self, x: f64) -> f64 {
        self.power * x.powf(self.power - 1.0)
    }

    pub fn transform_f32(&self, x: f32) -> f32 {
        (x as f64).powf(self.power) as f32
    }

    /// `x^(1/power)`.
    pub fn inverse(&self) -> PowerTransform1D {
        PowerTransform1D {
            power: self.inverse_power,
            inverse_power: self.power,
        }
    }

    /// Combine two power transforms. Exponents add rather than multiply,
    /// matching how powers cancel against the logarithmic and exponential
    /// transforms they are chained with.
    pub fn concatenate(&self, other: &PowerTransform1D) -> Transform1D {
        Self::create(self.power + other.power)
    }
}

impl PartialEq for PowerTransform1D {
    fn eq(&self, other: &Self) -> bool {
        self.power.to_bits() == other.power.to_bits()
    }
}
