//! Heuristic grid-to-envelope mapping.
//!
//! Given only a grid range and the envelope it should cover, an affine
//! grid-to-CRS transform is built by pairing every grid axis with an
//! envelope axis and deciding whether that axis runs backwards. The pairing
//! is a guess driven by axis directions. Callers that know better pass
//! [`MapperParams`] overrides or their own [`AxisMappingPolicy`].

use std::fmt::Debug;
use std::sync::Arc;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use geogrid_transform::LinearTransform;

use crate::crs::{AxisDirection, CoordinateReferenceSystem};
use crate::envelope::Envelope;
use crate::error::GridGeometryError;
use crate::grid_range::GridRange;

/// Pairing between grid axes and envelope axes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxisMapping {
    /// `envelope_axis[i]` is the envelope axis fed by grid axis `i`.
    pub envelope_axis: Vec<usize>,
    /// `reverse[j]` is `true` when envelope axis `j` decreases as the grid
    /// index grows.
    pub reverse: Vec<bool>,
}

impl AxisMapping {
    pub fn identity(dim: usize) -> Self {
        Self {
            envelope_axis: (0..dim).collect(),
            reverse: vec![false; dim],
        }
    }

    /// `true` when the first two grid axes feed envelope axes 1 and 0.
    pub fn swaps_xy(&self) -> bool {
        self.envelope_axis.len() >= 2 && self.envelope_axis[0] == 1 && self.envelope_axis[1] == 0
    }
}

/// Strategy that infers an [`AxisMapping`] from the envelope CRS.
pub trait AxisMappingPolicy: Debug + Send + Sync {
    fn infer(&self, crs: Option<&CoordinateReferenceSystem>, dimension: usize) -> AxisMapping;
}

/// Greedy per-axis matching.
///
/// Grid axis 0 takes the first free envelope axis pointing east, west, along
/// columns or horizontally on a display; grid axis 1 the first free one
/// pointing north, south, along rows or vertically. Remaining axes keep
/// their index when it is free, else take the lowest free one.
///
/// The grid is assumed to run right along axis 0, down along axis 1, and up
/// or forward in time along higher axes. An envelope axis is reversed when
/// it points against that direction.
#[derive(Clone, Copy, Debug, Default)]
pub struct GreedyAxisMatcher;

impl GreedyAxisMatcher {
    fn prefers(grid_axis: usize, direction: AxisDirection) -> bool {
        match grid_axis {
            0 => direction.is_horizontal_x(),
            1 => direction.is_horizontal_y(),
            _ => false,
        }
    }

    fn runs_along(grid_axis: usize, direction: AxisDirection) -> bool {
        use AxisDirection::*;
        match grid_axis {
            0 => matches!(direction, East | ColumnPositive | DisplayRight),
            1 => matches!(direction, South | RowPositive | DisplayDown),
            _ => matches!(direction, Up | Future),
        }
    }
}

impl AxisMappingPolicy for GreedyAxisMatcher {
    fn infer(&self, crs: Option<&CoordinateReferenceSystem>, dimension: usize) -> AxisMapping {
        let Some(crs) = crs.filter(|c| c.dimension() == dimension) else {
            return AxisMapping::identity(dimension);
        };
        let mut used = vec![false; dimension];
        let mut envelope_axis = Vec::with_capacity(dimension);
        for i in 0..dimension {
            let preferred = (0..dimension)
                .find(|&j| !used[j] && GreedyAxisMatcher::prefers(i, crs.axes[j]));
            let j = preferred
                .or_else(|| (!used[i]).then_some(i))
                .or_else(|| (0..dimension).find(|&j| !used[j]))
                .unwrap_or(i);
            used[j] = true;
            envelope_axis.push(j);
        }
        let mut reverse = vec![false; dimension];
        for (i, &j) in envelope_axis.iter().enumerate() {
            reverse[j] = GreedyAxisMatcher::runs_along(i, crs.axes[j].opposite());
        }
        AxisMapping {
            envelope_axis,
            reverse,
        }
    }
}

/// Explicit answers that bypass the inference. `None` means automatic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperParams {
    /// Per envelope axis.
    pub reverse_axis: Option<Vec<bool>>,
    pub swap_xy: Option<bool>,
}

impl MapperParams {
    pub fn is_automatic(&self) -> bool {
        self.reverse_axis.is_none() && self.swap_xy.is_none()
    }
}

/// Builds a cell-center grid-to-CRS transform mapping a grid range onto an
/// envelope.
#[derive(Clone, Debug)]
pub struct GridToEnvelopeMapper {
    grid_range: GridRange,
    envelope: Envelope,
    params: MapperParams,
    policy: Arc<dyn AxisMappingPolicy>,
}

impl GridToEnvelopeMapper {
    pub fn new(grid_range: GridRange, envelope: Envelope) -> Result<Self, GridGeometryError> {
        if envelope.dimension() != grid_range.dimension() {
            return Err(GridGeometryError::dimension_mismatch(
                "envelope",
                envelope.dimension(),
                grid_range.dimension(),
            ));
        }
        if let Some(i) = (0..envelope.dimension())
            .find(|&i| !envelope.span(i).is_finite() || !envelope.minimum(i).is_finite())
        {
            return Err(GridGeometryError::IllegalArgument {
                name: "envelope",
                value: format!("non-finite extent in dimension {i}"),
            });
        }
        Ok(Self {
            grid_range,
            envelope,
            params: MapperParams::default(),
            policy: Arc::new(GreedyAxisMatcher),
        })
    }

    pub fn with_params(mut self, params: MapperParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn AxisMappingPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn grid_range(&self) -> &GridRange {
        &self.grid_range
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn params(&self) -> &MapperParams {
        &self.params
    }

    /// The inferred mapping with the explicit overrides applied.
    pub fn mapping(&self) -> Result<AxisMapping, GridGeometryError> {
        let dim = self.grid_range.dimension();
        let mut mapping = self
            .policy
            .infer(self.envelope.crs().map(|c| c.as_ref()), dim);
        if let Some(swap) = self.params.swap_xy {
            mapping.envelope_axis = (0..dim).collect();
            if swap && dim >= 2 {
                mapping.envelope_axis.swap(0, 1);
            }
        }
        if let Some(reverse) = &self.params.reverse_axis {
            if reverse.len() != dim {
                return Err(GridGeometryError::dimension_mismatch(
                    "reverse_axis",
                    reverse.len(),
                    dim,
                ));
            }
            mapping.reverse = reverse.clone();
        }
        if self.params.is_automatic() {
            log::debug!(
                "inferred grid axis mapping {:?}, reversed {:?}",
                mapping.envelope_axis,
                mapping.reverse
            );
        }
        Ok(mapping)
    }

    /// Cell-center transform sending the outer edges of the grid cells onto
    /// the envelope bounds.
    pub fn create_transform(&self) -> Result<LinearTransform, GridGeometryError> {
        let mapping = self.mapping()?;
        let n = self.grid_range.dimension();
        let mut matrix = DMatrix::<f64>::zeros(n + 1, n + 1);
        matrix[(n, n)] = 1.0;
        for (i, &j) in mapping.envelope_axis.iter().enumerate() {
            let mut scale = self.envelope.span(j) / self.grid_range.span(i) as f64;
            let mut offset = if mapping.reverse[j] {
                scale = -scale;
                self.envelope.maximum(j)
            } else {
                self.envelope.minimum(j)
            };
            offset -= scale * (self.grid_range.low(i) as f64 - 0.5);
            matrix[(j, i)] = scale;
            matrix[(j, n)] = offset;
        }
        Ok(LinearTransform::new(matrix)?)
    }
}
