use std::any::Any;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::TransformError;
use crate::linear::LinearTransform;
use crate::math_transform::{ensure_dimension_match, same_transform, MathTransform};

/// Two transforms applied one after the other.
#[derive(Clone, Debug)]
pub struct ConcatenatedTransform {
    first: Arc<dyn MathTransform>,
    second: Arc<dyn MathTransform>,
}

impl ConcatenatedTransform {
    /// `first` followed by `second`.
    ///
    /// Identity steps are dropped and two linear steps are multiplied into a
    /// single [`LinearTransform`].
    pub fn create(
        first: Arc<dyn MathTransform>,
        second: Arc<dyn MathTransform>,
    ) -> Result<Arc<dyn MathTransform>, TransformError> {
        ensure_dimension_match(
            "second",
            second.source_dimensions(),
            first.target_dimensions(),
        )?;
        if first.is_identity() {
            return Ok(second);
        }
        if second.is_identity() {
            return Ok(first);
        }
        if let (Some(a), Some(b)) = (
            LinearTransform::from_transform(first.as_ref()),
            LinearTransform::from_transform(second.as_ref()),
        ) {
            return Ok(Arc::new(a.then(&b)?));
        }
        Ok(Arc::new(Self { first, second }))
    }

    pub fn first(&self) -> &Arc<dyn MathTransform> {
        &self.first
    }

    pub fn second(&self) -> &Arc<dyn MathTransform> {
        &self.second
    }
}

impl MathTransform for ConcatenatedTransform {
    fn source_dimensions(&self) -> usize {
        self.first.source_dimensions()
    }

    fn target_dimensions(&self) -> usize {
        self.second.target_dimensions()
    }

    fn transform_point(&self, src: &[f64], dst: &mut [f64]) -> Result<(), TransformError> {
        let mut mid = vec![0.0; self.first.target_dimensions()];
        self.first.transform_point(src, &mut mid)?;
        self.second.transform_point(&mid, dst)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>, TransformError> {
        ConcatenatedTransform::create(self.second.inverse()?, self.first.inverse()?)
    }

    fn matrix(&self) -> Option<DMatrix<f64>> {
        Some(self.second.matrix()? * self.first.matrix()?)
    }

    fn equals(&self, other: &dyn MathTransform) -> bool {
        other
            .as_any()
            .downcast_ref::<ConcatenatedTransform>()
            .is_some_and(|o| {
                same_transform(&self.first, &o.first) && same_transform(&self.second, &o.second)
            })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `x ↦ transform(x + offsets)`, kept linear when `transform` is.
pub fn translate_source(
    transform: &Arc<dyn MathTransform>,
    offsets: &[f64],
) -> Result<Arc<dyn MathTransform>, TransformError> {
    ensure_dimension_match("offsets", offsets.len(), transform.source_dimensions())?;
    if offsets.iter().all(|&o| o == 0.0) {
        return Ok(Arc::clone(transform));
    }
    if let Some(linear) = LinearTransform::from_transform(transform.as_ref()) {
        return Ok(Arc::new(linear.translate_source(offsets)?));
    }
    ConcatenatedTransform::create(
        Arc::new(LinearTransform::translation(offsets)),
        Arc::clone(transform),
    )
}
