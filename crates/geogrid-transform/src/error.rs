/// Errors returned by coordinate transforms and by warp fitting.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("argument `{argument}` has {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        argument: &'static str,
        actual: usize,
        expected: usize,
    },
    #[error("transform is not invertible: {0}")]
    NonInvertible(String),
    #[error("a degree {degree} polynomial warp needs at least {required} point pairs, got {actual}")]
    InsufficientCorrespondence {
        degree: usize,
        required: usize,
        actual: usize,
    },
    #[error("point pairs are degenerate for a degree {degree} polynomial (rank {rank} < {terms})")]
    DegenerateCorrespondence {
        degree: usize,
        rank: usize,
        terms: usize,
    },
    #[error("illegal value for `{name}`: {value}")]
    IllegalArgument { name: &'static str, value: String },
    #[error("invalid point: {0}")]
    InvalidPoint(String),
    #[error("coordinate buffer too small: need {required} values, got {actual}")]
    BufferTooSmall { required: usize, actual: usize },
}

impl TransformError {
    pub(crate) fn illegal(name: &'static str, value: impl ToString) -> Self {
        TransformError::IllegalArgument {
            name,
            value: value.to_string(),
        }
    }
}
