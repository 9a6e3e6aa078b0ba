//! Iteration order for batch transforms whose source and destination
//! coordinates live in the same buffer.
//!
//! A point is always read completely before its result is written, so a
//! batch is safe in ascending order when writes trail the reads, and safe
//! in descending order when writes lead them. Anything else needs a copy
//! of the source range.

/// Order in which an in-place batch transform visits its points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterationStrategy {
    /// Visit points from first to last.
    Ascending,
    /// Visit points from last to first.
    Descending,
    /// Copy the source range to a temporary buffer first.
    BufferSource,
}

impl IterationStrategy {
    /// Suggest an iteration order for transforming `num_pts` points of
    /// `src_dim` ordinates starting at `src_off` into points of `dst_dim`
    /// ordinates starting at `dst_off`, within the same buffer.
    pub fn suggest(
        src_off: usize,
        src_dim: usize,
        dst_off: usize,
        dst_dim: usize,
        num_pts: usize,
    ) -> Self {
        if num_pts <= 1 {
            return Self::Ascending;
        }
        let src_end = src_off + src_dim * num_pts;
        let dst_end = dst_off + dst_dim * num_pts;
        if dst_end <= src_off || src_end <= dst_off {
            return Self::Ascending;
        }
        if dst_off <= src_off && dst_dim <= src_dim {
            return Self::Ascending;
        }
        if dst_off >= src_off && dst_dim >= src_dim {
            return Self::Descending;
        }
        Self::BufferSource
    }
}
