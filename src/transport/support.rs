/// marker trait for any type that can
/// be interpreted as a support for a probability distribution.
///
/// currently only implemented by
/// - Bin , where SparseHistogram is the implied Density and CostModel is the implied Measure
pub trait Support: Clone {}
