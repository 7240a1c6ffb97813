use super::support::Support;
use crate::Cost;

/// generalization of *element-wise* distance metric between
/// two Density spaces over arbitrary Support.
///
/// for CostModel, this is a power of the euclidean distance between
/// bin centers, or a user-supplied metric.
///
/// in the transport problem X and Y are of the same type, but image
/// space X and range space Y need not share a support. what is
/// important is that we can define a distance between any x ∈ X and
/// any y ∈ Y, and that the definition is symmetric and non-negative.
pub trait Measure {
    type X: Support;
    type Y: Support;
    fn distance(&self, x: &Self::X, y: &Self::Y) -> Cost;
}
