use super::density::Density;
use super::measure::Measure;
use super::support::Support;
use crate::Cost;
use crate::Mass;
use crate::Result;

/// a joint distribution transporting one Density onto another.
///
/// minimize() runs whatever optimization the implementation encodes and
/// yields the coupling in its optimal state, or a typed error when the
/// problem is degenerate or the solver gives up. flow() and cost() read
/// the minimized state.
pub trait Coupling {
    type X: Support;
    type Y: Support;
    type M: Measure<X = Self::X, Y = Self::Y>;
    type P: Density<S = Self::X>;
    type Q: Density<S = Self::Y>;

    /// solve for the optimal coupling between P and Q under M.
    fn minimize(self) -> Result<Self>
    where
        Self: Sized;

    /// transported mass between a pair of support elements.
    fn flow(&self, x: &Self::X, y: &Self::Y) -> Mass;

    /// total cost of the coupling, i.e. the integral of
    /// flow(x, y) * distance(x, y) over the joint support.
    fn cost(&self) -> Cost;
}
