use crate::histogram::Bin;
use crate::transport::Measure;
use crate::Coordinate;
use crate::Cost;
use crate::Error;
use crate::Result;

/// pairwise transport cost between two bin centers.
///
/// squared euclidean distance is the default: it is the quadratic OT
/// cost, which gives the stable convex formulation the correction
/// methods are built on. evaluation is O(k) in the dimension, which
/// matters because the dense graph calls this once per (source, sink)
/// pair.
pub enum CostModel {
    /// squared euclidean distance between centers.
    SqEuclidean,
    /// plain euclidean distance between centers.
    Euclidean,
    /// user-supplied metric over center coordinates.
    /// must be symmetric and non-negative; the solvers assume both.
    Custom(Box<dyn Fn(&[Coordinate], &[Coordinate]) -> Cost + Send + Sync>),
}

impl CostModel {
    /// the `cost_power` configuration knob: 1 is euclidean, 2 is
    /// squared euclidean.
    pub fn from_power(power: u32) -> Result<Self> {
        match power {
            1 => Ok(Self::Euclidean),
            2 => Ok(Self::SqEuclidean),
            _ => Err(Error::Config("cost power must be 1 or 2")),
        }
    }

    fn squared(x: &[Coordinate], y: &[Coordinate]) -> Cost {
        x.iter()
            .zip(y)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<Cost>()
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::SqEuclidean
    }
}

impl Measure for CostModel {
    type X = Bin;
    type Y = Bin;
    fn distance(&self, x: &Self::X, y: &Self::Y) -> Cost {
        match self {
            Self::SqEuclidean => Self::squared(x.center(), y.center()),
            Self::Euclidean => Self::squared(x.center(), y.center()).sqrt(),
            Self::Custom(f) => f(x.center(), y.center()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(center: Vec<f64>) -> Bin {
        let index = center.iter().map(|&c| c.floor() as i64).collect();
        Bin::new(index, center, 1.)
    }

    #[test]
    fn squared_euclidean_matches_by_hand() {
        let x = bin(vec![0., 0.]);
        let y = bin(vec![3., 4.]);
        assert!(CostModel::SqEuclidean.distance(&x, &y) == 25.);
        assert!(CostModel::Euclidean.distance(&x, &y) == 5.);
    }

    #[test]
    fn is_symmetric() {
        let x = bin(vec![1.5, -2.]);
        let y = bin(vec![-0.5, 7.]);
        for model in [CostModel::SqEuclidean, CostModel::Euclidean] {
            assert!(model.distance(&x, &y) == model.distance(&y, &x));
        }
    }

    #[test]
    fn custom_metric_is_honored() {
        let manhattan = CostModel::Custom(Box::new(|x, y| {
            x.iter().zip(y).map(|(a, b)| (a - b).abs()).sum()
        }));
        let x = bin(vec![0., 0.]);
        let y = bin(vec![3., 4.]);
        assert!(manhattan.distance(&x, &y) == 7.);
    }

    #[test]
    fn power_knob() {
        assert!(matches!(CostModel::from_power(1), Ok(CostModel::Euclidean)));
        assert!(matches!(
            CostModel::from_power(2),
            Ok(CostModel::SqEuclidean)
        ));
        assert!(matches!(CostModel::from_power(3), Err(Error::Config(_))));
    }
}
