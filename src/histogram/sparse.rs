use super::bin::Bin;
use crate::transport::Density;
use crate::Arbitrary;
use crate::Coordinate;
use crate::Error;
use crate::Mass;
use crate::Result;
use std::collections::BTreeMap;

/// a sparse empirical distribution over the occupied cells of a
/// fixed-width grid.
///
/// built once from a sample matrix (n observations × k dimensions) and a
/// per-dimension bin width; immutable afterwards. samples falling in the
/// same cell accumulate mass, and masses are normalized so the histogram
/// sums to one. bins are kept sorted by multi-index, which makes
/// construction deterministic: identical input always yields the
/// identical bin set in the identical order.
#[derive(Debug, Clone)]
pub struct SparseHistogram {
    widths: Vec<Coordinate>,
    bins: Vec<Bin>,
}

impl SparseHistogram {
    /// bin the sample matrix on the global grid anchored at the origin.
    pub fn from_samples(samples: &[Vec<Coordinate>], widths: &[Coordinate]) -> Result<Self> {
        if samples.is_empty() {
            return Err(Error::EmptyInput("zero samples"));
        }
        if widths.is_empty() {
            return Err(Error::Config("bin width vector must be non-empty"));
        }
        if widths.iter().any(|&w| !(w > 0.) || !w.is_finite()) {
            return Err(Error::Config("bin widths must be positive and finite"));
        }
        let dims = widths.len();
        if samples.iter().any(|x| x.len() != dims) {
            return Err(Error::Config("sample dimension does not match bin widths"));
        }
        let weight = 1. / samples.len() as Mass;
        let mut counts = BTreeMap::<Vec<i64>, Mass>::new();
        for x in samples {
            *counts.entry(Self::grid(x, widths)).or_default() += weight;
        }
        let bins = counts
            .into_iter()
            .map(|(index, mass)| {
                let center = Self::center(&index, widths);
                Bin::new(index, center, mass)
            })
            .collect::<Vec<_>>();
        log::debug!(
            "{:<32}{} samples into {} bins",
            "collected histogram",
            samples.len(),
            bins.len()
        );
        Ok(Self {
            widths: widths.to_vec(),
            bins,
        })
    }

    /// assemble from bins that already carry mass, for callers that did
    /// their own binning. duplicate indices accumulate; masses need not
    /// sum to one, the graph layer applies the mismatch policy.
    pub fn from_bins(bins: Vec<Bin>, widths: Vec<Coordinate>) -> Result<Self> {
        if bins.is_empty() {
            return Err(Error::EmptyInput("zero occupied bins"));
        }
        if widths.iter().any(|&w| !(w > 0.) || !w.is_finite()) {
            return Err(Error::Config("bin widths must be positive and finite"));
        }
        if bins.iter().any(|b| b.dims() != widths.len()) {
            return Err(Error::Config("bin dimension does not match bin widths"));
        }
        if bins.iter().any(|b| !(b.mass() >= 0.) || !b.mass().is_finite()) {
            return Err(Error::Config("bin masses must be non-negative and finite"));
        }
        let mut unique = BTreeMap::<Vec<i64>, Bin>::new();
        for bin in bins {
            let mass = bin.mass();
            unique
                .entry(bin.index().to_vec())
                .and_modify(|b| b.absorb(mass))
                .or_insert(bin);
        }
        Ok(Self {
            widths,
            bins: unique.into_values().collect(),
        })
    }

    /// the occupied bins, sorted by multi-index.
    pub fn bins(&self) -> &[Bin] {
        &self.bins
    }
    pub fn bin(&self, i: usize) -> &Bin {
        &self.bins[i]
    }
    /// number of occupied bins.
    pub fn len(&self) -> usize {
        self.bins.len()
    }
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }
    pub fn dims(&self) -> usize {
        self.widths.len()
    }
    pub fn widths(&self) -> &[Coordinate] {
        &self.widths
    }
    pub fn total_mass(&self) -> Mass {
        self.bins.iter().map(Bin::mass).sum()
    }

    /// the occupied bin whose cell contains the point, if any.
    /// the correction layer uses this to route fresh samples through a
    /// transport plan.
    pub fn locate(&self, point: &[Coordinate]) -> Option<&Bin> {
        if point.len() != self.dims() {
            return None;
        }
        let index = Self::grid(point, &self.widths);
        self.position(&index).map(|i| &self.bins[i])
    }

    /// position of a multi-index within the sorted bin list.
    pub fn position(&self, index: &[i64]) -> Option<usize> {
        self.bins
            .binary_search_by(|bin| bin.index().cmp(index))
            .ok()
    }

    fn grid(point: &[Coordinate], widths: &[Coordinate]) -> Vec<i64> {
        point
            .iter()
            .zip(widths)
            .map(|(x, w)| (x / w).floor() as i64)
            .collect()
    }

    fn center(index: &[i64], widths: &[Coordinate]) -> Vec<Coordinate> {
        index
            .iter()
            .zip(widths)
            .map(|(&i, w)| (i as Coordinate + 0.5) * w)
            .collect()
    }
}

impl Density for SparseHistogram {
    type S = Bin;

    fn density(&self, x: &Self::S) -> Mass {
        self.position(x.index())
            .map(|i| self.bins[i].mass())
            .unwrap_or(0.)
    }
    fn support(&self) -> impl Iterator<Item = &Self::S> {
        self.bins.iter()
    }
}

impl Arbitrary for SparseHistogram {
    fn random() -> Self {
        const N: usize = 64;
        const K: usize = 2;
        let samples = (0..N)
            .map(|_| (0..K).map(|_| rand::random::<f64>()).collect::<Vec<_>>())
            .collect::<Vec<_>>();
        Self::from_samples(&samples, &[0.25; K]).expect("non-degenerate samples")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_samples_is_an_error() {
        let samples: Vec<Vec<f64>> = vec![];
        assert!(matches!(
            SparseHistogram::from_samples(&samples, &[1.]),
            Err(Error::EmptyInput(_))
        ));
    }

    #[test]
    fn nonpositive_width_is_an_error() {
        let samples = vec![vec![0.5]];
        assert!(matches!(
            SparseHistogram::from_samples(&samples, &[0.]),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn duplicates_accumulate_mass() {
        let samples = vec![vec![0.1], vec![0.2], vec![1.5]];
        let h = SparseHistogram::from_samples(&samples, &[1.]).unwrap();
        assert_eq!(h.len(), 2);
        assert!((h.bin(0).mass() - 2. / 3.).abs() < 1e-12);
        assert!((h.bin(1).mass() - 1. / 3.).abs() < 1e-12);
    }

    #[test]
    fn masses_normalize_to_one() {
        let h = SparseHistogram::random();
        assert!((h.total_mass() - 1.).abs() < 1e-9);
    }

    #[test]
    fn construction_is_deterministic() {
        let samples = (0..32)
            .map(|i| vec![(i as f64 * 0.37).sin(), (i as f64 * 0.61).cos()])
            .collect::<Vec<_>>();
        let h1 = SparseHistogram::from_samples(&samples, &[0.2, 0.2]).unwrap();
        let h2 = SparseHistogram::from_samples(&samples, &[0.2, 0.2]).unwrap();
        assert_eq!(h1.len(), h2.len());
        for (a, b) in h1.bins().iter().zip(h2.bins()) {
            assert_eq!(a.index(), b.index());
            assert!(a.mass() == b.mass());
        }
    }

    #[test]
    fn bins_are_sorted_by_index() {
        let h = SparseHistogram::random();
        for pair in h.bins().windows(2) {
            assert!(pair[0].index() < pair[1].index());
        }
    }

    #[test]
    fn locate_roundtrip() {
        let samples = vec![vec![0.1, 0.9], vec![2.3, -1.2]];
        let h = SparseHistogram::from_samples(&samples, &[1., 1.]).unwrap();
        let bin = h.locate(&[2.5, -1.5]).expect("occupied cell");
        assert_eq!(bin.index(), &[2, -2]);
        assert!(h.locate(&[9., 9.]).is_none());
    }

    #[test]
    fn centers_sit_mid_cell() {
        let samples = vec![vec![1.2]];
        let h = SparseHistogram::from_samples(&samples, &[0.5]).unwrap();
        assert_eq!(h.bin(0).index(), &[2]);
        assert!((h.bin(0).center()[0] - 1.25).abs() < 1e-12);
    }

    #[test]
    fn from_bins_accumulates_duplicates() {
        let bins = vec![
            Bin::new(vec![0], vec![0.5], 0.25),
            Bin::new(vec![0], vec![0.5], 0.25),
            Bin::new(vec![1], vec![1.5], 0.5),
        ];
        let h = SparseHistogram::from_bins(bins, vec![1.]).unwrap();
        assert_eq!(h.len(), 2);
        assert!((h.bin(0).mass() - 0.5).abs() < 1e-12);
    }
}
