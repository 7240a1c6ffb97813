use crate::histogram::SparseHistogram;
use crate::metric::CostModel;
use crate::transport::Measure;
use crate::Cost;
use crate::Error;
use crate::Mass;
use crate::Result;
use petgraph::unionfind::UnionFind;
use rayon::prelude::*;
use std::collections::BTreeSet;

/// how many arcs the bipartite formulation carries.
///
/// Dense is the exact formulation: all n·m arcs, O(n·m) memory, viable
/// up to a few thousand occupied bins per histogram. Sparsified keeps
/// only the union of k-nearest arcs in both directions, bounding the
/// arc count to O((n + m)·k); the solution can be slightly suboptimal
/// but is near-optimal in practice, and construction fails loudly when
/// the truncated graph falls apart into disconnected islands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphMode {
    Dense,
    Sparsified { neighbors: usize },
}

/// what to do when the two histograms disagree on total mass beyond
/// tolerance: refuse, or rescale the target masses to the source total.
/// rescaling is logged, never silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MassMismatchPolicy {
    Fail,
    Rescale,
}

/// one directed source→sink arc with its transport cost.
#[derive(Debug, Clone, Copy)]
pub struct Arc {
    pub source: usize,
    pub sink: usize,
    pub cost: Cost,
}

/// the min-cost-flow boundary contract shared by both solver backends:
/// per-arc flow in graph arc order, final node potentials (sources
/// first, then sinks), the objective, and the pivot/augmentation count.
///
/// the potentials certify optimality: for every arc,
/// cost + potential(source) - potential(sink) is non-negative, and zero
/// wherever flow is positive.
#[derive(Debug, Clone)]
pub struct Flows {
    pub flows: Vec<Mass>,
    pub potentials: Vec<Cost>,
    pub cost: Cost,
    pub iterations: usize,
}

/// the bipartite transportation network: one supply node per occupied
/// bin of the source histogram, one demand node per occupied bin of the
/// target, and cost-carrying arcs between them. construction is pure;
/// the histograms are read-only and shared.
#[derive(Debug)]
pub struct TransportGraph {
    supplies: Vec<Mass>,
    demands: Vec<Mass>,
    arcs: Vec<Arc>,
}

impl TransportGraph {
    pub fn build(
        source: &SparseHistogram,
        target: &SparseHistogram,
        model: &CostModel,
        mode: GraphMode,
        policy: MassMismatchPolicy,
        tolerance: f64,
    ) -> Result<Self> {
        if source.is_empty() || target.is_empty() {
            return Err(Error::EmptyInput("histogram with zero occupied bins"));
        }
        if source.dims() != target.dims() {
            return Err(Error::Config("histogram dimensions disagree"));
        }
        let supplies = source.bins().iter().map(|b| b.mass()).collect::<Vec<_>>();
        let mut demands = target.bins().iter().map(|b| b.mass()).collect::<Vec<_>>();
        let supply_total = supplies.iter().sum::<Mass>();
        let demand_total = demands.iter().sum::<Mass>();
        if (supply_total - demand_total).abs() > tolerance {
            match policy {
                MassMismatchPolicy::Fail => {
                    return Err(Error::MassMismatch {
                        source_total: supply_total,
                        target_total: demand_total,
                    });
                }
                MassMismatchPolicy::Rescale => {
                    let factor = supply_total / demand_total;
                    log::info!(
                        "{:<32}target total {} rescaled by {}",
                        "mass mismatch",
                        demand_total,
                        factor
                    );
                    demands.iter_mut().for_each(|d| *d *= factor);
                }
            }
        }
        let arcs = match mode {
            GraphMode::Dense => Self::dense(source, target, model),
            GraphMode::Sparsified { neighbors } => Self::sparsified(source, target, model, neighbors)?,
        };
        log::debug!(
            "{:<32}{} x {} bins, {} arcs",
            "built transport graph",
            supplies.len(),
            demands.len(),
            arcs.len()
        );
        Ok(Self {
            supplies,
            demands,
            arcs,
        })
    }

    pub fn n_sources(&self) -> usize {
        self.supplies.len()
    }
    pub fn n_sinks(&self) -> usize {
        self.demands.len()
    }
    pub fn supplies(&self) -> &[Mass] {
        &self.supplies
    }
    pub fn demands(&self) -> &[Mass] {
        &self.demands
    }
    /// arcs in (source, sink) lexicographic order.
    pub fn arcs(&self) -> &[Arc] {
        &self.arcs
    }

    /// all n·m arcs. cost evaluation is independent per pair, so rows
    /// are filled across worker threads; the row-major collection keeps
    /// the lexicographic arc order deterministic.
    fn dense(source: &SparseHistogram, target: &SparseHistogram, model: &CostModel) -> Vec<Arc> {
        (0..source.len())
            .into_par_iter()
            .map(|i| {
                (0..target.len())
                    .map(|j| Arc {
                        source: i,
                        sink: j,
                        cost: model.distance(source.bin(i), target.bin(j)),
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// union of the k nearest sinks per source and the k nearest
    /// sources per sink. every node keeps at least one arc, but the
    /// union can still split into islands; that is checked here and
    /// surfaced rather than letting the solver chase an unreachable
    /// demand.
    fn sparsified(
        source: &SparseHistogram,
        target: &SparseHistogram,
        model: &CostModel,
        neighbors: usize,
    ) -> Result<Vec<Arc>> {
        if neighbors == 0 {
            return Err(Error::Config("sparsified mode needs at least one neighbor"));
        }
        let n = source.len();
        let m = target.len();
        let forward = (0..n)
            .into_par_iter()
            .map(|i| {
                Self::nearest(m, neighbors, |j| model.distance(source.bin(i), target.bin(j)))
                    .into_iter()
                    .map(|j| (i, j))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let backward = (0..m)
            .into_par_iter()
            .map(|j| {
                Self::nearest(n, neighbors, |i| model.distance(source.bin(i), target.bin(j)))
                    .into_iter()
                    .map(|i| (i, j))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let pairs = forward
            .into_iter()
            .chain(backward)
            .flatten()
            .collect::<BTreeSet<_>>();
        let mut components = UnionFind::<usize>::new(n + m);
        for &(i, j) in &pairs {
            components.union(i, n + j);
        }
        let root = components.find(0);
        if (0..n + m).any(|v| components.find(v) != root) {
            return Err(Error::InfeasibleGraph(
                "sparsified graph is disconnected; raise k_neighbors or use dense mode",
            ));
        }
        Ok(pairs
            .into_iter()
            .map(|(i, j)| Arc {
                source: i,
                sink: j,
                cost: model.distance(source.bin(i), target.bin(j)),
            })
            .collect())
    }

    /// indices of the k nearest candidates under the distance closure,
    /// ties broken by lowest index.
    fn nearest(candidates: usize, k: usize, distance: impl Fn(usize) -> Cost) -> Vec<usize> {
        let mut order = (0..candidates)
            .map(|j| (distance(j), j))
            .collect::<Vec<_>>();
        order.sort_by(|a, b| a.partial_cmp(b).expect("finite costs"));
        order.truncate(k);
        order.into_iter().map(|(_, j)| j).collect()
    }
}
