use crate::augmenting;
use crate::graph::GraphMode;
use crate::graph::MassMismatchPolicy;
use crate::graph::TransportGraph;
use crate::histogram::Bin;
use crate::histogram::SparseHistogram;
use crate::metric::CostModel;
use crate::plan::TransportPlan;
use crate::simplex::NetworkSimplex;
use crate::transport::Coupling;
use crate::Cost;
use crate::Mass;
use crate::Result;

/// which min-cost-flow engine runs the solve. both produce the optimal
/// objective within tolerance and a valid plan; the network simplex is
/// the default, the augmenting-path engine exists as an independent
/// cross-check and a fallback. a plain tagged variant keeps the choice
/// out of the pivot loop's hot path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    NetworkSimplex,
    AugmentingPaths,
}

/// everything the caller can turn: graph construction mode, mass
/// mismatch policy, solver backend, cost model, the pivot budget and
/// the numerical tolerance used for every mass and cost comparison.
pub struct Config {
    pub mode: GraphMode,
    pub policy: MassMismatchPolicy,
    pub backend: Backend,
    pub cost: CostModel,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: GraphMode::Dense,
            policy: MassMismatchPolicy::Fail,
            backend: Backend::NetworkSimplex,
            cost: CostModel::SqEuclidean,
            max_iterations: 100_000,
            tolerance: 1e-9,
        }
    }
}

/// solve the discrete optimal transport problem between two sparse
/// histograms: build the bipartite flow network, run the configured
/// backend, assemble the plan. the single synchronous entry point of
/// the crate; no state survives the call.
pub fn transport(
    source: &SparseHistogram,
    target: &SparseHistogram,
    config: &Config,
) -> Result<TransportPlan> {
    let graph = TransportGraph::build(
        source,
        target,
        &config.cost,
        config.mode,
        config.policy,
        config.tolerance,
    )?;
    let flows = match config.backend {
        Backend::NetworkSimplex => {
            NetworkSimplex::new(&graph, config.tolerance, config.max_iterations).solve()?
        }
        Backend::AugmentingPaths => {
            augmenting::solve(&graph, config.tolerance, config.max_iterations)?
        }
    };
    log::info!(
        "{:<32}{} entries, cost {}",
        "optimal transport solved",
        flows.flows.iter().filter(|&&f| f > config.tolerance).count(),
        flows.cost
    );
    Ok(TransportPlan::from_flows(&graph, &flows, config.tolerance))
}

/// the Coupling view of the solver, for callers that live on the trait
/// seams rather than on the plan directly.
pub struct OptimalTransport<'a> {
    source: &'a SparseHistogram,
    target: &'a SparseHistogram,
    config: Config,
    plan: Option<TransportPlan>,
}

impl OptimalTransport<'_> {
    /// the solved plan; callers wanting marginals or conditionals reach
    /// through here after minimize().
    pub fn plan(&self) -> &TransportPlan {
        self.plan.as_ref().expect("minimized coupling")
    }
}

impl<'a> From<(&'a SparseHistogram, &'a SparseHistogram, Config)> for OptimalTransport<'a> {
    fn from((source, target, config): (&'a SparseHistogram, &'a SparseHistogram, Config)) -> Self {
        Self {
            source,
            target,
            config,
            plan: None,
        }
    }
}

impl Coupling for OptimalTransport<'_> {
    type X = Bin;
    type Y = Bin;
    type M = CostModel;
    type P = SparseHistogram;
    type Q = SparseHistogram;

    fn minimize(mut self) -> Result<Self> {
        self.plan = Some(transport(self.source, self.target, &self.config)?);
        Ok(self)
    }
    fn flow(&self, x: &Self::X, y: &Self::Y) -> Mass {
        match (
            self.source.position(x.index()),
            self.target.position(y.index()),
        ) {
            (Some(i), Some(j)) => self.plan().mass(i, j),
            _ => 0.,
        }
    }
    fn cost(&self) -> Cost {
        self.plan().cost()
    }
}
