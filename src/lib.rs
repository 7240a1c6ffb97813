pub mod augmenting;
pub mod graph;
pub mod histogram;
pub mod metric;
pub mod plan;
pub mod simplex;
pub mod solve;
pub mod transport;

pub type Mass = f64;
pub type Cost = f64;
pub type Coordinate = f64;

/// earthmover error variants.
///
/// every failure propagates to the caller as one of these; the crate never
/// retries internally. NonConvergence carries the objective of the best flow
/// found as diagnostic context, not as a usable result.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("empty input: {0}")]
    EmptyInput(&'static str),
    #[error("configuration error: {0}")]
    Config(&'static str),
    #[error("mass mismatch: source total {source_total} vs target total {target_total}")]
    MassMismatch { source_total: Mass, target_total: Mass },
    #[error("infeasible transport graph: {0}")]
    InfeasibleGraph(&'static str),
    #[error("no convergence after {iterations} pivots (best cost {cost})")]
    NonConvergence {
        iterations: usize,
        cost: Cost,
        /// best per-arc flow reached before the cap, in graph arc order.
        /// diagnostic only, never a valid plan.
        flows: Vec<Mass>,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// trait for generating random instances of a type.
/// used to sample histograms and transport problems in tests and benches.
pub trait Arbitrary {
    fn random() -> Self;
}
