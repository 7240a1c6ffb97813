use crate::graph::Flows;
use crate::graph::TransportGraph;
use crate::Cost;
use crate::Error;
use crate::Mass;
use crate::Result;
use std::collections::BinaryHeap;

/// successive shortest augmenting paths, the second solver backend.
///
/// honors the same boundary contract as the network simplex: the same
/// graph goes in, per-arc flows and dual potentials come out, and the
/// objective agrees within tolerance. each round runs Dijkstra over the
/// residual network under reduced costs (all non-negative by the
/// potential invariant), augments along the cheapest path from the
/// lowest-index unsaturated source to the cheapest unmet sink, and
/// lifts the potentials by the shortest-path distances.
pub fn solve(graph: &TransportGraph, tolerance: f64, max_iterations: usize) -> Result<Flows> {
    let n = graph.n_sources();
    let m = graph.n_sinks();
    let arcs = graph.arcs();
    let mut outgoing = vec![vec![]; n];
    let mut incoming = vec![vec![]; m];
    for (e, arc) in arcs.iter().enumerate() {
        outgoing[arc.source].push(e);
        incoming[arc.sink].push(e);
    }
    let mut flow = vec![0.; arcs.len()];
    let mut pi = vec![0.; n + m];
    let mut supply = graph.supplies().to_vec();
    let mut demand = graph.demands().to_vec();
    let mut rounds = 0usize;

    while let Some(s) = (0..n).find(|&i| supply[i] > tolerance) {
        if rounds >= max_iterations {
            return Err(Error::NonConvergence {
                iterations: rounds,
                cost: objective(graph, &flow),
                flows: flow,
            });
        }
        rounds += 1;

        // Dijkstra over the residual network under reduced costs
        let mut dist = vec![Cost::INFINITY; n + m];
        let mut prev = vec![usize::MAX; n + m];
        let mut heap = BinaryHeap::new();
        dist[s] = 0.;
        heap.push(Visit { dist: 0., node: s });
        while let Some(Visit { dist: d, node: u }) = heap.pop() {
            if d > dist[u] {
                continue;
            }
            if u < n {
                for &e in &outgoing[u] {
                    let v = n + arcs[e].sink;
                    let w = d + arcs[e].cost + pi[u] - pi[v];
                    if w < dist[v] {
                        dist[v] = w;
                        prev[v] = e;
                        heap.push(Visit { dist: w, node: v });
                    }
                }
            } else {
                for &e in &incoming[u - n] {
                    if flow[e] <= tolerance {
                        continue;
                    }
                    let v = arcs[e].source;
                    let w = d - arcs[e].cost + pi[u] - pi[v];
                    if w < dist[v] {
                        dist[v] = w;
                        prev[v] = e;
                        heap.push(Visit { dist: w, node: v });
                    }
                }
            }
        }

        // cheapest reachable sink with unmet demand, lowest index on ties
        let t = (0..m)
            .filter(|&j| demand[j] > tolerance && dist[n + j].is_finite())
            .min_by(|&a, &b| {
                (dist[n + a], a)
                    .partial_cmp(&(dist[n + b], b))
                    .expect("finite distances")
            });
        let Some(t) = t else {
            return Err(Error::InfeasibleGraph(
                "no augmenting path reaches unmet demand",
            ));
        };

        // lift potentials so every residual arc stays non-negative
        let lift = dist[n + t];
        for v in 0..n + m {
            if dist[v].is_finite() {
                pi[v] += dist[v].min(lift);
            }
        }

        // bottleneck along the path, then push
        let mut theta = supply[s].min(demand[t]);
        let mut v = n + t;
        while v != s {
            let e = prev[v];
            if v == n + arcs[e].sink {
                v = arcs[e].source;
            } else {
                theta = theta.min(flow[e]);
                v = n + arcs[e].sink;
            }
        }
        let mut v = n + t;
        while v != s {
            let e = prev[v];
            if v == n + arcs[e].sink {
                flow[e] += theta;
                v = arcs[e].source;
            } else {
                flow[e] -= theta;
                v = n + arcs[e].sink;
            }
        }
        supply[s] -= theta;
        demand[t] -= theta;
    }
    log::debug!("{:<32}{} augmentations", "augmenting paths converged", rounds);
    Ok(Flows {
        cost: objective(graph, &flow),
        flows: flow,
        potentials: pi,
        iterations: rounds,
    })
}

fn objective(graph: &TransportGraph, flow: &[Mass]) -> Cost {
    graph
        .arcs()
        .iter()
        .zip(flow)
        .map(|(arc, &f)| arc.cost * f)
        .sum()
}

/// heap entry; reversed ordering turns the max-heap into a min-heap,
/// with the node index as the deterministic tie-break.
struct Visit {
    dist: Cost,
    node: usize,
}

impl PartialEq for Visit {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist && self.node == other.node
    }
}
impl Eq for Visit {}
impl PartialOrd for Visit {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Visit {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .expect("finite distances")
            .then(other.node.cmp(&self.node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphMode;
    use crate::graph::MassMismatchPolicy;
    use crate::histogram::SparseHistogram;
    use crate::metric::CostModel;
    use crate::simplex::NetworkSimplex;
    use crate::Arbitrary;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn backends_agree_on_random_instances() {
        for _ in 0..8 {
            let a = SparseHistogram::random();
            let b = SparseHistogram::random();
            let graph = TransportGraph::build(
                &a,
                &b,
                &CostModel::default(),
                GraphMode::Dense,
                MassMismatchPolicy::Fail,
                TOLERANCE,
            )
            .unwrap();
            let simplex = NetworkSimplex::new(&graph, TOLERANCE, 100_000)
                .solve()
                .unwrap();
            let paths = solve(&graph, TOLERANCE, 100_000).unwrap();
            assert!(
                (simplex.cost - paths.cost).abs() < 1e-6,
                "backends disagree: {} vs {}",
                simplex.cost,
                paths.cost
            );
        }
    }

    #[test]
    fn augmentations_conserve_mass() {
        let a = SparseHistogram::random();
        let b = SparseHistogram::random();
        let graph = TransportGraph::build(
            &a,
            &b,
            &CostModel::default(),
            GraphMode::Dense,
            MassMismatchPolicy::Fail,
            TOLERANCE,
        )
        .unwrap();
        let flows = solve(&graph, TOLERANCE, 100_000).unwrap();
        let mut out = vec![0.; graph.n_sources()];
        for (arc, &f) in graph.arcs().iter().zip(&flows.flows) {
            assert!(f >= -TOLERANCE);
            out[arc.source] += f;
        }
        for (i, &s) in graph.supplies().iter().enumerate() {
            assert!((out[i] - s).abs() < 1e-6, "source {i} leaks mass");
        }
    }
}
