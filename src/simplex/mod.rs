use crate::graph::Flows;
use crate::graph::TransportGraph;
use crate::Cost;
use crate::Error;
use crate::Mass;
use crate::Result;

/// spanning-tree primal network simplex, specialized to the balanced
/// uncapacitated transportation problem.
///
/// the basis is a spanning tree rooted at an artificial node; every real
/// node hangs off the root through an artificial arc in the initial
/// solution, and pivots swap real arcs into the tree until no arc prices
/// out negative. the tree is stored in the classic threaded form
/// (parent / predecessor arc / thread / reverse thread / subtree size /
/// last successor), so potentials update by a single subtree traversal
/// per pivot rather than a full recomputation.
///
/// determinism: the entering arc is the most negative reduced cost with
/// ties resolved to the lowest arc index, and arcs are laid out in
/// (source, sink) lexicographic order; the leaving arc takes the
/// tightest bound on the cycle, ties again to the lowest arc index.
/// identical graphs therefore pivot identically, bit for bit.
pub struct NetworkSimplex<'a> {
    graph: &'a TransportGraph,
    tolerance: f64,
    max_iterations: usize,

    // arc arrays: real arcs first, one artificial arc per node after
    source: Vec<usize>,
    target: Vec<usize>,
    cost: Vec<Cost>,
    flow: Vec<Mass>,
    state: Vec<i8>, // 1 = out of tree at lower bound, 0 = in tree

    // threaded spanning tree over nodes 0..n+m plus the root
    supply: Vec<Mass>,
    pi: Vec<Cost>,
    parent: Vec<Option<usize>>,
    pred: Vec<Option<usize>>,
    sign: Vec<f64>, // +1: predecessor arc points node → parent
    thread: Vec<usize>,
    rev_thread: Vec<usize>,
    succ_count: Vec<usize>,
    last_succ: Vec<usize>,
    root: usize,

    // scratch state for the current pivot
    in_arc: usize,
    join: usize,
    u_in: usize,
    v_in: usize,
    u_out: usize,
    delta: Mass,
    dirty_revs: Vec<usize>,
}

impl<'a> NetworkSimplex<'a> {
    pub fn new(graph: &'a TransportGraph, tolerance: f64, max_iterations: usize) -> Self {
        let n = graph.n_sources();
        let m = graph.n_sinks();
        let nodes = n + m;
        let real = graph.arcs().len();
        let mut source = Vec::with_capacity(real + nodes);
        let mut target = Vec::with_capacity(real + nodes);
        let mut cost = Vec::with_capacity(real + nodes);
        for arc in graph.arcs() {
            source.push(arc.source);
            target.push(n + arc.sink);
            cost.push(arc.cost);
        }
        let supply = graph
            .supplies()
            .iter()
            .copied()
            .chain(graph.demands().iter().map(|&d| -d))
            .collect::<Vec<_>>();
        Self {
            graph,
            tolerance,
            max_iterations,
            source,
            target,
            cost,
            flow: vec![],
            state: vec![],
            supply,
            pi: vec![],
            parent: vec![],
            pred: vec![],
            sign: vec![],
            thread: vec![],
            rev_thread: vec![],
            succ_count: vec![],
            last_succ: vec![],
            root: nodes,
            in_arc: 0,
            join: 0,
            u_in: 0,
            v_in: 0,
            u_out: 0,
            delta: 0.,
            dirty_revs: vec![],
        }
    }

    /// run pivots to optimality, or fail with the typed condition.
    pub fn solve(mut self) -> Result<Flows> {
        self.initialize();
        let mut pivots = 0usize;
        while self.entering() {
            if pivots >= self.max_iterations {
                let real = self.graph.arcs().len();
                return Err(Error::NonConvergence {
                    iterations: pivots,
                    cost: self.objective(),
                    flows: self.flow[..real].to_vec(),
                });
            }
            pivots += 1;
            self.find_join();
            if !self.leaving() {
                return Err(Error::InfeasibleGraph("unbounded pivot cycle"));
            }
            self.change_flow();
            self.update_tree();
            self.update_potentials();
        }
        log::debug!("{:<32}{} pivots", "network simplex converged", pivots);
        let residual = self.artificial_residual();
        if residual > self.tolerance {
            return Err(Error::InfeasibleGraph(
                "mass left on artificial arcs after convergence",
            ));
        }
        let real = self.graph.arcs().len();
        Ok(Flows {
            flows: self.flow[..real].to_vec(),
            potentials: self.pi[..self.root].to_vec(),
            cost: self.objective(),
            iterations: pivots,
        })
    }

    /// the initial basic feasible solution: every node connected to the
    /// artificial root, oriented by the sign of its supply, with big-M
    /// cost on the arcs that would hide unmet demand.
    fn initialize(&mut self) {
        let nodes = self.root;
        let real = self.graph.arcs().len();
        let all = real + nodes;
        let max_cost = self.cost.iter().fold(0., |max: Cost, &c| max.max(c));
        let big_m = (max_cost + 1.) * nodes as Cost;
        self.flow = vec![0.; all];
        self.state = vec![1; all];
        self.pi = vec![0.; nodes + 1];
        self.parent = vec![None; nodes + 1];
        self.pred = vec![None; nodes + 1];
        self.sign = vec![1.; nodes + 1];
        self.thread = vec![0; nodes + 1];
        self.rev_thread = vec![0; nodes + 1];
        self.succ_count = vec![1; nodes + 1];
        self.last_succ = vec![0; nodes + 1];
        self.source.resize(all, 0);
        self.target.resize(all, 0);
        self.cost.resize(all, 0.);

        self.thread[self.root] = 0;
        self.rev_thread[0] = self.root;
        self.succ_count[self.root] = nodes + 1;
        self.last_succ[self.root] = nodes - 1;

        for u in 0..nodes {
            let e = real + u;
            self.parent[u] = Some(self.root);
            self.pred[u] = Some(e);
            self.thread[u] = u + 1;
            self.rev_thread[u + 1] = u;
            self.last_succ[u] = u;
            self.state[e] = 0;
            if self.supply[u] >= 0. {
                // supply node ships straight to the root at zero cost
                self.sign[u] = 1.;
                self.pi[u] = 0.;
                self.source[e] = u;
                self.target[e] = self.root;
                self.flow[e] = self.supply[u];
                self.cost[e] = 0.;
            } else {
                // demand node is fed from the root at prohibitive cost
                self.sign[u] = -1.;
                self.pi[u] = big_m;
                self.source[e] = self.root;
                self.target[e] = u;
                self.flow[e] = -self.supply[u];
                self.cost[e] = big_m;
            }
        }
    }

    /// reduced cost of an arc under the current potentials:
    /// cost + pi(source) - pi(target).
    fn reduced_cost(&self, e: usize) -> Cost {
        self.cost[e] + self.pi[self.source[e]] - self.pi[self.target[e]]
    }

    /// most negative reduced cost over the non-tree arcs, lowest index
    /// on ties. returns false when no arc prices out below the scaled
    /// epsilon, i.e. the current tree is optimal.
    fn entering(&mut self) -> bool {
        let real = self.graph.arcs().len();
        let mut best = 0.;
        let mut found = false;
        for e in 0..real {
            if self.state[e] == 0 {
                continue;
            }
            let rc = self.reduced_cost(e);
            if rc < best {
                best = rc;
                self.in_arc = e;
                found = true;
            }
        }
        if !found {
            return false;
        }
        let scale = 1f64
            .max(self.cost[self.in_arc].abs())
            .max(self.pi[self.source[self.in_arc]].abs())
            .max(self.pi[self.target[self.in_arc]].abs());
        best < -self.tolerance * scale
    }

    /// deepest common ancestor of the entering arc's endpoints; the
    /// cycle closes there. subtree sizes stand in for depth.
    fn find_join(&mut self) {
        let mut u = self.source[self.in_arc];
        let mut v = self.target[self.in_arc];
        while u != v {
            if self.succ_count[u] < self.succ_count[v] {
                u = self.parent[u].expect("non-root has a parent");
            } else {
                v = self.parent[v].expect("non-root has a parent");
            }
        }
        self.join = u;
    }

    /// tightest flow bound around the cycle; the arc that hits zero
    /// leaves the tree. the entering arc is uncapacitated, so only tree
    /// arcs oriented against the cycle bound the step. ties go to the
    /// lowest arc index.
    fn leaving(&mut self) -> bool {
        let first = self.source[self.in_arc];
        let second = self.target[self.in_arc];
        self.delta = Mass::INFINITY;
        let mut out_arc = usize::MAX;
        let mut second_side = false;

        let mut u = first;
        while u != self.join {
            let e = self.pred[u].expect("cycle node has a predecessor");
            let d = if self.sign[u] < 0. {
                Mass::INFINITY
            } else {
                self.flow[e]
            };
            if d < self.delta || (d == self.delta && d.is_finite() && e < out_arc) {
                self.delta = d;
                self.u_out = u;
                out_arc = e;
                second_side = false;
            }
            u = self.parent[u].expect("cycle node has a parent");
        }
        let mut u = second;
        while u != self.join {
            let e = self.pred[u].expect("cycle node has a predecessor");
            let d = if self.sign[u] > 0. {
                Mass::INFINITY
            } else {
                self.flow[e]
            };
            if d < self.delta || (d == self.delta && d.is_finite() && e < out_arc) {
                self.delta = d;
                self.u_out = u;
                out_arc = e;
                second_side = true;
            }
            u = self.parent[u].expect("cycle node has a parent");
        }
        if out_arc == usize::MAX {
            return false;
        }
        if second_side {
            self.u_in = second;
            self.v_in = first;
        } else {
            self.u_in = first;
            self.v_in = second;
        }
        true
    }

    /// push delta around the cycle and swap the entering and leaving
    /// arcs. degenerate pivots (delta = 0) swap without moving mass.
    fn change_flow(&mut self) {
        if self.delta > 0. {
            self.flow[self.in_arc] += self.delta;
            let mut u = self.source[self.in_arc];
            while u != self.join {
                let e = self.pred[u].expect("cycle node has a predecessor");
                self.flow[e] -= self.sign[u] * self.delta;
                u = self.parent[u].expect("cycle node has a parent");
            }
            let mut u = self.target[self.in_arc];
            while u != self.join {
                let e = self.pred[u].expect("cycle node has a predecessor");
                self.flow[e] += self.sign[u] * self.delta;
                u = self.parent[u].expect("cycle node has a parent");
            }
        }
        let out = self.pred[self.u_out].expect("leaving node has a predecessor");
        self.state[self.in_arc] = 0;
        self.state[out] = 1;
        // the leaving arc is at its lower bound by construction; pin the
        // rounding residue to an exact zero
        self.flow[out] = 0.;
    }

    /// re-hang the subtree cut off by the leaving arc under the entering
    /// arc, keeping the threaded representation consistent. this is the
    /// standard stem-reversal walk from u_out down to u_in.
    fn update_tree(&mut self) {
        let old_rev_thread = self.rev_thread[self.u_out];
        let old_succ_count = self.succ_count[self.u_out];
        let old_last_succ = self.last_succ[self.u_out];
        let v_out = self.parent[self.u_out].expect("leaving node has a parent");

        if self.u_in == self.u_out {
            // the cut subtree hangs directly under the entering arc
            self.parent[self.u_in] = Some(self.v_in);
            self.pred[self.u_in] = Some(self.in_arc);
            self.sign[self.u_in] = if self.u_in == self.source[self.in_arc] {
                1.
            } else {
                -1.
            };
            if self.thread[self.v_in] != self.u_out {
                let mut after = self.thread[old_last_succ];
                self.thread[old_rev_thread] = after;
                self.rev_thread[after] = old_rev_thread;
                after = self.thread[self.v_in];
                self.thread[self.v_in] = self.u_out;
                self.rev_thread[self.u_out] = self.v_in;
                self.thread[old_last_succ] = after;
                self.rev_thread[after] = old_last_succ;
            }
        } else {
            // reverse the stem u_in..u_out, re-threading each displaced
            // subtree as it moves
            let thread_continue = if old_rev_thread == self.v_in {
                self.thread[old_last_succ]
            } else {
                self.thread[self.v_in]
            };
            let mut stem = self.u_in;
            let mut stem_parent = self.v_in;
            let mut last = self.last_succ[self.u_in];
            let mut after = self.thread[last];
            self.thread[self.v_in] = self.u_in;
            self.dirty_revs.clear();
            self.dirty_revs.push(self.v_in);
            while stem != self.u_out {
                let next_stem = self.parent[stem].expect("stem node has a parent");
                self.thread[last] = next_stem;
                self.dirty_revs.push(last);
                let before = self.rev_thread[stem];
                self.thread[before] = after;
                self.rev_thread[after] = before;
                self.parent[stem] = Some(stem_parent);
                stem_parent = stem;
                stem = next_stem;
                last = if self.last_succ[stem] == self.last_succ[stem_parent] {
                    self.rev_thread[stem_parent]
                } else {
                    self.last_succ[stem]
                };
                after = self.thread[last];
            }
            self.parent[self.u_out] = Some(stem_parent);
            self.thread[last] = thread_continue;
            self.rev_thread[thread_continue] = last;
            self.last_succ[self.u_out] = last;
            if old_rev_thread != self.v_in {
                self.thread[old_rev_thread] = after;
                self.rev_thread[after] = old_rev_thread;
            }
            for i in 0..self.dirty_revs.len() {
                let u = self.dirty_revs[i];
                self.rev_thread[self.thread[u]] = u;
            }

            // predecessor data flips along the reversed stem
            let mut running_succ = 0;
            let stem_last_succ = self.last_succ[self.u_out];
            let mut u = self.u_out;
            let mut p = self.parent[u];
            while u != self.u_in {
                let parent = p.expect("stem node has a parent");
                self.pred[u] = self.pred[parent];
                self.sign[u] = -self.sign[parent];
                running_succ += self.succ_count[u] - self.succ_count[parent];
                self.succ_count[u] = running_succ;
                self.last_succ[parent] = stem_last_succ;
                u = parent;
                p = self.parent[u];
            }
            self.pred[self.u_in] = Some(self.in_arc);
            self.sign[self.u_in] = if self.u_in == self.source[self.in_arc] {
                1.
            } else {
                -1.
            };
            self.succ_count[self.u_in] = old_succ_count;
        }

        // propagate last-successor corrections toward the root
        let up_limit = if self.last_succ[self.join] == self.v_in {
            Some(self.join)
        } else {
            None
        };
        let last_succ_out = self.last_succ[self.u_out];
        let mut u = Some(self.v_in);
        while let Some(node) = u {
            if self.last_succ[node] != self.v_in {
                break;
            }
            self.last_succ[node] = last_succ_out;
            u = self.parent[node];
        }
        if self.join != old_rev_thread && self.v_in != old_rev_thread {
            let mut u = Some(v_out);
            while let Some(node) = u {
                if u == up_limit || self.last_succ[node] != old_last_succ {
                    break;
                }
                self.last_succ[node] = old_rev_thread;
                u = self.parent[node];
            }
        } else if last_succ_out != old_last_succ {
            let mut u = Some(v_out);
            while let Some(node) = u {
                if u == up_limit || self.last_succ[node] != old_last_succ {
                    break;
                }
                self.last_succ[node] = last_succ_out;
                u = self.parent[node];
            }
        }

        // subtree sizes shift from the leaving branch to the entering one
        let mut u = self.v_in;
        while u != self.join {
            self.succ_count[u] += old_succ_count;
            u = self.parent[u].expect("non-join node has a parent");
        }
        let mut u = v_out;
        while u != self.join {
            self.succ_count[u] -= old_succ_count;
            u = self.parent[u].expect("non-join node has a parent");
        }
    }

    /// potentials change by a constant on the re-hung subtree; one
    /// thread traversal applies it.
    fn update_potentials(&mut self) {
        let sigma = -self.cost[self.in_arc] * self.sign[self.u_in] + self.pi[self.v_in]
            - self.pi[self.u_in];
        let end = self.thread[self.last_succ[self.u_in]];
        let mut u = self.u_in;
        while u != end {
            self.pi[u] += sigma;
            u = self.thread[u];
        }
    }

    fn artificial_residual(&self) -> Mass {
        let real = self.graph.arcs().len();
        self.flow[real..]
            .iter()
            .fold(0., |max: Mass, &f| max.max(f))
    }

    fn objective(&self) -> Cost {
        let real = self.graph.arcs().len();
        (0..real).map(|e| self.flow[e] * self.cost[e]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphMode;
    use crate::graph::MassMismatchPolicy;
    use crate::histogram::SparseHistogram;
    use crate::metric::CostModel;
    use crate::Arbitrary;

    const TOLERANCE: f64 = 1e-9;

    fn dense(a: &SparseHistogram, b: &SparseHistogram) -> TransportGraph {
        TransportGraph::build(
            a,
            b,
            &CostModel::default(),
            GraphMode::Dense,
            MassMismatchPolicy::Fail,
            TOLERANCE,
        )
        .unwrap()
    }

    #[test]
    fn certificate_holds_on_random_instances() {
        // no non-tree arc may price out negative under the final duals
        let a = SparseHistogram::random();
        let b = SparseHistogram::random();
        let graph = dense(&a, &b);
        let flows = NetworkSimplex::new(&graph, TOLERANCE, 100_000)
            .solve()
            .unwrap();
        for (e, arc) in graph.arcs().iter().enumerate() {
            let rc = arc.cost + flows.potentials[arc.source]
                - flows.potentials[graph.n_sources() + arc.sink];
            assert!(
                rc >= -1e-6,
                "arc {e} prices out negative: {rc}"
            );
        }
    }

    #[test]
    fn flows_conserve_mass() {
        let a = SparseHistogram::random();
        let b = SparseHistogram::random();
        let graph = dense(&a, &b);
        let flows = NetworkSimplex::new(&graph, TOLERANCE, 100_000)
            .solve()
            .unwrap();
        let mut out = vec![0.; graph.n_sources()];
        let mut into = vec![0.; graph.n_sinks()];
        for (arc, &f) in graph.arcs().iter().zip(&flows.flows) {
            assert!(f >= 0.);
            out[arc.source] += f;
            into[arc.sink] += f;
        }
        for (i, &supply) in graph.supplies().iter().enumerate() {
            assert!((out[i] - supply).abs() < 1e-6, "source {i} leaks mass");
        }
        for (j, &demand) in graph.demands().iter().enumerate() {
            assert!((into[j] - demand).abs() < 1e-6, "sink {j} leaks mass");
        }
    }

    #[test]
    fn pivots_are_deterministic() {
        let a = SparseHistogram::random();
        let b = SparseHistogram::random();
        let graph = dense(&a, &b);
        let one = NetworkSimplex::new(&graph, TOLERANCE, 100_000)
            .solve()
            .unwrap();
        let two = NetworkSimplex::new(&graph, TOLERANCE, 100_000)
            .solve()
            .unwrap();
        assert!(one.cost == two.cost);
        assert!(one.iterations == two.iterations);
        assert!(one.flows == two.flows);
        assert!(one.potentials == two.potentials);
    }

    #[test]
    fn iteration_cap_is_fatal() {
        let a = SparseHistogram::random();
        let b = SparseHistogram::random();
        let graph = dense(&a, &b);
        let err = NetworkSimplex::new(&graph, TOLERANCE, 0).solve().unwrap_err();
        assert!(matches!(err, Error::NonConvergence { .. }));
    }
}
