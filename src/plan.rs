use crate::graph::Flows;
use crate::graph::TransportGraph;
use crate::Cost;
use crate::Mass;
use std::collections::BTreeMap;

/// the solved coupling: transported mass per (source bin, target bin)
/// pair, assembled purely from the final arc flows. entries at or below
/// the assembly tolerance are dropped, so iteration only ever sees
/// strictly positive mass, in deterministic (source, sink) order.
///
/// a basic optimal solution lives on a spanning tree, so the number of
/// entries is bounded by n_sources + n_sinks - 1.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportPlan {
    entries: BTreeMap<(usize, usize), Mass>,
    cost: Cost,
    n_sources: usize,
    n_sinks: usize,
}

impl TransportPlan {
    pub fn from_flows(graph: &TransportGraph, flows: &Flows, tolerance: f64) -> Self {
        let entries = graph
            .arcs()
            .iter()
            .zip(&flows.flows)
            .filter(|&(_, &f)| f > tolerance)
            .map(|(arc, &f)| ((arc.source, arc.sink), f))
            .collect::<BTreeMap<_, _>>();
        Self {
            entries,
            cost: flows.cost,
            n_sources: graph.n_sources(),
            n_sinks: graph.n_sinks(),
        }
    }

    /// strictly positive entries in (source, sink) order.
    pub fn entries(&self) -> impl Iterator<Item = (usize, usize, Mass)> + '_ {
        self.entries.iter().map(|(&(i, j), &mass)| (i, j, mass))
    }
    /// transported mass between a source and a sink bin, zero if the
    /// pair is not in the support of the plan.
    pub fn mass(&self, source: usize, sink: usize) -> Mass {
        self.entries.get(&(source, sink)).copied().unwrap_or(0.)
    }
    /// optimal total transport cost, Σ flow × cost over all entries.
    pub fn cost(&self) -> Cost {
        self.cost
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    pub fn n_sources(&self) -> usize {
        self.n_sources
    }
    pub fn n_sinks(&self) -> usize {
        self.n_sinks
    }

    /// total mass leaving a source bin; equals its histogram mass for a
    /// conserving plan.
    pub fn outflow(&self, source: usize) -> Mass {
        self.entries
            .range((source, 0)..(source + 1, 0))
            .map(|(_, &mass)| mass)
            .sum()
    }
    /// total mass arriving at a sink bin; equals its histogram mass for
    /// a conserving plan.
    pub fn inflow(&self, sink: usize) -> Mass {
        self.entries
            .iter()
            .filter(|&(&(_, j), _)| j == sink)
            .map(|(_, &mass)| mass)
            .sum()
    }

    /// conditional distribution over sinks given a source bin: the row
    /// of the plan normalized to one. the correction layer samples from
    /// this to reassign values binned at the source. empty when the
    /// source bin carries no mass.
    pub fn conditional(&self, source: usize) -> Vec<(usize, Mass)> {
        let total = self.outflow(source);
        if total <= 0. {
            return vec![];
        }
        self.entries
            .range((source, 0)..(source + 1, 0))
            .map(|(&(_, j), &mass)| (j, mass / total))
            .collect()
    }
}
