//! Pipeline Assembler Module
//!
//! Merges a base valve sequence with extra valves into one total order.
//!
//! The base sequence contributes an edge between each consecutive pair, and
//! every `after`/`before` name contributes one edge per target. A stable
//! Kahn's sort over that graph picks, among the ready valves, the one with
//! the lowest rank: base position first, then extra position. Identical
//! input therefore always yields the identical order.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::pipeline::RegisteredValve;

// == Assemble ==
/// Orders `base ∪ extra` for the stage called `stage`.
///
/// Neither input is modified. Constraint names that match no valve in the
/// union are ignored. Fails with `DuplicateValve` when a name occurs twice
/// and with `OrderingCycle` when the constraints cannot all hold.
pub fn assemble(
    stage: &str,
    base: &[RegisteredValve],
    extra: &[RegisteredValve],
) -> Result<Vec<RegisteredValve>> {
    let nodes: Vec<&RegisteredValve> = base.iter().chain(extra.iter()).collect();

    let mut ranks: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (rank, node) in nodes.iter().enumerate() {
        if ranks.insert(node.name(), rank).is_some() {
            return Err(PipelineError::DuplicateValve(node.name().to_string()));
        }
    }

    let graph = ValveGraph::build(stage, &nodes, base.len(), &ranks);
    let order = match graph.sort() {
        Ok(order) => order,
        Err(unplaced) => {
            let names = graph
                .find_cycle(&unplaced)
                .into_iter()
                .map(|rank| nodes[rank].name().to_string())
                .collect();
            return Err(PipelineError::OrderingCycle {
                stage: stage.to_string(),
                names,
            });
        }
    };

    let assembled: Vec<RegisteredValve> = order.into_iter().map(|rank| nodes[rank].clone()).collect();
    info!(
        stage,
        valves = ?assembled.iter().map(RegisteredValve::name).collect::<Vec<_>>(),
        "Assembled valve order"
    );
    Ok(assembled)
}

// == Valve Graph ==
/// Ordering graph over valve ranks.
struct ValveGraph {
    successors: Vec<BTreeSet<usize>>,
    predecessors: Vec<BTreeSet<usize>>,
}

impl ValveGraph {
    fn build(
        stage: &str,
        nodes: &[&RegisteredValve],
        base_len: usize,
        ranks: &HashMap<&str, usize>,
    ) -> Self {
        let mut graph = Self {
            successors: vec![BTreeSet::new(); nodes.len()],
            predecessors: vec![BTreeSet::new(); nodes.len()],
        };

        for rank in 1..base_len {
            graph.add_edge(rank - 1, rank);
        }

        for (rank, node) in nodes.iter().enumerate() {
            for name in node.after_names() {
                match ranks.get(name.as_str()) {
                    Some(&first) => graph.add_edge(first, rank),
                    None => debug!(stage, valve = node.name(), after = %name, "ignoring unknown valve name"),
                }
            }
            for name in node.before_names() {
                match ranks.get(name.as_str()) {
                    Some(&then) => graph.add_edge(rank, then),
                    None => debug!(stage, valve = node.name(), before = %name, "ignoring unknown valve name"),
                }
            }
        }

        graph
    }

    fn add_edge(&mut self, from: usize, to: usize) {
        self.successors[from].insert(to);
        self.predecessors[to].insert(from);
    }

    /// Stable topological sort. On failure returns the ranks left unplaced.
    fn sort(&self) -> std::result::Result<Vec<usize>, Vec<usize>> {
        let mut in_degree: Vec<usize> = self.predecessors.iter().map(BTreeSet::len).collect();
        let mut ready: BinaryHeap<Reverse<usize>> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, &degree)| degree == 0)
            .map(|(rank, _)| Reverse(rank))
            .collect();

        let mut order = Vec::with_capacity(in_degree.len());
        while let Some(Reverse(rank)) = ready.pop() {
            order.push(rank);
            for &next in &self.successors[rank] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() == in_degree.len() {
            Ok(order)
        } else {
            Err((0..in_degree.len()).filter(|&rank| in_degree[rank] > 0).collect())
        }
    }

    /// Extracts one cycle from the unplaced ranks, in execution order, with
    /// the first valve repeated at the end.
    ///
    /// Every unplaced valve has an unplaced predecessor, so walking
    /// predecessors from any of them must revisit a valve.
    fn find_cycle(&self, unplaced: &[usize]) -> Vec<usize> {
        let remaining: BTreeSet<usize> = unplaced.iter().copied().collect();
        let mut seen_at: HashMap<usize, usize> = HashMap::new();
        let mut walk: Vec<usize> = Vec::new();

        let mut current = match remaining.iter().next() {
            Some(&rank) => rank,
            None => return Vec::new(),
        };
        loop {
            if let Some(&start) = seen_at.get(&current) {
                let mut cycle: Vec<usize> = walk[start..].to_vec();
                cycle.reverse();
                cycle.push(cycle[0]);
                return cycle;
            }
            seen_at.insert(current, walk.len());
            walk.push(current);

            match self.predecessors[current]
                .iter()
                .find(|rank| remaining.contains(rank))
            {
                Some(&previous) => current = previous,
                None => return walk,
            }
        }
    }
}
