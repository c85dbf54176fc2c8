use anyhow::{Result, bail};
use rustc_hash::FxHashSet;
use tracing::info;

use super::{Cycle, CycleSet, Graph, NodeId};

/// Inbound subtree size and depth of every node, computed once per render pass.
///
/// Cycle members are measured with their in-cycle predecessor cut off, so the
/// sizes of all members of all cycles add up to the domain size.
#[derive(Clone, Debug)]
pub struct SubtreeTable {
    size: Vec<u32>,
    depth: Vec<u32>,
    periodic: Vec<bool>,
}

/// Every node reachable from `cycles` over reverse edges, parents before
/// children, plus the membership mask of `cycles`.
///
/// Fails unless the cycles reach the whole domain: a node left over drains
/// into an attractor missing from `cycles`.
pub(crate) fn basin_order(graph: &Graph, cycles: &CycleSet) -> Result<(Vec<NodeId>, Vec<bool>)> {
    let domain_size = graph.domain_size() as usize;

    let mut periodic = vec![false; domain_size];
    let mut order = Vec::with_capacity(domain_size);
    for cycle in cycles.cycles() {
        for &id in cycle.members() {
            periodic[id as usize] = true;
            order.push(id);
        }
    }

    // Breadth-first over reverse edges: parents always precede children.
    let mut cursor = 0;
    while cursor < order.len() {
        let id = order[cursor];
        cursor += 1;
        for &src in graph.srcs(id) {
            if !periodic[src as usize] {
                order.push(src);
            }
        }
    }

    if order.len() != domain_size {
        let mut reached = vec![false; domain_size];
        for &id in &order {
            reached[id as usize] = true;
        }
        let missed = reached.iter().position(|&seen| !seen).unwrap_or(0) as NodeId;
        bail!(
            "cycles reach only {} of {domain_size} nodes; {} drains into a cycle that is not listed",
            order.len(),
            graph.format_id(missed)
        );
    }

    Ok((order, periodic))
}

impl SubtreeTable {
    pub fn compute(graph: &Graph, cycles: &CycleSet) -> Result<Self> {
        let domain_size = graph.domain_size() as usize;
        let (order, periodic) = basin_order(graph, cycles)?;

        let mut size = vec![1u32; domain_size];
        let mut depth = vec![1u32; domain_size];
        for &id in order.iter().rev() {
            if periodic[id as usize] {
                continue;
            }
            let parent = graph.dst(id) as usize;
            size[parent] += size[id as usize];
            depth[parent] = depth[parent].max(depth[id as usize] + 1);
        }

        info!(reached = order.len(), "subtree table computed");

        Ok(Self {
            size,
            depth,
            periodic,
        })
    }

    pub fn size(&self, id: NodeId) -> u64 {
        u64::from(self.size[id as usize])
    }

    pub fn depth(&self, id: NodeId) -> u32 {
        self.depth[id as usize]
    }

    pub fn is_periodic(&self, id: NodeId) -> bool {
        self.periodic[id as usize]
    }

    /// Rings needed by one cycle's branch, its own ring included.
    pub fn loop_depth(&self, cycle: &Cycle) -> u32 {
        cycle
            .members()
            .iter()
            .map(|&id| self.depth(id))
            .max()
            .unwrap_or(0)
    }

    pub fn branch_size(&self, cycle: &Cycle) -> u64 {
        cycle.members().iter().map(|&id| self.size(id)).sum()
    }

    /// Rings needed by every cycle, one spacer ring per cycle included.
    pub fn total_depth(&self, cycles: &CycleSet) -> u32 {
        cycles
            .cycles()
            .iter()
            .map(|cycle| self.loop_depth(cycle) + 1)
            .sum()
    }
}

/// Counts `node` and everything that reaches it over reverse edges.
///
/// `excluding` only cuts children of `node` itself. A node is never counted
/// twice, so a cycle member without its cycle excluded counts its whole basin.
pub fn subtree_size(graph: &Graph, node: NodeId, excluding: &FxHashSet<NodeId>) -> u64 {
    let mut seen = FxHashSet::default();
    seen.insert(node);

    let mut stack = Vec::new();
    for &src in graph.srcs(node) {
        if !excluding.contains(&src) && seen.insert(src) {
            stack.push(src);
        }
    }

    let mut count = 1u64;
    while let Some(id) = stack.pop() {
        count += 1;
        for &src in graph.srcs(id) {
            if seen.insert(src) {
                stack.push(src);
            }
        }
    }
    count
}

/// Longest reverse-edge chain ending at `node`, counted in nodes.
pub fn subtree_depth(graph: &Graph, node: NodeId, excluding: &FxHashSet<NodeId>) -> u32 {
    let mut seen = FxHashSet::default();
    seen.insert(node);

    let mut stack = Vec::new();
    for &src in graph.srcs(node) {
        if !excluding.contains(&src) && seen.insert(src) {
            stack.push((src, 2u32));
        }
    }

    let mut deepest = 1u32;
    while let Some((id, level)) = stack.pop() {
        deepest = deepest.max(level);
        for &src in graph.srcs(id) {
            if seen.insert(src) {
                stack.push((src, level + 1));
            }
        }
    }
    deepest
}
