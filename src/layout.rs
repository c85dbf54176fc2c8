use rustc_hash::FxHashSet;

use crate::graph::{Cycle, Graph, NodeId, SubtreeTable};

/// One annular sector: a node drawn on ring `ring` between two fractions of a
/// full turn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wedge {
    pub node: NodeId,
    pub ring: u32,
    pub color: u32,
    pub start: f64,
    pub end: f64,
}

impl Wedge {
    pub fn new(node: NodeId, ring: u32, start: f64, end: f64) -> Self {
        Self {
            node,
            ring,
            color: node & 0xFF_FFFF,
            start,
            end,
        }
    }

    pub fn span(&self) -> f64 {
        self.end - self.start
    }
}

/// Splits `[start, end)` into contiguous spans proportional to `weights`.
///
/// The last span always ends exactly at `end`. A group whose weights sum to
/// zero is split evenly instead, so a lone child keeps the whole span.
pub fn partition(start: f64, end: f64, weights: &[u64]) -> Vec<(f64, f64)> {
    let total = weights.iter().sum::<u64>();
    let width = end - start;
    let count = weights.len();

    let mut spans = Vec::with_capacity(count);
    let mut accumulated = 0u64;
    let mut low = start;
    for (index, &weight) in weights.iter().enumerate() {
        let high = if index + 1 == count {
            end
        } else if total == 0 {
            start + width * ((index + 1) as f64 / count as f64)
        } else {
            accumulated += weight;
            start + width * (accumulated as f64 / total as f64)
        };
        spans.push((low, high));
        low = high;
    }
    spans
}

fn qualifying_children<'g>(
    graph: &'g Graph,
    table: &'g SubtreeTable,
    node: NodeId,
    excluding: &'g FxHashSet<NodeId>,
) -> impl Iterator<Item = NodeId> + 'g {
    graph
        .srcs(node)
        .iter()
        .copied()
        .filter(move |src| !excluding.contains(src) && !table.is_periodic(*src))
}

/// Emits a wedge for `node` and, depth first, for every node of its inbound
/// tree. Children split their parent's span by subtree size in `srcs` order.
///
/// `excluding` cuts children of `node` only; cycle members are never entered
/// below the starting node.
pub fn layout_branch<F>(
    graph: &Graph,
    table: &SubtreeTable,
    node: NodeId,
    excluding: &FxHashSet<NodeId>,
    ring: u32,
    start: f64,
    end: f64,
    emit: &mut F,
) where
    F: FnMut(Wedge),
{
    let none = FxHashSet::default();
    let mut stack = vec![(node, ring, start, end)];
    let mut children = Vec::new();
    let mut weights = Vec::new();

    while let Some((id, ring, start, end)) = stack.pop() {
        emit(Wedge::new(id, ring, start, end));

        let cut = if id == node { excluding } else { &none };
        children.clear();
        children.extend(qualifying_children(graph, table, id, cut));
        if children.is_empty() {
            continue;
        }

        weights.clear();
        weights.extend(children.iter().map(|&child| table.size(child)));
        let spans = partition(start, end, &weights);

        // Reversed so the first source is laid out first.
        for (&child, &(low, high)) in children.iter().zip(spans.iter()).rev() {
            stack.push((child, ring + 1, low, high));
        }
    }
}

/// Angular share of each member of `cycle`, proportional to its branch size.
pub fn cycle_spans(table: &SubtreeTable, cycle: &Cycle) -> Vec<(NodeId, f64, f64)> {
    let weights = cycle
        .members()
        .iter()
        .map(|&id| table.size(id))
        .collect::<Vec<_>>();

    cycle
        .members()
        .iter()
        .zip(partition(0.0, 1.0, &weights))
        .map(|(&id, (start, end))| (id, start, end))
        .collect()
}

/// Lays out every member of `cycle` on `ring` together with its whole branch.
pub fn layout_cycle<F>(graph: &Graph, table: &SubtreeTable, cycle: &Cycle, ring: u32, emit: &mut F)
where
    F: FnMut(Wedge),
{
    let excluding = cycle.members().iter().copied().collect::<FxHashSet<_>>();
    for (member, start, end) in cycle_spans(table, cycle) {
        layout_branch(graph, table, member, &excluding, ring, start, end, emit);
    }
}
