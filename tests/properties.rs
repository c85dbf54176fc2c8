use happy_tree::graph::{Graph, SubtreeTable, find_cycles};
use happy_tree::layout::{Wedge, layout_cycle, partition};
use proptest::prelude::*;
use rustc_hash::FxHashMap;

fn functional_graph() -> impl Strategy<Value = Vec<u32>> {
    (1u32..160).prop_flat_map(|size| prop::collection::vec(0..size, size as usize))
}

fn graph_from(dst: Vec<u32>) -> Graph {
    let size = dst.len() as u32;
    let table = dst;
    happy_tree::graph::build_graph(size, move |id| table[id as usize]).unwrap()
}

proptest! {
    #[test]
    fn every_trajectory_reaches_a_cycle(dst in functional_graph()) {
        let graph = graph_from(dst);
        let cycles = find_cycles(&graph).unwrap();

        for start in 0..graph.domain_size() {
            let mut cursor = start;
            let mut steps = 0;
            while !cycles.is_periodic(cursor) {
                cursor = graph.dst(cursor);
                steps += 1;
                prop_assert!(steps <= graph.domain_size());
            }
        }
    }

    #[test]
    fn cycles_are_disjoint_and_closed(dst in functional_graph()) {
        let graph = graph_from(dst);
        let cycles = find_cycles(&graph).unwrap();

        let mut members = cycles
            .cycles()
            .iter()
            .flat_map(|cycle| cycle.members().iter().copied())
            .collect::<Vec<_>>();
        let total = members.len();
        members.sort_unstable();
        members.dedup();
        prop_assert_eq!(members.len(), total);

        for cycle in cycles.cycles() {
            prop_assert!(cycle.is_closed_in(&graph));
            prop_assert_eq!(cycle.first(), *cycle.members().iter().min().unwrap());
        }
        for pair in cycles.cycles().windows(2) {
            prop_assert!(pair[0].first() < pair[1].first());
        }
    }

    #[test]
    fn subtree_sizes_are_conserved(dst in functional_graph()) {
        let graph = graph_from(dst);
        let cycles = find_cycles(&graph).unwrap();
        let table = SubtreeTable::compute(&graph, &cycles).unwrap();

        let total = cycles
            .cycles()
            .iter()
            .map(|cycle| table.branch_size(cycle))
            .sum::<u64>();
        prop_assert_eq!(total, u64::from(graph.domain_size()));

        for node in graph.nodes() {
            let children = node
                .srcs
                .iter()
                .filter(|&&src| !cycles.is_periodic(src))
                .map(|&src| table.size(src))
                .sum::<u64>();
            prop_assert_eq!(table.size(node.id), 1 + children);
        }
    }

    #[test]
    fn child_wedges_tile_their_parent(dst in functional_graph()) {
        let graph = graph_from(dst);
        let cycles = find_cycles(&graph).unwrap();
        let table = SubtreeTable::compute(&graph, &cycles).unwrap();

        for cycle in cycles.cycles() {
            let mut wedges = FxHashMap::<u32, Wedge>::default();
            layout_cycle(&graph, &table, cycle, 0, &mut |wedge| {
                wedges.insert(wedge.node, wedge);
            });

            let members = cycle.members();
            prop_assert_eq!(wedges[&members[0]].start, 0.0);
            prop_assert_eq!(wedges[&members[members.len() - 1]].end, 1.0);

            for wedge in wedges.values() {
                prop_assert!(wedge.end >= wedge.start);
                let children = graph
                    .srcs(wedge.node)
                    .iter()
                    .filter(|&&src| !cycles.is_periodic(src))
                    .map(|src| wedges[src])
                    .collect::<Vec<_>>();
                let Some((first, last)) = children.first().zip(children.last()) else {
                    continue;
                };

                prop_assert_eq!(first.start, wedge.start);
                prop_assert_eq!(last.end, wedge.end);
                for pair in children.windows(2) {
                    prop_assert_eq!(pair[0].end, pair[1].start);
                }
                let covered = children.iter().map(Wedge::span).sum::<f64>();
                prop_assert!((covered - wedge.span()).abs() < 1e-9);
                prop_assert!(children.iter().all(|child| child.ring == wedge.ring + 1));
            }
        }
    }

    #[test]
    fn partition_never_leaves_gaps(weights in prop::collection::vec(0u64..1000, 1..32), start in 0.0f64..0.5, width in 0.0f64..0.5) {
        let end = start + width;
        let spans = partition(start, end, &weights);

        prop_assert_eq!(spans.len(), weights.len());
        prop_assert_eq!(spans[0].0, start);
        prop_assert_eq!(spans[spans.len() - 1].1, end);
        for pair in spans.windows(2) {
            prop_assert_eq!(pair[0].1, pair[1].0);
        }
        prop_assert!(spans.iter().all(|(low, high)| low.is_finite() && high.is_finite() && high >= low));
    }
}
