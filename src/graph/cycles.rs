use std::fmt;

use anyhow::{Result, bail};
use rustc_hash::FxHashSet;
use tracing::{debug, info};

use super::{Graph, NodeId};
use crate::util::format_id;

const UNVISITED: NodeId = NodeId::MAX;
const PROGRESS_INTERVAL: NodeId = 0x1000;

/// Members of one attractor in forward order: `dst(members[i]) == members[i + 1]`,
/// wrapping around. The smallest member comes first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cycle {
    members: Vec<NodeId>,
}

impl Cycle {
    pub fn new(mut members: Vec<NodeId>) -> Result<Self> {
        let Some(start) = members
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map(|(index, _)| index)
        else {
            bail!("a cycle needs at least one member");
        };
        members.rotate_left(start);
        Ok(Self { members })
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn first(&self) -> NodeId {
        self.members[0]
    }

    pub fn is_closed_in(&self, graph: &Graph) -> bool {
        self.members.iter().enumerate().all(|(index, &id)| {
            let next = self.members[(index + 1) % self.members.len()];
            graph.contains(id) && graph.dst(id) == next
        })
    }

    /// Members as hex ids padded to `width` digits, e.g. `[02 -> 03]`.
    pub fn display(&self, width: usize) -> CycleDisplay<'_> {
        CycleDisplay { cycle: self, width }
    }
}

pub struct CycleDisplay<'c> {
    cycle: &'c Cycle,
    width: usize,
}

impl fmt::Display for CycleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (index, &id) in self.cycle.members.iter().enumerate() {
            if index > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", format_id(id, self.width))?;
        }
        write!(f, "]")
    }
}

/// Every attractor of a graph, ordered by smallest member.
#[derive(Clone, Debug, Default)]
pub struct CycleSet {
    cycles: Vec<Cycle>,
    periodic: FxHashSet<NodeId>,
}

impl CycleSet {
    /// Rejects cycle lists that share a node.
    pub fn new(mut cycles: Vec<Cycle>) -> Result<Self> {
        cycles.sort_by_key(Cycle::first);

        let mut periodic = FxHashSet::default();
        for cycle in &cycles {
            for &id in cycle.members() {
                if !periodic.insert(id) {
                    bail!("node {id:X} appears in more than one cycle");
                }
            }
        }

        Ok(Self { cycles, periodic })
    }

    pub fn cycles(&self) -> &[Cycle] {
        &self.cycles
    }

    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    pub fn is_periodic(&self, id: NodeId) -> bool {
        self.periodic.contains(&id)
    }

    pub fn periodic_count(&self) -> usize {
        self.periodic.len()
    }
}

/// Walks forward from every node not seen by an earlier walk.
///
/// A walk that runs into its own path closes a new cycle at the repeated node;
/// a walk that runs into a node owned by an earlier walk is a transient tail.
/// Each node is walked exactly once.
pub fn find_cycles(graph: &Graph) -> Result<CycleSet> {
    let domain_size = graph.domain_size();
    let width = graph.id_width();
    let mut walk_of = vec![UNVISITED; domain_size as usize];
    let mut path = Vec::with_capacity(16);
    let mut cycles = Vec::new();

    info!(nodes = domain_size, "finding cycles");

    for origin in 0..domain_size {
        if origin % PROGRESS_INTERVAL == 0 {
            debug!(origin = %format_id(origin, width), found = cycles.len(), "maybe loop");
        }
        if walk_of[origin as usize] != UNVISITED {
            continue;
        }

        path.clear();
        let mut cursor = origin;
        while walk_of[cursor as usize] == UNVISITED {
            walk_of[cursor as usize] = origin;
            path.push(cursor);
            cursor = graph.dst(cursor);
        }

        if walk_of[cursor as usize] != origin {
            continue;
        }

        let Some(start) = path.iter().position(|&id| id == cursor) else {
            bail!(
                "walk from {} closed on {} outside its own path",
                format_id(origin, width),
                format_id(cursor, width)
            );
        };
        let cycle = Cycle::new(path[start..].to_vec())?;
        debug!(cycle = %cycle.display(width), "found cycle");
        cycles.push(cycle);
    }

    let cycles = CycleSet::new(cycles)?;
    info!(
        cycles = cycles.len(),
        periodic = cycles.periodic_count(),
        "cycles found"
    );
    Ok(cycles)
}
