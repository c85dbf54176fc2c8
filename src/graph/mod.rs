use std::fmt;

use anyhow::{Result, bail};

use crate::util::{format_id, hex_width};

mod build;
mod cycles;
mod subtree;

pub use build::build_graph;
pub use cycles::{Cycle, CycleDisplay, CycleSet, find_cycles};
pub use subtree::{SubtreeTable, subtree_depth, subtree_size};
pub(crate) use subtree::basin_order;

pub type NodeId = u32;

/// Functional graph over `[0, domain_size)`: one forward edge per node and the
/// reverse edges stored contiguously, grouped by target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Graph {
    dst: Vec<NodeId>,
    src_offsets: Vec<u32>,
    srcs: Vec<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node<'g> {
    pub id: NodeId,
    pub dst: NodeId,
    pub srcs: &'g [NodeId],
    width: usize,
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{} -> {} ({} srcs)}}",
            format_id(self.id, self.width),
            format_id(self.dst, self.width),
            self.srcs.len()
        )
    }
}

impl Graph {
    /// Builds the reverse edges from a complete forward edge table.
    ///
    /// Sources of every node end up in ascending id order.
    pub(crate) fn from_dst(dst: Vec<NodeId>) -> Result<Self> {
        let Ok(domain_size) = u32::try_from(dst.len()) else {
            bail!("domain of {} nodes does not fit 32-bit node ids", dst.len());
        };
        if domain_size == 0 {
            bail!("domain must contain at least one node");
        }

        let width = hex_width(domain_size);
        let mut src_offsets = vec![0u32; dst.len() + 1];
        for (id, &target) in dst.iter().enumerate() {
            if target >= domain_size {
                bail!(
                    "node {} points to {}, outside the domain of {domain_size} nodes",
                    format_id(id as NodeId, width),
                    format_id(target, width)
                );
            }
            src_offsets[target as usize + 1] += 1;
        }
        for index in 1..src_offsets.len() {
            src_offsets[index] += src_offsets[index - 1];
        }

        let mut cursor = src_offsets.clone();
        let mut srcs = vec![0 as NodeId; dst.len()];
        for (id, &target) in dst.iter().enumerate() {
            let slot = &mut cursor[target as usize];
            srcs[*slot as usize] = id as NodeId;
            *slot += 1;
        }

        Ok(Self {
            dst,
            src_offsets,
            srcs,
        })
    }

    pub fn domain_size(&self) -> u32 {
        self.dst.len() as u32
    }

    pub fn dst(&self, id: NodeId) -> NodeId {
        self.dst[id as usize]
    }

    pub fn srcs(&self, id: NodeId) -> &[NodeId] {
        let start = self.src_offsets[id as usize] as usize;
        let end = self.src_offsets[id as usize + 1] as usize;
        &self.srcs[start..end]
    }

    pub fn node(&self, id: NodeId) -> Node<'_> {
        Node {
            id,
            dst: self.dst(id),
            srcs: self.srcs(id),
            width: self.id_width(),
        }
    }

    /// Hex digits needed to print any id of this graph.
    pub fn id_width(&self) -> usize {
        hex_width(self.domain_size())
    }

    pub fn format_id(&self, id: NodeId) -> String {
        format_id(id, self.id_width())
    }

    pub fn nodes(&self) -> impl ExactSizeIterator<Item = Node<'_>> + '_ {
        (0..self.domain_size()).map(|id| self.node(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id < self.domain_size()
    }
}
