use anyhow::{Context, Result, bail};
use tracing::info;

use super::{Graph, NodeId};
use crate::util::{format_count, format_id, hex_width};

pub fn build_graph<F>(domain_size: u32, transform: F) -> Result<Graph>
where
    F: Fn(NodeId) -> NodeId,
{
    if domain_size == 0 {
        bail!("domain size must be at least 1");
    }

    info!(nodes = %format_count(u64::from(domain_size)), "creating nodes");

    let width = hex_width(domain_size);
    let mut dst = Vec::with_capacity(domain_size as usize);
    for id in 0..domain_size {
        let target = transform(id);
        if target >= domain_size {
            bail!(
                "transform maps {} to {}, which is outside the domain of {domain_size} nodes",
                format_id(id, width),
                format_id(target, width)
            );
        }
        dst.push(target);
    }

    let graph = Graph::from_dst(dst).context("failed to index reverse edges")?;
    let leaves = graph.nodes().filter(|node| node.srcs.is_empty()).count();
    info!(nodes = graph.domain_size(), leaves, "graph built");
    Ok(graph)
}
