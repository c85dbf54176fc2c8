use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize, Serializer};
use tracing::info;

use crate::graph::{Cycle, CycleSet, Graph, Node, NodeId, basin_order};
use crate::util::{format_id, hex_width};

#[derive(Clone, Debug, Deserialize)]
struct NodeRecord {
    id: NodeId,
    dst: NodeId,
    #[serde(default)]
    srcs: Vec<NodeId>,
}

#[derive(Serialize)]
struct NodeRecordRef<'g> {
    id: NodeId,
    dst: NodeId,
    srcs: &'g [NodeId],
}

impl<'g> From<Node<'g>> for NodeRecordRef<'g> {
    fn from(node: Node<'g>) -> Self {
        Self {
            id: node.id,
            dst: node.dst,
            srcs: node.srcs,
        }
    }
}

struct NodeRecords<'g>(&'g Graph);

impl Serialize for NodeRecords<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.nodes().map(NodeRecordRef::from))
    }
}

#[derive(Serialize)]
struct GraphSnapshotRef<'g> {
    domain_size: u32,
    nodes: NodeRecords<'g>,
}

#[derive(Deserialize)]
struct GraphSnapshot {
    domain_size: u32,
    nodes: Vec<NodeRecord>,
}

#[derive(Serialize)]
struct CycleSnapshotRef<'g> {
    cycles: Vec<Vec<NodeRecordRef<'g>>>,
}

#[derive(Deserialize)]
struct CycleSnapshot {
    cycles: Vec<Vec<NodeRecord>>,
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    Ok(BufReader::new(file))
}

pub fn write_graph<W: Write>(graph: &Graph, writer: W) -> Result<()> {
    let snapshot = GraphSnapshotRef {
        domain_size: graph.domain_size(),
        nodes: NodeRecords(graph),
    };
    serde_json::to_writer(writer, &snapshot).context("failed to serialize graph snapshot")
}

pub fn store_graph(graph: &Graph, path: &Path) -> Result<()> {
    info!(path = %path.display(), "storing nodes");
    let mut writer = create(path)?;
    write_graph(graph, &mut writer)
        .with_context(|| format!("failed to write graph snapshot {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

/// Rebuilds the graph from its forward edges and checks the stored reverse
/// edges against it.
pub fn read_graph<R: std::io::Read>(reader: R) -> Result<Graph> {
    let snapshot: GraphSnapshot =
        serde_json::from_reader(reader).context("invalid graph snapshot JSON")?;

    if snapshot.nodes.len() != snapshot.domain_size as usize {
        bail!(
            "graph snapshot declares {} nodes but holds {}",
            snapshot.domain_size,
            snapshot.nodes.len()
        );
    }

    let width = hex_width(snapshot.domain_size);
    let mut dst = Vec::with_capacity(snapshot.nodes.len());
    for (index, record) in snapshot.nodes.iter().enumerate() {
        if record.id as usize != index {
            bail!(
                "graph snapshot record {index} has id {}",
                format_id(record.id, width)
            );
        }
        dst.push(record.dst);
    }

    let graph = Graph::from_dst(dst).context("graph snapshot has invalid edges")?;
    for record in &snapshot.nodes {
        if graph.srcs(record.id) != record.srcs.as_slice() {
            bail!(
                "graph snapshot sources of {} disagree with its forward edges",
                graph.format_id(record.id)
            );
        }
    }
    Ok(graph)
}

pub fn load_graph(path: &Path) -> Result<Graph> {
    info!(path = %path.display(), "loading in nodes");
    read_graph(open(path)?).with_context(|| format!("failed to load graph {}", path.display()))
}

pub fn write_cycles<W: Write>(graph: &Graph, cycles: &CycleSet, writer: W) -> Result<()> {
    let snapshot = CycleSnapshotRef {
        cycles: cycles
            .cycles()
            .iter()
            .map(|cycle| {
                cycle
                    .members()
                    .iter()
                    .map(|&id| NodeRecordRef::from(graph.node(id)))
                    .collect()
            })
            .collect(),
    };
    serde_json::to_writer(writer, &snapshot).context("failed to serialize cycle snapshot")
}

pub fn store_cycles(graph: &Graph, cycles: &CycleSet, path: &Path) -> Result<()> {
    info!(path = %path.display(), "storing loops");
    let mut writer = create(path)?;
    write_cycles(graph, cycles, &mut writer)
        .with_context(|| format!("failed to write cycle snapshot {}", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))
}

/// Reads cycles recorded for `graph`; every member must exist, match the
/// graph's edges, and close under `dst`, and together the cycles must drain
/// the whole domain.
pub fn read_cycles<R: std::io::Read>(graph: &Graph, reader: R) -> Result<CycleSet> {
    let snapshot: CycleSnapshot =
        serde_json::from_reader(reader).context("invalid cycle snapshot JSON")?;

    let mut cycles = Vec::with_capacity(snapshot.cycles.len());
    for (index, records) in snapshot.cycles.into_iter().enumerate() {
        for record in &records {
            if !graph.contains(record.id) {
                bail!(
                    "cycle {index} member {} is outside the graph",
                    graph.format_id(record.id)
                );
            }
            if graph.dst(record.id) != record.dst {
                bail!(
                    "cycle {index} member {} points to {}, graph says {}",
                    graph.format_id(record.id),
                    graph.format_id(record.dst),
                    graph.format_id(graph.dst(record.id))
                );
            }
        }

        let members = records.iter().map(|record| record.id).collect::<Vec<_>>();
        let cycle = Cycle::new(members).with_context(|| format!("cycle {index} is empty"))?;
        if !cycle.is_closed_in(graph) {
            return Err(anyhow!(
                "cycle {index} {} does not close under the graph's edges",
                cycle.display(graph.id_width())
            ));
        }
        cycles.push(cycle);
    }

    let cycles = CycleSet::new(cycles)?;
    basin_order(graph, &cycles).context("cycle snapshot is incomplete")?;
    Ok(cycles)
}

pub fn load_cycles(graph: &Graph, path: &Path) -> Result<CycleSet> {
    info!(path = %path.display(), "loading in loops");
    read_cycles(graph, open(path)?)
        .with_context(|| format!("failed to load cycles {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{build_graph, find_cycles};
    use crate::transform::square_mod;

    fn squares16() -> (Graph, CycleSet) {
        let graph = build_graph(16, |id| square_mod(id, 16)).unwrap();
        let cycles = find_cycles(&graph).unwrap();
        (graph, cycles)
    }

    #[test]
    fn graph_snapshot_uses_plain_records() {
        let graph = Graph::from_dst(vec![1, 1]).unwrap();
        let mut buffer = Vec::new();
        write_graph(&graph, &mut buffer).unwrap();
        assert_eq!(
            String::from_utf8(buffer).unwrap(),
            r#"{"domain_size":2,"nodes":[{"id":0,"dst":1,"srcs":[]},{"id":1,"dst":1,"srcs":[0,1]}]}"#
        );
    }

    #[test]
    fn graph_snapshot_restores_the_same_graph() {
        let (graph, _) = squares16();
        let mut buffer = Vec::new();
        write_graph(&graph, &mut buffer).unwrap();
        assert_eq!(read_graph(buffer.as_slice()).unwrap(), graph);
    }

    #[test]
    fn inconsistent_sources_are_rejected() {
        let raw = r#"{"domain_size":2,"nodes":[{"id":0,"dst":1,"srcs":[]},{"id":1,"dst":1,"srcs":[1]}]}"#;
        let error = read_graph(raw.as_bytes()).unwrap_err();
        assert!(format!("{error:#}").contains("disagree"));
    }

    #[test]
    fn sparse_ids_are_rejected() {
        let raw = r#"{"domain_size":2,"nodes":[{"id":1,"dst":1,"srcs":[1]},{"id":0,"dst":1,"srcs":[]}]}"#;
        assert!(read_graph(raw.as_bytes()).is_err());
    }

    #[test]
    fn cycle_snapshot_keeps_canonical_order() {
        let (graph, cycles) = squares16();
        let mut buffer = Vec::new();
        write_cycles(&graph, &cycles, &mut buffer).unwrap();

        let restored = read_cycles(&graph, buffer.as_slice()).unwrap();
        let members = restored
            .cycles()
            .iter()
            .map(|cycle| cycle.members().to_vec())
            .collect::<Vec<_>>();
        assert_eq!(members, vec![vec![0], vec![1]]);
    }

    #[test]
    fn open_chains_are_not_cycles() {
        let (graph, _) = squares16();
        let raw = r#"{"cycles":[[{"id":2,"dst":4,"srcs":[]},{"id":4,"dst":0,"srcs":[2,6,10,14]}]]}"#;
        let error = read_cycles(&graph, raw.as_bytes()).unwrap_err();
        assert!(error.to_string().contains("does not close"));
    }

    #[test]
    fn snapshots_missing_an_attractor_are_rejected() {
        let (graph, _) = squares16();
        let raw = r#"{"cycles":[[{"id":0,"dst":0,"srcs":[0,4,8,12]}]]}"#;
        let error = read_cycles(&graph, raw.as_bytes()).unwrap_err();

        let message = format!("{error:#}");
        assert!(message.contains("incomplete"));
        assert!(message.contains("reach only 8 of 16 nodes"));
    }

    #[test]
    fn errors_print_ids_at_the_domain_width() {
        let (graph, _) = squares16();
        let raw = r#"{"cycles":[[{"id":3,"dst":4,"srcs":[]}]]}"#;
        let error = read_cycles(&graph, raw.as_bytes()).unwrap_err();
        assert_eq!(error.to_string(), "cycle 0 member 3 points to 4, graph says 9");
    }

    #[test]
    fn missing_files_name_the_path() {
        let error = load_graph(Path::new("/nonexistent/nodes.json")).unwrap_err();
        assert!(format!("{error:#}").contains("/nonexistent/nodes.json"));
    }
}
