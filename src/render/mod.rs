use std::fmt;
use std::num::NonZeroUsize;
use std::path::Path;
use std::thread;

use anyhow::{Context, Result, bail};
use rustc_hash::FxHashSet;
use tracing::info;

use crate::graph::{CycleSet, Graph, NodeId, SubtreeTable};
use crate::layout::{cycle_spans, layout_branch};
use crate::util::format_id;

mod canvas;
mod pool;
mod progress;

pub use canvas::{PixmapCanvas, Surface};
pub use pool::RenderPool;
pub use progress::DrawProgress;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub workers: usize,
}

impl RenderConfig {
    pub fn new(width: u32, height: u32) -> Self {
        let workers = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            width,
            height,
            workers,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            bail!("canvas must be at least 1x1, got {}x{}", self.width, self.height);
        }
        if self.workers == 0 {
            bail!("render needs at least one worker");
        }
        Ok(())
    }

    /// Width of one ring in pixels when `rings` rings share the shorter half-axis.
    pub fn ring_width(&self, rings: u32) -> Result<f32> {
        if rings == 0 {
            bail!("nothing to render: no rings were planned");
        }

        let radius = self.width.min(self.height) as f32 / 2.0;
        let ring_width = radius / rings as f32;
        if ring_width < 1.0 {
            bail!(
                "ring width is too small ({ring_width:.3}px) for {rings} rings on a {}x{} canvas",
                self.width,
                self.height
            );
        }
        Ok(ring_width)
    }
}

/// Innermost ring of each cycle's branch, in cycle order.
///
/// Every cycle gets its own depth in rings plus one empty ring before the next.
pub fn assign_rings(table: &SubtreeTable, cycles: &CycleSet) -> Vec<u32> {
    let mut next = 0u32;
    cycles
        .cycles()
        .iter()
        .map(|cycle| {
            let ring = next;
            next += table.loop_depth(cycle) + 1;
            ring
        })
        .collect()
}

/// One cycle member and its inbound tree, drawn by a single task.
struct Branch {
    cycle: usize,
    member: NodeId,
    ring: u32,
    start: f64,
    end: f64,
    width: usize,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "branch {}", format_id(self.member, self.width))
    }
}

/// Renders every cycle branch on its own surface in the render pool and
/// composites the branches in submission order as they come back.
pub fn render<S: Surface>(graph: &Graph, cycles: &CycleSet, config: &RenderConfig) -> Result<S> {
    config.validate()?;
    if cycles.is_empty() {
        bail!("no cycles to render");
    }

    let table = SubtreeTable::compute(graph, cycles)?;
    let total_depth = table.total_depth(cycles);
    let ring_width = config.ring_width(total_depth)?;
    let rings = assign_rings(&table, cycles);
    info!(total_depth, ring_width, "render plan ready");

    let excluding = cycles
        .cycles()
        .iter()
        .map(|cycle| cycle.members().iter().copied().collect::<FxHashSet<_>>())
        .collect::<Vec<_>>();

    let mut branches = Vec::new();
    for (index, (cycle, &ring)) in cycles.cycles().iter().zip(&rings).enumerate() {
        for (member, start, end) in cycle_spans(&table, cycle) {
            branches.push(Branch {
                cycle: index,
                member,
                ring,
                start,
                end,
                width: graph.id_width(),
            });
        }
    }

    let progress = DrawProgress::new(total_depth);
    let pool = RenderPool::new(config.workers)?;
    let (width, height) = (config.width, config.height);
    info!(branches = branches.len(), workers = pool.size(), "rendering branches");

    let mut output = S::blank(width, height)?;
    pool.run_ordered(
        &branches,
        |branch| {
            let mut surface = S::blank(width, height)?;
            layout_branch(
                graph,
                &table,
                branch.member,
                &excluding[branch.cycle],
                branch.ring,
                branch.start,
                branch.end,
                &mut |wedge| {
                    surface.draw_wedge(&wedge, ring_width);
                    progress.record(wedge.ring);
                },
            );
            Ok(surface)
        },
        |surface| {
            output.composite_over(&surface);
            Ok(())
        },
    )?;

    progress.report();
    Ok(output)
}

pub fn render_to_file(
    graph: &Graph,
    cycles: &CycleSet,
    config: &RenderConfig,
    path: &Path,
) -> Result<()> {
    let canvas = render::<PixmapCanvas>(graph, cycles, config)?;
    canvas
        .persist(path)
        .with_context(|| format!("failed to save render to {}", path.display()))?;
    info!(path = %path.display(), "image written");
    Ok(())
}
