use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use happy_tree::format_count;
use happy_tree::graph::{SubtreeTable, build_graph, find_cycles};
use happy_tree::render::{RenderConfig, render_to_file};
use happy_tree::snapshot::{load_cycles, load_graph, store_cycles, store_graph};
use happy_tree::transform::TransformKind;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply the transform to every node and store the resulting graph.
    BuildGraph {
        #[arg(long, value_enum, default_value_t = TransformKind::DigitSquares)]
        transform: TransformKind,
        #[arg(long, default_value_t = 0x100_0000)]
        domain_size: u32,
        #[arg(long, default_value = "nodes.json")]
        output: PathBuf,
    },
    /// Find every cycle of a stored graph.
    FindCycles {
        #[arg(long, default_value = "nodes.json")]
        graph: PathBuf,
        #[arg(long, default_value = "loops.json")]
        output: PathBuf,
    },
    /// Draw the sunburst of every cycle's inbound tree.
    Render {
        #[arg(long, default_value = "nodes.json")]
        graph: PathBuf,
        #[arg(long, default_value = "loops.json")]
        cycles: PathBuf,
        #[arg(long, default_value = "happy-tree.png")]
        output: PathBuf,
        #[arg(long, default_value_t = 1000)]
        width: u32,
        #[arg(long, default_value_t = 1000)]
        height: u32,
        /// Defaults to the available parallelism.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Log size and depth of every cycle's branch.
    Stats {
        #[arg(long, default_value = "nodes.json")]
        graph: PathBuf,
        #[arg(long, default_value = "loops.json")]
        cycles: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::BuildGraph {
            transform,
            domain_size,
            output,
        } => {
            info!(transform = transform.label(), domain_size, "building graph");
            let graph = build_graph(domain_size, transform.for_domain(domain_size))?;
            store_graph(&graph, &output)?;
        }
        Command::FindCycles { graph, output } => {
            let nodes = load_graph(&graph)?;
            let cycles = find_cycles(&nodes)?;
            store_cycles(&nodes, &cycles, &output)?;
        }
        Command::Render {
            graph,
            cycles,
            output,
            width,
            height,
            workers,
        } => {
            let mut config = RenderConfig::new(width, height);
            if let Some(workers) = workers {
                config = config.with_workers(workers);
            }
            config.validate()?;

            let nodes = load_graph(&graph)?;
            let loops = load_cycles(&nodes, &cycles)?;
            render_to_file(&nodes, &loops, &config, &output)?;
        }
        Command::Stats { graph, cycles } => {
            let nodes = load_graph(&graph)?;
            let loops = load_cycles(&nodes, &cycles)?;
            let table = SubtreeTable::compute(&nodes, &loops)?;

            for cycle in loops.cycles() {
                info!(
                    "{}: {} members, depth {}, branch of {} nodes",
                    cycle.display(nodes.id_width()),
                    cycle.len(),
                    table.loop_depth(cycle),
                    format_count(table.branch_size(cycle))
                );
            }
            info!(
                cycles = loops.len(),
                total_depth = table.total_depth(&loops),
                "all branches measured"
            );
        }
    }

    Ok(())
}
