//! CLI commands for fireline

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use fireline::config::RouterConfig;
use fireline::fire::{simulate_fire, FireReport};
use fireline::graph::format::GraphDefinition;
use fireline::graph::{demo, haversine_m, GraphStore};
use fireline::route::Comparison;
use fireline::router::Router;
use fireline::validate::{all_pairs, random_pairs, validate_against_rebuild, validate_engines, ValidationReport};

#[derive(Parser)]
#[command(name = "fireline", version)]
#[command(about = "Evacuation routing under road closures: Dijkstra vs dynamically repaired Contraction Hierarchies", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Router configuration file (JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fraction of nodes above which a repair falls back to a full rebuild
    #[arg(long, global = true)]
    pub rebuild_threshold: Option<f64>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Route between two nodes with both engines
    Route {
        /// Graph definition (JSON); the Lahaina demo network if omitted
        #[arg(long)]
        graph: Option<PathBuf>,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Close an edge before routing, as FROM:TO (repeatable)
        #[arg(long = "close", value_parser = parse_edge)]
        close: Vec<(String, String)>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Close random roads, then route with both engines
    Fire {
        #[arg(long)]
        graph: Option<PathBuf>,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        /// Number of roads the fire closes
        #[arg(long, default_value_t = 3)]
        roads: usize,

        /// RNG seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        json: bool,
    },

    /// Check CH against Dijkstra, before and after a simulated fire
    Validate {
        #[arg(long)]
        graph: Option<PathBuf>,

        /// Number of random pairs (all pairs if omitted)
        #[arg(long)]
        pairs: Option<usize>,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Roads closed by the simulated fire
        #[arg(long, default_value_t = 3)]
        roads: usize,
    },

    /// Write the bundled demo network as a graph definition
    ExportDemo {
        /// Output JSON file
        output: PathBuf,
    },
}

fn parse_edge(s: &str) -> std::result::Result<(String, String), String> {
    match s.split_once(':') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => {
            Ok((from.to_string(), to.to_string()))
        }
        _ => Err(format!("expected FROM:TO, got '{}'", s)),
    }
}

/// Install the tracing subscriber; logs go to stderr
pub fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_graph(path: Option<&Path>) -> Result<GraphStore> {
    match path {
        Some(path) => {
            let definition = GraphDefinition::load(path)
                .with_context(|| format!("Failed to read graph {}", path.display()))?;
            definition
                .build()
                .with_context(|| format!("Invalid graph {}", path.display()))
        }
        None => Ok(demo::lahaina()),
    }
}

impl Cli {
    fn router_config(&self) -> Result<RouterConfig> {
        let mut config = match &self.config {
            Some(path) => RouterConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => RouterConfig::default(),
        };
        if let Some(threshold) = self.rebuild_threshold {
            config.rebuild_threshold = threshold;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn run(self) -> Result<()> {
        let config = self.router_config()?;

        match self.command {
            Commands::Route {
                graph,
                from,
                to,
                close,
                json,
            } => {
                let router = Router::new(load_graph(graph.as_deref())?, config)?;
                for (a, b) in &close {
                    let outcome = router
                        .set_closed(a, b, true)
                        .with_context(|| format!("Cannot close {}:{}", a, b))?;
                    if !json {
                        println!("closed {} -> {}: {:?}", a, b, outcome);
                    }
                }
                let comparison = router.compare(&from, &to)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&comparison)?);
                } else {
                    print_comparison(&router, &comparison);
                }
            }

            Commands::Fire {
                graph,
                from,
                to,
                roads,
                seed,
                json,
            } => {
                let router = Router::new(load_graph(graph.as_deref())?, config)?;
                let seed = seed.unwrap_or_else(rand::random);
                let report = simulate_fire(&router, roads, seed)?;
                let comparison = router.compare(&from, &to)?;
                if json {
                    let out = serde_json::json!({ "fire": report, "route": comparison });
                    println!("{}", serde_json::to_string_pretty(&out)?);
                } else {
                    print_fire(&report);
                    print_comparison(&router, &comparison);
                }
            }

            Commands::Validate {
                graph,
                pairs,
                seed,
                roads,
            } => {
                let router = Router::new(load_graph(graph.as_deref())?, config)?;
                let snapshot = router.snapshot_graph();
                let pairs = match pairs {
                    Some(n) => random_pairs(&snapshot, n, seed),
                    None => all_pairs(&snapshot),
                };

                let before = validate_engines(&router, &pairs);
                print_report("open network", &before);

                let fire = simulate_fire(&router, roads, seed)?;
                print_fire(&fire);
                let after = validate_engines(&router, &pairs);
                print_report("after fire", &after);
                let rebuild = validate_against_rebuild(&router);
                print_report("repaired vs rebuilt", &rebuild);

                if !(before.is_ok() && after.is_ok() && rebuild.is_ok()) {
                    bail!("validation failed");
                }
                println!("all checks passed");
            }

            Commands::ExportDemo { output } => {
                GraphDefinition::from_graph(&demo::lahaina())
                    .save(&output)
                    .with_context(|| format!("Failed to write {}", output.display()))?;
                println!("wrote {}", output.display());
            }
        }

        Ok(())
    }
}

fn print_comparison(router: &Router, comparison: &Comparison) {
    let straight = router.with_state(|s| {
        let a = s.graph.resolve(&comparison.from).ok()?;
        let b = s.graph.resolve(&comparison.to).ok()?;
        Some(haversine_m(s.graph.node(a), s.graph.node(b)))
    });
    println!("{} -> {}", comparison.from, comparison.to);
    if let Some(m) = straight {
        println!("  straight line {:.0} m", m);
    }
    println!("  {}", comparison.dijkstra);
    println!("  {}", comparison.ch);
    if !comparison.costs_agree() {
        println!("  WARNING: engines disagree");
    }
}

fn print_fire(report: &FireReport) {
    println!("fire (seed {}): {} roads closed", report.seed, report.closed.len());
    for update in &report.closed {
        println!("  {} -> {}: {:?}", update.from, update.to, update.outcome);
    }
}

fn print_report(label: &str, report: &ValidationReport) {
    println!(
        "{}: {}/{} agree ({} unreachable in both, {} invalid paths, CH explored <= Dijkstra on {}) in {} ms",
        label,
        report.agreed,
        report.total,
        report.unreachable_both,
        report.invalid_paths,
        report.ch_explored_no_more,
        report.elapsed_ms
    );
    for m in report.mismatches.iter().take(10) {
        println!("  MISMATCH {} -> {}: baseline {} vs ch {}", m.from, m.to, m.baseline_cost, m.ch_cost);
    }
}
