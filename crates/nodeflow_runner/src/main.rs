// SPDX-License-Identifier: MIT OR Apache-2.0
//! Headless node graph runner.
//!
//! Loads a graph asset, applies parameter overrides, runs the graph a
//! number of times and reports the results through `tracing`.

mod config;

use clap::{Parser, ValueEnum};
use config::RunnerConfig;
use nodeflow_graph::nodes::create_builtin_registry;
use nodeflow_graph::{ComputeOrderStrategy, Graph, GraphAsset, GraphError, TypeRegistry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, name = "nodeflow", about = "Run a node graph asset")]
struct Cli {
    /// Runner configuration (RON)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,
    /// Graph asset, overrides the configured one
    #[arg(short = 'g', long)]
    graph: Option<PathBuf>,
    /// Compute order strategy, overrides the configured one
    #[arg(short = 's', long, value_enum)]
    strategy: Option<StrategyArg>,
    /// Number of runs, overrides the configured one
    #[arg(short = 'n', long)]
    iterations: Option<u32>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    DepthFirst,
    BreadthFirst,
}

impl From<StrategyArg> for ComputeOrderStrategy {
    fn from(value: StrategyArg) -> Self {
        match value {
            StrategyArg::DepthFirst => Self::DepthFirst,
            StrategyArg::BreadthFirst => Self::BreadthFirst,
        }
    }
}

fn init_tracing(default_filter: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn resolve_config(cli: &Cli) -> Result<RunnerConfig, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::default(),
    };
    if let Some(graph) = &cli.graph {
        config.graph.clone_from(graph);
    }
    if let Some(strategy) = cli.strategy {
        config.compute_order = Some(strategy.into());
    }
    if let Some(iterations) = cli.iterations {
        config.iterations = iterations;
    }
    Ok(config)
}

/// Load and run the configured graph; returns whether every run succeeded
fn run(config: &RunnerConfig) -> Result<bool, GraphError> {
    let asset = GraphAsset::load(&config.graph)?;
    let registry = create_builtin_registry();
    let mut graph = Graph::from_asset(&asset, &registry, Arc::new(TypeRegistry::with_default_adapters()));

    if let Some(strategy) = config.compute_order {
        graph.compute_order_strategy = strategy;
        graph.update_compute_order();
    }
    for (name, value) in &config.parameters {
        if !graph.set_parameter_value(name, value.clone()) {
            tracing::warn!("Parameter `{name}` not applied");
        }
    }

    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        strategy = ?graph.compute_order_strategy,
        "Loaded graph `{}`",
        graph.name
    );

    let mut success = true;
    for iteration in 1..=config.iterations {
        let report = graph.run();
        tracing::info!(
            iteration,
            processed = report.processed.len(),
            failed = report.failed.len(),
            "Run finished"
        );
        success &= report.is_success();
    }

    for parameter in graph.exposed_parameters() {
        tracing::info!("{} = {:?}", parameter.name, parameter.value);
    }
    Ok(success)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("info");
            tracing::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_filter);
    tracing::info!("nodeflow v{}", env!("CARGO_PKG_VERSION"));

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            tracing::warn!("Some nodes failed");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
