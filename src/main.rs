use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use graph_rl_search::{
    config::StorageBackend, track_error, CodeSearchEngine, EngineConfig, MemoryGraph,
    SearchControl, SearchResult, SharedGraph,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Graph snapshot (JSON with `nodes` and `edges`)
    #[arg(short, long)]
    graph: PathBuf,

    /// Engine config (json, yaml or toml); defaults to the user config dir
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Keep learned values in memory only
    #[arg(long)]
    ephemeral: bool,

    /// Plain logs on stderr
    #[arg(long)]
    no_color: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Strategy {
    Td,
    Mcts,
}

#[derive(Subcommand)]
enum Commands {
    /// Search the graph for a query
    Search {
        query: String,

        /// Node to start from
        #[arg(short, long)]
        start: String,

        #[arg(long, value_enum, default_value = "td")]
        strategy: Strategy,

        /// Give up after this many milliseconds and return the best path so far
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Reinforce the returned path with this satisfaction score (0 to 1)
        #[arg(long)]
        satisfaction: Option<f64>,
    },

    /// Print how many learned values the store holds
    Stats,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => {
            let default_path = EngineConfig::default_config_path();
            if default_path.exists() {
                EngineConfig::load(&default_path).with_context(|| {
                    format!("Failed to load config from {}", default_path.display())
                })
            } else {
                Ok(EngineConfig::default())
            }
        }
    }
}

/// Path to feed back into the engine: the start node followed by the result path
fn feedback_path(start: &str, result: &SearchResult) -> Vec<String> {
    let mut path = Vec::with_capacity(result.path.len() + 1);
    if result.path.first().map(String::as_str) != Some(start) {
        path.push(start.to_string());
    }
    path.extend(result.path.iter().cloned());
    path
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    graph_rl_search::init_with_logger(!cli.no_color).context("Failed to initialize logging")?;

    let mut config = load_config(cli.config.as_ref())?;
    if cli.ephemeral {
        config.storage.backend = StorageBackend::Memory;
    }

    let graph = track_error!(MemoryGraph::load_snapshot(&cli.graph), "Loading graph snapshot")
        .with_context(|| format!("Failed to load graph from {}", cli.graph.display()))?;
    info!(
        "Loaded graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    let engine = Arc::new(
        CodeSearchEngine::from_config(SharedGraph::new(graph), config)
            .context("Failed to create search engine")?,
    );

    match cli.command {
        Commands::Search {
            query,
            start,
            strategy,
            timeout_ms,
            satisfaction,
        } => {
            let cancel = CancellationToken::new();
            let mut control = SearchControl::unbounded().with_cancellation(cancel.clone());
            if let Some(ms) = timeout_ms {
                control = control.with_timeout(Duration::from_millis(ms));
            }

            let ctrl_c_token = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, returning the best path found so far");
                    ctrl_c_token.cancel();
                }
            });

            let search_engine = engine.clone();
            let search_query = query.clone();
            let search_start = start.clone();
            let result = tokio::task::spawn_blocking(move || match strategy {
                Strategy::Td => search_engine.search_with_td_learning_control(
                    &search_query,
                    &search_start,
                    &control,
                ),
                Strategy::Mcts => {
                    search_engine.search_with_control(&search_query, &search_start, &control)
                }
            })
            .await
            .context("Search task panicked")?
            .context("Search failed")?;

            println!("{}", serde_json::to_string_pretty(&result)?);

            let path = feedback_path(&start, &result);
            if satisfaction.is_some() && path.len() < 2 {
                warn!("Search never left {}; no feedback to apply", start);
            } else if let Some(satisfaction) = satisfaction {
                let feedback_engine = engine.clone();
                // Applied off the request path; only awaited so the process
                // does not exit before the write lands
                let feedback = tokio::task::spawn_blocking(move || {
                    if let Err(e) = feedback_engine.learn_from_feedback(&query, &path, satisfaction)
                    {
                        error!("Failed to apply feedback: {}", e);
                    }
                });
                feedback.await.context("Feedback task panicked")?;
            }

            let stats = engine.learning_stats();
            info!(
                "Learning stats: {} steps, {} episodes, avg |δ| {:.4}",
                stats.total_steps, stats.episodes, stats.average_td_error
            );
        }
        Commands::Stats => {
            let stored = engine.store().len().context("Failed to read value store")?;
            println!("stored values: {}", stored);
        }
    }

    Ok(())
}
