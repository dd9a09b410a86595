use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing_subscriber::EnvFilter;

use einfo_retrieval::geo::{format_distance, haversine_km};
use einfo_retrieval::{Budget, Config, IncidentBoard, RetrievalContext, RetrievalEngine};

/// EINFO Retrieval - context retrieval for disaster-exercise simulations
#[derive(Parser)]
#[command(name = "einfo-retrieval", version, about)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(short, long, env = "EINFO_CONFIG")]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble the context for a query
    Query {
        /// Query text
        text: String,

        /// Character budget (defaults to the configured maximum)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Deadline for the query embedding in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Exercise board JSON providing the incidents
        #[arg(long)]
        board: Option<PathBuf>,

        /// Print intent, scope and sources as JSON
        #[arg(long)]
        json: bool,
    },
    /// Classify a query without retrieving
    Intent {
        /// Query text
        text: String,
    },
    /// Look up a name or address in the geo index
    Geocode {
        /// Name or address
        text: String,
    },
    /// Show index statistics
    Stats,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,einfo_retrieval=info",
        1 => "info,einfo_retrieval=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    tracing::debug!(
        knowledge_dir = %config.knowledge_dir.display(),
        index_dir = %config.index_dir.display(),
        model = %config.embedding.model,
        "configuration loaded"
    );
    let default_budget = config.retrieval.max_chars;
    let engine = RetrievalEngine::from_config(config)?;

    match cli.command {
        Command::Query {
            text,
            budget,
            timeout,
            board,
            json,
        } => {
            let incidents = match board {
                Some(path) => IncidentBoard::load(&path).await?,
                None => IncidentBoard::default(),
            };
            let context = RetrievalContext {
                incidents,
                request_bbox: None,
            };
            let mut limits = Budget::chars(budget.unwrap_or(default_budget));
            if let Some(secs) = timeout {
                limits = limits.with_timeout(Duration::from_secs(secs));
            }

            let retrieved = engine.retrieve(&text, &context, &limits).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&retrieved)?);
            } else if retrieved.is_empty() {
                println!("(no context)");
            } else {
                println!("{}", retrieved.text);
            }
        }
        Command::Intent { text } => {
            let intent = engine.detect_intent(&text).await;
            println!("{}", serde_json::to_string_pretty(&intent)?);
        }
        Command::Geocode { text } => {
            let geo = engine.ensure_fresh().await.geo;
            let fallback = engine.config().geo.fallback_center;
            let hits = geo.geocode(&text);
            if hits.is_empty() {
                println!("No match for {text:?}");
            }
            for hit in hits {
                let location = hit
                    .record
                    .geo
                    .map(|p| format!("{:.5}, {:.5}", p.lat, p.lon))
                    .unwrap_or_default();
                let distance = fallback
                    .zip(hit.record.geo)
                    .map(|(c, p)| format!("  ({} from center)", format_distance(haversine_km(c, p))))
                    .unwrap_or_default();
                println!(
                    "{:.2}  {}  [{}]  {location}{distance}",
                    hit.score,
                    hit.record.label(),
                    hit.record.doc_type
                );
            }
        }
        Command::Stats => {
            let snapshots = engine.ensure_fresh().await;
            let stats = json!({
                "knowledge": {
                    "chunks": snapshots.knowledge.len(),
                    "dim": snapshots.knowledge.dim,
                    "files": snapshots.knowledge.files,
                },
                "geo": snapshots.geo.stats(),
                "router": {
                    "categories": snapshots.router.dictionary().entries().len(),
                    "municipalities": snapshots.router.municipalities().len(),
                },
            });
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
