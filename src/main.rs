use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use dupescope::analysis::CorpusAnalyzer;
use dupescope::config::Config;
use dupescope::corpus::loader::{load_corpus, load_graph};
use dupescope::output::terminal;

/// Dupescope: find duplicated and overlapping documentation.
///
/// Extracts a concept vocabulary from a corpus of documents and scores
/// document pairs by exact text, shared concepts and TF-IDF similarity.
#[derive(Parser)]
#[command(name = "dupescope", version, about)]
struct Cli {
    /// Concept graph JSON to use instead of the one derived from extraction
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the most frequent concepts in the corpus
    Concepts {
        /// Corpus JSON file (path -> document map, or a list of documents)
        corpus: PathBuf,

        /// Number of concepts to show (default: 25)
        #[arg(long, default_value = "25")]
        limit: usize,
    },

    /// Compare two documents
    Compare {
        corpus: PathBuf,
        /// Path of the first document as it appears in the corpus
        a: String,
        /// Path of the second document
        b: String,
    },

    /// List documents similar to one document
    Similar {
        corpus: PathBuf,
        path: String,

        /// Minimum overall score (default: 0.5)
        #[arg(long, default_value = "0.5")]
        min: f64,

        /// Max results (default: 10)
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Group near-duplicate documents into clusters
    Duplicates {
        corpus: PathBuf,

        /// Minimum overall score to join a cluster (default: overall threshold)
        #[arg(long)]
        min: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dupescope=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Concepts { corpus, limit } => {
            let analyzer = open_analyzer(config, &corpus, cli.graph.as_deref())?;
            terminal::display_top_concepts(&analyzer.top_concepts(limit));

            let extraction = analyzer.extraction();
            if extraction.stopped_early {
                println!(
                    "{}",
                    format!(
                        "Concept ceiling reached after {} documents; later documents were not read.",
                        extraction.documents_processed
                    )
                    .yellow()
                );
            }
        }

        Commands::Compare { corpus, a, b } => {
            let analyzer = open_analyzer(config, &corpus, cli.graph.as_deref())?;
            for path in [&a, &b] {
                if !analyzer.engine().contains(path) {
                    bail!("Document not found in corpus: {path}");
                }
            }
            let result = analyzer.compare(&a, &b).await?;
            terminal::display_comparison(&result);
        }

        Commands::Similar {
            corpus,
            path,
            min,
            limit,
        } => {
            let analyzer = open_analyzer(config, &corpus, cli.graph.as_deref())?;
            if !analyzer.engine().contains(&path) {
                bail!("Document not found in corpus: {path}");
            }
            let similar = analyzer.find_similar(&path, min, limit);
            terminal::display_similar(&path, &similar);
        }

        Commands::Duplicates { corpus, min } => {
            let min = min.unwrap_or(config.thresholds.overall);
            let analyzer = open_analyzer(config, &corpus, cli.graph.as_deref())?;

            let spinner = ProgressBar::new_spinner();
            spinner.set_style(ProgressStyle::default_spinner().template("  {spinner} {msg}")?);
            spinner.set_message(format!(
                "Comparing {} documents...",
                analyzer.engine().corpus().len()
            ));
            spinner.enable_steady_tick(Duration::from_millis(100));

            let clusters = analyzer.find_duplicate_clusters(min);
            spinner.finish_and_clear();

            terminal::display_clusters(&clusters);
            terminal::display_cache_stats(&analyzer.cache_stats());
        }
    }

    Ok(())
}

/// Load the corpus (and optional graph) and build an analyzer over it.
fn open_analyzer(
    config: Config,
    corpus_path: &Path,
    graph_path: Option<&Path>,
) -> Result<CorpusAnalyzer> {
    let corpus = load_corpus(corpus_path)?;
    let mut analyzer = CorpusAnalyzer::new(config)?;
    match graph_path {
        Some(path) => {
            let graph = load_graph(path)?;
            analyzer.update_data_with_graph(corpus, graph);
        }
        None => analyzer.update_data(corpus),
    }
    info!(
        concepts = analyzer.extraction().concepts.len(),
        "Analyzer ready"
    );
    Ok(analyzer)
}
