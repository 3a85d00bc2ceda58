//! Folio CLI entry point
//!
//! Orchestrates the reading and syntopical services: single-book analysis,
//! multi-book comparison, the downstream library steps, and batch/parallel
//! variants. Exit code 0 means the requested work (or any part of a batch)
//! succeeded.

mod orchestrator;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(
    name = "folio",
    version,
    about = "Unified CLI for reading services - orchestrates analysis and syntopical comparison"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full syntopical pipeline: analyze all books then compare
    AnalyzeSyntopical {
        /// EPUB files to analyze and compare (at least two)
        #[arg(required = true, num_args = 2..)]
        books: Vec<PathBuf>,
    },
    /// Analyze a single book through the reading pipeline (8 stages)
    Analyze {
        /// EPUB file to analyze
        book: PathBuf,
    },
    /// Compare multiple book analyses (syntopical stages 1-3)
    Compare {
        /// Markdown files to compare (at least two)
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,
    },
    /// Connect a comparison to the library (stage 4)
    LibraryConnect {
        /// Comparison markdown file
        comparison: PathBuf,
    },
    /// Find gaps in a comparison (stage 5)
    FindGaps {
        /// Comparison markdown file
        comparison: PathBuf,
    },
    /// Batch analyze multiple books in parallel
    BatchAnalyze {
        /// EPUB files to analyze in parallel
        #[arg(required = true)]
        books: Vec<PathBuf>,
        /// Number of parallel workers
        #[arg(long, default_value_t = 3)]
        workers: usize,
    },
    /// Full pipeline with batch processing: analyze then synthesize
    BatchPipeline {
        /// EPUB files to process in parallel
        #[arg(required = true)]
        books: Vec<PathBuf>,
        /// Number of parallel workers
        #[arg(long, default_value_t = 5)]
        workers: usize,
        /// Run syntopical synthesis after analysis
        #[arg(long)]
        synthesize: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let orchestrator = Arc::new(Orchestrator::from_env());

    let success = match cli.command {
        Commands::AnalyzeSyntopical { books } => orchestrator.analyze_syntopical(&books).await,
        Commands::Analyze { book } => orchestrator.analyze(&book).await.is_some(),
        Commands::Compare { files } => orchestrator.compare(&files).await.is_some(),
        Commands::LibraryConnect { comparison } => orchestrator.library_connect(&comparison).await,
        Commands::FindGaps { comparison } => orchestrator.find_gaps(&comparison).await,
        Commands::BatchAnalyze { books, workers } => {
            let results = orchestrator.batch_analyze(&books, workers).await;
            results.iter().any(|(_, output)| output.is_some())
        }
        Commands::BatchPipeline {
            books,
            workers,
            synthesize,
        } => orchestrator.batch_pipeline(&books, workers, synthesize).await,
    };

    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
