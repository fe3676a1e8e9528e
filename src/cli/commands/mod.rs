//! CLI parser and dispatch to command-specific modules.

mod check;
mod enrich;
mod reset;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use rowfill::RowRange;

use super::helpers::load_config;

/// Annotation backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AnnotatorKind {
    /// Caption images through the caption service
    Caption,
    /// Extract text from images through the OCR service
    Ocr,
    /// Link rows to images already present in the image directory
    ImagePath,
    /// Generate an image per row through the image generator
    Synthesize,
}

impl AnnotatorKind {
    pub fn all() -> [AnnotatorKind; 4] {
        [
            AnnotatorKind::ImagePath,
            AnnotatorKind::Synthesize,
            AnnotatorKind::Caption,
            AnnotatorKind::Ocr,
        ]
    }
}

#[derive(Parser)]
#[command(name = "rowfill")]
#[command(about = "Incremental, resumable enrichment of tabular datasets")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Fill a derived column for every row that does not have it yet
    Enrich {
        /// Annotation backend to run
        #[arg(value_enum)]
        annotator: AnnotatorKind,
        /// Column to fill (defaults to the annotator's column)
        #[arg(long)]
        column: Option<String>,
        /// First row to consider (inclusive)
        #[arg(long)]
        start: Option<usize>,
        /// Row to stop before (exclusive)
        #[arg(long)]
        end: Option<usize>,
        /// Rows processed between checkpoints
        #[arg(long)]
        batch_size: Option<usize>,
        /// Rows in flight at once
        #[arg(long)]
        concurrency: Option<usize>,
        /// Input table (overrides config)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output table (defaults to the input table)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show how much of each column is filled
    Status {
        /// Table to inspect (overrides config)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Columns to report (defaults to all)
        #[arg(long = "column")]
        columns: Vec<String>,
    },

    /// Clear derived cells so the next run processes those rows again
    Reset {
        /// Column to clear
        #[arg(long)]
        column: String,
        /// First row to clear (inclusive)
        #[arg(long)]
        start: Option<usize>,
        /// Row to stop before (exclusive)
        #[arg(long)]
        end: Option<usize>,
        /// Only clear cells holding exactly this value
        #[arg(long)]
        value: Option<String>,
        /// Input table (overrides config)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Output table (defaults to the input table)
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check that configured services are reachable
    Check {
        /// Annotators to probe (defaults to all)
        #[arg(value_enum)]
        annotators: Vec<AnnotatorKind>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Enrich {
            annotator,
            column,
            start,
            end,
            batch_size,
            concurrency,
            input,
            output,
        } => {
            enrich::cmd_enrich(
                &config,
                enrich::EnrichArgs {
                    annotator,
                    column,
                    range: RowRange::new(start, end),
                    batch_size,
                    concurrency,
                    input,
                    output,
                },
            )
            .await
        }
        Commands::Status { input, columns } => status::cmd_status(&config, input, &columns),
        Commands::Reset {
            column,
            start,
            end,
            value,
            input,
            output,
        } => reset::cmd_reset(
            &config,
            &column,
            RowRange::new(start, end),
            value.as_deref(),
            input,
            output,
        ),
        Commands::Check { annotators } => check::cmd_check(&config, &annotators).await,
    }
}
