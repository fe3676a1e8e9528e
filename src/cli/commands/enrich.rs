//! Enrichment command.

use std::path::PathBuf;

use console::style;
use tokio::sync::{mpsc, watch};

use rowfill::config::Config;
use rowfill::services::{EnrichConfig, EnrichEvent, EnrichmentDriver, RetryPolicy, RowRange};

use super::AnnotatorKind;
use crate::cli::helpers::{build_annotator, load_dataset, open_store};
use crate::cli::progress::spawn_progress;

pub struct EnrichArgs {
    pub annotator: AnnotatorKind,
    pub column: Option<String>,
    pub range: RowRange,
    pub batch_size: Option<usize>,
    pub concurrency: Option<usize>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
}

/// Fill a derived column using the selected annotator.
pub async fn cmd_enrich(config: &Config, args: EnrichArgs) -> anyhow::Result<()> {
    let mut run = config.run.clone();
    if let Some(n) = args.batch_size {
        run.batch_size = n;
    }
    if let Some(n) = args.concurrency {
        run.concurrency = n;
    }
    if run.batch_size == 0 || run.concurrency == 0 {
        anyhow::bail!("--batch-size and --concurrency must be at least 1");
    }

    let store = open_store(config, args.input, args.output);
    let mut dataset = load_dataset(&store)?;
    let annotator = build_annotator(args.annotator, config)?;
    let column = args
        .column
        .unwrap_or_else(|| annotator.default_column().to_string());

    if !annotator.is_available().await {
        println!("{} {} is not available", style("✗").red(), annotator.name());
        println!("  {}", annotator.availability_hint());
        anyhow::bail!("{} is not available", annotator.name());
    }

    println!(
        "{} {} → column '{}' of {} ({} rows)",
        style("→").cyan(),
        annotator.name(),
        column,
        store.input().display(),
        dataset.len()
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!(
                "{} Interrupt received, saving after the rows in flight...",
                style("!").yellow()
            );
            let _ = stop_tx.send(true);
        }
    });

    let (event_tx, event_rx) = mpsc::channel::<EnrichEvent>(1024);
    let progress = spawn_progress(event_rx);

    let retry = RetryPolicy::from_config(&config.retry);
    let driver = EnrichmentDriver::new(EnrichConfig::from(&run), retry)
        .with_events(event_tx)
        .with_stop(stop_rx);
    let result = driver
        .run(&mut dataset, &column, args.range, annotator.as_ref(), &store)
        .await;

    // Closing the channel lets the progress task finish.
    drop(driver);
    let _ = progress.await;

    let summary = result?;
    let marker = if summary.interrupted {
        style("!").yellow()
    } else {
        style("✓").green()
    };
    println!(
        "{} {} rows processed: {} filled, {} empty, {} failed ({:.1}s)",
        marker,
        summary.attempted,
        summary.succeeded,
        summary.empty,
        summary.failed,
        summary.elapsed.as_secs_f64()
    );
    println!(
        "  {} saved to {}",
        style("→").dim(),
        store.output().display()
    );
    if summary.interrupted {
        println!(
            "  {} run the same command again to continue",
            style("→").dim()
        );
    }
    Ok(())
}
