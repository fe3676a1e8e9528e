//! Progress display driven by enrichment events.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use rowfill::services::EnrichEvent;

use super::helpers::truncate;

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓░")
}

/// Consume driver events on a background task until the channel closes.
pub fn spawn_progress(mut event_rx: mpsc::Receiver<EnrichEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut bar: Option<ProgressBar> = None;
        while let Some(event) = event_rx.recv().await {
            match event {
                EnrichEvent::Started { column, total } => {
                    let progress = ProgressBar::new(total as u64);
                    progress.set_style(bar_style());
                    progress.set_message(format!("Filling {}", column));
                    bar = Some(progress);
                }
                EnrichEvent::RowStarted { index } => {
                    if let Some(ref progress) = bar {
                        progress.set_message(format!("row {}", index));
                    }
                }
                EnrichEvent::RowCompleted { .. } => {
                    if let Some(ref progress) = bar {
                        progress.inc(1);
                    }
                }
                EnrichEvent::RowFailed {
                    index,
                    error,
                    attempts,
                } => {
                    if let Some(ref progress) = bar {
                        progress.println(format!(
                            "{} row {} ({} attempts): {}",
                            style("✗").red(),
                            index,
                            attempts,
                            truncate(&error, 100)
                        ));
                        progress.inc(1);
                    }
                }
                EnrichEvent::Checkpointed { processed } => {
                    if let Some(ref progress) = bar {
                        progress.println(format!(
                            "{} checkpoint after {} rows",
                            style("↓").dim(),
                            processed
                        ));
                    }
                }
                EnrichEvent::Interrupted { remaining, .. } => {
                    if let Some(ref progress) = bar {
                        progress.println(format!(
                            "{} interrupted, {} rows left for the next run",
                            style("!").yellow(),
                            remaining
                        ));
                    }
                }
                EnrichEvent::Finished(_) => {
                    if let Some(progress) = bar.take() {
                        progress.finish_and_clear();
                    }
                }
            }
        }
        if let Some(progress) = bar.take() {
            progress.finish_and_clear();
        }
    })
}
