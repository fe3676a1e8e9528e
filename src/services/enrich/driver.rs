//! Enrichment driver: one parameterized loop for every annotator.

use std::time::Instant;

use futures::future::join_all;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::models::Dataset;
use crate::services::annotation::{AnnotationError, AnnotationOutput, Annotator, WorkItem};
use crate::services::retry::{Attempted, RetryPolicy};
use crate::store::{StoreError, TabularStore};

use super::checkpoint::Checkpointer;
use super::selector::{select, RowRange};
use super::{EnrichConfig, EnrichError, EnrichEvent, RunSummary};

/// Drives an annotator over the unprocessed rows of a dataset.
///
/// The driver is the only writer of the dataset. Rows are dispatched in
/// windows of `concurrency`; results are written in row order once the whole
/// window has resolved. A stop signal is observed between windows.
pub struct EnrichmentDriver {
    config: EnrichConfig,
    retry: RetryPolicy,
    events: Option<mpsc::Sender<EnrichEvent>>,
    stop: Option<watch::Receiver<bool>>,
}

impl EnrichmentDriver {
    pub fn new(config: EnrichConfig, retry: RetryPolicy) -> Self {
        Self {
            config,
            retry,
            events: None,
            stop: None,
        }
    }

    /// Emit progress events on `tx`. Events are dropped if the receiver
    /// falls behind.
    pub fn with_events(mut self, tx: mpsc::Sender<EnrichEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Stop between windows once `stop` turns true.
    pub fn with_stop(mut self, stop: watch::Receiver<bool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn emit(&self, event: EnrichEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.try_send(event) {
                debug!("Dropped progress event: {}", e);
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Fill `column` for every unprocessed row in `range`.
    ///
    /// The dataset is saved through `store` every `batch_size` processed rows
    /// and once more at the end, including after an interrupt.
    pub async fn run(
        &self,
        dataset: &mut Dataset,
        column: &str,
        range: RowRange,
        annotator: &dyn Annotator,
        store: &dyn TabularStore,
    ) -> Result<RunSummary, EnrichError> {
        range.validate()?;
        for required in annotator.required_columns() {
            if !dataset.has_column(&required) {
                return Err(EnrichError::Configuration(format!(
                    "{} needs column '{}', which the dataset does not have",
                    annotator.name(),
                    required
                )));
            }
        }
        if dataset.ensure_column(column) {
            info!("Added column '{}'", column);
        }

        let pending: Vec<usize> = select(dataset, column, range).collect();
        let total = pending.len();
        info!(
            "{}: {} rows need '{}' ({} rows total)",
            annotator.name(),
            total,
            column,
            dataset.len()
        );
        self.emit(EnrichEvent::Started {
            column: column.to_string(),
            total,
        });

        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut checkpointer = Checkpointer::new(store, self.config.batch_size);

        for window in pending.chunks(self.config.concurrency.max(1)) {
            if self.stop_requested() {
                info!(
                    "Stop requested after {} rows, {} left unprocessed",
                    summary.attempted,
                    total - summary.attempted
                );
                summary.interrupted = true;
                self.emit(EnrichEvent::Interrupted {
                    processed: summary.attempted,
                    remaining: total - summary.attempted,
                });
                break;
            }

            let items: Vec<(usize, Result<WorkItem, AnnotationError>)> = window
                .iter()
                .map(|&index| {
                    self.emit(EnrichEvent::RowStarted { index });
                    let item = match dataset.record(index) {
                        Some(record) => annotator.prepare(&record),
                        None => Err(AnnotationError::MissingInput(format!(
                            "row {} does not exist",
                            index
                        ))),
                    };
                    (index, item)
                })
                .collect();

            let outcomes = join_all(
                items
                    .into_iter()
                    .map(|(index, item)| self.process(annotator, index, item)),
            )
            .await;

            for (index, outcome) in outcomes {
                self.write(dataset, column, index, outcome, &mut summary)?;

                match checkpointer.record(dataset) {
                    Ok(true) => self.emit(EnrichEvent::Checkpointed {
                        processed: summary.attempted,
                    }),
                    Ok(false) => {}
                    Err(source) => {
                        return Err(Self::abort(&checkpointer, store, dataset, source));
                    }
                }
            }
        }

        if let Err(source) = checkpointer.save(dataset) {
            return Err(EnrichError::Checkpoint {
                rows_at_risk: checkpointer.pending(),
                source,
            });
        }

        summary.checkpoints = checkpointer.saves();
        summary.elapsed = started.elapsed();
        info!(
            "{} on '{}': {} attempted, {} succeeded, {} empty, {} failed in {:.1}s",
            annotator.name(),
            column,
            summary.attempted,
            summary.succeeded,
            summary.empty,
            summary.failed,
            summary.elapsed.as_secs_f64()
        );
        self.emit(EnrichEvent::Finished(summary.clone()));
        Ok(summary)
    }

    /// Build-and-call for one row under the retry policy.
    async fn process(
        &self,
        annotator: &dyn Annotator,
        index: usize,
        item: Result<WorkItem, AnnotationError>,
    ) -> (usize, Attempted) {
        let item = match item {
            Ok(item) => item,
            Err(error) => return (index, Attempted::Failed { error, attempts: 0 }),
        };
        let label = format!("Row {}", index);
        let outcome = self
            .retry
            .execute(&label, || annotator.annotate(&item))
            .await;
        (index, outcome)
    }

    /// Record one row's outcome in the dataset and the summary.
    fn write(
        &self,
        dataset: &mut Dataset,
        column: &str,
        index: usize,
        outcome: Attempted,
        summary: &mut RunSummary,
    ) -> Result<(), EnrichError> {
        summary.attempted += 1;
        match outcome {
            Attempted::Done { output, attempts } => {
                let empty = output == AnnotationOutput::NoResult;
                dataset.set(index, column, output.into_cell())?;
                if empty {
                    summary.empty += 1;
                } else {
                    summary.succeeded += 1;
                }
                self.emit(EnrichEvent::RowCompleted {
                    index,
                    empty,
                    attempts,
                });
            }
            Attempted::Failed { error, attempts } => {
                warn!(
                    "Row {} failed permanently after {} attempt(s): {}",
                    index, attempts, error
                );
                let value = self.config.failure_marker.clone().unwrap_or_default();
                dataset.set(index, column, value)?;
                summary.failed += 1;
                self.emit(EnrichEvent::RowFailed {
                    index,
                    error: error.to_string(),
                    attempts,
                });
            }
        }
        Ok(())
    }

    /// A checkpoint failed: try one last save, then report the rows at risk.
    fn abort(
        checkpointer: &Checkpointer<'_>,
        store: &dyn TabularStore,
        dataset: &Dataset,
        source: StoreError,
    ) -> EnrichError {
        let rows_at_risk = checkpointer.pending();
        match store.save(dataset) {
            Ok(()) => {
                warn!("Checkpoint failed but the final save succeeded: {}", source);
                EnrichError::Checkpoint {
                    rows_at_risk: 0,
                    source,
                }
            }
            Err(e) => {
                warn!(
                    "Final save failed: {} ({} rows at risk since the last checkpoint)",
                    e, rows_at_risk
                );
                EnrichError::Checkpoint {
                    rows_at_risk,
                    source,
                }
            }
        }
    }
}
