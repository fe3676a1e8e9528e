//! Re-queue rows by clearing derived cells.

use std::path::PathBuf;

use anyhow::Context;
use console::style;

use rowfill::config::Config;
use rowfill::services::enrich::requeue;
use rowfill::services::RowRange;
use rowfill::store::TabularStore;

use crate::cli::helpers::{load_dataset, open_store};

/// Clear `column` in `range` (optionally only cells equal to `value`) and save.
pub fn cmd_reset(
    config: &Config,
    column: &str,
    range: RowRange,
    value: Option<&str>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let store = open_store(config, input, output);
    let mut dataset = load_dataset(&store)?;

    let cleared = requeue(&mut dataset, column, range, value)?;
    if cleared == 0 {
        println!("{} Nothing to reset in '{}'", style("!").yellow(), column);
        return Ok(());
    }

    store
        .save(&dataset)
        .with_context(|| format!("saving {}", store.describe()))?;
    println!(
        "{} Cleared {} cells in '{}'; those rows will be processed on the next run",
        style("✓").green(),
        cleared,
        column
    );
    Ok(())
}
