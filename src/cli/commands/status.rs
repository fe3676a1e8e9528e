//! Column fill status.

use std::path::PathBuf;

use console::style;

use rowfill::config::Config;

use crate::cli::helpers::{load_dataset, open_store};

/// Print filled / empty / absent counts per column.
pub fn cmd_status(
    config: &Config,
    input: Option<PathBuf>,
    columns: &[String],
) -> anyhow::Result<()> {
    let store = open_store(config, input, None);
    let dataset = load_dataset(&store)?;

    println!(
        "{} {} ({} rows)",
        style("→").cyan(),
        store.load_path().display(),
        dataset.len()
    );

    let names: Vec<String> = if columns.is_empty() {
        dataset.columns().to_vec()
    } else {
        columns.to_vec()
    };
    let width = names.iter().map(|n| n.len()).max().unwrap_or(0).max(6);

    println!(
        "  {:<width$}  {:>8}  {:>8}  {:>8}",
        style("column").bold(),
        "filled",
        "empty",
        "absent",
        width = width
    );
    for name in &names {
        match dataset.column_stats(name) {
            Some(stats) => {
                let absent = if stats.absent > 0 {
                    style(stats.absent.to_string()).yellow()
                } else {
                    style(stats.absent.to_string()).green()
                };
                println!(
                    "  {:<width$}  {:>8}  {:>8}  {:>8}",
                    name,
                    stats.filled,
                    stats.empty,
                    absent,
                    width = width
                );
            }
            None => println!(
                "  {:<width$}  {}",
                name,
                style("not in dataset").dim(),
                width = width
            ),
        }
    }
    Ok(())
}
