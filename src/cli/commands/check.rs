//! Service availability check.

use console::style;

use rowfill::config::Config;
use rowfill::store::TabularStore;

use super::AnnotatorKind;
use crate::cli::helpers::{build_annotator, open_store};

/// Probe each selected annotator and report whether it can run.
pub async fn cmd_check(config: &Config, kinds: &[AnnotatorKind]) -> anyhow::Result<()> {
    let kinds: Vec<AnnotatorKind> = if kinds.is_empty() {
        AnnotatorKind::all().to_vec()
    } else {
        kinds.to_vec()
    };

    let store = open_store(config, None, None);
    if store.exists() {
        println!("{} dataset {}", style("✓").green(), store.describe());
    } else {
        println!(
            "{} dataset {} not found",
            style("✗").red(),
            store.describe()
        );
    }

    let mut unavailable = 0;
    for kind in kinds {
        let annotator = match build_annotator(kind, config) {
            Ok(annotator) => annotator,
            Err(e) => {
                println!("{} {:?}: {}", style("-").dim(), kind, e);
                continue;
            }
        };
        if annotator.is_available().await {
            println!("{} {}", style("✓").green(), annotator.name());
        } else {
            unavailable += 1;
            println!(
                "{} {}: {}",
                style("✗").red(),
                annotator.name(),
                annotator.availability_hint()
            );
        }
    }

    if unavailable > 0 {
        anyhow::bail!("{} annotator(s) unavailable", unavailable);
    }
    Ok(())
}
