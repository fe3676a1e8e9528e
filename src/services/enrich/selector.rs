//! Row selection: which rows still need a value in the derived column.

use crate::models::Dataset;

use super::EnrichError;

/// Half-open row range `[start, end)`. Unset bounds mean the start or the end
/// of the dataset; bounds past the end are clamped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowRange {
    pub start: Option<usize>,
    pub end: Option<usize>,
}

impl RowRange {
    pub fn new(start: Option<usize>, end: Option<usize>) -> Self {
        Self { start, end }
    }

    pub fn all() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), EnrichError> {
        match (self.start, self.end) {
            (Some(start), Some(end)) if start > end => Err(EnrichError::Configuration(format!(
                "invalid row range: start {} is after end {}",
                start, end
            ))),
            _ => Ok(()),
        }
    }

    /// Concrete bounds for a dataset of `len` rows.
    pub fn bounds(&self, len: usize) -> (usize, usize) {
        let end = self.end.unwrap_or(len).min(len);
        let start = self.start.unwrap_or(0).min(end);
        (start, end)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.start.map_or(true, |s| index >= s) && self.end.map_or(true, |e| index < e)
    }
}

/// Indices in `range`, ascending, whose `column` cell is absent.
///
/// A column the dataset does not have yet counts as absent everywhere.
pub fn select<'a>(
    dataset: &'a Dataset,
    column: &'a str,
    range: RowRange,
) -> impl Iterator<Item = usize> + 'a {
    let (start, end) = range.bounds(dataset.len());
    (start..end).filter(move |&index| !dataset.is_present(index, column))
}

/// Clear cells in `range` back to absent so the next run selects them again.
///
/// With `only` set, just the cells holding exactly that value are cleared
/// (for example `""` or a failure marker). Returns how many were cleared.
pub fn requeue(
    dataset: &mut Dataset,
    column: &str,
    range: RowRange,
    only: Option<&str>,
) -> Result<usize, EnrichError> {
    range.validate()?;
    if !dataset.has_column(column) {
        return Err(EnrichError::Configuration(format!(
            "dataset has no column '{}'",
            column
        )));
    }

    let (start, end) = range.bounds(dataset.len());
    let mut cleared = 0;
    for index in start..end {
        let matches = match (dataset.get(index, column), only) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(value), Some(wanted)) => value == wanted,
        };
        if matches {
            dataset.clear(index, column)?;
            cleared += 1;
        }
    }
    Ok(cleared)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Dataset {
        Dataset::from_parts(
            vec!["name".to_string(), "caption".to_string()],
            vec![
                vec![Some("a".to_string()), Some("done".to_string())],
                vec![Some("b".to_string()), None],
                vec![Some("c".to_string()), Some(String::new())],
                vec![Some("d".to_string()), None],
                vec![Some("e".to_string()), None],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_selects_only_absent_cells() {
        let ds = dataset();
        let selected: Vec<usize> = select(&ds, "caption", RowRange::all()).collect();
        assert_eq!(selected, vec![1, 3, 4]);
    }

    #[test]
    fn test_range_is_half_open_and_clamped() {
        let ds = dataset();
        let selected: Vec<usize> =
            select(&ds, "caption", RowRange::new(Some(1), Some(4))).collect();
        assert_eq!(selected, vec![1, 3]);

        let clamped: Vec<usize> =
            select(&ds, "caption", RowRange::new(Some(3), Some(100))).collect();
        assert_eq!(clamped, vec![3, 4]);

        let past_end: Vec<usize> = select(&ds, "caption", RowRange::new(Some(10), None)).collect();
        assert!(past_end.is_empty());
    }

    #[test]
    fn test_selection_stays_inside_range() {
        let rows = (0..30)
            .map(|i| {
                let caption = (i % 3 == 0).then(|| format!("caption {}", i));
                vec![Some(i.to_string()), caption]
            })
            .collect();
        let columns = vec!["idx".to_string(), "caption".to_string()];
        let ds = Dataset::from_parts(columns, rows).unwrap();
        let range = RowRange::new(Some(10), Some(20));

        let selected: Vec<usize> = select(&ds, "caption", range).collect();
        assert!(selected.iter().all(|&i| (10..20).contains(&i)));
        assert!(selected.iter().all(|&i| range.contains(i)));
        assert_eq!(selected, vec![10, 11, 13, 14, 16, 17, 19]);
    }

    #[test]
    fn test_missing_column_selects_everything() {
        let ds = dataset();
        assert_eq!(select(&ds, "ocr", RowRange::all()).count(), 5);
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        assert!(RowRange::new(Some(5), Some(2)).validate().is_err());
        assert!(RowRange::new(Some(2), Some(2)).validate().is_ok());
        assert!(RowRange::new(None, Some(2)).validate().is_ok());
    }

    #[test]
    fn test_contains() {
        let range = RowRange::new(Some(2), Some(4));
        assert!(!range.contains(1));
        assert!(range.contains(2));
        assert!(range.contains(3));
        assert!(!range.contains(4));
        assert!(RowRange::all().contains(1_000));
    }

    #[test]
    fn test_requeue_only_matching_value() {
        let mut ds = dataset();
        let cleared = requeue(&mut ds, "caption", RowRange::all(), Some("")).unwrap();
        assert_eq!(cleared, 1);
        assert!(!ds.is_present(2, "caption"));
        assert_eq!(ds.get(0, "caption"), Some("done"));
    }

    #[test]
    fn test_requeue_range() {
        let mut ds = dataset();
        let cleared = requeue(&mut ds, "caption", RowRange::new(Some(1), None), None).unwrap();
        assert_eq!(cleared, 1);
        assert_eq!(ds.get(0, "caption"), Some("done"));
        assert_eq!(select(&ds, "caption", RowRange::all()).count(), 4);
    }

    #[test]
    fn test_requeue_unknown_column() {
        let mut ds = dataset();
        assert!(matches!(
            requeue(&mut ds, "nope", RowRange::all(), None),
            Err(EnrichError::Configuration(_))
        ));
    }
}
