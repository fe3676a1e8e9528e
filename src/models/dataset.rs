//! In-memory table of records with a stable column set.
//!
//! Cells are `Option<String>`: `None` is the absent sentinel ("not yet
//! processed"), `Some` is a present value, which may be the empty string.

use thiserror::Error;

/// Errors raised when a dataset is built or addressed incorrectly.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatasetError {
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Row {index} out of bounds (dataset has {len} rows)")]
    RowOutOfBounds { index: usize, len: usize },

    #[error("Row {index} has {found} cells, expected at most {expected}")]
    RowTooWide {
        index: usize,
        found: usize,
        expected: usize,
    },

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),
}

/// An ordered sequence of records indexed `0..len`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl Dataset {
    /// Create an empty dataset with the given header.
    pub fn new<I, S>(columns: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = Vec::new();
        for column in columns {
            let column = column.into();
            if names.contains(&column) {
                return Err(DatasetError::DuplicateColumn(column));
            }
            names.push(column);
        }
        Ok(Self {
            columns: names,
            rows: Vec::new(),
        })
    }

    /// Build a dataset from a header and raw rows.
    ///
    /// Short rows are padded with absent cells; rows wider than the header
    /// are rejected.
    pub fn from_parts(
        columns: Vec<String>,
        rows: Vec<Vec<Option<String>>>,
    ) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(columns)?;
        for row in rows {
            dataset.push_row(row)?;
        }
        Ok(dataset)
    }

    /// Append a row, padding it to the current width.
    pub fn push_row(&mut self, mut cells: Vec<Option<String>>) -> Result<usize, DatasetError> {
        let index = self.rows.len();
        if cells.len() > self.columns.len() {
            return Err(DatasetError::RowTooWide {
                index,
                found: cells.len(),
                expected: self.columns.len(),
            });
        }
        cells.resize(self.columns.len(), None);
        self.rows.push(cells);
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Add `name` if it does not exist yet, backfilling every row with the
    /// absent sentinel. Returns `true` when the column was created.
    ///
    /// Idempotent: calling it again for an existing column is a no-op.
    pub fn ensure_column(&mut self, name: &str) -> bool {
        if self.has_column(name) {
            return false;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        true
    }

    /// Read a cell. `None` means absent (or unknown column / row).
    pub fn get(&self, index: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(index)?.get(col)?.as_deref()
    }

    /// Whether the cell holds a value (possibly empty).
    pub fn is_present(&self, index: usize, column: &str) -> bool {
        self.get(index, column).is_some()
    }

    /// Write a present value into a cell.
    pub fn set(
        &mut self,
        index: usize,
        column: &str,
        value: impl Into<String>,
    ) -> Result<(), DatasetError> {
        *self.cell_mut(index, column)? = Some(value.into());
        Ok(())
    }

    /// Reset a cell to the absent sentinel. Returns the previous value.
    pub fn clear(&mut self, index: usize, column: &str) -> Result<Option<String>, DatasetError> {
        Ok(self.cell_mut(index, column)?.take())
    }

    /// Borrow a row as a [`Record`].
    pub fn record(&self, index: usize) -> Option<Record<'_>> {
        self.rows.get(index).map(|cells| Record {
            index,
            columns: &self.columns,
            cells,
        })
    }

    /// Fill counts for one column, or `None` if the column does not exist.
    pub fn column_stats(&self, column: &str) -> Option<ColumnStats> {
        let col = self.column_index(column)?;
        let mut stats = ColumnStats::default();
        for row in &self.rows {
            match row[col].as_deref() {
                None => stats.absent += 1,
                Some("") => stats.empty += 1,
                Some(_) => stats.filled += 1,
            }
        }
        Some(stats)
    }

    /// Iterate over raw rows in index order.
    pub fn rows(&self) -> impl Iterator<Item = &[Option<String>]> {
        self.rows.iter().map(|r| r.as_slice())
    }

    fn cell_mut(
        &mut self,
        index: usize,
        column: &str,
    ) -> Result<&mut Option<String>, DatasetError> {
        let col = self
            .column_index(column)
            .ok_or_else(|| DatasetError::UnknownColumn(column.to_string()))?;
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(index)
            .ok_or(DatasetError::RowOutOfBounds { index, len })?;
        Ok(&mut row[col])
    }
}

/// How many cells of a column are filled, present but empty, or absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnStats {
    pub filled: usize,
    pub empty: usize,
    pub absent: usize,
}

impl ColumnStats {
    /// Cells holding a value, empty or not.
    pub fn present(&self) -> usize {
        self.filled + self.empty
    }
}

/// Borrowed view of one row.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    index: usize,
    columns: &'a [String],
    cells: &'a [Option<String>],
}

impl<'a> Record<'a> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Present value of a field, if any.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.cells.get(col)?.as_deref()
    }

    /// Field text, with absent and unknown fields rendered as "".
    pub fn text(&self, column: &str) -> &'a str {
        self.get(column).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_parts(
            vec!["idx".to_string(), "text".to_string()],
            vec![
                vec![Some("0".to_string()), Some("a".to_string())],
                vec![Some("1".to_string())],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_short_rows_are_padded_with_absent() {
        let ds = sample();
        assert_eq!(ds.get(0, "text"), Some("a"));
        assert_eq!(ds.get(1, "text"), None);
        assert!(!ds.is_present(1, "text"));
    }

    #[test]
    fn test_wide_rows_rejected() {
        let err = Dataset::from_parts(
            vec!["a".to_string()],
            vec![vec![Some("1".to_string()), Some("2".to_string())]],
        )
        .unwrap_err();
        assert_eq!(
            err,
            DatasetError::RowTooWide {
                index: 0,
                found: 2,
                expected: 1
            }
        );
    }

    #[test]
    fn test_ensure_column_backfills_and_is_idempotent() {
        let mut ds = sample();
        assert!(ds.ensure_column("caption"));
        assert!(!ds.ensure_column("caption"));
        assert_eq!(ds.columns().len(), 3);
        assert!(ds.rows().all(|r| r.len() == 3 && r[2].is_none()));
    }

    #[test]
    fn test_empty_string_is_present() {
        let mut ds = sample();
        ds.set(1, "text", "").unwrap();
        assert!(ds.is_present(1, "text"));
        assert_eq!(ds.clear(1, "text").unwrap(), Some(String::new()));
        assert!(!ds.is_present(1, "text"));
    }

    #[test]
    fn test_set_unknown_column_or_row() {
        let mut ds = sample();
        assert_eq!(
            ds.set(0, "nope", "x"),
            Err(DatasetError::UnknownColumn("nope".to_string()))
        );
        assert_eq!(
            ds.set(9, "text", "x"),
            Err(DatasetError::RowOutOfBounds { index: 9, len: 2 })
        );
    }

    #[test]
    fn test_record_text_defaults_to_empty() {
        let ds = sample();
        let record = ds.record(1).unwrap();
        assert_eq!(record.index(), 1);
        assert_eq!(record.text("idx"), "1");
        assert_eq!(record.text("text"), "");
        assert_eq!(record.text("missing"), "");
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        assert_eq!(
            Dataset::new(["a", "a"]).unwrap_err(),
            DatasetError::DuplicateColumn("a".to_string())
        );
    }

    #[test]
    fn test_column_stats() {
        let mut ds = sample();
        ds.ensure_column("caption");
        ds.set(0, "caption", "").unwrap();
        let stats = ds.column_stats("text").unwrap();
        assert_eq!(
            stats,
            ColumnStats {
                filled: 1,
                empty: 0,
                absent: 1
            }
        );
        let stats = ds.column_stats("caption").unwrap();
        assert_eq!(stats.empty, 1);
        assert_eq!(stats.present(), 1);
        assert!(ds.column_stats("missing").is_none());
    }
}
