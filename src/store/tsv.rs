//! Tab-separated table files.
//!
//! Header row of column names, one line per record, UTF-8. Fields containing
//! a tab, a line break or a double quote are wrapped in `"` with inner quotes
//! doubled. An absent cell is an empty field; a present empty cell is written
//! as `""` so the two survive a round trip.
//!
//! Blank lines are skipped when the table has more than one column. In a
//! single-column table a blank line is a record whose only cell is absent.

use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{StoreError, TabularStore};
use crate::models::Dataset;

/// A dataset stored as a TSV file.
///
/// Reads from `input` and writes to `output` (the same file unless
/// [`TsvStore::with_output`] is used). Once `output` exists it is the
/// table to resume from, so re-running with the same paths continues where
/// the last checkpoint left off.
#[derive(Debug, Clone)]
pub struct TsvStore {
    input: PathBuf,
    output: PathBuf,
}

impl TsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            input: path.clone(),
            output: path,
        }
    }

    /// Write checkpoints to a different file than the one first loaded.
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// The file `load` will read.
    pub fn load_path(&self) -> &Path {
        if self.output != self.input && self.output.exists() {
            &self.output
        } else {
            &self.input
        }
    }
}

impl TabularStore for TsvStore {
    fn describe(&self) -> String {
        self.output.display().to_string()
    }

    fn exists(&self) -> bool {
        self.load_path().exists()
    }

    fn load(&self) -> Result<Dataset, StoreError> {
        let path = self.load_path();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.to_path_buf())
            } else {
                StoreError::Io {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let dataset = parse_tsv(&contents)?;
        debug!(
            "Loaded {} rows x {} columns from {}",
            dataset.len(),
            dataset.columns().len(),
            path.display()
        );
        Ok(dataset)
    }

    fn save(&self, dataset: &Dataset) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.output.clone(),
            source,
        };

        let dir = match self.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(io_err)?;

        // Same directory as the target so the final rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        {
            let mut writer = std::io::BufWriter::new(tmp.as_file_mut());
            write_tsv(dataset, &mut writer).map_err(io_err)?;
            writer.flush().map_err(io_err)?;
        }
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(&self.output).map_err(|e| io_err(e.error))?;

        debug!("Saved {} rows to {}", dataset.len(), self.output.display());
        Ok(())
    }
}

struct Field {
    value: String,
    quoted: bool,
}

impl Field {
    fn is_blank(&self) -> bool {
        !self.quoted && self.value.is_empty()
    }

    fn into_cell(self) -> Option<String> {
        if self.quoted || !self.value.is_empty() {
            Some(self.value)
        } else {
            None
        }
    }
}

/// Parse TSV text into a dataset.
pub fn parse_tsv(input: &str) -> Result<Dataset, StoreError> {
    let mut records = split_records(input)?.into_iter();

    let (_, header) = records.next().ok_or(StoreError::Malformed {
        line: 1,
        message: "missing header row".to_string(),
    })?;

    let mut columns = Vec::with_capacity(header.len());
    for field in header {
        match field.into_cell() {
            Some(name) => columns.push(name),
            None => {
                return Err(StoreError::Malformed {
                    line: 1,
                    message: "empty column name".to_string(),
                })
            }
        }
    }

    let skip_blank = columns.len() > 1;
    let mut dataset = Dataset::new(columns)?;
    for (line, fields) in records {
        if skip_blank && fields.len() == 1 && fields[0].is_blank() {
            continue;
        }
        let cells = fields.into_iter().map(Field::into_cell).collect();
        dataset.push_row(cells).map_err(|e| StoreError::Malformed {
            line,
            message: e.to_string(),
        })?;
    }
    Ok(dataset)
}

fn split_records(input: &str) -> Result<Vec<(usize, Vec<Field>)>, StoreError> {
    let mut records = Vec::new();
    let mut fields: Vec<Field> = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut dirty = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    current.push('"');
                }
                '"' => in_quotes = false,
                '\n' => {
                    line += 1;
                    current.push(c);
                }
                _ => current.push(c),
            }
            continue;
        }

        match c {
            '"' if at_field_start => {
                in_quotes = true;
                quoted = true;
                at_field_start = false;
                dirty = true;
            }
            '\t' => {
                fields.push(Field {
                    value: std::mem::take(&mut current),
                    quoted,
                });
                quoted = false;
                at_field_start = true;
                dirty = true;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                fields.push(Field {
                    value: std::mem::take(&mut current),
                    quoted,
                });
                records.push((record_line, std::mem::take(&mut fields)));
                quoted = false;
                at_field_start = true;
                dirty = false;
                line += 1;
                record_line = line;
            }
            _ if quoted => {
                return Err(StoreError::Malformed {
                    line,
                    message: format!("unexpected {:?} after closing quote", c),
                });
            }
            _ => {
                current.push(c);
                at_field_start = false;
                dirty = true;
            }
        }
    }

    if in_quotes {
        return Err(StoreError::Malformed {
            line: record_line,
            message: "unterminated quoted field".to_string(),
        });
    }
    if dirty {
        fields.push(Field {
            value: current,
            quoted,
        });
        records.push((record_line, fields));
    }
    Ok(records)
}

/// Serialize a dataset as TSV.
pub fn write_tsv<W: Write>(dataset: &Dataset, mut out: W) -> std::io::Result<()> {
    write_line(&mut out, dataset.columns().iter().map(|c| Some(c.as_str())))?;
    for row in dataset.rows() {
        write_line(&mut out, row.iter().map(|c| c.as_deref()))?;
    }
    Ok(())
}

fn write_line<'a, W: Write>(
    out: &mut W,
    cells: impl Iterator<Item = Option<&'a str>>,
) -> std::io::Result<()> {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.write_all(b"\t")?;
        }
        if let Some(value) = cell {
            out.write_all(encode_field(value).as_bytes())?;
        }
    }
    out.write_all(b"\n")
}

fn encode_field(value: &str) -> Cow<'_, str> {
    if value.is_empty() || value.contains(['\t', '\n', '\r', '"']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
