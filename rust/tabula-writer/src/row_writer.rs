//! Row-by-row construction of a set of columns.

use tabula_column::{Column, ColumnTypeId, Value};
use tabula_common::{Result, error::Error, verify_arg};

use crate::{
    column_writer::ColumnWriter,
    config::{FinalizeMode, RowWriterOptions},
};

/// Builds immutable columns from rows.
///
/// A row starts with [`RowWriter::move_next`]; [`RowWriter::set`] then stages cell
/// values for it, and cells left unset are missing. [`RowWriter::create`] finishes
/// every column exactly once, after which the writer rejects all calls.
///
/// The writer is a single-threaded accumulator: it takes `&mut self` everywhere and
/// does no locking of its own.
#[derive(Debug)]
pub struct RowWriter {
    labels: Vec<String>,
    writers: Vec<ColumnWriter>,
    staged: Vec<Value>,
    rows: usize,
    max_rows: usize,
    finalize: FinalizeMode,
    frozen: bool,
}

impl RowWriter {
    /// Largest number of rows a column can hold.
    pub const MAX_ROWS: usize = i32::MAX as usize;

    /// Creates a writer for columns named `labels` of the matching `types`.
    pub fn new(
        labels: impl IntoIterator<Item = impl Into<String>>,
        types: &[ColumnTypeId],
        options: RowWriterOptions,
    ) -> Result<RowWriter> {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        verify_arg!(types, types.len() == labels.len());
        let writers = types
            .iter()
            .map(|&type_id| {
                ColumnWriter::new(type_id, options.sparsity.clone(), options.expected_rows)
            })
            .collect();
        Ok(RowWriter {
            labels,
            writers,
            staged: vec![Value::Missing; types.len()],
            rows: 0,
            max_rows: Self::MAX_ROWS,
            finalize: options.sparsity.finalize,
            frozen: false,
        })
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.writers.len()
    }

    /// Number of rows started so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Starts a new row, committing the previous one.
    ///
    /// Fails without touching any column once the writer holds the maximum number of
    /// rows; the last row stays staged and is committed by `create`.
    pub fn move_next(&mut self) -> Result<()> {
        self.check_open()?;
        if self.rows >= self.max_rows {
            return Err(Error::out_of_bounds(self.rows, self.max_rows));
        }
        if self.rows > 0 {
            self.commit()?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Stages `value` for `column` in the current row, replacing any value staged
    /// before.
    pub fn set(&mut self, column: usize, value: impl Into<Value>) -> Result<()> {
        self.check_open()?;
        if self.rows == 0 {
            return Err(Error::illegal_state("set called before the first move_next"));
        }
        let Some(writer) = self.writers.get(column) else {
            return Err(Error::out_of_bounds(column, self.writers.len()));
        };
        let value = value.into();
        let type_id = writer.type_id();
        if !type_id.accepts(&value) {
            return Err(Error::invalid_arg(
                "value",
                format!(
                    "column {column} ({type_id}) cannot hold a {} value",
                    value.kind_name()
                ),
            ));
        }
        self.staged[column] = value;
        Ok(())
    }

    /// Commits the current row and finishes every column.
    pub fn create(&mut self) -> Result<ColumnSet> {
        self.check_open()?;
        if self.rows > 0 {
            self.commit()?;
        }
        self.frozen = true;

        let finalize = self.finalize;
        let columns = std::mem::take(&mut self.writers)
            .into_iter()
            .map(|writer| writer.finish(finalize))
            .collect::<Result<Vec<_>>>()?;
        log::debug!("created {} columns of {} rows", columns.len(), self.rows);
        Ok(ColumnSet {
            labels: std::mem::take(&mut self.labels),
            columns,
            height: self.rows,
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.frozen {
            return Err(Error::illegal_state("row writer already created its columns"));
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        for (writer, value) in self.writers.iter_mut().zip(self.staged.iter_mut()) {
            writer.push(std::mem::take(value))?;
        }
        Ok(())
    }
}

/// Labelled columns of equal height produced by [`RowWriter::create`].
#[derive(Debug, Clone)]
pub struct ColumnSet {
    labels: Vec<String>,
    columns: Vec<Column>,
    height: usize,
}

impl ColumnSet {
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, label: &str) -> Option<&Column> {
        self.labels
            .iter()
            .position(|candidate| candidate == label)
            .map(|position| &self.columns[position])
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(types: &[ColumnTypeId]) -> RowWriter {
        let labels = (0..types.len()).map(|i| format!("c{i}"));
        RowWriter::new(labels, types, RowWriterOptions::default()).unwrap()
    }

    #[test]
    fn test_unset_cells_are_missing() {
        let mut writer = writer(&[ColumnTypeId::Real, ColumnTypeId::Text]);
        writer.move_next().unwrap();
        writer.set(0, 1.5).unwrap();
        writer.move_next().unwrap();
        writer.set(1, "b").unwrap();
        let set = writer.create().unwrap();
        assert_eq!(set.height(), 2);
        let real = set.column("c0").unwrap();
        assert_eq!(real.get(0).unwrap(), Value::Number(1.5));
        assert_eq!(real.get(1).unwrap(), Value::Missing);
        let text = set.column("c1").unwrap();
        assert_eq!(text.get(0).unwrap(), Value::Missing);
        assert_eq!(text.get(1).unwrap(), Value::text("b"));
    }

    #[test]
    fn test_set_overwrites_staged_value() {
        let mut writer = writer(&[ColumnTypeId::Nominal]);
        writer.move_next().unwrap();
        writer.set(0, "first").unwrap();
        writer.set(0, "second").unwrap();
        let set = writer.create().unwrap();
        assert_eq!(set.columns()[0].get(0).unwrap(), Value::text("second"));
        // Only committed values reach the dictionary.
        assert_eq!(set.columns()[0].dictionary().unwrap().size(), 2);
    }

    #[test]
    fn test_row_limit_keeps_columns_aligned() {
        let mut writer = writer(&[ColumnTypeId::Real, ColumnTypeId::Nominal]);
        writer.max_rows = 2;
        for row in 0..2 {
            writer.move_next().unwrap();
            writer.set(0, row as f64).unwrap();
            writer.set(1, "x").unwrap();
        }
        assert!(writer.move_next().unwrap_err().is_out_of_bounds());
        writer.set(1, "y").unwrap();

        let set = writer.create().unwrap();
        assert_eq!(set.height(), 2);
        for column in set.columns() {
            assert_eq!(column.size(), 2);
        }
        assert_eq!(set.columns()[1].get(1).unwrap(), Value::text("y"));
    }

    #[test]
    fn test_argument_errors() {
        assert!(RowWriter::new(["a"], &[], RowWriterOptions::default()).is_err());
        let mut writer = writer(&[ColumnTypeId::Real]);
        writer.move_next().unwrap();
        assert!(writer.set(1, 1.0).unwrap_err().is_out_of_bounds());
        assert!(writer.set(0, "x").unwrap_err().is_invalid_arg());
    }
}
