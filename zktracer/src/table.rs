//! Trace tables: the columns of one module sharing a row cursor.
//!
//! A table is allocated with the exact number of rows its module plans to
//! write. Rows are written one column at a time and then validated; the
//! `filled` bitset makes sure every column of a row is set exactly once
//! before the cursor moves on.

use bitvec::vec::BitVec;

use crate::column::{ColumnBuffer, ColumnHeader, ColumnSpec, ColumnValue};
use crate::error::TraceError;

/// One row of a module's trace, supplied all at once.
///
/// Usually derived with `#[derive(TraceRow)]`, which lists the struct fields
/// as columns in declaration order.
pub trait TraceRow {
    const COLUMNS: &'static [ColumnSpec];
    const COLUMN_COUNT: usize = Self::COLUMNS.len();

    /// Sets every column of the current row of `table`, then validates it.
    fn write_row(&self, table: &mut TraceTable) -> Result<(), TraceError>;

    fn headers(module_key: &str, length: usize) -> Vec<ColumnHeader> {
        Self::COLUMNS
            .iter()
            .map(|spec| ColumnHeader::new(module_key, spec, length))
            .collect()
    }
}

#[derive(Debug)]
pub struct TraceTable {
    module: String,
    columns: Vec<ColumnBuffer>,
    filled: BitVec,
    current_line: usize,
    length: usize,
}

impl TraceTable {
    /// Allocates a table from its column headers. All headers must agree on
    /// the row count.
    pub fn new(module: impl Into<String>, headers: Vec<ColumnHeader>) -> Self {
        let length = headers.first().map_or(0, |h| h.length);
        debug_assert!(headers.iter().all(|h| h.length == length));
        let filled = BitVec::repeat(false, headers.len());
        Self {
            module: module.into(),
            columns: headers.into_iter().map(ColumnBuffer::new).collect(),
            filled,
            current_line: 0,
            length,
        }
    }

    /// Allocates a table for rows of type `R`.
    pub fn for_rows<R: TraceRow>(module: &str, length: usize) -> Self {
        Self::new(module, R::headers(module, length))
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn headers(&self) -> Vec<ColumnHeader> {
        self.columns.iter().map(|c| c.header().clone()).collect()
    }

    /// Number of rows the table was planned for.
    pub const fn capacity(&self) -> usize {
        self.length
    }

    /// Sets one column of the current row.
    pub fn set<V: ColumnValue + ?Sized>(
        &mut self,
        column: usize,
        value: &V,
    ) -> Result<(), TraceError> {
        if column >= self.columns.len() {
            return Err(TraceError::UnknownColumn {
                module: self.module.clone(),
                index: column,
            });
        }
        if self.filled[column] {
            return Err(TraceError::AlreadySet {
                column: self.columns[column].name().to_owned(),
            });
        }
        self.ensure_capacity()?;

        let buffer = &mut self.columns[column];
        buffer.push(value).map_err(|len| TraceError::ValueTooWide {
            column: buffer.name().to_owned(),
            len,
            byte_width: buffer.byte_width(),
        })?;
        self.filled.set(column, true);
        Ok(())
    }

    /// Closes the current row. Every column must have been set.
    pub fn validate_row(&mut self) -> Result<(), TraceError> {
        if let Some(missing) = self.filled.first_zero() {
            return Err(TraceError::NotFilled {
                column: self.columns[missing].name().to_owned(),
            });
        }
        self.next_row();
        Ok(())
    }

    /// Zero-fills every column not set yet, then closes the current row.
    pub fn fill_and_validate_row(&mut self) -> Result<(), TraceError> {
        self.ensure_capacity()?;
        for column in self.filled.iter_zeros() {
            self.columns[column].push_zero();
        }
        self.next_row();
        Ok(())
    }

    /// Number of validated rows.
    pub fn size(&self) -> Result<usize, TraceError> {
        if self.filled.any() {
            return Err(TraceError::RowInProgress {
                module: self.module.clone(),
            });
        }
        Ok(self.current_line)
    }

    /// Freezes the table, checking that exactly the planned number of rows
    /// was written.
    pub fn build(self) -> Result<ModuleTrace, TraceError> {
        let size = self.size()?;
        if size != self.length {
            return Err(TraceError::RowCountMismatch {
                module: self.module,
                expected: self.length,
                actual: size,
            });
        }
        Ok(ModuleTrace {
            module: self.module,
            columns: self.columns,
        })
    }

    fn ensure_capacity(&self) -> Result<(), TraceError> {
        if self.current_line >= self.length {
            return Err(TraceError::CapacityExceeded {
                module: self.module.clone(),
                row: self.current_line,
                capacity: self.length,
            });
        }
        Ok(())
    }

    fn next_row(&mut self) {
        self.filled.fill(false);
        self.current_line += 1;
    }
}

/// A complete, validated module trace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleTrace {
    module: String,
    columns: Vec<ColumnBuffer>,
}

impl ModuleTrace {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn columns(&self) -> &[ColumnBuffer] {
        &self.columns
    }

    pub fn rows(&self) -> usize {
        self.columns.first().map_or(0, ColumnBuffer::rows)
    }

    /// Looks a column up by its short name, e.g. `"LIMB"`.
    pub fn column(&self, name: &str) -> Option<&ColumnBuffer> {
        self.columns.iter().find(|c| {
            c.name()
                .strip_prefix(self.module.as_str())
                .and_then(|n| n.strip_prefix('.'))
                == Some(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::U256;
    use zktracer_proc_macro::TraceRow;

    use super::*;

    #[derive(TraceRow)]
    struct Row {
        counter: u8,
        #[column(name = "nBYTES")]
        n_bytes: u8,
        limb: U256,
    }

    fn table(length: usize) -> TraceTable {
        TraceTable::for_rows::<Row>("test", length)
    }

    #[test]
    fn derived_columns() {
        assert_eq!(Row::COLUMN_COUNT, 3);
        let headers = Row::headers("test", 7);
        let names = headers.iter().map(|h| h.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, ["test.COUNTER", "test.nBYTES", "test.LIMB"]);
        assert_eq!(
            headers.iter().map(|h| h.byte_width).collect::<Vec<_>>(),
            [1, 1, 32]
        );
        assert!(headers.iter().all(|h| h.length == 7));
    }

    #[test]
    fn setting_a_column_twice_fails() {
        let mut table = table(1);
        table.set(0, &1u8).unwrap();
        let err = table.set(0, &2u8).unwrap_err();
        assert!(matches!(err, TraceError::AlreadySet { ref column } if column == "test.COUNTER"));
    }

    #[test]
    fn validating_an_incomplete_row_fails() {
        let mut table = table(1);
        table.set(0, &1u8).unwrap();
        table.set(2, &U256::from(5)).unwrap();
        let err = table.validate_row().unwrap_err();
        assert!(matches!(err, TraceError::NotFilled { ref column } if column == "test.nBYTES"));
        assert!(matches!(table.size(), Err(TraceError::RowInProgress { .. })));
    }

    #[test]
    fn fill_and_validate_zeroes_missing_columns() {
        let mut table = table(2);
        table.set(2, &U256::from(9)).unwrap();
        table.fill_and_validate_row().unwrap();
        Row {
            counter: 1,
            n_bytes: 16,
            limb: U256::MAX,
        }
        .write_row(&mut table)
        .unwrap();
        assert_eq!(table.size().unwrap(), 2);

        let trace = table.build().unwrap();
        assert_eq!(trace.rows(), 2);
        let limb = trace.column("LIMB").unwrap();
        assert_eq!(limb.value(0), Some(U256::from(9)));
        assert_eq!(limb.value(1), Some(U256::MAX));
        assert_eq!(trace.column("nBYTES").unwrap().value(0), Some(U256::zero()));
    }

    #[test]
    fn row_count_must_match_the_plan() {
        let mut table = table(2);
        table.fill_and_validate_row().unwrap();
        assert!(matches!(
            table.build(),
            Err(TraceError::RowCountMismatch {
                expected: 2,
                actual: 1,
                ..
            })
        ));

        let mut table = self::table(1);
        table.fill_and_validate_row().unwrap();
        assert!(matches!(
            table.fill_and_validate_row(),
            Err(TraceError::CapacityExceeded { row: 1, .. })
        ));
    }

    #[test]
    fn values_wider_than_the_column_are_rejected() {
        let mut table = table(1);
        let err = table.set(1, &vec![1u8, 0]).unwrap_err();
        assert!(matches!(err, TraceError::ValueTooWide { len: 2, byte_width: 1, .. }));
        // The failed write left the column untouched.
        table.set(1, &3u8).unwrap();
    }
}
