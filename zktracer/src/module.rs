use crate::column::ColumnHeader;
use crate::error::TraceError;
use crate::table::TraceTable;

/// A trace module: collects chunks during execution and expands them into
/// rows of its own trace table on commit.
///
/// Row counts must be known before any row is written, since tables are
/// allocated with a fixed capacity: [`Module::line_count`] is called first,
/// the table is allocated from [`Module::columns_headers`], then
/// [`Module::commit`] fills it.
pub trait Module {
    /// Prefix of the module's column names.
    fn module_key(&self) -> &'static str;

    /// Key under which the module's line count is reported.
    fn json_key(&self) -> &'static str {
        self.module_key()
    }

    fn enter_transaction(&mut self);

    /// Drops everything recorded since the last `enter_transaction`.
    fn pop_transaction(&mut self);

    fn line_count(&self) -> usize;

    /// Headers of the module's columns, sized with the current line count.
    /// Counting-only modules have none.
    fn columns_headers(&self) -> Vec<ColumnHeader>;

    /// Writes every row into `table`, allocated from `columns_headers`.
    fn commit(&self, table: &mut TraceTable) -> Result<(), TraceError>;
}
