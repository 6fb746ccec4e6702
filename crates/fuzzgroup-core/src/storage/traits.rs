//! Row-store trait definitions

use crate::row::{ClientId, ColumnInfo, ColumnSet, GroupId, Row, StoredRow};
use crate::storage::error::StoreResult;

/// The operations the grouping engine needs from a tabular store.
///
/// Implementations hold one table of ingested rows. Every row has a stable
/// `client_id`; `group_id` is the only field the engine ever writes.
pub trait RowStore {
    /// Data columns in table order, excluding `client_id` and `group_id`.
    ///
    /// Returns `StoreError::TableMissing` when nothing has been ingested yet.
    fn list_columns(&self) -> StoreResult<Vec<ColumnInfo>>;

    /// Stream every row in natural order (ascending `client_id`), handing
    /// each to `visit` with values for `columns` in set order.
    ///
    /// An error from `visit` stops the scan and is returned unchanged. A scan
    /// cannot be resumed; call again to re-read.
    fn scan(
        &self,
        columns: &ColumnSet,
        visit: &mut dyn FnMut(Row) -> StoreResult<()>,
    ) -> StoreResult<()>;

    /// Write all assignments in one atomic step keyed by `client_id`.
    ///
    /// Either every row is updated or none is.
    fn bulk_update_group_ids(&mut self, assignments: &[(ClientId, GroupId)]) -> StoreResult<()>;

    /// Performance hint before a large run. Must not affect results.
    fn create_index(&mut self, _columns: &ColumnSet) -> StoreResult<()> {
        Ok(())
    }

    /// Number of rows in the table.
    fn row_count(&self) -> StoreResult<usize>;

    /// Read full rows in natural order, including their current `group_id`.
    fn read_page(&self, offset: usize, limit: usize) -> StoreResult<Vec<StoredRow>>;
}
