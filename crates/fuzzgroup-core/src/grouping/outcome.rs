//! Results of a grouping run and the paginated read-back view

use ahash::AHashMap;
use serde::Serialize;

use crate::error::GroupResult;
use crate::row::{ClientId, ColumnSet, GroupId, Value};
use crate::storage::RowStore;

/// Rows returned when the caller does not ask for a page size
pub const DEFAULT_PAGE_LIMIT: usize = 100;

/// Upper bound on a single page
pub const MAX_PAGE_LIMIT: usize = 1000;

/// One connected component of the candidate graph
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: GroupId,
    /// Member ids, ascending
    pub members: Vec<ClientId>,
    pub representative: ClientId,
    /// The representative's values for the reference columns
    pub representative_values: Vec<Value>,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub rows: usize,
    pub groups: usize,
    /// Edges handed to union-find. Rows sharing a normalized value are
    /// chained to the first of them (one edge per extra row), and each
    /// matching pair of distinct values adds one edge, so this is at most
    /// the number of matching row pairs.
    pub edges: usize,
    pub elapsed_ms: u64,
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct GroupingOutcome {
    columns: ColumnSet,
    groups: Vec<Group>,
    assignments: Vec<(ClientId, GroupId)>,
    stats: RunStats,
}

/// A stored row joined with its group's representative
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRow {
    pub client_id: ClientId,
    pub group_id: Option<GroupId>,
    pub representative_id: Option<ClientId>,
    pub representative: serde_json::Map<String, serde_json::Value>,
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// A bounded page of grouped rows in natural order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedPage {
    pub items: Vec<GroupedRow>,
    pub total: usize,
    pub offset: usize,
    pub limit: usize,
    pub groups: usize,
    /// See [`RunStats::edges`]
    pub edges: usize,
}

impl GroupingOutcome {
    pub(crate) fn new(
        columns: ColumnSet,
        groups: Vec<Group>,
        assignments: Vec<(ClientId, GroupId)>,
        stats: RunStats,
    ) -> Self {
        Self {
            columns,
            groups,
            assignments,
            stats,
        }
    }

    pub fn columns(&self) -> &ColumnSet {
        &self.columns
    }

    /// Groups ordered by id
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// `(client_id, group_id)` for every scanned row, ascending by `client_id`
    pub fn assignments(&self) -> &[(ClientId, GroupId)] {
        &self.assignments
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn group(&self, id: GroupId) -> Option<&Group> {
        let index = usize::try_from(id.checked_sub(1)?).ok()?;
        self.groups.get(index)
    }

    /// Group id a row was assigned in this run
    pub fn group_of(&self, client_id: ClientId) -> Option<GroupId> {
        self.assignments
            .binary_search_by_key(&client_id, |&(id, _)| id)
            .ok()
            .map(|i| self.assignments[i].1)
    }

    /// Read a page of stored rows and join each with its representative.
    ///
    /// `limit` is capped at [`MAX_PAGE_LIMIT`].
    pub fn read_page<S: RowStore + ?Sized>(
        &self,
        store: &S,
        offset: usize,
        limit: usize,
    ) -> GroupResult<GroupedPage> {
        let limit = limit.min(MAX_PAGE_LIMIT);
        let rows = store.read_page(offset, limit)?;
        let total = store.row_count()?;

        let mut representatives: AHashMap<GroupId, serde_json::Map<String, serde_json::Value>> =
            AHashMap::new();

        let items = rows
            .into_iter()
            .map(|row| {
                let group = row.group_id.and_then(|id| self.group(id));
                let representative = match group {
                    Some(g) => representatives
                        .entry(g.id)
                        .or_insert_with(|| self.representative_map(g))
                        .clone(),
                    None => serde_json::Map::new(),
                };

                GroupedRow {
                    client_id: row.client_id,
                    group_id: row.group_id,
                    representative_id: group.map(|g| g.representative),
                    representative,
                    values: row
                        .values
                        .into_iter()
                        .map(|(name, value)| (name, serde_json::Value::from(value)))
                        .collect(),
                }
            })
            .collect();

        Ok(GroupedPage {
            items,
            total,
            offset,
            limit,
            groups: self.groups.len(),
            edges: self.stats.edges,
        })
    }

    fn representative_map(&self, group: &Group) -> serde_json::Map<String, serde_json::Value> {
        self.columns
            .names()
            .iter()
            .zip(&group.representative_values)
            .map(|(name, value)| (name.clone(), serde_json::Value::from(value.clone())))
            .collect()
    }
}
