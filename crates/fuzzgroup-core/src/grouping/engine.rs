//! GroupingEngine - one grouping run from column selection to write-back

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelFlag;
use crate::cluster::UnionFind;
use crate::error::{GroupError, GroupResult};
use crate::matcher::{MatchConfig, RowKeys};
use crate::normalize::{Key, NameTokens};
use crate::row::{ClientId, ColumnSet, GroupId, Value};
use crate::storage::{RowStore, StoreError};

use super::candidates;
use super::outcome::{Group, GroupingOutcome, RunStats};

#[cfg(feature = "parallel")]
pub(crate) type WorkerPool = rayon::ThreadPool;

/// Never constructed without the `parallel` feature.
#[cfg(not(feature = "parallel"))]
pub(crate) enum WorkerPool {}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Edit-distance thresholds
    pub matching: MatchConfig,
    /// Worker threads for candidate generation (1 = sequential)
    pub workers: usize,
    /// Minimum row count before the worker pool is used
    pub parallel_threshold: usize,
    /// Minimum row count before the store is asked to build an index
    pub index_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            matching: MatchConfig::default(),
            workers: 1,
            parallel_threshold: 1000,
            index_threshold: 10_000,
        }
    }
}

/// Column selection for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingRequest {
    /// Columns to match on, in caller order
    pub reference_columns: Vec<String>,
    /// Subset of `reference_columns` holding personal names
    #[serde(default)]
    pub name_columns: Vec<String>,
}

impl GroupingRequest {
    pub fn new<S: Into<String>>(reference_columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            reference_columns: reference_columns.into_iter().map(Into::into).collect(),
            name_columns: Vec::new(),
        }
    }

    pub fn with_name_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.name_columns = columns.into_iter().map(Into::into).collect();
        self
    }
}

/// Fuzzy grouping engine.
///
/// Holds configuration and an optional worker pool; the row store is passed
/// to each [`GroupingEngine::run`] call.
pub struct GroupingEngine {
    config: EngineConfig,
    pool: Option<WorkerPool>,
}

impl Default for GroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Rows gathered by the scan phase, indexed by scan position.
struct Scanned {
    client_ids: Vec<ClientId>,
    keys: Vec<RowKeys>,
    values: Vec<Vec<Value>>,
}

impl GroupingEngine {
    /// Create an engine with default configuration
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(config: EngineConfig) -> Self {
        let pool = build_pool(config.workers);
        Self { config, pool }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one grouping pass and persist the resulting group ids.
    ///
    /// Phases: validate columns, scan, candidate generation, merge,
    /// write-back. The cancel flag is honored between phases; once it is
    /// seen, nothing is written.
    pub fn run<S: RowStore + ?Sized>(
        &self,
        store: &mut S,
        request: &GroupingRequest,
        cancel: &CancelFlag,
    ) -> GroupResult<GroupingOutcome> {
        let started = Instant::now();
        cancel.check()?;

        let columns = ColumnSet::validate(&request.reference_columns, &store.list_columns()?)?;
        let name_flags = name_flags(&columns, &request.name_columns)?;

        let row_count = store.row_count().map_err(|e| computation("count", e))?;
        if row_count >= self.config.index_threshold {
            // Only a hint; a failure here changes speed, not results
            if let Err(e) = store.create_index(&columns) {
                warn!("index hint rejected: {}", e);
            }
        }

        let scanned = scan(store, &columns, &name_flags)?;
        cancel.check()?;

        let pool = if scanned.keys.len() >= self.config.parallel_threshold {
            self.pool.as_ref()
        } else {
            None
        };
        let edges = candidates::generate(
            &scanned.keys,
            &name_flags,
            &self.config.matching,
            pool,
            cancel,
        )?;

        let mut union_find = UnionFind::new(scanned.keys.len());
        for &(a, b) in &edges {
            union_find.union(a, b);
        }
        let components = union_find.components();
        cancel.check()?;

        let (groups, assignments) = assign_groups(&scanned, components);

        cancel.check()?;
        store
            .bulk_update_group_ids(&assignments)
            .map_err(|e| computation("write-back", e))?;

        let stats = RunStats {
            rows: scanned.keys.len(),
            groups: groups.len(),
            edges: edges.len(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            rows = stats.rows,
            groups = stats.groups,
            edges = stats.edges,
            elapsed_ms = stats.elapsed_ms,
            columns = ?columns.names(),
            "grouping run complete"
        );

        Ok(GroupingOutcome::new(columns, groups, assignments, stats))
    }
}

#[cfg(feature = "parallel")]
fn build_pool(workers: usize) -> Option<WorkerPool> {
    if workers <= 1 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("fuzzgroup-worker-{}", i))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("worker pool unavailable, running sequentially: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "parallel"))]
fn build_pool(_workers: usize) -> Option<WorkerPool> {
    None
}

/// Map each selected column to whether the name branch applies to it.
fn name_flags(columns: &ColumnSet, name_columns: &[String]) -> GroupResult<Vec<bool>> {
    let mut flags = vec![false; columns.len()];
    for name in name_columns {
        let position = columns.position(name).ok_or_else(|| {
            GroupError::Schema(format!(
                "name column '{}' is not one of the reference columns",
                name
            ))
        })?;
        flags[position] = true;
    }
    Ok(flags)
}

fn scan<S: RowStore + ?Sized>(
    store: &S,
    columns: &ColumnSet,
    name_flags: &[bool],
) -> GroupResult<Scanned> {
    let mut scanned = Scanned {
        client_ids: Vec::new(),
        keys: Vec::new(),
        values: Vec::new(),
    };

    store
        .scan(columns, &mut |row| {
            let keys = row.values.iter().map(Key::from_value).collect();
            let names = row
                .values
                .iter()
                .zip(name_flags)
                .map(|(v, &is_name)| if is_name { NameTokens::from_value(v) } else { None })
                .collect();

            scanned.client_ids.push(row.client_id);
            scanned.keys.push(RowKeys { keys, names });
            scanned.values.push(row.values);
            Ok(())
        })
        .map_err(|e| match e {
            StoreError::TableMissing(_) | StoreError::UnknownColumn(_) => GroupError::from(e),
            other => computation("scan", other),
        })?;

    debug!(rows = scanned.keys.len(), "scan complete");
    Ok(scanned)
}

/// Number components 1..=N in order of smallest member and pick each
/// component's representative.
///
/// Scan order is ascending `client_id`, so a component's smallest position
/// is also its smallest `client_id`.
fn assign_groups(
    scanned: &Scanned,
    components: Vec<Vec<usize>>,
) -> (Vec<Group>, Vec<(ClientId, GroupId)>) {
    let mut group_of = vec![0 as GroupId; scanned.keys.len()];
    let mut groups = Vec::with_capacity(components.len());

    for (index, members) in components.into_iter().enumerate() {
        let id = index as GroupId + 1;
        let representative = representative(scanned, &members);
        for &position in &members {
            group_of[position] = id;
        }
        groups.push(Group {
            id,
            members: members.iter().map(|&p| scanned.client_ids[p]).collect(),
            representative: scanned.client_ids[representative],
            representative_values: scanned.values[representative].clone(),
        });
    }

    let assignments = scanned
        .client_ids
        .iter()
        .zip(group_of)
        .map(|(&client_id, group_id)| (client_id, group_id))
        .collect();

    (groups, assignments)
}

/// Member with the smallest normalized key tuple; ties go to the smallest
/// `client_id`.
fn representative(scanned: &Scanned, members: &[usize]) -> usize {
    members
        .iter()
        .copied()
        .min_by(|&a, &b| {
            scanned.keys[a]
                .key_tuple()
                .cmp(scanned.keys[b].key_tuple())
                .then_with(|| scanned.client_ids[a].cmp(&scanned.client_ids[b]))
        })
        .unwrap_or(members[0])
}

fn computation(phase: &str, err: StoreError) -> GroupError {
    let err = GroupError::from(err);
    if let GroupError::Computation(detail) = &err {
        error!(severity = "critical", phase, "row store failed: {}", detail);
    }
    err
}
