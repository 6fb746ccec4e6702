//! Candidate edge generation
//!
//! Rows are bucketed by distinct normalized value per column. Rows sharing a
//! bucket are linked directly (their keys are equal), and the predicate is
//! evaluated once per pair of distinct values, linking one row of each
//! bucket. Connectivity is the same as evaluating every row pair.

use std::hash::Hash;

use ahash::AHashMap;
use tracing::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::cancel::CancelFlag;
use crate::error::GroupResult;
use crate::matcher::{key_match, name_match, MatchConfig, RowKeys};

use super::engine::WorkerPool;

/// Unordered pair of row positions, stored with the smaller position first
pub type Edge = (usize, usize);

/// Build candidate edges across all selected columns.
///
/// `name_columns[c]` enables the name branch for column `c`. The cancel flag
/// is checked after each column.
pub(crate) fn generate(
    rows: &[RowKeys],
    name_columns: &[bool],
    config: &MatchConfig,
    pool: Option<&WorkerPool>,
    cancel: &CancelFlag,
) -> GroupResult<Vec<Edge>> {
    let mut edges = Vec::new();

    for (column, &is_name) in name_columns.iter().enumerate() {
        let before = edges.len();

        let buckets = bucket(rows, |r| Some(&r.keys[column]));
        link_buckets(&buckets, pool, cancel, &mut edges, |a, b| {
            key_match(a, b, config).is_some()
        });
        cancel.check()?;

        if is_name {
            let buckets = bucket(rows, |r| r.names[column].as_ref());
            link_buckets(&buckets, pool, cancel, &mut edges, name_match);
        }

        debug!(
            column,
            distinct = buckets.len(),
            edges = edges.len() - before,
            "candidate edges generated"
        );
        cancel.check()?;
    }

    Ok(edges)
}

/// Group row positions by key, sorted by key so output order is stable.
fn bucket<'a, K, F>(rows: &'a [RowKeys], key_of: F) -> Vec<(&'a K, Vec<usize>)>
where
    K: Hash + Eq + Ord,
    F: Fn(&'a RowKeys) -> Option<&'a K>,
{
    let mut map: AHashMap<&'a K, Vec<usize>> = AHashMap::new();
    for (position, row) in rows.iter().enumerate() {
        if let Some(key) = key_of(row) {
            map.entry(key).or_default().push(position);
        }
    }

    let mut buckets: Vec<(&'a K, Vec<usize>)> = map.into_iter().collect();
    buckets.sort_by(|a, b| a.0.cmp(b.0));
    buckets
}

/// Emit edges inside each bucket and between matching buckets.
fn link_buckets<K, F>(
    buckets: &[(&K, Vec<usize>)],
    pool: Option<&WorkerPool>,
    cancel: &CancelFlag,
    edges: &mut Vec<Edge>,
    matches: F,
) where
    K: Sync,
    F: Fn(&K, &K) -> bool + Sync,
{
    for (_, members) in buckets {
        let head = members[0];
        edges.extend(members[1..].iter().map(|&m| (head, m)));
    }

    let pairs = pairwise(buckets, pool, cancel, |a, b| matches(a.0, b.0));
    edges.extend(pairs.into_iter().map(|(i, j)| {
        let (a, b) = (buckets[i].1[0], buckets[j].1[0]);
        (a.min(b), a.max(b))
    }));
}

/// Indices `(i, j)`, `i < j`, of every item pair accepted by `pred`.
///
/// Runs inside the worker pool when one is given; collection keeps the
/// sequential order either way. Once `cancel` is set the remaining outer
/// items are skipped, so the result is partial and must be discarded.
fn pairwise<T, F>(
    items: &[T],
    pool: Option<&WorkerPool>,
    cancel: &CancelFlag,
    pred: F,
) -> Vec<(usize, usize)>
where
    T: Sync,
    F: Fn(&T, &T) -> bool + Sync,
{
    let row = |i: usize| -> Vec<(usize, usize)> {
        if cancel.is_cancelled() {
            return Vec::new();
        }
        (i + 1..items.len())
            .filter(|&j| pred(&items[i], &items[j]))
            .map(|j| (i, j))
            .collect()
    };

    #[cfg(feature = "parallel")]
    {
        if let Some(pool) = pool {
            return pool
                .install(|| (0..items.len()).into_par_iter().flat_map_iter(&row).collect());
        }
    }

    #[cfg(not(feature = "parallel"))]
    let _ = pool;

    (0..items.len()).flat_map(&row).collect()
}
