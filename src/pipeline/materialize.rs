//! Feature evaluation - computes the nodes behind the requested features, one depth level at a time

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use tracing::debug;

use super::feature::{FeatureArena, FeatureId, FeatureNode, NodeKind};
use super::matrix::FeatureMatrix;
use super::synthesis::SynthesisConfig;
use crate::entityset::{ColumnValues, EntitySet};
use crate::error::{Result, SynthesisError};

/// Rayon pool with `n_jobs` threads, or `None` when work runs on the calling thread.
pub(crate) fn worker_pool(n_jobs: usize) -> Result<Option<rayon::ThreadPool>> {
    if n_jobs <= 1 {
        return Ok(None);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_jobs)
        .build()
        .map(Some)
        .map_err(|e| SynthesisError::InvalidConfig(format!("thread pool: {}", e)))
}

/// Child rows of each parent row, per relationship.
type Groups = Vec<Vec<usize>>;

/// Evaluate `outputs` (features of `target`) into a feature matrix.
pub(crate) fn materialize(
    es: &EntitySet,
    arena: &FeatureArena,
    target: &str,
    outputs: &[FeatureId],
    config: &SynthesisConfig,
) -> Result<FeatureMatrix> {
    let target_entity = es.require_entity(target)?;
    let cutoff = match config.cutoff_time {
        Some(cutoff) => Some(cutoff),
        None => es.latest_time()?,
    };

    let levels = needed_by_depth(arena, outputs);
    let groups = build_groups(es, arena, &levels, cutoff)?;

    let mut values: Vec<Option<ColumnValues>> = vec![None; arena.len()];
    let pool = worker_pool(config.n_jobs)?;

    for (depth, level) in &levels {
        let computed: Vec<Result<ColumnValues>> = match &pool {
            Some(pool) => pool.install(|| {
                level
                    .par_iter()
                    .map(|&id| evaluate(es, arena.node(id), &values, &groups, cutoff))
                    .collect()
            }),
            None => level
                .iter()
                .map(|&id| evaluate(es, arena.node(id), &values, &groups, cutoff))
                .collect(),
        };
        for (&id, column) in level.iter().zip(computed) {
            values[id.index()] = Some(column?);
        }
        debug!(depth, features = level.len(), "evaluated depth level");
    }

    let index: Vec<String> = target_entity
        .index_values()?
        .into_iter()
        .flatten()
        .collect();
    let mut columns = Vec::with_capacity(outputs.len());
    for &id in outputs {
        let node = arena.node(id);
        let column = values[id.index()].clone().ok_or_else(|| {
            SynthesisError::schema(format!("feature '{}' was not evaluated", node.name))
        })?;
        columns.push(column.into_column(&node.name));
    }
    FeatureMatrix::new(target_entity.index(), index, columns)
}

/// Every node reachable from `outputs`, bucketed by depth.
fn needed_by_depth(arena: &FeatureArena, outputs: &[FeatureId]) -> BTreeMap<usize, Vec<FeatureId>> {
    let mut needed = vec![false; arena.len()];
    let mut stack: Vec<FeatureId> = outputs.to_vec();
    while let Some(id) = stack.pop() {
        if needed[id.index()] {
            continue;
        }
        needed[id.index()] = true;
        stack.extend(arena.node(id).inputs.iter().copied());
    }

    let mut levels: BTreeMap<usize, Vec<FeatureId>> = BTreeMap::new();
    for id in arena.ids().filter(|id| needed[id.index()]) {
        levels.entry(arena.node(id).depth).or_default().push(id);
    }
    levels
}

/// Group the child rows of each relationship used by an aggregation.
///
/// Child rows whose time index is after `cutoff` are left out.
fn build_groups(
    es: &EntitySet,
    arena: &FeatureArena,
    levels: &BTreeMap<usize, Vec<FeatureId>>,
    cutoff: Option<i64>,
) -> Result<HashMap<usize, Groups>> {
    let mut groups = HashMap::new();
    for id in levels.values().flatten() {
        let NodeKind::Aggregation { relationship, .. } = arena.node(*id).kind else {
            continue;
        };
        if groups.contains_key(&relationship) {
            continue;
        }

        let rel = &es.relationships()[relationship];
        let parent = es.require_entity(&rel.parent)?;
        let child = es.require_entity(&rel.child)?;

        let position: HashMap<String, usize> = parent
            .index_values()?
            .into_iter()
            .enumerate()
            .filter_map(|(row, key)| key.map(|k| (k, row)))
            .collect();
        let times = match (child.time_index(), cutoff) {
            (Some(time_index), Some(_)) => Some(child.column_values(time_index)?),
            _ => None,
        };

        let mut rows: Groups = vec![Vec::new(); parent.len()];
        let keys = child.column_values(&rel.child_key)?;
        for row in 0..child.len() {
            let late = match (&times, cutoff) {
                (Some(times), Some(cutoff)) => times.int(row).is_some_and(|t| t > cutoff),
                _ => false,
            };
            if late {
                continue;
            }
            if let Some(&parent_row) = keys.text(row).and_then(|key| position.get(key)) {
                rows[parent_row].push(row);
            }
        }
        groups.insert(relationship, rows);
    }
    Ok(groups)
}

fn evaluate(
    es: &EntitySet,
    node: &FeatureNode,
    values: &[Option<ColumnValues>],
    groups: &HashMap<usize, Groups>,
    cutoff: Option<i64>,
) -> Result<ColumnValues> {
    match &node.kind {
        NodeKind::Identity { column } => es.require_entity(&node.entity)?.column_values(column),
        NodeKind::Transform { primitive } => Ok(primitive.transform(first_input(node, values)?)),
        NodeKind::Aggregation {
            primitive,
            relationship,
        } => {
            let rows = groups.get(relationship).ok_or_else(|| {
                SynthesisError::schema(format!("no child groups for '{}'", node.name))
            })?;
            let base = if primitive.takes_input() {
                Some(first_input(node, values)?)
            } else {
                None
            };
            Ok(ColumnValues::collect(
                node.logical_type.storage(),
                rows.iter().map(|group| primitive.aggregate(base, group, cutoff)),
            ))
        }
    }
}

fn first_input<'a>(node: &FeatureNode, values: &'a [Option<ColumnValues>]) -> Result<&'a ColumnValues> {
    node.inputs
        .first()
        .and_then(|id| values[id.index()].as_ref())
        .ok_or_else(|| SynthesisError::schema(format!("input of '{}' was not evaluated", node.name)))
}
