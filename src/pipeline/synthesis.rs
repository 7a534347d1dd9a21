//! Deep feature synthesis - depth-bounded stacking of primitives across relationships
//!
//! The recursion of classic DFS is unrolled into one pass per depth level. Each
//! level only reads the features created by the previous level, so a feature at
//! depth `d` is always built from inputs at depth `d - 1` and nothing past
//! `max_depth` is ever generated.

use std::collections::HashMap;

use tracing::{debug, info};

use super::feature::{Feature, FeatureArena, FeatureId, NodeKind};
use super::materialize::materialize;
use super::matrix::FeatureMatrix;
use crate::entityset::{EntitySet, LogicalType};
use crate::error::{Result, SynthesisError};
use crate::primitives::PrimitiveSet;

/// Default stacking depth.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Configuration for a synthesis run
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Maximum stacking depth; 0 keeps only the raw target columns
    pub max_depth: usize,
    /// Worker threads used to evaluate one depth level; 1 is sequential
    pub n_jobs: usize,
    /// Epoch milliseconds; child rows after it are ignored. Defaults to the
    /// latest time index value in the entity set.
    pub cutoff_time: Option<i64>,
    pub primitives: PrimitiveSet,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            n_jobs: 1,
            cutoff_time: None,
            primitives: PrimitiveSet::default(),
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_jobs == 0 {
            return Err(SynthesisError::InvalidConfig(
                "n_jobs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run deep feature synthesis anchored at `target`.
///
/// Returns the materialized matrix (one row per target row) and the feature
/// definitions in deterministic order. Primitives that match no column are
/// skipped, never fatal.
pub fn synthesize(
    es: &EntitySet,
    target: &str,
    config: &SynthesisConfig,
) -> Result<(FeatureMatrix, Vec<Feature>)> {
    config.validate()?;
    es.check_acyclic(target)?;

    debug!(entityset = es.id(), target, max_depth = config.max_depth, "starting deep feature synthesis");
    let (arena, outputs) = generate_features(es, target, config)?;
    let features: Vec<Feature> = outputs.iter().map(|&id| arena.to_feature(es, id)).collect();

    let matrix = materialize(es, &arena, target, &outputs, config)?;
    info!(
        target,
        features = features.len(),
        rows = matrix.height(),
        "deep feature synthesis complete"
    );
    Ok((matrix, features))
}

/// Evaluate saved feature definitions against a fresh entity set.
pub fn calculate_feature_matrix(
    es: &EntitySet,
    target: &str,
    features: &[Feature],
    config: &SynthesisConfig,
) -> Result<FeatureMatrix> {
    config.validate()?;
    es.check_acyclic(target)?;

    let mut arena = FeatureArena::default();
    let mut outputs = Vec::with_capacity(features.len());
    for feature in features {
        if feature.entity != target {
            return Err(SynthesisError::schema(format!(
                "feature '{}' is defined on '{}', not the target '{}'",
                feature.name, feature.entity, target
            )));
        }
        let id = arena.intern_feature(es, feature)?;
        if arena.node(id).name != feature.name {
            return Err(SynthesisError::schema(format!(
                "feature '{}' resolves to '{}' on this entity set",
                feature.name,
                arena.node(id).name
            )));
        }
        outputs.push(id);
    }
    materialize(es, &arena, target, &outputs, config)
}

/// Entities reachable from `target` along parent→child edges, in discovery order.
fn reachable_entities<'a>(es: &'a EntitySet, target: &'a str) -> Vec<&'a str> {
    let mut order = vec![target];
    let mut next = 0;
    while next < order.len() {
        let parent = order[next];
        for (_, rel) in es.children_of(parent) {
            if !order.contains(&rel.child.as_str()) {
                order.push(rel.child.as_str());
            }
        }
        next += 1;
    }
    order
}

/// Build every feature up to `max_depth` and return the target's features in output order.
pub(crate) fn generate_features(
    es: &EntitySet,
    target: &str,
    config: &SynthesisConfig,
) -> Result<(FeatureArena, Vec<FeatureId>)> {
    let entities = reachable_entities(es, target);
    let position: HashMap<&str, usize> = entities
        .iter()
        .enumerate()
        .map(|(i, name)| (*name, i))
        .collect();
    let primitives = &config.primitives;
    let mut arena = FeatureArena::default();

    // Depth 0: every non-index column becomes an identity feature
    let mut frontier: Vec<Vec<FeatureId>> = Vec::with_capacity(entities.len());
    for name in &entities {
        let entity = es.require_entity(name)?;
        let mut level = Vec::new();
        for (column, _) in entity.columns() {
            if column == entity.index() {
                continue;
            }
            let (id, _) = arena.identity(es, name, column)?;
            level.push(id);
        }
        frontier.push(level);
    }

    for depth in 1..=config.max_depth {
        let mut next: Vec<Vec<FeatureId>> = vec![Vec::new(); entities.len()];

        for (pos, name) in entities.iter().enumerate() {
            // Transforms over this entity's previous level (no transform chains)
            for &input in &frontier[pos] {
                let node = arena.node(input);
                if matches!(node.kind, NodeKind::Transform { .. }) {
                    continue;
                }
                for primitive in primitives.transforms_for(node.signature()) {
                    let (id, is_new) = arena.transform(primitive, input);
                    if is_new {
                        next[pos].push(id);
                    }
                }
            }

            // Aggregations of each child's previous level onto this entity
            for (rel_idx, rel) in es.children_of(name) {
                let child_pos = position[rel.child.as_str()];

                if depth == 1 && primitives.counts_rows() {
                    let (id, is_new) = arena.aggregation(
                        es,
                        crate::primitives::AggregationPrimitive::Count,
                        rel_idx,
                        None,
                    )?;
                    if is_new {
                        next[pos].push(id);
                    }
                }

                for &input in &frontier[child_pos] {
                    let node = arena.node(input);
                    let eligible = primitives.aggregations_for(node.signature());
                    if eligible.is_empty() {
                        if node.logical_type != LogicalType::Identifier {
                            let skipped = SynthesisError::UnsupportedPrimitive {
                                kind: "aggregation",
                                entity: node.entity.clone(),
                                column: node.name.clone(),
                                logical_type: node.logical_type,
                            };
                            debug!("{}", skipped);
                        }
                        continue;
                    }
                    let stacked_on = match &node.kind {
                        NodeKind::Aggregation { primitive, .. } => Some(*primitive),
                        _ => None,
                    };
                    for primitive in eligible {
                        if stacked_on == Some(primitive) {
                            continue;
                        }
                        let (id, is_new) = arena.aggregation(es, primitive, rel_idx, Some(input))?;
                        if is_new {
                            next[pos].push(id);
                        }
                    }
                }
            }
        }

        debug!(
            depth,
            generated = next.iter().map(Vec::len).sum::<usize>(),
            "synthesized depth level"
        );
        frontier = next;
    }

    let mut outputs: Vec<FeatureId> = arena
        .ids()
        .filter(|&id| arena.node(id).entity == target)
        .collect();
    outputs.sort_by_cached_key(|&id| output_key(es, &arena, id));
    Ok((arena, outputs))
}

/// Stable output order: (depth, source entity, primitive name, base name).
fn output_key(es: &EntitySet, arena: &FeatureArena, id: FeatureId) -> (usize, String, String, String, String) {
    let node = arena.node(id);
    let source = match &node.kind {
        NodeKind::Aggregation { relationship, .. } => es.relationships()[*relationship].child.clone(),
        _ => node.entity.clone(),
    };
    let primitive = match node.kind {
        NodeKind::Identity { .. } => String::new(),
        _ => node.primitive_name().to_string(),
    };
    let base = node
        .inputs
        .first()
        .map(|&input| arena.node(input).name.clone())
        .unwrap_or_else(|| node.name.clone());
    (node.depth, source, primitive, base, node.name.clone())
}
