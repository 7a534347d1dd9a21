//! Feature definitions and the index-addressed arena synthesis builds them in

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::entityset::{EntitySet, LogicalType};
use crate::error::{Result, SynthesisError};
use crate::primitives::{AggregationPrimitive, InputColumn, TransformPrimitive};

/// How a feature's values are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipe {
    /// A raw column of the entity
    Identity { column: String },
    /// A reduction over the child rows of `child` linked through `child_key`
    Aggregation {
        primitive: AggregationPrimitive,
        child: String,
        child_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<Box<Feature>>,
    },
    Transform {
        primitive: TransformPrimitive,
        input: Box<Feature>,
    },
}

/// A named, typed column recipe anchored at an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub entity: String,
    pub depth: usize,
    pub logical_type: LogicalType,
    pub recipe: Recipe,
}

impl Feature {
    /// Generating primitive, or `IDENTITY` for raw columns.
    pub fn primitive_name(&self) -> &'static str {
        match &self.recipe {
            Recipe::Identity { .. } => "IDENTITY",
            Recipe::Aggregation { primitive, .. } => primitive.name(),
            Recipe::Transform { primitive, .. } => primitive.name(),
        }
    }

    /// Features this one is built from.
    pub fn base_features(&self) -> Vec<&Feature> {
        match &self.recipe {
            Recipe::Identity { .. } => Vec::new(),
            Recipe::Aggregation { input, .. } => input.iter().map(|f| f.as_ref()).collect(),
            Recipe::Transform { input, .. } => vec![input.as_ref()],
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self.recipe, Recipe::Identity { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct FeatureId(usize);

impl FeatureId {
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum NodeKind {
    Identity { column: String },
    Aggregation { primitive: AggregationPrimitive, relationship: usize },
    Transform { primitive: TransformPrimitive },
}

#[derive(Debug, Clone)]
pub(crate) struct FeatureNode {
    pub kind: NodeKind,
    pub entity: String,
    pub inputs: Vec<FeatureId>,
    pub depth: usize,
    pub logical_type: LogicalType,
    pub name: String,
    pub is_time_index: bool,
}

impl FeatureNode {
    pub fn signature(&self) -> InputColumn {
        InputColumn {
            logical_type: self.logical_type,
            is_time_index: self.is_time_index,
        }
    }

    pub fn primitive_name(&self) -> &'static str {
        match &self.kind {
            NodeKind::Identity { .. } => "IDENTITY",
            NodeKind::Aggregation { primitive, .. } => primitive.name(),
            NodeKind::Transform { primitive } => primitive.name(),
        }
    }
}

type RecipeKey = (NodeKind, String, Vec<FeatureId>);

/// Feature nodes addressed by index; structurally identical recipes share one node.
#[derive(Debug, Default)]
pub(crate) struct FeatureArena {
    nodes: Vec<FeatureNode>,
    lookup: HashMap<RecipeKey, FeatureId>,
}

impl FeatureArena {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: FeatureId) -> &FeatureNode {
        &self.nodes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = FeatureId> {
        (0..self.nodes.len()).map(FeatureId)
    }

    /// Insert a node unless an identical recipe exists. Returns the id and whether it is new.
    fn intern(&mut self, node: FeatureNode) -> (FeatureId, bool) {
        let key = (node.kind.clone(), node.entity.clone(), node.inputs.clone());
        if let Some(&id) = self.lookup.get(&key) {
            return (id, false);
        }
        let id = FeatureId(self.nodes.len());
        self.nodes.push(node);
        self.lookup.insert(key, id);
        (id, true)
    }

    pub fn identity(&mut self, es: &EntitySet, entity: &str, column: &str) -> Result<(FeatureId, bool)> {
        let table = es.require_entity(entity)?;
        let logical_type = table.logical_type(column).ok_or_else(|| {
            SynthesisError::schema(format!("column '{}.{}' does not exist", entity, column))
        })?;
        Ok(self.intern(FeatureNode {
            kind: NodeKind::Identity {
                column: column.to_string(),
            },
            entity: entity.to_string(),
            inputs: Vec::new(),
            depth: 0,
            logical_type,
            name: column.to_string(),
            is_time_index: table.time_index() == Some(column),
        }))
    }

    pub fn aggregation(
        &mut self,
        es: &EntitySet,
        primitive: AggregationPrimitive,
        relationship: usize,
        input: Option<FeatureId>,
    ) -> Result<(FeatureId, bool)> {
        let rel = es.relationships().get(relationship).ok_or_else(|| {
            SynthesisError::schema(format!("relationship #{} does not exist", relationship))
        })?;

        // Disambiguate when the parent links to the same child more than once
        let ambiguous = es
            .children_of(&rel.parent)
            .filter(|(_, r)| r.child == rel.child)
            .count()
            > 1;
        let path = if ambiguous {
            format!("{}[{}]", rel.child, rel.child_key)
        } else {
            rel.child.clone()
        };

        let (name, depth, input_type) = match input {
            None => (format!("{}({})", primitive.name(), path), 1, None),
            Some(id) => {
                let base = self.node(id);
                (
                    format!("{}({}.{})", primitive.name(), path, base.name),
                    base.depth + 1,
                    Some(base.logical_type),
                )
            }
        };

        Ok(self.intern(FeatureNode {
            kind: NodeKind::Aggregation {
                primitive,
                relationship,
            },
            entity: rel.parent.clone(),
            inputs: input.into_iter().collect(),
            depth,
            logical_type: primitive.output_type(input_type),
            name,
            is_time_index: false,
        }))
    }

    pub fn transform(&mut self, primitive: TransformPrimitive, input: FeatureId) -> (FeatureId, bool) {
        let base = self.node(input);
        let node = FeatureNode {
            kind: NodeKind::Transform { primitive },
            entity: base.entity.clone(),
            inputs: vec![input],
            depth: base.depth + 1,
            logical_type: primitive.output_type(),
            name: format!("{}({})", primitive.name(), base.name),
            is_time_index: false,
        };
        self.intern(node)
    }

    /// Expand a node into a self-contained feature definition.
    pub fn to_feature(&self, es: &EntitySet, id: FeatureId) -> Feature {
        let node = self.node(id);
        let recipe = match &node.kind {
            NodeKind::Identity { column } => Recipe::Identity {
                column: column.clone(),
            },
            NodeKind::Aggregation {
                primitive,
                relationship,
            } => {
                let rel = &es.relationships()[*relationship];
                Recipe::Aggregation {
                    primitive: *primitive,
                    child: rel.child.clone(),
                    child_key: rel.child_key.clone(),
                    input: node
                        .inputs
                        .first()
                        .map(|&input| Box::new(self.to_feature(es, input))),
                }
            }
            NodeKind::Transform { primitive } => Recipe::Transform {
                primitive: *primitive,
                input: Box::new(self.to_feature(es, node.inputs[0])),
            },
        };
        Feature {
            name: node.name.clone(),
            entity: node.entity.clone(),
            depth: node.depth,
            logical_type: node.logical_type,
            recipe,
        }
    }

    /// Rebuild the nodes behind a saved feature definition against `es`.
    ///
    /// Fails with `Schema` when a column, relationship or primitive signature
    /// referenced by the definition does not hold for this entity set.
    pub fn intern_feature(&mut self, es: &EntitySet, feature: &Feature) -> Result<FeatureId> {
        let id = match &feature.recipe {
            Recipe::Identity { column } => self.identity(es, &feature.entity, column)?.0,
            Recipe::Aggregation {
                primitive,
                child,
                child_key,
                input,
            } => {
                let relationship = es
                    .relationships()
                    .iter()
                    .position(|r| {
                        r.parent == feature.entity && &r.child == child && &r.child_key == child_key
                    })
                    .ok_or_else(|| {
                        SynthesisError::schema(format!(
                            "feature '{}' needs relationship {} -> {}.{}",
                            feature.name, feature.entity, child, child_key
                        ))
                    })?;
                let input = match input {
                    Some(base) => {
                        if base.entity != *child {
                            return Err(SynthesisError::schema(format!(
                                "feature '{}' aggregates '{}' which is not on '{}'",
                                feature.name, base.name, child
                            )));
                        }
                        let base_id = self.intern_feature(es, base)?;
                        if !primitive.accepts(self.node(base_id).signature()) {
                            return Err(SynthesisError::schema(format!(
                                "{} does not accept '{}' ({})",
                                primitive,
                                base.name,
                                self.node(base_id).logical_type
                            )));
                        }
                        Some(base_id)
                    }
                    None if primitive.takes_input() => {
                        return Err(SynthesisError::schema(format!(
                            "feature '{}' is missing the input of {}",
                            feature.name, primitive
                        )))
                    }
                    None => None,
                };
                self.aggregation(es, *primitive, relationship, input)?.0
            }
            Recipe::Transform { primitive, input } => {
                if input.entity != feature.entity {
                    return Err(SynthesisError::schema(format!(
                        "transform '{}' crosses from '{}' to '{}'",
                        feature.name, input.entity, feature.entity
                    )));
                }
                let base_id = self.intern_feature(es, input)?;
                if !primitive.accepts(self.node(base_id).signature()) {
                    return Err(SynthesisError::schema(format!(
                        "{} does not accept '{}' ({})",
                        primitive,
                        input.name,
                        self.node(base_id).logical_type
                    )));
                }
                self.transform(*primitive, base_id).0
            }
        };
        Ok(id)
    }
}
