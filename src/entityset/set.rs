//! The entity graph: entities plus parent→child relationships

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::entity::Entity;
use super::logical_type::LogicalType;
use super::values::ColumnValues;
use crate::error::{Result, SynthesisError};

/// Directed parent→child foreign-key edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relationship {
    pub parent: String,
    pub parent_key: String,
    pub child: String,
    pub child_key: String,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{} -> {}.{}",
            self.parent, self.parent_key, self.child, self.child_key
        )
    }
}

/// Entities and the relationships between them, built fresh per request.
#[derive(Debug, Clone, Default)]
pub struct EntitySet {
    id: String,
    entities: Vec<Entity>,
    relationships: Vec<Relationship>,
}

impl EntitySet {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<()> {
        if self.entity(entity.name()).is_some() {
            return Err(SynthesisError::schema(format!(
                "entity '{}' already exists in '{}'",
                entity.name(),
                self.id
            )));
        }
        debug!(entityset = %self.id, entity = entity.name(), "adding entity");
        self.entities.push(entity);
        Ok(())
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name() == name)
    }

    pub(crate) fn require_entity(&self, name: &str) -> Result<&Entity> {
        self.entity(name).ok_or_else(|| {
            SynthesisError::schema(format!("entity '{}' not found in '{}'", name, self.id))
        })
    }

    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    /// Relationships (with their position) in which `parent` is the parent.
    pub fn children_of<'a>(
        &'a self,
        parent: &'a str,
    ) -> impl Iterator<Item = (usize, &'a Relationship)> + 'a {
        self.relationships
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.parent == parent)
    }

    /// Link `parent.parent_key` (the parent's index) to `child.child_key`.
    ///
    /// The child key becomes an `Identifier`. Every non-null child key must
    /// match a parent index value; the first dangling value is reported.
    pub fn add_relationship(
        &mut self,
        parent: &str,
        parent_key: &str,
        child: &str,
        child_key: &str,
    ) -> Result<()> {
        let parent_entity = self.require_entity(parent)?;
        let child_entity = self.require_entity(child)?;

        if parent_entity.logical_type(parent_key).is_none() {
            return Err(SynthesisError::schema(format!(
                "parent key '{}.{}' does not exist",
                parent, parent_key
            )));
        }
        if parent_entity.index() != parent_key {
            return Err(SynthesisError::schema(format!(
                "parent key '{}.{}' must be the index of '{}' ('{}')",
                parent,
                parent_key,
                parent,
                parent_entity.index()
            )));
        }
        let Some(child_type) = child_entity.logical_type(child_key) else {
            return Err(SynthesisError::schema(format!(
                "child key '{}.{}' does not exist",
                child, child_key
            )));
        };
        if child_entity.index() == child_key && parent != child {
            return Err(SynthesisError::schema(format!(
                "child key '{}.{}' cannot be the child's own index",
                child, child_key
            )));
        }
        if self
            .relationships
            .iter()
            .any(|r| r.child == child && r.child_key == child_key)
        {
            return Err(SynthesisError::schema(format!(
                "'{}.{}' is already a foreign key",
                child, child_key
            )));
        }

        let keys = key_values(child_entity, child_key, child_type)?;

        let parent_index: HashSet<String> = parent_entity
            .index_values()?
            .into_iter()
            .flatten()
            .collect();
        if let Some(dangling) = keys
            .iter()
            .flatten()
            .find(|key| !parent_index.contains(key.as_str()))
        {
            return Err(SynthesisError::ReferentialIntegrity {
                parent: parent.to_string(),
                parent_key: parent_key.to_string(),
                child: child.to_string(),
                child_key: child_key.to_string(),
                value: dangling.clone(),
            });
        }

        if child_type != LogicalType::Identifier {
            let child_entity = self
                .entities
                .iter_mut()
                .find(|e| e.name() == child)
                .ok_or_else(|| SynthesisError::schema(format!("entity '{}' not found", child)))?;
            child_entity.replace_column(
                child_key,
                LogicalType::Identifier,
                ColumnValues::Text(keys),
            )?;
        }

        let relationship = Relationship {
            parent: parent.to_string(),
            parent_key: parent_key.to_string(),
            child: child.to_string(),
            child_key: child_key.to_string(),
        };
        debug!(entityset = %self.id, %relationship, "adding relationship");
        self.relationships.push(relationship);
        Ok(())
    }

    /// Verify that no entity reachable from `target` is transitively its own child.
    pub fn check_acyclic(&self, target: &str) -> Result<()> {
        self.require_entity(target)?;

        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        let mut marks: HashMap<&str, Mark> = HashMap::new();
        // Iterative DFS: (entity, next child position)
        let mut stack: Vec<(&str, usize)> = vec![(target, 0)];
        marks.insert(target, Mark::Visiting);

        while let Some((entity, next)) = stack.pop() {
            let children: Vec<&str> = self
                .children_of(entity)
                .map(|(_, r)| r.child.as_str())
                .collect();
            if next >= children.len() {
                marks.insert(entity, Mark::Done);
                continue;
            }
            stack.push((entity, next + 1));

            let child = children[next];
            match marks.get(child) {
                Some(Mark::Visiting) => return Err(SynthesisError::Cycle(child.to_string())),
                Some(Mark::Done) => {}
                None => {
                    marks.insert(child, Mark::Visiting);
                    stack.push((child, 0));
                }
            }
        }
        Ok(())
    }

    /// Latest time index value across every entity.
    pub fn latest_time(&self) -> Result<Option<i64>> {
        let mut latest = None;
        for entity in &self.entities {
            latest = latest.max(entity.latest_time()?);
        }
        Ok(latest)
    }
}

/// Free-function form of [`EntitySet::add_relationship`].
pub fn add_relationship(
    entityset: &mut EntitySet,
    parent: &str,
    parent_key: &str,
    child: &str,
    child_key: &str,
) -> Result<()> {
    entityset.add_relationship(parent, parent_key, child, child_key)
}

/// Foreign key values as text, checking that the column type can hold keys.
///
/// Keys supplied as text are compared as written, so an inferred numeric type
/// never rewrites them ("007" stays "007").
fn key_values(entity: &Entity, column: &str, logical_type: LogicalType) -> Result<Vec<Option<String>>> {
    let incompatible = || {
        SynthesisError::schema(format!(
            "child key '{}.{}' of type {} is not compatible with an identifier index",
            entity.name(),
            column,
            logical_type
        ))
    };

    if matches!(
        logical_type,
        LogicalType::Boolean | LogicalType::Datetime | LogicalType::Ordinal
    ) {
        return Err(incompatible());
    }
    if let Some(raw) = entity.source_text(column)? {
        return Ok(raw);
    }

    let keys = match entity.column_values(column)? {
        ColumnValues::Text(values) => values,
        ColumnValues::Int(values) if logical_type == LogicalType::Integer => values
            .into_iter()
            .map(|v| v.map(|i| i.to_string()))
            .collect(),
        ColumnValues::Float(values) => values
            .into_iter()
            .map(|v| match v {
                None => Ok(None),
                Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Ok(Some((f as i64).to_string())),
                Some(_) => Err(incompatible()),
            })
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(incompatible()),
    };
    Ok(keys)
}
