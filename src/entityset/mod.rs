//! Entity model - typed tables and the relationships between them

mod entity;
mod logical_type;
mod set;
mod values;

pub use entity::{build_entity, Entity};
pub use logical_type::{
    coerce_column, infer_logical_type, parse_bool, parse_datetime_ms, LogicalType, Storage,
};
pub use set::{add_relationship, EntitySet, Relationship};
pub use values::{ColumnValues, DiscreteKey, Scalar};
