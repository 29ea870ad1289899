//! Everything a record type needs to declare and use composed properties.

pub use crate::aggregations::{
    AggregationOptions, Aggregations, Assignment, Composed, Validate, ValidationErrors,
    ValueObject, presence_of,
};
pub use crate::core::{AggregateError, Column, ColumnValue, DataType, Result, Schema, Value};
pub use crate::record::{ComposedOf, MemoryRecord, Model, Record};
pub use crate::value_object;
