// ============================================================================
// memodb-aggregations
// ============================================================================

pub mod aggregations;
pub mod core;
pub mod prelude;
pub mod record;

// Re-export main types for convenience
pub use crate::aggregations::{
    AggregateReflection, AggregationCache, AggregationOptions, Aggregations, Assignment, Composed,
    Validate, ValidationErrors, ValueObject,
};
pub use crate::core::{AggregateError, Column, ColumnValue, DataType, Result, Schema, Value};
pub use crate::record::{ComposedOf, MemoryRecord, Model, Record, RecordStore};
