//! Value objects composed out of flat record columns.
//!
//! A record type registers each composed property once in its
//! [`Aggregations`] table. Reads build the value object lazily from the
//! mapped columns and cache it on the record instance; writes decompose a
//! value object back into the columns, validate and freeze it, and persist
//! the record when the declaration asks for autosave.

pub mod accessor;
pub mod cache;
pub mod composed;
pub mod declaration;
mod macros;
pub mod options;
pub mod value_object;

pub use accessor::{Accessor, AggregateAccessor, Assignment};
pub use cache::AggregationCache;
pub use composed::Composed;
pub use declaration::{Aggregations, camelize};
pub use options::{AggregateReflection, AggregationOptions, Constructor, Converter};
pub use value_object::{
    NamedConstructor, NamedConverter, Validate, ValidationErrors, ValueObject, presence_of,
};
