//! Record contracts the composed accessors rely on.

pub mod memory;

use std::rc::Rc;

use crate::aggregations::{AggregationCache, Aggregations, Assignment, Composed, ValueObject};
use crate::core::{Result, Value};

pub use memory::{MemoryRecord, Model, RecordStore};

/// A persisted record with named scalar columns.
pub trait Record: 'static {
    fn read_column(&self, column: &str) -> Result<Value>;

    fn write_column(&mut self, column: &str, value: Value) -> Result<()>;

    /// Saves the record, failing loudly.
    fn persist(&mut self) -> Result<()>;

    fn aggregation_cache(&self) -> &AggregationCache;
}

/// Opt-in for record types that expose composed properties.
pub trait ComposedOf: Record + Sized {
    fn aggregations(&self) -> &Aggregations<Self>;

    fn composed<V: ValueObject>(&self, property: &str) -> Result<Option<Rc<Composed<V>>>> {
        self.aggregations().get(self, property)
    }

    fn assign_composed<V: ValueObject>(
        &mut self,
        property: &str,
        value: impl Into<Assignment<V>>,
    ) -> Result<()> {
        let accessor = self.aggregations().accessor::<V>(property)?;
        accessor.set(self, value.into())
    }

    /// Drops the cached value so the next read rebuilds it from the columns.
    fn reset_composed(&self, property: &str) -> bool {
        self.aggregation_cache().remove(property)
    }
}
