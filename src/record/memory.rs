//! In-memory record layer: a schema-checked row plus the table it saves into.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::{debug, trace};

use super::{ComposedOf, Record};
use crate::aggregations::{AggregationCache, AggregationOptions, Aggregations, ValueObject};
use crate::core::{AggregateError, Result, Schema, Value};

/// Rows saved for one record type, keyed by record id.
pub struct RecordStore {
    table_name: String,
    rows: RwLock<BTreeMap<u64, Vec<Value>>>,
    next_id: AtomicU64,
    saves: AtomicUsize,
    read_only: AtomicBool,
}

impl RecordStore {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            saves: AtomicUsize::new(0),
            read_only: AtomicBool::new(false),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Inserts the row when `id` is `None`, updates it otherwise. Returns the id.
    pub fn save(&self, id: Option<u64>, row: Vec<Value>) -> Result<u64> {
        if self.read_only.load(Ordering::SeqCst) {
            return Err(AggregateError::Persistence(format!(
                "table '{}' is read-only",
                self.table_name
            )));
        }

        let mut rows = self.rows.write()?;
        let id = match id {
            Some(id) if rows.contains_key(&id) => id,
            Some(id) => {
                return Err(AggregateError::Persistence(format!(
                    "record {} no longer exists in '{}'",
                    id, self.table_name
                )));
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        rows.insert(id, row);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    pub fn fetch(&self, id: u64) -> Result<Vec<Value>> {
        self.rows.read()?.get(&id).cloned().ok_or_else(|| {
            AggregateError::Persistence(format!(
                "record {} not found in '{}'",
                id, self.table_name
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful saves since the store was created.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Rejects every save while set.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }
}

impl fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordStore")
            .field("table_name", &self.table_name)
            .field("rows", &self.len())
            .field("saves", &self.save_count())
            .finish()
    }
}

/// A record type: its schema, its table and its composed properties.
pub struct Model {
    schema: Schema,
    store: RecordStore,
    aggregations: Aggregations<MemoryRecord>,
}

impl Model {
    pub fn new(schema: Schema) -> Arc<Self> {
        Arc::new(Self {
            store: RecordStore::new(schema.table_name()),
            aggregations: Aggregations::with_schema(schema.clone()),
            schema,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn aggregations(&self) -> &Aggregations<MemoryRecord> {
        &self.aggregations
    }

    /// Declares a composed property on this record type.
    pub fn composed_of<V: ValueObject>(
        &self,
        property: &str,
        options: AggregationOptions<V>,
    ) -> Result<()> {
        self.aggregations.declare(property, options)
    }

    /// A new, unsaved record with every column null.
    pub fn build(self: &Arc<Self>) -> MemoryRecord {
        MemoryRecord {
            model: Arc::clone(self),
            id: None,
            values: vec![Value::Null; self.schema.column_count()],
            cache: AggregationCache::new(),
        }
    }

    /// Builds a record from `(column, value)` pairs and saves it.
    pub fn create<I, C, T>(self: &Arc<Self>, values: I) -> Result<MemoryRecord>
    where
        I: IntoIterator<Item = (C, T)>,
        C: AsRef<str>,
        T: Into<Value>,
    {
        let mut record = self.build();
        for (column, value) in values {
            record.write_column(column.as_ref(), value.into())?;
        }
        record.persist()?;
        Ok(record)
    }

    pub fn find(self: &Arc<Self>, id: u64) -> Result<MemoryRecord> {
        let values = self.store.fetch(id)?;
        Ok(MemoryRecord {
            model: Arc::clone(self),
            id: Some(id),
            values,
            cache: AggregationCache::new(),
        })
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("schema", &self.schema)
            .field("store", &self.store)
            .finish()
    }
}

/// One row of a [`Model`], with its own aggregation cache.
pub struct MemoryRecord {
    model: Arc<Model>,
    id: Option<u64>,
    values: Vec<Value>,
    cache: AggregationCache,
}

impl MemoryRecord {
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn model(&self) -> &Arc<Model> {
        &self.model
    }

    pub fn get(&self, column: &str) -> Result<Value> {
        self.read_column(column)
    }

    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> Result<()> {
        self.write_column(column, value.into())
    }

    /// Re-reads the columns from the store and drops every cached value.
    pub fn reload(&mut self) -> Result<()> {
        let id = self.id.ok_or_else(|| {
            AggregateError::Persistence("cannot reload a record that was never saved".to_string())
        })?;
        self.values = self.model.store.fetch(id)?;
        self.cache.clear();
        Ok(())
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.model
            .schema
            .find_column_index(column)
            .ok_or_else(|| {
                AggregateError::ColumnNotFound(
                    column.to_string(),
                    self.model.schema.table_name().to_string(),
                )
            })
    }
}

impl Record for MemoryRecord {
    fn read_column(&self, column: &str) -> Result<Value> {
        let idx = self.column_index(column)?;
        Ok(self.values[idx].clone())
    }

    fn write_column(&mut self, column: &str, value: Value) -> Result<()> {
        let idx = self.column_index(column)?;
        self.model.schema.columns()[idx].check_type(&value)?;
        trace!(column, value = %value, "column written");
        self.values[idx] = value;
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        for (column, value) in self.model.schema.columns().iter().zip(&self.values) {
            column.validate(value)?;
        }
        let id = self.model.store.save(self.id, self.values.clone())?;
        debug!(table = self.model.schema.table_name(), id, "record saved");
        self.id = Some(id);
        Ok(())
    }

    fn aggregation_cache(&self) -> &AggregationCache {
        &self.cache
    }
}

impl ComposedOf for MemoryRecord {
    fn aggregations(&self) -> &Aggregations<Self> {
        &self.model.aggregations
    }
}

impl fmt::Debug for MemoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRecord")
            .field("table", &self.model.schema.table_name())
            .field("id", &self.id)
            .field("values", &self.values)
            .field("cache", &self.cache)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn people() -> Arc<Model> {
        Model::new(Schema::new(
            "people",
            vec![
                Column::new("name", DataType::Text).not_null(),
                Column::new("age", DataType::Integer),
            ],
        ))
    }

    #[test]
    fn test_create_and_find() {
        let model = people();
        let record = model
            .create([("name", Value::from("Tobias")), ("age", Value::from(41))])
            .unwrap();
        let id = record.id().unwrap();

        let found = model.find(id).unwrap();
        assert_eq!(found.get("name").unwrap(), Value::Text("Tobias".into()));
        assert_eq!(found.get("age").unwrap(), Value::Integer(41));
        assert_eq!(model.store().save_count(), 1);
    }

    #[test]
    fn test_unknown_column_and_type_mismatch() {
        let model = people();
        let mut record = model.build();
        assert!(matches!(
            record.set("nickname", "Tob"),
            Err(AggregateError::ColumnNotFound(..))
        ));
        assert!(matches!(
            record.set("age", "forty"),
            Err(AggregateError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_persist_checks_not_null_and_read_only() {
        let model = people();
        let mut record = model.build();
        assert!(matches!(
            record.persist(),
            Err(AggregateError::ConstraintViolation(_))
        ));

        record.set("name", "Tobias").unwrap();
        model.store().set_read_only(true);
        assert!(matches!(
            record.persist(),
            Err(AggregateError::Persistence(_))
        ));
        assert!(!record.is_persisted());

        model.store().set_read_only(false);
        record.persist().unwrap();
        assert!(record.is_persisted());
    }

    #[test]
    fn test_reload_discards_unsaved_changes() {
        let model = people();
        let mut record = model.create([("name", "Tobias")]).unwrap();
        record.set("name", "Changed").unwrap();
        record.reload().unwrap();
        assert_eq!(record.get("name").unwrap(), Value::Text("Tobias".into()));
    }
}
