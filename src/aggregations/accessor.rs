//! Read and write accessors installed for each declared property.

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use super::composed::Composed;
use super::options::{AggregateReflection, ConstructorFn, ConverterFn};
use super::value_object::ValueObject;
use crate::core::{AggregateError, Result, Value};
use crate::record::Record;

/// Type name reported when a field is read from nil.
const NIL_TYPE_NAME: &str = "nil";

/// What can be assigned to a composed property.
#[derive(Debug)]
pub enum Assignment<V> {
    /// A fresh value object.
    Value(V),
    /// A value object already held elsewhere, for example read from another record.
    Shared(Rc<Composed<V>>),
    /// Field name to value. Built with the type's default constructor.
    Map(IndexMap<String, Value>),
    /// A scalar that is not a value object. Goes through the converter, if any.
    Raw(Value),
    Nil,
}

impl<V> Assignment<V> {
    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }

    pub fn raw(value: impl Into<Value>) -> Self {
        Self::Raw(value.into())
    }
}

impl<V: ValueObject> From<V> for Assignment<V> {
    fn from(value: V) -> Self {
        Self::Value(value)
    }
}

impl<V: ValueObject> From<Option<V>> for Assignment<V> {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Nil, Self::Value)
    }
}

impl<V: ValueObject> From<Rc<Composed<V>>> for Assignment<V> {
    fn from(value: Rc<Composed<V>>) -> Self {
        Self::Shared(value)
    }
}

/// Type-erased view of an accessor pair, stored in the declaration registry.
pub trait AggregateAccessor<R>: Send + Sync + 'static {
    fn reflection(&self) -> &AggregateReflection;

    fn value_type_name(&self) -> &'static str;

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// Read/write pair for one property of record type `R` composing a `V`.
pub struct Accessor<R, V> {
    reflection: AggregateReflection,
    constructor: ConstructorFn<V>,
    converter: Option<ConverterFn<V>>,
    _record: PhantomData<fn(&R)>,
}

impl<R, V> Accessor<R, V>
where
    R: Record,
    V: ValueObject,
{
    pub(crate) fn new(
        reflection: AggregateReflection,
        constructor: ConstructorFn<V>,
        converter: Option<ConverterFn<V>>,
    ) -> Self {
        Self {
            reflection,
            constructor,
            converter,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &str {
        &self.reflection.name
    }

    /// Returns the cached value object, building it from the record's columns
    /// on a cache miss.
    ///
    /// With `allow_nil`, a record whose mapped columns are all null yields
    /// `None` and nothing is cached. Values built here are not frozen.
    pub fn get(&self, record: &R) -> Result<Option<Rc<Composed<V>>>> {
        let name = self.name();
        let cache = record.aggregation_cache();

        if let Some(hit) = cache.get::<V>(name) {
            trace!(aggregation = name, "aggregation cache hit");
            return Ok(Some(hit));
        }

        let values = self
            .reflection
            .columns()
            .map(|column| record.read_column(column))
            .collect::<Result<Vec<_>>>()?;

        if self.reflection.allow_nil && values.iter().all(Value::is_null) {
            trace!(aggregation = name, "all mapped columns are null");
            return Ok(None);
        }

        let object = (self.constructor)(values)?;
        let composed = Rc::new(Composed::new(object));
        cache.insert(name, composed.clone());
        trace!(aggregation = name, "aggregation built from columns");
        Ok(Some(composed))
    }

    /// Decomposes `value` into the mapped columns, freezes and caches it, and
    /// persists the record when autosave applies.
    ///
    /// Column writes are independent: a failure part way through leaves the
    /// columns written so far in place.
    pub fn set(&self, record: &mut R, value: Assignment<V>) -> Result<()> {
        let name = self.reflection.name.as_str();
        let composed = self.resolve(value)?;

        let valid = match composed {
            None if self.reflection.allow_nil => {
                for column in self.reflection.columns() {
                    record.write_column(column, Value::Null)?;
                }
                record.aggregation_cache().remove(name);
                debug!(aggregation = name, "aggregation cleared");
                true
            }
            None => return Err(self.missing_field(NIL_TYPE_NAME)),
            Some(composed) => {
                for (column, field) in &self.reflection.mapping {
                    let value = composed
                        .field(field)
                        .ok_or_else(|| AggregateError::missing_attribute(field, V::TYPE_NAME))?;
                    record.write_column(column, value)?;
                }

                composed.freeze();
                let valid = composed.is_valid();
                record.aggregation_cache().insert(name, composed);
                debug!(aggregation = name, valid, "aggregation assigned");
                valid
            }
        };

        if self.reflection.autosave {
            if valid {
                debug!(aggregation = name, "autosaving owner record");
                record.persist()?;
            } else {
                warn!(aggregation = name, "autosave skipped for invalid value");
            }
        }

        Ok(())
    }

    /// Turns an assignment into the value object to store, or `None` for nil.
    fn resolve(&self, value: Assignment<V>) -> Result<Option<Rc<Composed<V>>>> {
        let object = match value {
            Assignment::Shared(shared) => return Ok(Some(shared)),
            Assignment::Value(object) => Some(object),
            Assignment::Map(entries) => Some(self.construct_from_map(entries)?),
            Assignment::Nil | Assignment::Raw(Value::Null) => None,
            Assignment::Raw(raw) => match &self.converter {
                Some(convert) => convert(raw)?,
                // Unconverted scalars fail on the first field read.
                None => return Err(self.missing_field(raw.type_name())),
            },
        };
        Ok(object.map(|object| Rc::new(Composed::new(object))))
    }

    /// Builds a value object from a field map through the default constructor.
    ///
    /// Entries are arranged in the constructor's field order regardless of the
    /// map's own order. Absent fields are null; keys that are not fields of
    /// the type are rejected.
    fn construct_from_map(&self, mut entries: IndexMap<String, Value>) -> Result<V> {
        let values = V::field_names()
            .iter()
            .map(|field| entries.shift_remove(*field).unwrap_or(Value::Null))
            .collect();

        if let Some((unknown, _)) = entries.into_iter().next() {
            return Err(AggregateError::missing_attribute(unknown, V::TYPE_NAME));
        }

        V::from_fields(values)
    }

    fn missing_field(&self, type_name: &str) -> AggregateError {
        let field = self.reflection.fields().next().unwrap_or_default();
        AggregateError::missing_attribute(field, type_name)
    }
}

impl<R, V> AggregateAccessor<R> for Accessor<R, V>
where
    R: Record,
    V: ValueObject,
{
    fn reflection(&self) -> &AggregateReflection {
        &self.reflection
    }

    fn value_type_name(&self) -> &'static str {
        V::TYPE_NAME
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
