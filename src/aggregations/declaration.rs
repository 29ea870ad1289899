//! Per-record-type registry of composed properties.

use std::rc::Rc;
use std::sync::{Arc, RwLock};

use indexmap::IndexMap;
use tracing::debug;

use super::accessor::{Accessor, AggregateAccessor, Assignment};
use super::composed::Composed;
use super::options::{
    AggregateReflection, AggregationOptions, Constructor, ConstructorFn, Converter, ConverterFn,
};
use super::value_object::ValueObject;
use crate::core::{AggregateError, Result, Schema};
use crate::record::Record;

/// Dispatch table from property name to its accessor pair.
///
/// Built once per record type by calling [`declare`](Self::declare) for each
/// composed property. When constructed with a [`Schema`], declarations are
/// checked against the record's columns.
pub struct Aggregations<R> {
    schema: Option<Schema>,
    entries: RwLock<IndexMap<String, Arc<dyn AggregateAccessor<R>>>>,
}

impl<R: Record> Default for Aggregations<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> Aggregations<R> {
    pub fn new() -> Self {
        Self {
            schema: None,
            entries: RwLock::new(IndexMap::new()),
        }
    }

    pub fn with_schema(schema: Schema) -> Self {
        Self {
            schema: Some(schema),
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Declares `property` as a composed value of type `V`.
    ///
    /// Declaring a property again replaces its accessors.
    pub fn declare<V: ValueObject>(
        &self,
        property: &str,
        options: AggregationOptions<V>,
    ) -> Result<()> {
        let accessor = self.resolve::<V>(property, options)?;
        debug!(
            aggregation = property,
            class_name = %accessor.reflection().class_name,
            columns = accessor.reflection().mapping.len(),
            "aggregation declared"
        );
        self.entries
            .write()?
            .insert(property.to_string(), Arc::new(accessor));
        Ok(())
    }

    /// Declares `property` from an options table, see
    /// [`AggregationOptions::from_table`].
    pub fn declare_from_table<V: ValueObject>(
        &self,
        property: &str,
        table: serde_json::Value,
    ) -> Result<()> {
        self.declare::<V>(property, AggregationOptions::from_table(table)?)
    }

    pub fn is_declared(&self, property: &str) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(property))
            .unwrap_or(false)
    }

    /// Typed accessor pair for `property`.
    pub fn accessor<V: ValueObject>(&self, property: &str) -> Result<Arc<Accessor<R, V>>> {
        let entry = self
            .entries
            .read()?
            .get(property)
            .cloned()
            .ok_or_else(|| AggregateError::UnknownAggregation(property.to_string()))?;
        let declared = entry.value_type_name();
        entry
            .into_any()
            .downcast::<Accessor<R, V>>()
            .map_err(|_| {
                AggregateError::TypeMismatch(format!(
                    "aggregation '{}' composes {}, not {}",
                    property,
                    declared,
                    V::TYPE_NAME
                ))
            })
    }

    pub fn get<V: ValueObject>(&self, record: &R, property: &str) -> Result<Option<Rc<Composed<V>>>> {
        self.accessor::<V>(property)?.get(record)
    }

    pub fn set<V: ValueObject>(
        &self,
        record: &mut R,
        property: &str,
        value: impl Into<Assignment<V>>,
    ) -> Result<()> {
        self.accessor::<V>(property)?.set(record, value.into())
    }

    pub fn reflect_on_aggregation(&self, property: &str) -> Option<AggregateReflection> {
        let entries = self.entries.read().ok()?;
        entries
            .get(property)
            .map(|entry| entry.reflection().clone())
    }

    /// Reflections of every declared property, in declaration order.
    pub fn reflect_on_all_aggregations(&self) -> Vec<AggregateReflection> {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .values()
                    .map(|entry| entry.reflection().clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve<V: ValueObject>(
        &self,
        property: &str,
        options: AggregationOptions<V>,
    ) -> Result<Accessor<R, V>> {
        if property.is_empty() {
            return Err(AggregateError::Configuration(
                "aggregation name cannot be empty".to_string(),
            ));
        }

        let class_name = options
            .class_name
            .unwrap_or_else(|| camelize(property));
        if class_name != V::TYPE_NAME {
            return Err(AggregateError::Configuration(format!(
                "class name '{}' for aggregation '{}' does not resolve to {}",
                class_name,
                property,
                V::TYPE_NAME
            )));
        }

        let mapping = options
            .mapping
            .unwrap_or_else(|| vec![(property.to_string(), property.to_string())]);
        self.check_mapping::<V>(property, &mapping)?;

        let (constructor, constructor_name): (ConstructorFn<V>, String) = match options.constructor
        {
            Constructor::Default => (Arc::new(V::from_fields) as ConstructorFn<V>, "new".to_string()),
            Constructor::Named(name) => {
                let factory = V::named_constructor(&name).ok_or_else(|| {
                    AggregateError::Configuration(format!(
                        "{} has no constructor named '{}'",
                        V::TYPE_NAME,
                        name
                    ))
                })?;
                (Arc::new(factory) as ConstructorFn<V>, name)
            }
            Constructor::Custom(f) => (f, "<fn>".to_string()),
        };

        let (converter, converter_name): (Option<ConverterFn<V>>, Option<String>) =
            match options.converter {
                None => (None, None),
                Some(Converter::Named(name)) => {
                    let convert = V::named_converter(&name).ok_or_else(|| {
                        AggregateError::Configuration(format!(
                            "{} has no converter named '{}'",
                            V::TYPE_NAME,
                            name
                        ))
                    })?;
                    (Some(Arc::new(convert) as ConverterFn<V>), Some(name))
                }
                Some(Converter::Custom(f)) => (Some(f), Some("<fn>".to_string())),
            };

        let reflection = AggregateReflection {
            name: property.to_string(),
            class_name,
            mapping,
            allow_nil: options.allow_nil,
            autosave: options.autosave,
            constructor: constructor_name,
            converter: converter_name,
        };

        Ok(Accessor::new(reflection, constructor, converter))
    }

    fn check_mapping<V: ValueObject>(
        &self,
        property: &str,
        mapping: &[(String, String)],
    ) -> Result<()> {
        if mapping.is_empty() {
            return Err(AggregateError::Configuration(format!(
                "aggregation '{}' needs at least one mapped column",
                property
            )));
        }

        for (column, field) in mapping {
            if let Some(schema) = &self.schema {
                if !schema.has_column(column) {
                    return Err(AggregateError::Configuration(format!(
                        "aggregation '{}' maps unknown column '{}' of table '{}'",
                        property,
                        column,
                        schema.table_name()
                    )));
                }
            }
            if !V::field_names().contains(&field.as_str()) {
                return Err(AggregateError::Configuration(format!(
                    "aggregation '{}' maps '{}' to unknown field '{}' of {}",
                    property,
                    column,
                    field,
                    V::TYPE_NAME
                )));
            }
        }

        Ok(())
    }
}

/// `gps_location` -> `GpsLocation`.
pub fn camelize(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
