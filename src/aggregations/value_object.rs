//! Contracts a type must satisfy to be composed out of record columns.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::core::{Result, Value};

/// Positional factory: receives mapped column values in mapping order.
pub type NamedConstructor<V> = fn(Vec<Value>) -> Result<V>;

/// Converts a raw assigned value into the value object; `None` means nil.
pub type NamedConverter<V> = fn(Value) -> Result<Option<V>>;

/// A structured, immutable view over several flat record columns.
///
/// Most types get this through [`value_object!`](crate::value_object), which
/// generates the field table and the positional default constructor. Implement
/// it by hand to expose named factories or converters.
pub trait ValueObject: Sized + fmt::Debug + 'static {
    /// Name used to resolve `class_name` at declaration time.
    const TYPE_NAME: &'static str;

    /// Readable fields, in the order the default constructor takes them.
    fn field_names() -> &'static [&'static str];

    /// Reads one field as a column value. `None` when the type has no such field.
    fn field(&self, name: &str) -> Option<Value>;

    /// Default constructor. Values arrive positionally.
    fn from_fields(values: Vec<Value>) -> Result<Self>;

    fn named_constructor(_name: &str) -> Option<NamedConstructor<Self>> {
        None
    }

    fn named_converter(_name: &str) -> Option<NamedConverter<Self>> {
        None
    }

    /// Validation capability. Types that opt into [`Validate`] return `Some(self)`.
    fn validation(&self) -> Option<&dyn Validate> {
        None
    }
}

/// General-purpose validation a value object can opt into.
pub trait Validate {
    /// Adds an entry to `errors` for every failed rule. `context` is the
    /// validation mode requested by the caller, if any.
    fn validate(&self, context: Option<&str>, errors: &mut ValidationErrors);
}

/// Error messages collected during one validation pass, keyed by field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    messages: IndexMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.messages
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn on(&self, field: &str) -> &[String] {
        self.messages
            .get(field)
            .map(|messages| messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of failed rules across all fields.
    pub fn len(&self) -> usize {
        self.messages.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn full_messages(&self) -> Vec<String> {
        self.messages
            .iter()
            .flat_map(|(field, messages)| {
                messages
                    .iter()
                    .map(move |message| format!("{} {}", field, message))
            })
            .collect()
    }
}

/// Records a "can't be blank" error for every listed field that reads as blank
/// or that the value does not have.
pub fn presence_of<V: ValueObject>(value: &V, fields: &[&str], errors: &mut ValidationErrors) {
    for field in fields {
        let blank = value.field(field).map_or(true, |v| v.is_blank());
        if blank {
            errors.add(*field, "can't be blank");
        }
    }
}
