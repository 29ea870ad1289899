//! Options accepted when declaring a composed property.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{Result, Value};

pub type ConstructorFn<V> = Arc<dyn Fn(Vec<Value>) -> Result<V> + Send + Sync>;
pub type ConverterFn<V> = Arc<dyn Fn(Value) -> Result<Option<V>> + Send + Sync>;

/// How the read path builds a value object out of mapped column values.
pub enum Constructor<V> {
    /// The type's default positional constructor.
    Default,
    /// A named factory the value-object type exposes.
    Named(String),
    Custom(ConstructorFn<V>),
}

/// How the write path turns a raw assigned value into a value object.
pub enum Converter<V> {
    Named(String),
    Custom(ConverterFn<V>),
}

impl<V> Clone for Constructor<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Named(name) => Self::Named(name.clone()),
            Self::Custom(f) => Self::Custom(f.clone()),
        }
    }
}

impl<V> Clone for Converter<V> {
    fn clone(&self) -> Self {
        match self {
            Self::Named(name) => Self::Named(name.clone()),
            Self::Custom(f) => Self::Custom(f.clone()),
        }
    }
}

impl<V> fmt::Debug for Constructor<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::Named(name) => write!(f, "Named({})", name),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

impl<V> fmt::Debug for Converter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, "Named({})", name),
            Self::Custom(_) => write!(f, "Custom(<fn>)"),
        }
    }
}

/// Declaration options for one composed property.
///
/// # Examples
///
/// ```
/// use memodb_aggregations::AggregationOptions;
/// # use memodb_aggregations::value_object;
/// # value_object! {
/// #     #[derive(Debug, Clone, PartialEq)]
/// #     pub struct Address { pub street: Option<String>, pub city: Option<String> }
/// # }
///
/// let options = AggregationOptions::<Address>::new()
///     .map("address_street", "street")
///     .map("address_city", "city")
///     .allow_nil(true);
/// assert_eq!(options.mapping.as_ref().map(Vec::len), Some(2));
/// ```
#[derive(Debug, Clone)]
pub struct AggregationOptions<V> {
    pub class_name: Option<String>,
    /// `(column, field)` pairs. The order is the positional argument order
    /// handed to the constructor.
    pub mapping: Option<Vec<(String, String)>>,
    pub allow_nil: bool,
    pub constructor: Constructor<V>,
    pub converter: Option<Converter<V>>,
    pub autosave: bool,
}

impl<V> Default for AggregationOptions<V> {
    fn default() -> Self {
        Self {
            class_name: None,
            mapping: None,
            allow_nil: false,
            constructor: Constructor::Default,
            converter: None,
            autosave: false,
        }
    }
}

impl<V> AggregationOptions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class_name(mut self, class_name: &str) -> Self {
        self.class_name = Some(class_name.to_string());
        self
    }

    /// Replaces the whole mapping.
    pub fn mapping<I, C, F>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, F)>,
        C: Into<String>,
        F: Into<String>,
    {
        self.mapping = Some(
            pairs
                .into_iter()
                .map(|(column, field)| (column.into(), field.into()))
                .collect(),
        );
        self
    }

    /// Appends one `(column, field)` pair to the mapping.
    pub fn map(mut self, column: &str, field: &str) -> Self {
        self.mapping
            .get_or_insert_with(Vec::new)
            .push((column.to_string(), field.to_string()));
        self
    }

    pub fn allow_nil(mut self, allow_nil: bool) -> Self {
        self.allow_nil = allow_nil;
        self
    }

    pub fn autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn constructor<F>(mut self, constructor: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<V> + Send + Sync + 'static,
    {
        self.constructor = Constructor::Custom(Arc::new(constructor));
        self
    }

    pub fn constructor_named(mut self, name: &str) -> Self {
        self.constructor = Constructor::Named(name.to_string());
        self
    }

    pub fn converter<F>(mut self, converter: F) -> Self
    where
        F: Fn(Value) -> Result<Option<V>> + Send + Sync + 'static,
    {
        self.converter = Some(Converter::Custom(Arc::new(converter)));
        self
    }

    pub fn converter_named(mut self, name: &str) -> Self {
        self.converter = Some(Converter::Named(name.to_string()));
        self
    }

    /// Parses a declaration table such as
    /// `{"mapping": [["address_city", "city"]], "allow_nil": true}`.
    ///
    /// `constructor` and `converter` name factories on the value-object type.
    /// Unrecognized keys are a configuration error.
    pub fn from_table(table: serde_json::Value) -> Result<Self> {
        let table: OptionsTable = serde_json::from_value(table)?;
        Ok(table.into())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionsTable {
    class_name: Option<String>,
    mapping: Option<MappingTable>,
    #[serde(default)]
    allow_nil: bool,
    constructor: Option<String>,
    converter: Option<String>,
    #[serde(default)]
    autosave: bool,
}

/// Either one `[column, field]` pair or a list of them.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MappingTable {
    Pair([String; 2]),
    Pairs(Vec<[String; 2]>),
}

impl MappingTable {
    fn into_pairs(self) -> Vec<(String, String)> {
        let pairs = match self {
            Self::Pair(pair) => vec![pair],
            Self::Pairs(pairs) => pairs,
        };
        pairs
            .into_iter()
            .map(|[column, field]| (column, field))
            .collect()
    }
}

impl<V> From<OptionsTable> for AggregationOptions<V> {
    fn from(table: OptionsTable) -> Self {
        Self {
            class_name: table.class_name,
            mapping: table.mapping.map(MappingTable::into_pairs),
            allow_nil: table.allow_nil,
            constructor: table
                .constructor
                .map_or(Constructor::Default, Constructor::Named),
            converter: table.converter.map(Converter::Named),
            autosave: table.autosave,
        }
    }
}

/// Introspection record for a declared property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregateReflection {
    pub name: String,
    pub class_name: String,
    pub mapping: Vec<(String, String)>,
    pub allow_nil: bool,
    pub autosave: bool,
    /// `"new"` for the default constructor, the factory name, or `"<fn>"`.
    pub constructor: String,
    pub converter: Option<String>,
}

impl AggregateReflection {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.mapping.iter().map(|(column, _)| column.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.mapping.iter().map(|(_, field)| field.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::AggregateError;

    #[derive(Debug)]
    struct Temperature;

    #[test]
    fn test_single_pair_mapping_is_wrapped() {
        let options =
            AggregationOptions::<Temperature>::from_table(json!({"mapping": ["reading", "celsius"]}))
                .unwrap();
        assert_eq!(
            options.mapping,
            Some(vec![("reading".to_string(), "celsius".to_string())])
        );
        assert!(!options.allow_nil);
        assert!(!options.autosave);
        assert!(matches!(options.constructor, Constructor::Default));
    }

    #[test]
    fn test_full_table_is_parsed() {
        let options = AggregationOptions::<Temperature>::from_table(json!({
            "class_name": "Temperature",
            "mapping": [["reading", "celsius"], ["unit", "scale"]],
            "allow_nil": true,
            "constructor": "parse",
            "converter": "from_text",
            "autosave": true
        }))
        .unwrap();
        assert_eq!(options.class_name.as_deref(), Some("Temperature"));
        assert_eq!(options.mapping.as_ref().map(Vec::len), Some(2));
        assert!(options.allow_nil && options.autosave);
        assert!(matches!(options.constructor, Constructor::Named(ref n) if n == "parse"));
        assert!(matches!(options.converter, Some(Converter::Named(ref n)) if n == "from_text"));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = AggregationOptions::<Temperature>::from_table(json!({"dependent": "destroy"}))
            .unwrap_err();
        match err {
            AggregateError::Configuration(message) => assert!(message.contains("dependent")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_builder_appends_pairs_in_order() {
        let options = AggregationOptions::<Temperature>::new()
            .map("address_street", "street")
            .map("address_city", "city");
        let mapping = options.mapping.unwrap();
        assert_eq!(mapping[0].0, "address_street");
        assert_eq!(mapping[1].1, "city");
    }
}
