use std::collections::HashMap;
use std::rc::Rc;

use lazy_static::lazy_static;
use memodb_aggregations::aggregations::{NamedConstructor, NamedConverter};
use memodb_aggregations::{
    AggregateError, AggregationCache, AggregationOptions, Aggregations, Assignment, Column,
    ComposedOf, DataType, Record, Result, Schema, Value, ValueObject, value_object,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
struct Money {
    cents: i64,
}

impl Money {
    fn from_dollars(values: Vec<Value>) -> Result<Self> {
        let dollars = values
            .first()
            .and_then(Value::as_f64)
            .ok_or_else(|| AggregateError::Construction("dollars must be numeric".into()))?;
        Ok(Self {
            cents: (dollars * 100.0).round() as i64,
        })
    }

    fn parse(value: Value) -> Result<Option<Self>> {
        match value {
            Value::Text(text) => {
                let dollars: f64 = text
                    .trim_start_matches('$')
                    .parse()
                    .map_err(|_| AggregateError::Construction(format!("not an amount: {text}")))?;
                Ok(Some(Self {
                    cents: (dollars * 100.0).round() as i64,
                }))
            }
            Value::Integer(dollars) => Ok(Some(Self {
                cents: dollars * 100,
            })),
            _ => Ok(None),
        }
    }
}

impl ValueObject for Money {
    const TYPE_NAME: &'static str = "Money";

    fn field_names() -> &'static [&'static str] {
        &["cents"]
    }

    fn field(&self, name: &str) -> Option<Value> {
        (name == "cents").then_some(Value::Integer(self.cents))
    }

    fn from_fields(values: Vec<Value>) -> Result<Self> {
        match values.as_slice() {
            [Value::Integer(cents)] => Ok(Self { cents: *cents }),
            other => Err(AggregateError::Construction(format!(
                "Money takes one integer, got {other:?}"
            ))),
        }
    }

    fn named_constructor(name: &str) -> Option<NamedConstructor<Self>> {
        match name {
            "from_dollars" => Some(Money::from_dollars as NamedConstructor<Self>),
            _ => None,
        }
    }

    fn named_converter(name: &str) -> Option<NamedConverter<Self>> {
        match name {
            "parse" => Some(Money::parse as NamedConverter<Self>),
            _ => None,
        }
    }
}

value_object! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct GpsLocation {
        pub gps_location: String,
    }
}

value_object! {
    #[derive(Debug, Clone, PartialEq)]
    pub struct Temperature {
        pub celsius: f64,
    }
}

const PERSON_COLUMNS: &[&str] = &["name", "balance", "gps_location", "reading"];

/// Hand-written record with a process-wide declaration table.
#[derive(Default)]
struct Person {
    columns: HashMap<String, Value>,
    saves: usize,
    fail_saves: bool,
    cache: AggregationCache,
}

impl Record for Person {
    fn read_column(&self, column: &str) -> Result<Value> {
        if !PERSON_COLUMNS.contains(&column) {
            return Err(AggregateError::ColumnNotFound(
                column.to_string(),
                "people".to_string(),
            ));
        }
        Ok(self.columns.get(column).cloned().unwrap_or_default())
    }

    fn write_column(&mut self, column: &str, value: Value) -> Result<()> {
        if !PERSON_COLUMNS.contains(&column) {
            return Err(AggregateError::ColumnNotFound(
                column.to_string(),
                "people".to_string(),
            ));
        }
        self.columns.insert(column.to_string(), value);
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        if self.fail_saves {
            return Err(AggregateError::Persistence("disk full".to_string()));
        }
        self.saves += 1;
        Ok(())
    }

    fn aggregation_cache(&self) -> &AggregationCache {
        &self.cache
    }
}

lazy_static! {
    static ref PERSON_AGGREGATIONS: Aggregations<Person> = {
        let aggregations = Aggregations::new();
        aggregations
            .declare_from_table::<Money>(
                "balance",
                json!({
                    "class_name": "Money",
                    "mapping": ["balance", "cents"],
                    "converter": "parse",
                    "allow_nil": true,
                    "autosave": true
                }),
            )
            .expect("balance declaration");
        aggregations
            .declare::<GpsLocation>("gps_location", AggregationOptions::new().allow_nil(true))
            .expect("gps_location declaration");
        aggregations
            .declare::<Temperature>(
                "temperature",
                AggregationOptions::new()
                    .map("reading", "celsius")
                    .constructor(|values| {
                        let tenths = values.first().and_then(Value::as_i64).unwrap_or_default();
                        Ok(Temperature::new(tenths as f64 / 10.0))
                    }),
            )
            .expect("temperature declaration");
        aggregations
    };
}

impl ComposedOf for Person {
    fn aggregations(&self) -> &Aggregations<Self> {
        &PERSON_AGGREGATIONS
    }
}

fn people_schema() -> Schema {
    Schema::new(
        "people",
        PERSON_COLUMNS
            .iter()
            .map(|name| Column::new(*name, DataType::Text))
            .collect(),
    )
}

#[test]
fn default_mapping_uses_the_property_name() {
    let mut person = Person::default();
    person
        .write_column("gps_location", Value::from("33.7490,-84.3880"))
        .unwrap();

    let location = person
        .composed::<GpsLocation>("gps_location")
        .unwrap()
        .unwrap();
    assert_eq!(location.gps_location, "33.7490,-84.3880");

    let reflection = PERSON_AGGREGATIONS
        .reflect_on_aggregation("gps_location")
        .unwrap();
    assert_eq!(reflection.class_name, "GpsLocation");
    assert_eq!(
        reflection.mapping,
        vec![("gps_location".to_string(), "gps_location".to_string())]
    );
}

#[test]
fn single_pair_mapping_and_named_converter() {
    let mut person = Person::default();

    person
        .assign_composed::<Money>("balance", Assignment::raw("$12.50"))
        .unwrap();
    assert_eq!(person.read_column("balance").unwrap(), Value::Integer(1250));

    let balance = person.composed::<Money>("balance").unwrap().unwrap();
    assert_eq!(balance.cents, 1250);
    assert!(balance.is_frozen());
    assert!(balance.is_valid());
}

#[test]
fn converter_errors_propagate() {
    let mut person = Person::default();
    let err = person
        .assign_composed::<Money>("balance", Assignment::raw("twelve"))
        .unwrap_err();
    assert!(matches!(err, AggregateError::Construction(_)));
    assert_eq!(person.saves, 0);
}

#[test]
fn autosave_persists_exactly_once_for_nil() {
    let mut person = Person::default();
    person
        .assign_composed::<Money>("balance", Assignment::Nil)
        .unwrap();
    assert_eq!(person.saves, 1);
    assert_eq!(person.read_column("balance").unwrap(), Value::Null);
}

#[test]
fn values_without_validation_always_autosave() {
    let mut person = Person::default();
    person
        .assign_composed::<Money>("balance", Money { cents: -5 })
        .unwrap();
    assert_eq!(person.saves, 1);
}

#[test]
fn autosave_failure_reaches_the_caller() {
    let mut person = Person {
        fail_saves: true,
        ..Person::default()
    };
    let err = person
        .assign_composed::<Money>("balance", Money { cents: 100 })
        .unwrap_err();
    assert!(matches!(err, AggregateError::Persistence(ref message) if message == "disk full"));
    assert_eq!(person.read_column("balance").unwrap(), Value::Integer(100));
}

#[test]
fn custom_constructor_receives_mapped_columns() {
    let mut person = Person::default();
    person.write_column("reading", Value::Integer(215)).unwrap();

    let temperature = person
        .composed::<Temperature>("temperature")
        .unwrap()
        .unwrap();
    assert!((temperature.celsius - 21.5).abs() < f64::EPSILON);

    let reflection = PERSON_AGGREGATIONS
        .reflect_on_aggregation("temperature")
        .unwrap();
    assert_eq!(reflection.constructor, "<fn>");
    assert!(!reflection.allow_nil);
}

#[test]
fn named_constructor_is_resolved_at_declaration() {
    let aggregations = Aggregations::<Person>::new();
    aggregations
        .declare::<Money>(
            "balance",
            AggregationOptions::new()
                .class_name("Money")
                .map("balance", "cents")
                .constructor_named("from_dollars"),
        )
        .unwrap();

    let mut person = Person::default();
    person.write_column("balance", Value::Float(3.25)).unwrap();
    let balance = aggregations
        .get::<Money>(&person, "balance")
        .unwrap()
        .unwrap();
    assert_eq!(balance.cents, 325);

    let err = aggregations
        .declare::<Money>(
            "balance",
            AggregationOptions::new()
                .class_name("Money")
                .map("balance", "cents")
                .constructor_named("from_euros"),
        )
        .unwrap_err();
    assert!(matches!(err, AggregateError::Configuration(ref m) if m.contains("from_euros")));
}

#[test]
fn unknown_option_keys_are_rejected() {
    let aggregations = Aggregations::<Person>::new();
    let err = aggregations
        .declare_from_table::<Money>(
            "balance",
            json!({"class_name": "Money", "mapping": ["balance", "cents"], "validate": true}),
        )
        .unwrap_err();
    assert!(matches!(err, AggregateError::Configuration(_)));
    assert!(!aggregations.is_declared("balance"));
}

#[test]
fn class_name_must_resolve_to_the_value_type() {
    let aggregations = Aggregations::<Person>::new();

    let err = aggregations
        .declare::<Money>("balance", AggregationOptions::new().map("balance", "cents"))
        .unwrap_err();
    assert!(matches!(err, AggregateError::Configuration(ref m) if m.contains("'Balance'")));

    let err = aggregations
        .declare::<Money>(
            "balance",
            AggregationOptions::new()
                .class_name("Currency")
                .map("balance", "cents"),
        )
        .unwrap_err();
    assert!(matches!(err, AggregateError::Configuration(_)));
}

#[test]
fn mapping_is_checked_against_schema_and_fields() {
    let aggregations = Aggregations::<Person>::with_schema(people_schema());

    let unknown_column = aggregations
        .declare::<Money>(
            "balance",
            AggregationOptions::new()
                .class_name("Money")
                .map("balance_cents", "cents"),
        )
        .unwrap_err();
    assert!(
        matches!(unknown_column, AggregateError::Configuration(ref m) if m.contains("balance_cents"))
    );

    let unknown_field = aggregations
        .declare::<Money>(
            "balance",
            AggregationOptions::new()
                .class_name("Money")
                .map("balance", "amount"),
        )
        .unwrap_err();
    assert!(matches!(unknown_field, AggregateError::Configuration(ref m) if m.contains("amount")));

    let empty = aggregations
        .declare::<Money>(
            "balance",
            AggregationOptions::new()
                .class_name("Money")
                .mapping(Vec::<(String, String)>::new()),
        )
        .unwrap_err();
    assert!(matches!(empty, AggregateError::Configuration(_)));

    let unnamed = aggregations
        .declare::<GpsLocation>("", AggregationOptions::new())
        .unwrap_err();
    assert!(matches!(unnamed, AggregateError::Configuration(_)));

    assert!(aggregations.reflect_on_all_aggregations().is_empty());
}

#[test]
fn accessing_undeclared_or_mistyped_properties_fails() {
    let person = Person::default();

    let err = person.composed::<Money>("address").unwrap_err();
    assert!(matches!(err, AggregateError::UnknownAggregation(ref name) if name == "address"));

    let err = person.composed::<GpsLocation>("balance").unwrap_err();
    assert!(matches!(err, AggregateError::TypeMismatch(ref m) if m.contains("Money")));
}

#[test]
fn reflections_are_listed_in_declaration_order() {
    let names: Vec<String> = PERSON_AGGREGATIONS
        .reflect_on_all_aggregations()
        .into_iter()
        .map(|reflection| reflection.name)
        .collect();
    assert_eq!(names, vec!["balance", "gps_location", "temperature"]);

    let balance = PERSON_AGGREGATIONS
        .reflect_on_aggregation("balance")
        .unwrap();
    let encoded = serde_json::to_value(&balance).unwrap();
    assert_eq!(encoded["converter"], json!("parse"));
    assert_eq!(encoded["mapping"], json!([["balance", "cents"]]));
    assert_eq!(encoded["autosave"], json!(true));
}

#[test]
fn cache_is_per_instance() {
    let mut first = Person::default();
    let mut second = Person::default();
    first
        .write_column("gps_location", Value::from("north"))
        .unwrap();
    second
        .write_column("gps_location", Value::from("south"))
        .unwrap();

    let a: Rc<_> = first
        .composed::<GpsLocation>("gps_location")
        .unwrap()
        .unwrap();
    let b: Rc<_> = second
        .composed::<GpsLocation>("gps_location")
        .unwrap()
        .unwrap();
    assert_eq!(a.gps_location, "north");
    assert_eq!(b.gps_location, "south");
    assert!(!Rc::ptr_eq(&a, &b));
}
