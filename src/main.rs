use anyhow::{Context, Result, bail};
use clap::Parser;
use memodb_aggregations::prelude::*;
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

value_object! {
    #[derive(Debug, Clone, PartialEq, Serialize)]
    validated pub struct Address {
        pub street: Option<String>,
        pub city: Option<String>,
        pub state: Option<String>,
        pub zip: Option<String>,
    }
}

impl Validate for Address {
    fn validate(&self, _context: Option<&str>, errors: &mut ValidationErrors) {
        presence_of(self, &["street", "city", "state", "zip"], errors);
    }
}

/// Walks a person record through reading, reassigning and clearing its
/// composed address, printing the record state after every step.
#[derive(Parser, Debug)]
#[command(name = "memodb-aggregations", version)]
struct Cli {
    #[arg(long, default_value = "123 Sesame St")]
    street: String,

    #[arg(long, default_value = "Atlanta")]
    city: String,

    #[arg(long, default_value = "GA")]
    state: String,

    #[arg(long, default_value = "30092")]
    zip: String,

    /// New address as "street,city,state,zip"; empty parts stay blank
    #[arg(long)]
    move_to: Option<String>,

    /// Clear the address after the other steps
    #[arg(long)]
    clear: bool,

    /// Save the person whenever a valid address is assigned
    #[arg(long)]
    autosave: bool,
}

fn people() -> std::sync::Arc<Model> {
    Model::new(Schema::new(
        "people",
        vec![
            Column::new("name", DataType::Text).not_null(),
            Column::new("address_street", DataType::Text),
            Column::new("address_city", DataType::Text),
            Column::new("address_state", DataType::Text),
            Column::new("address_zip", DataType::Text),
        ],
    ))
}

fn parse_address(input: &str) -> Result<Assignment<Address>> {
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        bail!("expected street,city,state,zip, got {} parts", parts.len());
    }
    let fields = ["street", "city", "state", "zip"];
    Ok(Assignment::map(fields.iter().zip(parts).map(|(field, part)| {
        let value = if part.is_empty() {
            Value::Null
        } else {
            Value::from(part)
        };
        (*field, value)
    })))
}

fn report(step: &str, person: &MemoryRecord) -> Result<()> {
    let address = person.composed::<Address>("address")?;
    let state = json!({
        "step": step,
        "id": person.id(),
        "address": address.as_deref().map(Composed::value),
        "valid": address.as_ref().map(|a| a.is_valid()),
        "errors": address.as_ref().map(|a| a.errors().full_messages()),
        "saves": person.model().store().save_count(),
    });
    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let model = people();
    model
        .composed_of::<Address>(
            "address",
            AggregationOptions::new()
                .map("address_street", "street")
                .map("address_city", "city")
                .map("address_state", "state")
                .map("address_zip", "zip")
                .allow_nil(true)
                .autosave(cli.autosave),
        )
        .context("declaring address")?;

    let mut person = model.create([
        ("name", "Tobias"),
        ("address_street", cli.street.as_str()),
        ("address_city", cli.city.as_str()),
        ("address_state", cli.state.as_str()),
        ("address_zip", cli.zip.as_str()),
    ])?;
    report("created", &person)?;

    if let Some(target) = cli.move_to.as_deref() {
        person.assign_composed::<Address>("address", parse_address(target)?)?;
        report("moved", &person)?;
    }

    if cli.clear {
        person.assign_composed::<Address>("address", Assignment::Nil)?;
        report("cleared", &person)?;
    }

    let reflections = model.aggregations().reflect_on_all_aggregations();
    println!("{}", serde_json::to_string_pretty(&reflections)?);
    Ok(())
}
