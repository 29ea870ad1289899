use std::fmt;

use serde::{Deserialize, Serialize};

use super::{AggregateError, Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Integer, Value::Integer(_)) => true,
            (Self::Float, Value::Float(_)) => true,
            (Self::Float, Value::Integer(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "INTEGER"),
            Self::Float => write!(f, "FLOAT"),
            Self::Text => write!(f, "TEXT"),
            Self::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Checks the value's type against the column. Nullability is checked
    /// separately at persist time, so a null may sit in a NOT NULL column
    /// between writes.
    pub fn check_type(&self, value: &Value) -> Result<()> {
        if !self.data_type.is_compatible(value) {
            return Err(AggregateError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }
        Ok(())
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(AggregateError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        self.check_type(value)
    }
}

/// Ordered column layout of a record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    table_name: String,
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(table_name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            table_name: table_name.into(),
            columns,
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.find_column_index(name).is_some()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_compatibility() {
        let int_type = DataType::Integer;
        assert!(int_type.is_compatible(&Value::Integer(42)));
        assert!(int_type.is_compatible(&Value::Null));
        assert!(!int_type.is_compatible(&Value::Text("hello".into())));
    }

    #[test]
    fn test_not_null_column_rejects_null_on_validate_only() {
        let column = Column::new("address_city", DataType::Text).not_null();
        assert!(column.check_type(&Value::Null).is_ok());
        assert!(matches!(
            column.validate(&Value::Null),
            Err(AggregateError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_schema_lookup() {
        let schema = Schema::new(
            "people",
            vec![
                Column::new("name", DataType::Text),
                Column::new("address_city", DataType::Text),
            ],
        );
        assert_eq!(schema.find_column_index("address_city"), Some(1));
        assert!(!schema.has_column("address_zip"));
        assert_eq!(schema.column_count(), 2);
    }
}
