use thiserror::Error;

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Undefined attribute '{attribute}' for {type_name}")]
    MissingAttribute {
        attribute: String,
        type_name: String,
    },

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Aggregation '{0}' is not declared")]
    UnknownAggregation(String),

    #[error("Value construction failed: {0}")]
    Construction(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Lock error: {0}")]
    LockError(String),
}

impl AggregateError {
    pub fn missing_attribute(attribute: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute: attribute.into(),
            type_name: type_name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, AggregateError>;

impl From<serde_json::Error> for AggregateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for AggregateError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}
