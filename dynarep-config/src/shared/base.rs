use thiserror::Error;

/// Errors returned when a loaded configuration is semantically invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("`{0}` must not be empty")]
    EmptyField(String),

    #[error("invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },

    #[error("`global_tables.create_stack` requires replication version {required}, got {actual}")]
    CreateStackUnsupported {
        required: &'static str,
        actual: &'static str,
    },
}
