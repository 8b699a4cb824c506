use thiserror::Error;

use crate::Datatype;

/// Errors raised while validating identifiers, datatypes, formats and values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("Invalid identifier '{0}': must match [a-z0-9][a-z0-9-]*")]
    InvalidIdentifier(String),
    #[error("Invalid datatype '{0}'")]
    InvalidDatatype(String),
    #[error("A format is required for datatype {0}")]
    MissingFormat(Datatype),
    #[error("Invalid format '{format}' for datatype {datatype}")]
    InvalidFormat { datatype: Datatype, format: String },
    #[error("Ranges must be bounded on both ends")]
    AmbiguousRange,
    #[error("Only inclusive ranges are supported for float formats")]
    ExclusiveRange,
    #[error("Value of datatype {found} cannot be assigned to a {expected} property")]
    ValueTypeMismatch { expected: Datatype, found: Datatype },
    #[error("Invalid root topic '{0}'")]
    InvalidRootTopic(String),
    #[error("Invalid ISO 8601 duration '{0}'")]
    InvalidDuration(String),
}
