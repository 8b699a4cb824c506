use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ValueError;

/// The datatypes a property can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Datatype {
    String,
    Integer,
    Float,
    Boolean,
    Enum,
    Color,
    DateTime,
    Duration,
}

impl Datatype {
    pub fn as_str(&self) -> &'static str {
        match self {
            Datatype::String => "string",
            Datatype::Integer => "integer",
            Datatype::Float => "float",
            Datatype::Boolean => "boolean",
            Datatype::Enum => "enum",
            Datatype::Color => "color",
            Datatype::DateTime => "datetime",
            Datatype::Duration => "duration",
        }
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datatype {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let datatype = match s {
            "string" => Datatype::String,
            "integer" => Datatype::Integer,
            "float" => Datatype::Float,
            "boolean" => Datatype::Boolean,
            "enum" => Datatype::Enum,
            "color" => Datatype::Color,
            "datetime" => Datatype::DateTime,
            "duration" => Datatype::Duration,
            other => return Err(ValueError::InvalidDatatype(other.to_string())),
        };
        Ok(datatype)
    }
}
