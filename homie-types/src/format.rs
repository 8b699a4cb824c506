use std::{
    fmt,
    ops::{Bound, Range, RangeFrom, RangeInclusive, RangeTo, RangeToInclusive},
};

use serde::{Deserialize, Serialize};

use crate::{Datatype, ValueError};

/// Color space declared by the format of a color property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorModel {
    Rgb,
    Hsv,
}

impl ColorModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorModel::Rgb => "rgb",
            ColorModel::Hsv => "hsv",
        }
    }
}

/// A format as supplied by the caller, before datatype specific normalization.
///
/// Usually created through one of the `From` implementations, e.g. `0..=100`, `"rgb"`
/// or `["low", "high"]`.
#[derive(Clone, Debug, PartialEq)]
pub enum FormatSpec {
    Text(String),
    Labels(Vec<String>),
    Integer { start: Bound<i64>, end: Bound<i64> },
    Float { start: Bound<f64>, end: Bound<f64> },
}

impl From<&str> for FormatSpec {
    fn from(value: &str) -> Self {
        FormatSpec::Text(value.to_string())
    }
}

impl From<String> for FormatSpec {
    fn from(value: String) -> Self {
        FormatSpec::Text(value)
    }
}

impl From<ColorModel> for FormatSpec {
    fn from(value: ColorModel) -> Self {
        FormatSpec::Text(value.as_str().to_string())
    }
}

impl From<Vec<String>> for FormatSpec {
    fn from(value: Vec<String>) -> Self {
        FormatSpec::Labels(value)
    }
}

impl From<Vec<&str>> for FormatSpec {
    fn from(value: Vec<&str>) -> Self {
        FormatSpec::Labels(value.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for FormatSpec {
    fn from(value: &[&str]) -> Self {
        FormatSpec::Labels(value.iter().map(|x| x.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for FormatSpec {
    fn from(value: [&str; N]) -> Self {
        FormatSpec::Labels(value.iter().map(|x| x.to_string()).collect())
    }
}

macro_rules! impl_range_format_spec {
    ($variant:ident, $ty:ty) => {
        impl From<RangeInclusive<$ty>> for FormatSpec {
            fn from(value: RangeInclusive<$ty>) -> Self {
                let (start, end) = value.into_inner();
                FormatSpec::$variant {
                    start: Bound::Included(start),
                    end: Bound::Included(end),
                }
            }
        }

        impl From<Range<$ty>> for FormatSpec {
            fn from(value: Range<$ty>) -> Self {
                FormatSpec::$variant {
                    start: Bound::Included(value.start),
                    end: Bound::Excluded(value.end),
                }
            }
        }

        impl From<RangeFrom<$ty>> for FormatSpec {
            fn from(value: RangeFrom<$ty>) -> Self {
                FormatSpec::$variant {
                    start: Bound::Included(value.start),
                    end: Bound::Unbounded,
                }
            }
        }

        impl From<RangeTo<$ty>> for FormatSpec {
            fn from(value: RangeTo<$ty>) -> Self {
                FormatSpec::$variant {
                    start: Bound::Unbounded,
                    end: Bound::Excluded(value.end),
                }
            }
        }

        impl From<RangeToInclusive<$ty>> for FormatSpec {
            fn from(value: RangeToInclusive<$ty>) -> Self {
                FormatSpec::$variant {
                    start: Bound::Unbounded,
                    end: Bound::Included(value.end),
                }
            }
        }
    };
}

impl_range_format_spec!(Integer, i64);
impl_range_format_spec!(Float, f64);

/// A normalized, validated format.
#[derive(Clone, Debug, PartialEq)]
pub enum Format {
    Text(String),
    Labels(Vec<String>),
    IntegerRange { min: i64, max: i64 },
    FloatRange { min: f64, max: f64 },
    Color(ColorModel),
}

impl Format {
    /// Validate and normalize `spec` for a property of `datatype`.
    ///
    /// Enums and colors require a format, the other datatypes accept `None`.
    pub fn normalize(datatype: Datatype, spec: Option<FormatSpec>) -> Result<Option<Format>, ValueError> {
        let spec = match spec {
            Some(spec) => spec,
            None => {
                return match datatype {
                    Datatype::Enum | Datatype::Color => Err(ValueError::MissingFormat(datatype)),
                    _ => Ok(None),
                }
            }
        };

        let format = match datatype {
            Datatype::Enum => normalize_labels(spec)?,
            Datatype::Color => match spec {
                FormatSpec::Text(text) if text == "rgb" => Format::Color(ColorModel::Rgb),
                FormatSpec::Text(text) if text == "hsv" => Format::Color(ColorModel::Hsv),
                other => return Err(invalid_format(datatype, &other)),
            },
            Datatype::Integer => normalize_integer_range(spec)?,
            Datatype::Float => normalize_float_range(spec)?,
            Datatype::String | Datatype::Boolean | Datatype::DateTime | Datatype::Duration => {
                match spec {
                    FormatSpec::Text(text) => Format::Text(text),
                    other => return Err(invalid_format(datatype, &other)),
                }
            }
        };
        Ok(Some(format))
    }

    /// The enum labels, if this is a label format.
    pub fn labels(&self) -> Option<&[String]> {
        match self {
            Format::Labels(labels) => Some(labels),
            _ => None,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Text(text) => f.write_str(text),
            Format::Labels(labels) => f.write_str(&labels.join(",")),
            Format::IntegerRange { min, max } => write!(f, "{min}:{max}"),
            Format::FloatRange { min, max } => write!(f, "{min}:{max}"),
            Format::Color(model) => f.write_str(model.as_str()),
        }
    }
}

fn spec_text(spec: &FormatSpec) -> String {
    match spec {
        FormatSpec::Text(text) => text.clone(),
        FormatSpec::Labels(labels) => labels.join(","),
        FormatSpec::Integer { start, end } => format!("{start:?}..{end:?}"),
        FormatSpec::Float { start, end } => format!("{start:?}..{end:?}"),
    }
}

fn invalid_format(datatype: Datatype, spec: &FormatSpec) -> ValueError {
    ValueError::InvalidFormat {
        datatype,
        format: spec_text(spec),
    }
}

fn normalize_labels(spec: FormatSpec) -> Result<Format, ValueError> {
    let labels: Vec<String> = match &spec {
        FormatSpec::Text(text) => text.split(',').map(String::from).collect(),
        FormatSpec::Labels(labels) => labels.clone(),
        _ => return Err(invalid_format(Datatype::Enum, &spec)),
    };
    if labels.is_empty() || labels.iter().any(|x| x.is_empty() || x.contains(',')) {
        return Err(invalid_format(Datatype::Enum, &spec));
    }
    Ok(Format::Labels(labels))
}

/// Split `a:b`, reporting a missing side as an ambiguous range
fn split_range_text(text: &str) -> Result<Option<(&str, &str)>, ValueError> {
    let (start, end) = match text.split_once(':') {
        Some(parts) => parts,
        None => return Ok(None),
    };
    if start.is_empty() || end.is_empty() {
        return Err(ValueError::AmbiguousRange);
    }
    Ok(Some((start, end)))
}

fn normalize_integer_range(spec: FormatSpec) -> Result<Format, ValueError> {
    let (min, max) = match &spec {
        FormatSpec::Text(text) => {
            let parsed = split_range_text(text)?
                .and_then(|(start, end)| Some((start.parse::<i64>().ok()?, end.parse::<i64>().ok()?)));
            match parsed {
                Some(range) => range,
                None => return Err(invalid_format(Datatype::Integer, &spec)),
            }
        }
        FormatSpec::Integer { start, end } => {
            let min = match start {
                Bound::Included(x) => *x,
                Bound::Excluded(x) => x
                    .checked_add(1)
                    .ok_or_else(|| invalid_format(Datatype::Integer, &spec))?,
                Bound::Unbounded => return Err(ValueError::AmbiguousRange),
            };
            let max = match end {
                Bound::Included(x) => *x,
                Bound::Excluded(x) => x
                    .checked_sub(1)
                    .ok_or_else(|| invalid_format(Datatype::Integer, &spec))?,
                Bound::Unbounded => return Err(ValueError::AmbiguousRange),
            };
            (min, max)
        }
        _ => return Err(invalid_format(Datatype::Integer, &spec)),
    };
    if min > max {
        return Err(invalid_format(Datatype::Integer, &spec));
    }
    Ok(Format::IntegerRange { min, max })
}

fn inclusive_float_bound(bound: Bound<f64>) -> Result<f64, ValueError> {
    match bound {
        Bound::Included(x) => Ok(x),
        Bound::Excluded(_) => Err(ValueError::ExclusiveRange),
        Bound::Unbounded => Err(ValueError::AmbiguousRange),
    }
}

fn normalize_float_range(spec: FormatSpec) -> Result<Format, ValueError> {
    let (min, max) = match &spec {
        FormatSpec::Text(text) => {
            let parsed = split_range_text(text)?
                .and_then(|(start, end)| Some((start.parse::<f64>().ok()?, end.parse::<f64>().ok()?)));
            match parsed {
                Some(range) => range,
                None => return Err(invalid_format(Datatype::Float, &spec)),
            }
        }
        FormatSpec::Float { start, end } => (
            inclusive_float_bound(*start)?,
            inclusive_float_bound(*end)?,
        ),
        FormatSpec::Integer { start, end } => (
            inclusive_float_bound(start.map(|x| x as f64))?,
            inclusive_float_bound(end.map(|x| x as f64))?,
        ),
        FormatSpec::Labels(_) => return Err(invalid_format(Datatype::Float, &spec)),
    };
    if !min.is_finite() || !max.is_finite() || min > max {
        return Err(invalid_format(Datatype::Float, &spec));
    }
    Ok(Format::FloatRange { min, max })
}
