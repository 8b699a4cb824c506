use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::{ColorModel, Datatype, Format, IsoDuration, ValueError};

/// A color as three components, interpreted according to the property's [ColorModel].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub u16, pub u16, pub u16);

impl Color {
    /// Check the components against the limits of `model`.
    ///
    /// rgb: every component at most 255. hsv: hue at most 360, saturation and value at most 100.
    pub fn fits(&self, model: ColorModel) -> bool {
        match model {
            ColorModel::Rgb => self.0 <= 255 && self.1 <= 255 && self.2 <= 255,
            ColorModel::Hsv => self.0 <= 360 && self.1 <= 100 && self.2 <= 100,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0, self.1, self.2)
    }
}

/// A property value, one variant per [Datatype].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Enum(String),
    Color(Color),
    DateTime(DateTime<FixedOffset>),
    Duration(IsoDuration),
}

impl Value {
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::String(_) => Datatype::String,
            Value::Integer(_) => Datatype::Integer,
            Value::Float(_) => Datatype::Float,
            Value::Boolean(_) => Datatype::Boolean,
            Value::Enum(_) => Datatype::Enum,
            Value::Color(_) => Datatype::Color,
            Value::DateTime(_) => Datatype::DateTime,
            Value::Duration(_) => Datatype::Duration,
        }
    }

    /// Convert the value so it can be held by a property of `datatype`.
    ///
    /// Strings become enum labels and integers become floats, anything else must already
    /// have the requested datatype.
    pub fn coerce(self, datatype: Datatype) -> Result<Value, ValueError> {
        let value = match (self, datatype) {
            (Value::String(label), Datatype::Enum) => Value::Enum(label),
            (Value::Integer(x), Datatype::Float) => Value::Float(x as f64),
            (value, datatype) if value.datatype() == datatype => value,
            (value, datatype) => {
                return Err(ValueError::ValueTypeMismatch {
                    expected: datatype,
                    found: value.datatype(),
                })
            }
        };
        Ok(value)
    }

    /// Validate an untrusted payload and cast it to a value of `datatype`.
    ///
    /// Syntax is checked first, then the semantic constraints declared by `format`.
    /// Returns `None` if either check rejects the payload.
    pub fn parse(datatype: Datatype, format: Option<&Format>, raw: &str) -> Option<Value> {
        match datatype {
            Datatype::String => Some(Value::String(raw.to_string())),
            Datatype::Boolean => match raw {
                "true" => Some(Value::Boolean(true)),
                "false" => Some(Value::Boolean(false)),
                _ => None,
            },
            Datatype::Integer => {
                if !is_integer_syntax(raw) {
                    return None;
                }
                let value = raw.parse::<i64>().ok()?;
                if let Some(Format::IntegerRange { min, max }) = format {
                    if !(*min..=*max).contains(&value) {
                        return None;
                    }
                }
                Some(Value::Integer(value))
            }
            Datatype::Float => {
                if !is_float_syntax(raw) {
                    return None;
                }
                let value = raw.parse::<f64>().ok()?;
                if let Some(Format::FloatRange { min, max }) = format {
                    if !(*min..=*max).contains(&value) {
                        return None;
                    }
                }
                Some(Value::Float(value))
            }
            Datatype::Enum => {
                let labels = format?.labels()?;
                if !labels.iter().any(|x| x == raw) {
                    return None;
                }
                Some(Value::Enum(raw.to_string()))
            }
            Datatype::Color => {
                let color = parse_color_syntax(raw)?;
                match format {
                    Some(Format::Color(model)) if !color.fits(*model) => None,
                    _ => Some(Value::Color(color)),
                }
            }
            Datatype::DateTime => parse_datetime(raw).map(Value::DateTime),
            Datatype::Duration => raw.parse::<IsoDuration>().ok().map(Value::Duration),
        }
    }
}

/// Serialized form published on the property's value topic
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(x) | Value::Enum(x) => f.write_str(x),
            Value::Integer(x) => write!(f, "{x}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Boolean(x) => write!(f, "{x}"),
            Value::Color(x) => write!(f, "{x}"),
            Value::DateTime(x) => f.write_str(&x.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Duration(x) => write!(f, "{x}"),
        }
    }
}

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// `-?\d+`
fn is_integer_syntax(raw: &str) -> bool {
    all_digits(raw.strip_prefix('-').unwrap_or(raw))
}

/// `-?(\d+|\d+\.|\.\d+|\d+\.\d+)([eE]-?\d+)?`
fn is_float_syntax(raw: &str) -> bool {
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let (mantissa, exponent) = match unsigned.find(|c: char| c == 'e' || c == 'E') {
        Some(i) => (&unsigned[..i], Some(&unsigned[i + 1..])),
        None => (unsigned, None),
    };
    let mantissa_ok = match mantissa.split_once('.') {
        Some(("", fraction)) => all_digits(fraction),
        Some((whole, "")) => all_digits(whole),
        Some((whole, fraction)) => all_digits(whole) && all_digits(fraction),
        None => all_digits(mantissa),
    };
    let exponent_ok = match exponent {
        Some(exponent) => is_integer_syntax(exponent),
        None => true,
    };
    mantissa_ok && exponent_ok
}

/// `\d{1,3},\d{1,3},\d{1,3}`, range limits are checked separately
fn parse_color_syntax(raw: &str) -> Option<Color> {
    let mut parts = raw.split(',');
    let mut component = || -> Option<u16> {
        let part = parts.next()?;
        if part.len() > 3 || !all_digits(part) {
            return None;
        }
        part.parse().ok()
    };
    let color = Color(component()?, component()?, component()?);
    if parts.next().is_some() {
        return None;
    }
    Some(color)
}

/// RFC 3339, or a date and time without offset which is read as UTC.
fn parse_datetime(raw: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return Some(datetime);
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, pattern) {
            return Some(Utc.from_utc_datetime(&naive).into());
        }
    }
    None
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Integer(value.into())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<Color> for Value {
    fn from(value: Color) -> Self {
        Value::Color(value)
    }
}

impl From<DateTime<FixedOffset>> for Value {
    fn from(value: DateTime<FixedOffset>) -> Self {
        Value::DateTime(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value.into())
    }
}

impl From<IsoDuration> for Value {
    fn from(value: IsoDuration) -> Self {
        Value::Duration(value)
    }
}

impl From<std::time::Duration> for Value {
    fn from(value: std::time::Duration) -> Self {
        Value::Duration(value.into())
    }
}
