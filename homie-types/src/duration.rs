use std::{fmt, str::FromStr, time::Duration};

use crate::ValueError;

/// An ISO 8601 duration, `PnYnMnDTnHnMnS` or `PnW`.
///
/// Components are kept as given rather than normalized, since years and months have no
/// fixed length. Seconds carry millisecond precision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IsoDuration(iso8601::Duration);

impl IsoDuration {
    pub fn as_iso8601(&self) -> &iso8601::Duration {
        &self.0
    }
}

impl Default for IsoDuration {
    fn default() -> Self {
        Self(iso8601::Duration::Weeks(0))
    }
}

impl From<iso8601::Duration> for IsoDuration {
    fn from(value: iso8601::Duration) -> Self {
        Self(value)
    }
}

impl From<IsoDuration> for iso8601::Duration {
    fn from(value: IsoDuration) -> Self {
        value.0
    }
}

impl From<Duration> for IsoDuration {
    fn from(value: Duration) -> Self {
        let total = value.as_secs();
        Self(iso8601::Duration::YMDHMS {
            year: 0,
            month: 0,
            day: 0,
            hour: (total / 3600).min(u32::MAX as u64) as u32,
            minute: ((total % 3600) / 60) as u32,
            second: (total % 60) as u32,
            millisecond: value.subsec_millis(),
        })
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (year, month, day, hour, minute, second, millisecond) = match self.0 {
            iso8601::Duration::Weeks(0) => return f.write_str("PT0S"),
            iso8601::Duration::Weeks(weeks) => return write!(f, "P{weeks}W"),
            iso8601::Duration::YMDHMS {
                year,
                month,
                day,
                hour,
                minute,
                second,
                millisecond,
            } => (year, month, day, hour, minute, second, millisecond),
        };
        let has_time = hour != 0 || minute != 0 || second != 0 || millisecond != 0;
        if year == 0 && month == 0 && day == 0 && !has_time {
            return f.write_str("PT0S");
        }
        f.write_str("P")?;
        for (value, designator) in [(year, 'Y'), (month, 'M'), (day, 'D')] {
            if value != 0 {
                write!(f, "{value}{designator}")?;
            }
        }
        if !has_time {
            return Ok(());
        }
        f.write_str("T")?;
        if hour != 0 {
            write!(f, "{hour}H")?;
        }
        if minute != 0 {
            write!(f, "{minute}M")?;
        }
        if millisecond != 0 {
            let fraction = format!("{millisecond:03}");
            write!(f, "{second}.{}S", fraction.trim_end_matches('0'))?;
        } else if second != 0 {
            write!(f, "{second}S")?;
        }
        Ok(())
    }
}

impl FromStr for IsoDuration {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValueError::InvalidDuration(s.to_string());

        // A bare designator or a dangling `T` names no component
        let body = s.strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() || body.ends_with('T') {
            return Err(invalid());
        }
        match iso8601::parsers::parse_duration(s.as_bytes()) {
            Ok((rest, duration)) if rest.is_empty() => Ok(Self(duration)),
            _ => Err(invalid()),
        }
    }
}
