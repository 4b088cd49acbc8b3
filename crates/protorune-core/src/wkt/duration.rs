//! `google.protobuf.Duration`.

use super::{expect_type, WellKnownAdapter, WellKnownType};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::SchemaPool;
use chrono::TimeDelta;
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Largest magnitude of `seconds`, roughly 10,000 years
pub const MAX_DURATION_SECONDS: i64 = 315_576_000_000;

const NANOS_PER_SECOND: i64 = 1_000_000_000;

static DURATION_PATTERN: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

/// A signed span of time as (seconds, nanos)
///
/// Both components carry the sign: `-1.5s` is `(-1, -500_000_000)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DurationValue {
    /// Whole seconds
    pub seconds: i64,
    /// Fraction of a second in nanoseconds, same sign as `seconds`
    pub nanos: i32,
}

impl DurationValue {
    /// Creates a validated duration
    pub fn new(seconds: i64, nanos: i32) -> Result<Self> {
        let duration = Self { seconds, nanos };
        duration.validate()?;
        Ok(duration)
    }

    /// Checks the range and sign rules
    pub fn validate(&self) -> Result<()> {
        if self.seconds.unsigned_abs() > MAX_DURATION_SECONDS as u64 {
            return Err(Error::validation(
                "google.protobuf.Duration",
                format!("seconds {} out of range", self.seconds),
            ));
        }
        if i64::from(self.nanos).abs() >= NANOS_PER_SECOND {
            return Err(Error::validation(
                "google.protobuf.Duration",
                format!("nanos {} out of range", self.nanos),
            ));
        }
        if (self.seconds > 0 && self.nanos < 0) || (self.seconds < 0 && self.nanos > 0) {
            return Err(Error::validation(
                "google.protobuf.Duration",
                "seconds and nanos have different signs",
            ));
        }
        Ok(())
    }

    /// Converts from a chrono span
    pub fn from_chrono(delta: TimeDelta) -> Result<Self> {
        Self::new(delta.num_seconds(), delta.subsec_nanos())
    }

    /// Converts to a chrono span
    pub fn to_chrono(&self) -> Option<TimeDelta> {
        TimeDelta::try_seconds(self.seconds)?
            .checked_add(&TimeDelta::nanoseconds(i64::from(self.nanos)))
    }
}

impl fmt::Display for DurationValue {
    /// Formats as `"{seconds}.{fraction}s"`, the fraction padded to 3, 6 or 9 digits
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.seconds < 0 || self.nanos < 0 {
            "-"
        } else {
            ""
        };
        let seconds = self.seconds.unsigned_abs();
        let nanos = self.nanos.unsigned_abs();
        if nanos == 0 {
            return write!(f, "{}{}s", sign, seconds);
        }
        let fraction = format!("{:09}", nanos);
        let digits = if nanos % 1_000_000 == 0 {
            3
        } else if nanos % 1_000 == 0 {
            6
        } else {
            9
        };
        write!(f, "{}{}.{}s", sign, seconds, &fraction[..digits])
    }
}

impl FromStr for DurationValue {
    type Err = Error;

    /// Parses `-?\d+(\.\d+)?s`; a leading `-` makes both components negative
    fn from_str(s: &str) -> Result<Self> {
        let compiled = DURATION_PATTERN.get_or_init(|| Regex::new(r"^(-)?(\d+)(?:\.(\d+))?s$"));
        let pattern = match compiled {
            Ok(pattern) => pattern,
            Err(e) => return Err(Error::validation("google.protobuf.Duration", e.to_string())),
        };
        let captures = pattern.captures(s).ok_or_else(|| {
            Error::validation(
                "google.protobuf.Duration",
                format!("'{}' is not a duration string", s),
            )
        })?;

        let negative = captures.get(1).is_some();
        let seconds: i64 = captures[2].parse().map_err(|_| {
            Error::validation(
                "google.protobuf.Duration",
                format!("seconds out of range in '{}'", s),
            )
        })?;
        let nanos = match captures.get(3) {
            Some(fraction) => {
                // Right-pad to nanosecond precision; extra digits are dropped
                let digits: String = fraction
                    .as_str()
                    .chars()
                    .chain(std::iter::repeat('0'))
                    .take(9)
                    .collect();
                digits.parse::<i32>().map_err(|_| {
                    Error::validation("google.protobuf.Duration", "invalid fraction")
                })?
            }
            None => 0,
        };

        let duration = if negative {
            Self {
                seconds: -seconds,
                nanos: -nanos,
            }
        } else {
            Self { seconds, nanos }
        };
        duration.validate()?;
        Ok(duration)
    }
}

/// Adapter between `google.protobuf.Duration` and [`DurationValue`]
#[derive(Debug, Clone, Copy)]
pub struct DurationType;

impl WellKnownAdapter for DurationType {
    type Native = DurationValue;
    const TYPE: WellKnownType = WellKnownType::Duration;

    fn from_native(pool: &SchemaPool, native: &DurationValue) -> Result<DynamicMessage> {
        native.validate()?;
        let mut message = Self::message_type(pool)?.new_message();
        message.set("seconds", native.seconds)?;
        message.set("nanos", native.nanos)?;
        Ok(message)
    }

    /// Reads the components as stored; call [`DurationValue::validate`] to check them
    fn to_native(message: &DynamicMessage) -> Result<DurationValue> {
        expect_type(message, Self::TYPE)?;
        Ok(DurationValue {
            seconds: message.get("seconds")?.as_i64().unwrap_or_default(),
            nanos: message.get("nanos")?.as_i32().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let cases = [
            ((0, 0), "0s"),
            ((1, 0), "1s"),
            ((1, 10_000_000), "1.010s"),
            ((1, 10_000), "1.000010s"),
            ((1, 10), "1.000000010s"),
            ((-1, -500_000_000), "-1.500s"),
            ((0, -500_000_000), "-0.500s"),
        ];
        for ((seconds, nanos), expected) in cases {
            assert_eq!(DurationValue { seconds, nanos }.to_string(), expected);
        }
    }

    #[test]
    fn test_parse() {
        let parse = |s: &str| s.parse::<DurationValue>();
        assert_eq!(parse("1.5s").unwrap(), DurationValue { seconds: 1, nanos: 500_000_000 });
        assert_eq!(parse("-0.5s").unwrap(), DurationValue { seconds: 0, nanos: -500_000_000 });
        assert_eq!(parse("3s").unwrap(), DurationValue { seconds: 3, nanos: 0 });
        assert_eq!(parse("0.0000000019s").unwrap(), DurationValue { seconds: 0, nanos: 1 });
        assert!("1.5".parse::<DurationValue>().is_err());
        assert!("+1s".parse::<DurationValue>().is_err());
        assert!("1.s".parse::<DurationValue>().is_err());
        assert!(" 1s".parse::<DurationValue>().is_err());
        assert!("315576000001s".parse::<DurationValue>().is_err());
    }

    #[test]
    fn test_extreme_round_trip() {
        let text = "-315576000000.999999999s";
        let duration: DurationValue = text.parse().unwrap();
        assert_eq!(duration, DurationValue { seconds: -315_576_000_000, nanos: -999_999_999 });
        assert_eq!(duration.to_string(), text);
    }

    #[test]
    fn test_validate() {
        assert!(DurationValue::new(1, -1).is_err());
        assert!(DurationValue::new(0, 1_000_000_000).is_err());
        assert!(DurationValue::new(-1, -999_999_999).is_ok());
    }

    #[test]
    fn test_chrono() {
        let delta = TimeDelta::milliseconds(-1500);
        let duration = DurationValue::from_chrono(delta).unwrap();
        assert_eq!(duration, DurationValue { seconds: -1, nanos: -500_000_000 });
        assert_eq!(duration.to_chrono(), Some(delta));
    }

    #[test]
    fn test_adapter() {
        let pool = SchemaPool::well_known().unwrap();
        let native = DurationValue::new(5, 250_000_000).unwrap();
        let message = DurationType::from_native(&pool, &native).unwrap();
        assert_eq!(message.encode_to_vec(), vec![0x08, 0x05, 0x10, 0x80, 0xE5, 0x9A, 0x77]);
        assert_eq!(DurationType::to_native(&message).unwrap(), native);
    }
}
