//! `google.protobuf.Timestamp`.

use super::{expect_type, WellKnownAdapter, WellKnownType};
use crate::error::{Error, Result};
use crate::message::DynamicMessage;
use crate::schema::SchemaPool;
use chrono::{DateTime, SecondsFormat, Utc};

/// `0001-01-01T00:00:00Z`
pub const MIN_TIMESTAMP_SECONDS: i64 = -62_135_596_800;

/// `9999-12-31T23:59:59Z`
pub const MAX_TIMESTAMP_SECONDS: i64 = 253_402_300_799;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

fn check_range(seconds: i64, nanos: i64) -> Result<()> {
    if !(MIN_TIMESTAMP_SECONDS..=MAX_TIMESTAMP_SECONDS).contains(&seconds) {
        return Err(Error::validation(
            "google.protobuf.Timestamp",
            format!("seconds {} out of range", seconds),
        ));
    }
    if !(0..i64::from(NANOS_PER_SECOND)).contains(&nanos) {
        return Err(Error::validation(
            "google.protobuf.Timestamp",
            format!("nanos {} out of range", nanos),
        ));
    }
    Ok(())
}

/// Converts (seconds, nanos) since the Unix epoch into a UTC instant
pub fn to_datetime(seconds: i64, nanos: i32) -> Result<DateTime<Utc>> {
    check_range(seconds, i64::from(nanos))?;
    DateTime::from_timestamp(seconds, nanos as u32).ok_or_else(|| {
        Error::validation(
            "google.protobuf.Timestamp",
            format!("{}.{:09} is not representable", seconds, nanos),
        )
    })
}

/// Converts a UTC instant into (seconds, nanos) since the Unix epoch
pub fn from_datetime(instant: &DateTime<Utc>) -> Result<(i64, i32)> {
    // Leap seconds surface as nanos beyond one second
    let subsec = instant.timestamp_subsec_nanos();
    let seconds = instant.timestamp() + i64::from(subsec / NANOS_PER_SECOND);
    let nanos = subsec % NANOS_PER_SECOND;
    check_range(seconds, i64::from(nanos))?;
    Ok((seconds, nanos as i32))
}

/// Formats as RFC 3339 in UTC with 0, 3, 6 or 9 fractional digits
pub fn format_rfc3339(seconds: i64, nanos: i32) -> Result<String> {
    Ok(to_datetime(seconds, nanos)?.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Parses an RFC 3339 string with an upper-case `T` and `Z` or a numeric offset
pub fn parse_rfc3339(text: &str) -> Result<(i64, i32)> {
    if text.contains(['t', 'z']) {
        return Err(Error::validation(
            "google.protobuf.Timestamp",
            format!("'{}' must use upper-case 'T' and 'Z'", text),
        ));
    }
    let parsed = DateTime::parse_from_rfc3339(text).map_err(|e| {
        Error::validation(
            "google.protobuf.Timestamp",
            format!("'{}' is not an RFC 3339 timestamp: {}", text, e),
        )
    })?;
    from_datetime(&parsed.with_timezone(&Utc))
}

/// Adapter between `google.protobuf.Timestamp` and a UTC instant
#[derive(Debug, Clone, Copy)]
pub struct TimestampType;

impl WellKnownAdapter for TimestampType {
    type Native = DateTime<Utc>;
    const TYPE: WellKnownType = WellKnownType::Timestamp;

    fn from_native(pool: &SchemaPool, native: &DateTime<Utc>) -> Result<DynamicMessage> {
        let (seconds, nanos) = from_datetime(native)?;
        let mut message = Self::message_type(pool)?.new_message();
        message.set("seconds", seconds)?;
        message.set("nanos", nanos)?;
        Ok(message)
    }

    fn to_native(message: &DynamicMessage) -> Result<DateTime<Utc>> {
        expect_type(message, Self::TYPE)?;
        to_datetime(
            message.get("seconds")?.as_i64().unwrap_or_default(),
            message.get("nanos")?.as_i32().unwrap_or_default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_trims_fraction() {
        assert_eq!(format_rfc3339(0, 0).unwrap(), "1970-01-01T00:00:00Z");
        assert_eq!(format_rfc3339(0, 10_000_000).unwrap(), "1970-01-01T00:00:00.010Z");
        assert_eq!(format_rfc3339(0, 10_000).unwrap(), "1970-01-01T00:00:00.000010Z");
        assert_eq!(format_rfc3339(0, 1).unwrap(), "1970-01-01T00:00:00.000000001Z");
        assert_eq!(
            format_rfc3339(MIN_TIMESTAMP_SECONDS, 0).unwrap(),
            "0001-01-01T00:00:00Z"
        );
        assert_eq!(
            format_rfc3339(MAX_TIMESTAMP_SECONDS, 999_999_999).unwrap(),
            "9999-12-31T23:59:59.999999999Z"
        );
    }

    #[test]
    fn test_range() {
        assert!(format_rfc3339(MIN_TIMESTAMP_SECONDS - 1, 0).is_err());
        assert!(format_rfc3339(MAX_TIMESTAMP_SECONDS + 1, 0).is_err());
        assert!(format_rfc3339(0, -1).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!(parse_rfc3339("1970-01-01T00:00:00Z").unwrap(), (0, 0));
        assert_eq!(parse_rfc3339("1970-01-01T00:00:01.5Z").unwrap(), (1, 500_000_000));
        assert_eq!(parse_rfc3339("1970-01-01T08:00:00+08:00").unwrap(), (0, 0));
        assert!(parse_rfc3339("1970-01-01t00:00:00Z").is_err());
        assert!(parse_rfc3339("1970-01-01T00:00:00z").is_err());
        assert!(parse_rfc3339("1970-01-01 00:00:00").is_err());
        assert!(parse_rfc3339("10000-01-01T00:00:00Z").is_err());
    }

    #[test]
    fn test_adapter() {
        let pool = SchemaPool::well_known().unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap();
        let message = TimestampType::from_native(&pool, &instant).unwrap();
        assert_eq!(
            *message.get("seconds").unwrap(),
            crate::value::Value::I64(instant.timestamp())
        );
        assert_eq!(TimestampType::to_native(&message).unwrap(), instant);
    }
}
