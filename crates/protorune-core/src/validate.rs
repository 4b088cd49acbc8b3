//! Range checks for values assigned from wider types.
//!
//! The wire decoder never calls these: it truncates to the wire bit width.
//! The JSON decoder and [`DynamicMessage::set_int`](crate::DynamicMessage::set_int)
//! do, so an out-of-range value is rejected instead of wrapping.

use crate::error::{Error, Result};
use crate::schema::{Kind, ScalarKind};
use crate::value::Value;

fn fit<T: TryFrom<i128>>(field: &str, type_name: &str, value: i128) -> Result<T> {
    T::try_from(value).map_err(|_| {
        Error::validation(
            field,
            format!("{} is out of range for {}", value, type_name),
        )
    })
}

/// Converts an integer into the value of an integer or enum field
pub fn int_value(field: &str, kind: &Kind, value: i128) -> Result<Value> {
    let scalar = match kind {
        Kind::Enum(_) => return fit(field, "enum", value).map(Value::EnumNumber),
        Kind::Scalar(scalar) => *scalar,
        Kind::Message(ty) => {
            return Err(Error::validation(
                field,
                format!("{} is not an integer type", ty.full_name()),
            ))
        }
    };
    let name = scalar.as_str();
    match scalar {
        ScalarKind::Int32 | ScalarKind::Sint32 | ScalarKind::Sfixed32 => {
            fit(field, name, value).map(Value::I32)
        }
        ScalarKind::Int64 | ScalarKind::Sint64 | ScalarKind::Sfixed64 => {
            fit(field, name, value).map(Value::I64)
        }
        ScalarKind::Uint32 | ScalarKind::Fixed32 => fit(field, name, value).map(Value::U32),
        ScalarKind::Uint64 | ScalarKind::Fixed64 => fit(field, name, value).map(Value::U64),
        other => Err(Error::validation(
            field,
            format!("{} is not an integer type", other),
        )),
    }
}

/// Converts a double into the value of a `float` or `double` field
///
/// Finite values beyond the `float` range are rejected; infinities and NaN
/// pass through.
pub fn float_value(field: &str, kind: ScalarKind, value: f64) -> Result<Value> {
    match kind {
        ScalarKind::Double => Ok(Value::F64(value)),
        ScalarKind::Float => {
            let narrowed = value as f32;
            // Decimals that round to the largest float are in range
            if value.is_finite() && narrowed.is_infinite() {
                return Err(Error::validation(
                    field,
                    format!("{} is out of range for float", value),
                ));
            }
            Ok(Value::F32(narrowed))
        }
        other => Err(Error::validation(
            field,
            format!("{} is not a floating-point type", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_ranges() {
        let int32 = Kind::Scalar(ScalarKind::Int32);
        assert_eq!(int_value("f", &int32, -2_147_483_648).unwrap(), Value::I32(i32::MIN));
        assert!(int_value("f", &int32, 2_147_483_648).is_err());

        let uint64 = Kind::Scalar(ScalarKind::Fixed64);
        assert_eq!(
            int_value("f", &uint64, 18_446_744_073_709_551_615).unwrap(),
            Value::U64(u64::MAX)
        );
        assert!(int_value("f", &uint64, -1).is_err());

        let sint64 = Kind::Scalar(ScalarKind::Sint64);
        assert!(int_value("f", &sint64, i64::MAX as i128 + 1).is_err());

        assert!(int_value("f", &Kind::Scalar(ScalarKind::String), 1).is_err());
    }

    #[test]
    fn test_float_range() {
        assert_eq!(float_value("f", ScalarKind::Float, 1.5).unwrap(), Value::F32(1.5));
        assert!(float_value("f", ScalarKind::Float, 3.5e38).is_err());
        assert_eq!(
            float_value("f", ScalarKind::Float, 3.4028235e38).unwrap(),
            Value::F32(f32::MAX)
        );
        assert_eq!(
            float_value("f", ScalarKind::Float, -3.4028235e38).unwrap(),
            Value::F32(f32::MIN)
        );
        assert!(float_value("f", ScalarKind::Float, f64::INFINITY).is_ok());
        assert_eq!(float_value("f", ScalarKind::Double, 3.5e38).unwrap(), Value::F64(3.5e38));
    }
}
