//! Conversions between primitive types, as written `int(x)`, `string(x)` and so on.
use crate::parser::ast::Primitive;
use crate::parser::types::TypeId;

use super::errors::RuntimeError;
use super::values::Value;


/// For each castable source type, the primitive types it may be cast to. Any type not listed
/// here, including `bool`, `string` and every composite type, cannot be cast at all.
const CASTS: [(TypeId, &[TypeId]); 3] = [
    (TypeId::INT, &[TypeId::INT, TypeId::FLOAT, TypeId::BOOL, TypeId::CHAR, TypeId::STRING]),
    (TypeId::FLOAT, &[TypeId::INT, TypeId::FLOAT, TypeId::BOOL, TypeId::STRING]),
    (TypeId::CHAR, &[TypeId::INT, TypeId::CHAR, TypeId::STRING]),
];


pub fn castable(from: TypeId, to: TypeId) -> bool {
    CASTS.iter().any(|(source, targets)| *source == from && targets.contains(&to))
}


/// Converts a primitive value to another primitive type.
///
/// Floats truncate towards zero when cast to `int`; numbers become `bool` by comparing with
/// zero; ints and chars convert through the Unicode code point.
///
/// # Errors
///
/// [`RuntimeError::InvalidCast`] when the particular value has no image in the target type,
/// such as a negative code point or an infinite float.
pub fn cast(value: Value, target: Primitive) -> Result<Value, RuntimeError> {
    let invalid = |value: &Value| RuntimeError::InvalidCast { value: value.to_string(), target: target_name(target) };

    match (value, target) {
        (Value::Int(n), Primitive::Int) => Ok(Value::Int(n)),
        (Value::Int(n), Primitive::Float) => Ok(Value::Float(n as f64)),
        (Value::Int(n), Primitive::Bool) => Ok(Value::Bool(n != 0)),
        (Value::Int(n), Primitive::Char) => u32::try_from(n).ok()
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or_else(|| invalid(&Value::Int(n))),
        (Value::Int(n), Primitive::String) => Ok(Value::Str(n.to_string())),

        (Value::Float(n), Primitive::Int) => {
            let truncated = n.trunc();
            // i64::MAX is not representable as f64, so the upper bound is exclusive
            if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                Ok(Value::Int(truncated as i64))
            } else {
                Err(invalid(&Value::Float(n)))
            }
        }
        (Value::Float(n), Primitive::Float) => Ok(Value::Float(n)),
        (Value::Float(n), Primitive::Bool) => Ok(Value::Bool(n != 0.0)),
        (Value::Float(n), Primitive::String) => Ok(Value::Str(Value::Float(n).to_string())),

        (Value::Char(c), Primitive::Int) => Ok(Value::Int(i64::from(u32::from(c)))),
        (Value::Char(c), Primitive::Char) => Ok(Value::Char(c)),
        (Value::Char(c), Primitive::String) => Ok(Value::Str(c.to_string())),

        (value, _) => Err(RuntimeError::UnsupportedOperation {
            operator: target_name(target),
            operands: value.tag_name().to_owned(),
        }),
    }
}


fn target_name(target: Primitive) -> &'static str {
    match target {
        Primitive::Int => "int",
        Primitive::Float => "float",
        Primitive::Bool => "bool",
        Primitive::Char => "char",
        Primitive::String => "string",
    }
}
