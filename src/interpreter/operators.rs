//! Table-driven operator dispatch.
//!
//! Each operator has one entry listing the operand types it accepts and the function computing
//! its result. The analyzer consults the operand lists; the interpreter calls the functions. Both
//! operands of a binary operator always share one type.
use crate::parser::ast::{BinaryOperator, UnaryOperator};
use crate::parser::types::TypeId;

use super::errors::RuntimeError;
use super::values::Value;


type BinaryFn = fn(Value, Value) -> Result<Value, RuntimeError>;
type UnaryFn = fn(Value) -> Result<Value, RuntimeError>;


pub struct BinaryEntry {
    pub operator: BinaryOperator,
    pub operands: &'static [TypeId],
    /// Whether the result is `bool` rather than the operand type.
    pub yields_bool: bool,
    evaluate: BinaryFn,
}


pub struct UnaryEntry {
    pub operator: UnaryOperator,
    pub operands: &'static [TypeId],
    evaluate: UnaryFn,
}


const NUMERIC: &[TypeId] = &[TypeId::INT, TypeId::FLOAT];
const ORDERED: &[TypeId] = &[TypeId::INT, TypeId::FLOAT, TypeId::CHAR, TypeId::STRING];
const EQUATABLE: &[TypeId] = &[TypeId::INT, TypeId::FLOAT, TypeId::BOOL, TypeId::CHAR, TypeId::STRING];
const LOGICAL: &[TypeId] = &[TypeId::BOOL];


/// Indexed by `BinaryOperator as usize`.
pub const BINARY_OPERATORS: [BinaryEntry; 13] = [
    BinaryEntry { operator: BinaryOperator::Or, operands: LOGICAL, yields_bool: true, evaluate: or },
    BinaryEntry { operator: BinaryOperator::And, operands: LOGICAL, yields_bool: true, evaluate: and },
    BinaryEntry { operator: BinaryOperator::Equal, operands: EQUATABLE, yields_bool: true, evaluate: equal },
    BinaryEntry { operator: BinaryOperator::NotEqual, operands: EQUATABLE, yields_bool: true, evaluate: not_equal },
    BinaryEntry { operator: BinaryOperator::Less, operands: ORDERED, yields_bool: true, evaluate: less },
    BinaryEntry { operator: BinaryOperator::LessEqual, operands: ORDERED, yields_bool: true, evaluate: less_equal },
    BinaryEntry { operator: BinaryOperator::Greater, operands: ORDERED, yields_bool: true, evaluate: greater },
    BinaryEntry { operator: BinaryOperator::GreaterEqual, operands: ORDERED, yields_bool: true, evaluate: greater_equal },
    BinaryEntry { operator: BinaryOperator::Add, operands: &[TypeId::INT, TypeId::FLOAT, TypeId::STRING], yields_bool: false, evaluate: add },
    BinaryEntry { operator: BinaryOperator::Subtract, operands: NUMERIC, yields_bool: false, evaluate: subtract },
    BinaryEntry { operator: BinaryOperator::Multiply, operands: NUMERIC, yields_bool: false, evaluate: multiply },
    BinaryEntry { operator: BinaryOperator::Divide, operands: NUMERIC, yields_bool: false, evaluate: divide },
    BinaryEntry { operator: BinaryOperator::Modulo, operands: &[TypeId::INT], yields_bool: false, evaluate: modulo },
];


/// Indexed by `UnaryOperator as usize`.
pub const UNARY_OPERATORS: [UnaryEntry; 2] = [
    UnaryEntry { operator: UnaryOperator::Negate, operands: NUMERIC, evaluate: negate },
    UnaryEntry { operator: UnaryOperator::Not, operands: LOGICAL, evaluate: not },
];


pub fn binary_entry(operator: BinaryOperator) -> &'static BinaryEntry {
    &BINARY_OPERATORS[operator as usize]
}


pub fn unary_entry(operator: UnaryOperator) -> &'static UnaryEntry {
    &UNARY_OPERATORS[operator as usize]
}


/// The result type of a binary operation, or `None` if the operator does not accept the
/// operand types.
pub fn binary_result_type(operator: BinaryOperator, left: TypeId, right: TypeId) -> Option<TypeId> {
    let entry = binary_entry(operator);
    if left != right || !entry.operands.contains(&left) {
        return None;
    }

    Some(if entry.yields_bool { TypeId::BOOL } else { left })
}


pub fn unary_result_type(operator: UnaryOperator, operand: TypeId) -> Option<TypeId> {
    unary_entry(operator).operands.contains(&operand).then_some(operand)
}


pub fn apply_binary(operator: BinaryOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    (binary_entry(operator).evaluate)(left, right)
}


pub fn apply_unary(operator: UnaryOperator, operand: Value) -> Result<Value, RuntimeError> {
    (unary_entry(operator).evaluate)(operand)
}


fn unsupported(operator: &'static str, operands: &[&Value]) -> RuntimeError {
    let operands = operands.iter().map(|v| v.tag_name()).collect::<Vec<&str>>().join(" and ");
    RuntimeError::UnsupportedOperation { operator, operands }
}


fn checked_int(result: Option<i64>, operator: &'static str) -> Result<Value, RuntimeError> {
    result.map(Value::Int).ok_or(RuntimeError::IntegerOverflow { operator })
}


fn or(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a || b)),
        (l, r) => Err(unsupported("||", &[&l, &r])),
    }
}


fn and(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a && b)),
        (l, r) => Err(unsupported("&&", &[&l, &r])),
    }
}


fn equality(left: &Value, right: &Value, operator: &'static str) -> Result<bool, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(a == b),
        (Value::Float(a), Value::Float(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Char(a), Value::Char(b)) => Ok(a == b),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (l, r) => Err(unsupported(operator, &[l, r])),
    }
}


fn equal(left: Value, right: Value) -> Result<Value, RuntimeError> {
    equality(&left, &right, "==").map(Value::Bool)
}


fn not_equal(left: Value, right: Value) -> Result<Value, RuntimeError> {
    equality(&left, &right, "!=").map(|equal| Value::Bool(!equal))
}


/// Orders two values of the same ordered type; `None` only for NaN floats.
fn ordering(left: &Value, right: &Value, operator: &'static str) -> Result<Option<std::cmp::Ordering>, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Some(a.cmp(b))),
        (Value::Float(a), Value::Float(b)) => Ok(a.partial_cmp(b)),
        (Value::Char(a), Value::Char(b)) => Ok(Some(a.cmp(b))),
        (Value::Str(a), Value::Str(b)) => Ok(Some(a.cmp(b))),
        (l, r) => Err(unsupported(operator, &[l, r])),
    }
}


fn less(left: Value, right: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordering(&left, &right, "<")?.is_some_and(|o| o.is_lt())))
}


fn less_equal(left: Value, right: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordering(&left, &right, "<=")?.is_some_and(|o| o.is_le())))
}


fn greater(left: Value, right: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordering(&left, &right, ">")?.is_some_and(|o| o.is_gt())))
}


fn greater_equal(left: Value, right: Value) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(ordering(&left, &right, ">=")?.is_some_and(|o| o.is_ge())))
}


fn add(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => checked_int(a.checked_add(b), "+"),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (l, r) => Err(unsupported("+", &[&l, &r])),
    }
}


fn subtract(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => checked_int(a.checked_sub(b), "-"),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
        (l, r) => Err(unsupported("-", &[&l, &r])),
    }
}


fn multiply(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => checked_int(a.checked_mul(b), "*"),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
        (l, r) => Err(unsupported("*", &[&l, &r])),
    }
}


fn divide(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => checked_int(a.checked_div(b), "/"),
        (Value::Float(_), Value::Float(b)) if b == 0.0 => Err(RuntimeError::DivisionByZero),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
        (l, r) => Err(unsupported("/", &[&l, &r])),
    }
}


fn modulo(left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(_), Value::Int(0)) => Err(RuntimeError::DivisionByZero),
        (Value::Int(a), Value::Int(b)) => checked_int(a.checked_rem(b), "%"),
        (l, r) => Err(unsupported("%", &[&l, &r])),
    }
}


fn negate(operand: Value) -> Result<Value, RuntimeError> {
    match operand {
        Value::Int(n) => checked_int(n.checked_neg(), "-"),
        Value::Float(n) => Ok(Value::Float(-n)),
        other => Err(unsupported("-", &[&other])),
    }
}


fn not(operand: Value) -> Result<Value, RuntimeError> {
    match operand {
        Value::Bool(b) => Ok(Value::Bool(!b)),
        other => Err(unsupported("!", &[&other])),
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;


    fn binary(operator: BinaryOperator, left: Value, right: Value) -> Value {
        apply_binary(operator, left, right).unwrap()
    }


    #[test]
    fn test_tables_are_indexed_by_operator() {
        for (i, entry) in BINARY_OPERATORS.iter().enumerate() {
            assert_eq!(entry.operator as usize, i);
        }
        for (i, entry) in UNARY_OPERATORS.iter().enumerate() {
            assert_eq!(entry.operator as usize, i);
        }
    }


    #[test]
    fn test_result_types() {
        assert_eq!(binary_result_type(BinaryOperator::Add, TypeId::STRING, TypeId::STRING), Some(TypeId::STRING));
        assert_eq!(binary_result_type(BinaryOperator::Add, TypeId::INT, TypeId::FLOAT), None);
        assert_eq!(binary_result_type(BinaryOperator::Less, TypeId::CHAR, TypeId::CHAR), Some(TypeId::BOOL));
        assert_eq!(binary_result_type(BinaryOperator::Less, TypeId::BOOL, TypeId::BOOL), None);
        assert_eq!(binary_result_type(BinaryOperator::Equal, TypeId::BOOL, TypeId::BOOL), Some(TypeId::BOOL));
        assert_eq!(binary_result_type(BinaryOperator::Modulo, TypeId::FLOAT, TypeId::FLOAT), None);
        assert_eq!(binary_result_type(BinaryOperator::And, TypeId::INT, TypeId::INT), None);

        assert_eq!(unary_result_type(UnaryOperator::Negate, TypeId::FLOAT), Some(TypeId::FLOAT));
        assert_eq!(unary_result_type(UnaryOperator::Negate, TypeId::STRING), None);
        assert_eq!(unary_result_type(UnaryOperator::Not, TypeId::BOOL), Some(TypeId::BOOL));
    }


    #[test]
    fn test_arithmetic() {
        assert_eq!(binary(BinaryOperator::Add, Value::Int(2), Value::Int(3)), Value::Int(5));
        assert_eq!(binary(BinaryOperator::Subtract, Value::Float(1.5), Value::Float(0.25)), Value::Float(1.25));
        assert_eq!(binary(BinaryOperator::Multiply, Value::Int(-4), Value::Int(3)), Value::Int(-12));
        assert_eq!(binary(BinaryOperator::Divide, Value::Int(7), Value::Int(2)), Value::Int(3));
        assert_eq!(binary(BinaryOperator::Divide, Value::Int(-7), Value::Int(2)), Value::Int(-3));
        assert_eq!(binary(BinaryOperator::Modulo, Value::Int(-7), Value::Int(3)), Value::Int(-1));
        assert_eq!(
            binary(BinaryOperator::Add, Value::Str("ab".to_owned()), Value::Str("cd".to_owned())),
            Value::Str("abcd".to_owned())
        );
        assert_eq!(apply_unary(UnaryOperator::Negate, Value::Int(5)).unwrap(), Value::Int(-5));
        assert_eq!(apply_unary(UnaryOperator::Not, Value::Bool(false)).unwrap(), Value::Bool(true));
    }


    #[test]
    fn test_checked_failures() {
        assert!(matches!(apply_binary(BinaryOperator::Divide, Value::Int(1), Value::Int(0)), Err(RuntimeError::DivisionByZero)));
        assert!(matches!(apply_binary(BinaryOperator::Modulo, Value::Int(1), Value::Int(0)), Err(RuntimeError::DivisionByZero)));
        assert!(matches!(apply_binary(BinaryOperator::Divide, Value::Float(1.0), Value::Float(0.0)), Err(RuntimeError::DivisionByZero)));
        assert!(matches!(
            apply_binary(BinaryOperator::Add, Value::Int(i64::MAX), Value::Int(1)),
            Err(RuntimeError::IntegerOverflow { operator: "+" })
        ));
        assert!(matches!(
            apply_binary(BinaryOperator::Divide, Value::Int(i64::MIN), Value::Int(-1)),
            Err(RuntimeError::IntegerOverflow { operator: "/" })
        ));
        assert!(matches!(apply_unary(UnaryOperator::Negate, Value::Int(i64::MIN)), Err(RuntimeError::IntegerOverflow { .. })));

        let error = apply_binary(BinaryOperator::Add, Value::Bool(true), Value::Int(1)).unwrap_err();
        assert!(error.is_fatal());
        assert_eq!(error.to_string(), "operator '+' is not defined for bool and int");
    }


    #[test]
    fn test_comparisons() {
        assert_eq!(binary(BinaryOperator::Less, Value::Char('a'), Value::Char('b')), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::GreaterEqual, Value::Int(2), Value::Int(2)), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::Greater, Value::Str("b".to_owned()), Value::Str("ab".to_owned())), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::LessEqual, Value::Float(f64::NAN), Value::Float(1.0)), Value::Bool(false));
        assert_eq!(binary(BinaryOperator::Equal, Value::Bool(true), Value::Bool(true)), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::NotEqual, Value::Str("x".to_owned()), Value::Str("x".to_owned())), Value::Bool(false));
        assert_eq!(binary(BinaryOperator::Or, Value::Bool(false), Value::Bool(true)), Value::Bool(true));
        assert_eq!(binary(BinaryOperator::And, Value::Bool(true), Value::Bool(false)), Value::Bool(false));
    }
}
