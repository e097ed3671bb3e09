//! Runtime values and how they relate to static types.
use std::fmt;

use indexmap::IndexMap;

use crate::parser::ast::Literal;
use crate::parser::types::{Type, TypeArena, TypeId};


#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Void,
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    /// A value held by a variant-typed place, tagged with the member type it currently has.
    Variant {
        type_id: TypeId,
        inner: Box<Value>,
    },
    /// The value of a struct type, members in declaration order.
    Object(IndexMap<String, Value>),
    /// A reference to a function by name.
    Function(String),
}


impl Value {
    /// A short name of the value's shape, used in error messages.
    pub fn tag_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::Str(_) => "string",
            Self::Variant { .. } => "variant",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
        }
    }
}


impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Int(n) => Self::Int(*n),
            Literal::Float(n) => Self::Float(*n),
            Literal::Bool(b) => Self::Bool(*b),
            Literal::Char(c) => Self::Char(*c),
            Literal::String(s) => Self::Str(s.clone()),
        }
    }
}


/// The canonical rendering, as written by `stdout <<` and by casts to `string`.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Void => Ok(()),
            Self::Int(n) => write!(f, "{}", n),
            // Debug keeps the shortest round-trip digits and a trailing ".0" on whole numbers
            Self::Float(n) => write!(f, "{:?}", n),
            Self::Bool(b) => write!(f, "{}", b),
            Self::Char(c) => write!(f, "{}", c),
            Self::Str(s) => write!(f, "{}", s),
            Self::Variant { inner, .. } => write!(f, "{}", inner),
            Self::Object(members) => {
                write!(f, "{{")?;
                for (i, (name, value)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, value)?;
                }
                write!(f, "}}")
            }
            Self::Function(name) => write!(f, "fn {}", name),
        }
    }
}


/// Checks whether a runtime value structurally fits a static type.
///
/// Primitives match by tag. An object matches a struct if it has exactly the struct's member
/// names and every member matches. A variant value matches a variant type if its active type
/// is one of the members and its inner value fits that member; any other value matches a
/// variant type if it fits at least one member.
pub fn value_type_match(value: &Value, ty: TypeId, types: &TypeArena) -> bool {
    match (value, types.get(ty)) {
        (Value::Void, Type::Void)
        | (Value::Int(_), Type::Int)
        | (Value::Float(_), Type::Float)
        | (Value::Bool(_), Type::Bool)
        | (Value::Char(_), Type::Char)
        | (Value::Str(_), Type::String)
        | (Value::Function(_), Type::Function(_)) => true,

        (Value::Object(members), Type::Struct(fields)) => {
            members.len() == fields.len()
                && fields.iter().all(|(name, field_type)| {
                    members.get(name).is_some_and(|member| value_type_match(member, *field_type, types))
                })
        }

        (Value::Variant { type_id, inner }, Type::Variant(options)) => {
            options.contains(type_id) && value_type_match(inner, *type_id, types)
        }

        (value, Type::Variant(options)) => options.iter().any(|option| value_type_match(value, *option, types)),

        _ => false,
    }
}


/// Converts a value for storage in a place of type `ty`.
///
/// Values stored into variant-typed places are wrapped with the first member type they match,
/// and objects stored into struct-typed places have their members converted in turn. Other
/// values are returned unchanged.
pub fn coerce(value: Value, ty: TypeId, types: &TypeArena) -> Value {
    match (value, types.get(ty)) {
        (value @ Value::Variant { .. }, Type::Variant(_)) if value_type_match(&value, ty, types) => value,

        (value, Type::Variant(options)) => {
            match options.iter().find(|option| value_type_match(&value, **option, types)) {
                Some(option) => Value::Variant { type_id: *option, inner: Box::new(coerce(value, *option, types)) },
                None => value,
            }
        }

        // members are put into declaration order on the way
        (Value::Object(mut members), Type::Struct(fields)) => {
            let mut ordered: IndexMap<String, Value> = IndexMap::with_capacity(members.len());
            for (name, field_type) in fields {
                if let Some(member) = members.shift_remove(name) {
                    ordered.insert(name.clone(), coerce(member, *field_type, types));
                }
            }
            ordered.extend(members);

            Value::Object(ordered)
        }

        (value, _) => value,
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;


    struct Fixture {
        types: TypeArena,
        number: TypeId,
        point: TypeId,
        shape: TypeId,
    }


    /// `Number = int | float`, `Point { x: int, y: Number }`, `Shape = Point | string`.
    fn fixture() -> Fixture {
        let mut types = TypeArena::new();
        let number = types.add("Number", Type::Variant(vec![TypeId::INT, TypeId::FLOAT]));

        let mut fields = IndexMap::new();
        fields.insert("x".to_owned(), TypeId::INT);
        fields.insert("y".to_owned(), number);
        let point = types.add("Point", Type::Struct(fields));
        let shape = types.add("Shape", Type::Variant(vec![point, TypeId::STRING]));

        Fixture { types, number, point, shape }
    }


    fn object(members: &[(&str, Value)]) -> Value {
        Value::Object(members.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect())
    }


    #[test]
    fn test_primitives_match_by_tag() {
        let types = TypeArena::new();
        assert!(value_type_match(&Value::Int(1), TypeId::INT, &types));
        assert!(value_type_match(&Value::Str("a".to_owned()), TypeId::STRING, &types));
        assert!(value_type_match(&Value::Void, TypeId::VOID, &types));
        assert!(!value_type_match(&Value::Int(1), TypeId::FLOAT, &types));
        assert!(!value_type_match(&Value::Char('a'), TypeId::STRING, &types));
        assert!(!value_type_match(&Value::Bool(true), TypeId::INT, &types));
    }


    #[test]
    fn test_struct_matching() {
        let f = fixture();
        let good = object(&[("x", Value::Int(1)), ("y", Value::Float(2.0))]);
        assert!(value_type_match(&good, f.point, &f.types));

        // member order does not matter, only the name set
        let reordered = object(&[("y", Value::Int(2)), ("x", Value::Int(1))]);
        assert!(value_type_match(&reordered, f.point, &f.types));

        let missing = object(&[("x", Value::Int(1))]);
        let extra = object(&[("x", Value::Int(1)), ("y", Value::Int(2)), ("z", Value::Int(3))]);
        let renamed = object(&[("x", Value::Int(1)), ("w", Value::Int(2))]);
        let wrong_tag = object(&[("x", Value::Float(1.0)), ("y", Value::Int(2))]);
        for value in [missing, extra, renamed, wrong_tag, Value::Int(1)] {
            assert!(!value_type_match(&value, f.point, &f.types), "{:?}", value);
        }
    }


    #[test]
    fn test_variant_matching() {
        let f = fixture();
        assert!(value_type_match(&Value::Int(1), f.number, &f.types));
        assert!(value_type_match(&Value::Float(1.5), f.number, &f.types));
        assert!(!value_type_match(&Value::Bool(true), f.number, &f.types));

        let tagged = Value::Variant { type_id: TypeId::FLOAT, inner: Box::new(Value::Float(1.5)) };
        assert!(value_type_match(&tagged, f.number, &f.types));

        let lying = Value::Variant { type_id: TypeId::FLOAT, inner: Box::new(Value::Int(1)) };
        assert!(!value_type_match(&lying, f.number, &f.types));

        let foreign = Value::Variant { type_id: TypeId::STRING, inner: Box::new(Value::Str("s".to_owned())) };
        assert!(!value_type_match(&foreign, f.number, &f.types));
        assert!(!value_type_match(&tagged, TypeId::FLOAT, &f.types));

        let point = object(&[("x", Value::Int(1)), ("y", Value::Int(2))]);
        assert!(value_type_match(&point, f.shape, &f.types));
    }


    #[test]
    fn test_coerce_wraps_variant_members() {
        let f = fixture();
        assert_eq!(
            coerce(Value::Float(2.5), f.number, &f.types),
            Value::Variant { type_id: TypeId::FLOAT, inner: Box::new(Value::Float(2.5)) }
        );

        // already tagged for this variant
        let tagged = Value::Variant { type_id: TypeId::INT, inner: Box::new(Value::Int(1)) };
        assert_eq!(coerce(tagged.clone(), f.number, &f.types), tagged);

        // non-variant targets leave values alone
        assert_eq!(coerce(Value::Int(3), TypeId::INT, &f.types), Value::Int(3));
    }


    #[test]
    fn test_coerce_recurses_through_structs() {
        let f = fixture();
        let point = object(&[("x", Value::Int(1)), ("y", Value::Int(2))]);

        let expected_point = object(&[
            ("x", Value::Int(1)),
            ("y", Value::Variant { type_id: TypeId::INT, inner: Box::new(Value::Int(2)) }),
        ]);
        assert_eq!(
            coerce(point, f.shape, &f.types),
            Value::Variant { type_id: f.point, inner: Box::new(expected_point) }
        );

        let reordered = object(&[("y", Value::Float(0.5)), ("x", Value::Int(1))]);
        assert_eq!(coerce(reordered, f.point, &f.types).to_string(), "{x: 1, y: 0.5}");
    }


    #[test]
    fn test_rendering() {
        assert_eq!(Value::Int(-12).to_string(), "-12");
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Char('z').to_string(), "z");
        assert_eq!(Value::Str("hi there".to_owned()).to_string(), "hi there");

        let tagged = Value::Variant { type_id: TypeId::INT, inner: Box::new(Value::Int(7)) };
        assert_eq!(tagged.to_string(), "7");
        assert_eq!(object(&[("x", Value::Int(1)), ("y", Value::Char('c'))]).to_string(), "{x: 1, y: c}");
    }
}
