//! Static types and the arena they live in.
//!
//! Composite types never hold other types directly. Instead every type is stored once in a
//! [`TypeArena`] and referred to by its [`TypeId`], so a struct member or a variant alternative
//! is just an index into the same arena. Primitive types occupy fixed ids which are the same in
//! every arena.
use std::fmt;

use indexmap::IndexMap;


/// A stable handle to a type stored in a [`TypeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(usize);


impl TypeId {
    pub const VOID: TypeId = TypeId(0);
    pub const INT: TypeId = TypeId(1);
    pub const FLOAT: TypeId = TypeId(2);
    pub const BOOL: TypeId = TypeId(3);
    pub const CHAR: TypeId = TypeId(4);
    pub const STRING: TypeId = TypeId(5);
}


/// The signature of a function, plus a reference to its body once the function is defined.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub params: Vec<TypeId>,
    pub return_type: TypeId,
    /// Index of the defining `fn` within the program's definitions.
    pub body: Option<usize>,
}


#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    Void,
    Int,
    Float,
    Bool,
    Char,
    String,
    /// A tagged union satisfied by a value of any one of its member types.
    Variant(Vec<TypeId>),
    /// Named members in declaration order.
    Struct(IndexMap<String, TypeId>),
    Function(FunctionType),
}


impl Type {
    pub fn is_primitive(&self) -> bool {
        matches!(self, Self::Void | Self::Int | Self::Float | Self::Bool | Self::Char | Self::String)
    }
}


/// The names and types of the primitives, in [`TypeId`] order.
pub const PRIMITIVES: [(&str, Type); 6] = [
    ("void", Type::Void),
    ("int", Type::Int),
    ("float", Type::Float),
    ("bool", Type::Bool),
    ("char", Type::Char),
    ("string", Type::String),
];


#[derive(Debug, Clone)]
struct ArenaEntry {
    name: String,
    ty: Type,
}


/// Owns every type created during one analysis or interpretation run.
///
/// Types are never removed, so a [`TypeId`] stays valid for the lifetime of the arena.
#[derive(Debug, Clone)]
pub struct TypeArena {
    entries: Vec<ArenaEntry>,
}


impl TypeArena {
    /// Creates an arena holding only the primitive types at their fixed ids.
    pub fn new() -> Self {
        let entries = PRIMITIVES.into_iter()
            .map(|(name, ty)| ArenaEntry { name: name.to_owned(), ty })
            .collect();

        Self { entries }
    }


    /// Stores a new type and returns its handle.
    pub fn add(&mut self, name: &str, ty: Type) -> TypeId {
        self.entries.push(ArenaEntry { name: name.to_owned(), ty });
        TypeId(self.entries.len() - 1)
    }


    /// Stores a function signature under a name derived from its parameter and return types.
    pub fn add_function(&mut self, params: Vec<TypeId>, return_type: TypeId) -> TypeId {
        let name = format!(
            "fn({}) -> {}",
            params.iter().map(|p| self.name(*p)).collect::<Vec<&str>>().join(", "),
            self.name(return_type)
        );

        self.add(&name, Type::Function(FunctionType { params, return_type, body: None }))
    }


    /// The type registered under `id`.
    ///
    /// # Panics
    ///
    /// If `id` was not handed out by this arena.
    pub fn get(&self, id: TypeId) -> &Type {
        &self.entries[id.0].ty
    }


    pub fn get_mut(&mut self, id: TypeId) -> &mut Type {
        &mut self.entries[id.0].ty
    }


    /// The name the type was registered under, as written in source.
    pub fn name(&self, id: TypeId) -> &str {
        &self.entries[id.0].name
    }


    pub fn is_primitive(&self, id: TypeId) -> bool {
        self.get(id).is_primitive()
    }

}


impl Default for TypeArena {
    fn default() -> Self {
        Self::new()
    }
}


impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
