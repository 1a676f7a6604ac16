use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared type of a binding.
///
/// Integers are unbounded unless a bit width is declared; a declared width
/// selects fixed-width wraparound semantics in the verifier's encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    Int { width: Option<u32> },
    Float,
    Bool,
    Str,
    Array(Box<Type>),
    Unit,
}

impl Type {
    /// Unbounded integer.
    pub fn int() -> Self {
        Type::Int { width: None }
    }

    /// Fixed-width integer with wraparound semantics.
    pub fn int_width(width: u32) -> Self {
        Type::Int { width: Some(width) }
    }

    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int { width: None } => write!(f, "int"),
            Type::Int { width: Some(w) } => write!(f, "int{w}"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Array(elem) => write!(f, "[{elem}]"),
            Type::Unit => write!(f, "unit"),
        }
    }
}
