//! Resolved type representation
//!
//! Drivers produce a [`Type`] when a symbol's resolver runs to completion;
//! the graph stores it on the closed symbol and backends consume it. The
//! core never interprets these shapes beyond equality and display — they
//! exist so cross-language tooling sees one vocabulary.

use std::fmt;

use crate::graph::SymbolId;

/// Signedness of a digit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Signed,
    Unsigned,
}

/// Target-independent width class of a digit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigitWidth {
    Char,
    Short,
    Int,
    Long,
}

/// Whether a closure accepts exactly its declared parameters or a variadic
/// tail as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed,
    Variable,
}

/// A resolved type. `Poison` is the value carried by symbols whose
/// resolution failed; it propagates through dependent resolutions without
/// producing cascading diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Unit,
    Bool,
    Str,
    Digit { width: DigitWidth, sign: Sign },
    Closure { params: Vec<Type>, result: Box<Type>, arity: Arity },
    Reference(Box<Type>),
    /// A reference to a named type symbol, left for backends to chase.
    Named(SymbolId),
    Poison,
}

impl Type {
    /// The default integer type drivers reach for.
    pub fn int() -> Self {
        Type::Digit { width: DigitWidth::Int, sign: Sign::Signed }
    }

    pub fn closure(params: Vec<Type>, result: Type, arity: Arity) -> Self {
        Type::Closure { params, result: Box::new(result), arity }
    }

    pub fn reference(inner: Type) -> Self {
        Type::Reference(Box::new(inner))
    }

    pub fn is_poison(&self) -> bool {
        matches!(self, Type::Poison)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Unit => write!(f, "unit"),
            Type::Bool => write!(f, "bool"),
            Type::Str => write!(f, "str"),
            Type::Digit { width, sign } => {
                let sign = match sign {
                    Sign::Signed => "",
                    Sign::Unsigned => "u",
                };
                let width = match width {
                    DigitWidth::Char => "char",
                    DigitWidth::Short => "short",
                    DigitWidth::Int => "int",
                    DigitWidth::Long => "long",
                };
                write!(f, "{sign}{width}")
            }
            Type::Closure { params, result, arity } => {
                write!(f, "fn(")?;
                for (index, param) in params.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                if *arity == Arity::Variable {
                    if !params.is_empty() {
                        write!(f, ", ")?;
                    }
                    write!(f, "...")?;
                }
                write!(f, ") -> {result}")
            }
            Type::Reference(inner) => write!(f, "&{inner}"),
            Type::Named(symbol) => write!(f, "<symbol #{}>", symbol.as_u32()),
            Type::Poison => write!(f, "<error>"),
        }
    }
}
