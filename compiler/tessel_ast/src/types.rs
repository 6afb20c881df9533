//! Concrete types and symbolic bindings.
//!
//! Types are produced by the type checker and may still mention parametric
//! symbols in their dimensions (`bits[N]`, `u8[M + 1]`). A type only becomes
//! fully concrete once it is resolved against the [`SymbolicBindings`] of one
//! function instantiation.

use std::fmt;

use smallvec::SmallVec;

/// Expression over parametric symbols appearing in a type dimension.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParametricExpr {
    Symbol(String),
    Constant(u64),
    Add(Box<ParametricExpr>, Box<ParametricExpr>),
    Mul(Box<ParametricExpr>, Box<ParametricExpr>),
}

impl ParametricExpr {
    /// Evaluate under `bindings`. Returns the first unbound symbol on failure.
    pub fn evaluate(&self, bindings: &SymbolicBindings) -> Result<u64, String> {
        match self {
            ParametricExpr::Symbol(name) => bindings.get(name).ok_or_else(|| name.clone()),
            ParametricExpr::Constant(value) => Ok(*value),
            ParametricExpr::Add(lhs, rhs) => {
                Ok(lhs.evaluate(bindings)?.wrapping_add(rhs.evaluate(bindings)?))
            }
            ParametricExpr::Mul(lhs, rhs) => {
                Ok(lhs.evaluate(bindings)?.wrapping_mul(rhs.evaluate(bindings)?))
            }
        }
    }
}

impl fmt::Display for ParametricExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParametricExpr::Symbol(name) => write!(f, "{name}"),
            ParametricExpr::Constant(value) => write!(f, "{value}"),
            ParametricExpr::Add(lhs, rhs) => write!(f, "({lhs} + {rhs})"),
            ParametricExpr::Mul(lhs, rhs) => write!(f, "({lhs} * {rhs})"),
        }
    }
}

/// Size of a bits/array/enum type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dim {
    Known(u64),
    Parametric(ParametricExpr),
}

impl Dim {
    pub fn symbol(name: impl Into<String>) -> Self {
        Dim::Parametric(ParametricExpr::Symbol(name.into()))
    }

    pub fn resolve(&self, bindings: &SymbolicBindings) -> Result<u64, String> {
        match self {
            Dim::Known(value) => Ok(*value),
            Dim::Parametric(expr) => expr.evaluate(bindings),
        }
    }

    pub fn known(&self) -> Option<u64> {
        match self {
            Dim::Known(value) => Some(*value),
            Dim::Parametric(_) => None,
        }
    }
}

impl fmt::Display for Dim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dim::Known(value) => write!(f, "{value}"),
            Dim::Parametric(expr) => write!(f, "{expr}"),
        }
    }
}

/// Type of an AST node as determined by the type checker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConcreteType {
    Bits {
        signed: bool,
        size: Dim,
    },
    Enum {
        size: Dim,
    },
    Array {
        element: Box<ConcreteType>,
        size: Dim,
    },
    /// Tuples and structs; struct members carry their field names.
    Tuple {
        members: Vec<(Option<String>, ConcreteType)>,
    },
    Function {
        params: Vec<ConcreteType>,
        ret: Box<ConcreteType>,
    },
}

impl ConcreteType {
    pub fn ubits(width: u64) -> Self {
        ConcreteType::Bits {
            signed: false,
            size: Dim::Known(width),
        }
    }

    pub fn sbits(width: u64) -> Self {
        ConcreteType::Bits {
            signed: true,
            size: Dim::Known(width),
        }
    }

    pub fn tuple(members: impl IntoIterator<Item = ConcreteType>) -> Self {
        ConcreteType::Tuple {
            members: members.into_iter().map(|m| (None, m)).collect(),
        }
    }

    pub fn array(element: ConcreteType, size: u64) -> Self {
        ConcreteType::Array {
            element: Box::new(element),
            size: Dim::Known(size),
        }
    }

    #[inline]
    pub fn is_signed(&self) -> bool {
        matches!(self, ConcreteType::Bits { signed: true, .. })
    }

    /// Replace every parametric dimension with its value under `bindings`.
    ///
    /// On failure returns the name of the first unbound symbol.
    pub fn resolve(&self, bindings: &SymbolicBindings) -> Result<ConcreteType, String> {
        Ok(match self {
            ConcreteType::Bits { signed, size } => ConcreteType::Bits {
                signed: *signed,
                size: Dim::Known(size.resolve(bindings)?),
            },
            ConcreteType::Enum { size } => ConcreteType::Enum {
                size: Dim::Known(size.resolve(bindings)?),
            },
            ConcreteType::Array { element, size } => ConcreteType::Array {
                element: Box::new(element.resolve(bindings)?),
                size: Dim::Known(size.resolve(bindings)?),
            },
            ConcreteType::Tuple { members } => ConcreteType::Tuple {
                members: members
                    .iter()
                    .map(|(name, ty)| Ok::<_, String>((name.clone(), ty.resolve(bindings)?)))
                    .collect::<Result<_, String>>()?,
            },
            ConcreteType::Function { params, ret } => ConcreteType::Function {
                params: params
                    .iter()
                    .map(|p| p.resolve(bindings))
                    .collect::<Result<_, String>>()?,
                ret: Box::new(ret.resolve(bindings)?),
            },
        })
    }

    /// Total flattened bit count, if every dimension is known.
    pub fn total_bit_count(&self) -> Option<u64> {
        match self {
            ConcreteType::Bits { size, .. } | ConcreteType::Enum { size } => size.known(),
            ConcreteType::Array { element, size } => {
                Some(element.total_bit_count()?.checked_mul(size.known()?)?)
            }
            ConcreteType::Tuple { members } => members
                .iter()
                .try_fold(0u64, |acc, (_, ty)| acc.checked_add(ty.total_bit_count()?)),
            ConcreteType::Function { .. } => None,
        }
    }

    /// Index of a named struct member.
    pub fn member_index(&self, name: &str) -> Option<usize> {
        match self {
            ConcreteType::Tuple { members } => members
                .iter()
                .position(|(member, _)| member.as_deref() == Some(name)),
            _ => None,
        }
    }

    pub fn tuple_members(&self) -> Option<SmallVec<[&ConcreteType; 4]>> {
        match self {
            ConcreteType::Tuple { members } => Some(members.iter().map(|(_, ty)| ty).collect()),
            _ => None,
        }
    }
}

impl fmt::Display for ConcreteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcreteType::Bits { signed, size } => {
                write!(f, "{}N[{size}]", if *signed { "s" } else { "u" })
            }
            ConcreteType::Enum { size } => write!(f, "enum[{size}]"),
            ConcreteType::Array { element, size } => write!(f, "{element}[{size}]"),
            ConcreteType::Tuple { members } => {
                write!(f, "(")?;
                for (i, (name, ty)) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    if let Some(name) = name {
                        write!(f, "{name}: ")?;
                    }
                    write!(f, "{ty}")?;
                }
                write!(f, ")")
            }
            ConcreteType::Function { params, ret } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {ret}")
            }
        }
    }
}

/// Values of a function's parametric bindings for one instantiation.
///
/// Entries are kept sorted by name, so two binding sets with the same
/// contents compare, hash and print identically regardless of insertion
/// order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SymbolicBindings {
    entries: Vec<(String, u64)>,
}

impl SymbolicBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a binding.
    pub fn insert(&mut self, name: impl Into<String>, value: u64) {
        let name = name.into();
        match self.entries.binary_search_by(|(k, _)| k.as_str().cmp(&name)) {
            Ok(pos) => self.entries[pos].1 = value,
            Err(pos) => self.entries.insert(pos, (name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.entries
            .binary_search_by(|(k, _)| k.as_str().cmp(name))
            .ok()
            .map(|pos| self.entries[pos].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `(name, value)` pairs in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for SymbolicBindings {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut bindings = SymbolicBindings::new();
        for (name, value) in iter {
            bindings.insert(name, value);
        }
        bindings
    }
}

impl fmt::Display for SymbolicBindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        write!(f, "}}")
    }
}

/// Resolved `[start:limit]` bounds of a static bit slice.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StartAndWidth {
    pub start: u64,
    pub width: u64,
}
