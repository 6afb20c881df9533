//! IR types and constant values.
//!
//! Bit vectors are capped at [`MAX_BIT_WIDTH`] bits and stored in a `u128`
//! with every bit above `width` cleared, so equal values always compare
//! equal.

use std::fmt;

use thiserror::Error;

pub const MAX_BIT_WIDTH: u32 = 128;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Type {
    Bits(u32),
    Array { element: Box<Type>, size: u32 },
    Tuple(Vec<Type>),
}

impl Type {
    pub fn array(element: Type, size: u32) -> Self {
        Type::Array {
            element: Box::new(element),
            size,
        }
    }

    /// Width of a bits type.
    pub fn bit_count(&self) -> Option<u32> {
        match self {
            Type::Bits(width) => Some(*width),
            _ => None,
        }
    }

    /// Total number of bits when flattened.
    pub fn flat_bit_count(&self) -> u64 {
        match self {
            Type::Bits(width) => u64::from(*width),
            Type::Array { element, size } => element.flat_bit_count() * u64::from(*size),
            Type::Tuple(members) => members.iter().map(Type::flat_bit_count).sum(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bits(width) => write!(f, "bits[{width}]"),
            Type::Array { element, size } => write!(f, "{element}[{size}]"),
            Type::Tuple(members) => {
                write!(f, "(")?;
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{member}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("bit width {0} exceeds the supported maximum of {MAX_BIT_WIDTH}")]
    TooWide(u64),
    #[error("cannot build an empty array value")]
    EmptyArray,
    #[error("array elements have differing types")]
    MixedArray,
}

/// Fixed-width bit vector.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bits {
    width: u32,
    value: u128,
}

impl Bits {
    /// Build from the low `width` bits of `value`.
    pub fn new(width: u64, value: u128) -> Result<Self, ValueError> {
        let width = u32::try_from(width)
            .ok()
            .filter(|w| *w <= MAX_BIT_WIDTH)
            .ok_or(ValueError::TooWide(width))?;
        Ok(Bits {
            width,
            value: value & Self::mask(width),
        })
    }

    /// Build from a signed integer, truncating its two's complement form.
    #[expect(
        clippy::cast_sign_loss,
        reason = "reinterpreting two's complement bits is the intent"
    )]
    pub fn from_i128(width: u64, value: i128) -> Result<Self, ValueError> {
        Self::new(width, value as u128)
    }

    pub fn zero(width: u32) -> Self {
        Bits { width, value: 0 }
    }

    pub fn bool(value: bool) -> Self {
        Bits {
            width: 1,
            value: u128::from(value),
        }
    }

    fn mask(width: u32) -> u128 {
        if width >= MAX_BIT_WIDTH {
            u128::MAX
        } else {
            (1u128 << width) - 1
        }
    }

    #[inline]
    pub fn width(self) -> u32 {
        self.width
    }

    #[inline]
    pub fn value(self) -> u128 {
        self.value
    }

    pub fn to_u64(self) -> Option<u64> {
        u64::try_from(self.value).ok()
    }

    /// Value interpreted as two's complement.
    #[expect(
        clippy::cast_possible_wrap,
        reason = "reinterpreting two's complement bits is the intent"
    )]
    pub fn to_signed(self) -> i128 {
        if self.width == 0 {
            return 0;
        }
        let shift = MAX_BIT_WIDTH - self.width;
        ((self.value << shift) as i128) >> shift
    }

    pub fn is_zero(self) -> bool {
        self.value == 0
    }
}

impl fmt::Display for Bits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bits[{}]:{}", self.width, self.value)
    }
}

/// Constant IR value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Bits(Bits),
    Tuple(Vec<Value>),
    Array(Vec<Value>),
}

impl Value {
    pub fn ubits(width: u64, value: u128) -> Result<Self, ValueError> {
        Bits::new(width, value).map(Value::Bits)
    }

    /// Array value; elements must share one type.
    pub fn array(elements: Vec<Value>) -> Result<Self, ValueError> {
        let first = elements.first().ok_or(ValueError::EmptyArray)?.ty();
        if elements.iter().skip(1).any(|e| e.ty() != first) {
            return Err(ValueError::MixedArray);
        }
        Ok(Value::Array(elements))
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "array lengths are bounded by u32 types"
    )]
    pub fn ty(&self) -> Type {
        match self {
            Value::Bits(bits) => Type::Bits(bits.width()),
            Value::Tuple(members) => Type::Tuple(members.iter().map(Value::ty).collect()),
            Value::Array(elements) => Type::Array {
                element: Box::new(elements.first().map_or(Type::Bits(0), Value::ty)),
                size: elements.len() as u32,
            },
        }
    }

    pub fn as_bits(&self) -> Option<Bits> {
        match self {
            Value::Bits(bits) => Some(*bits),
            _ => None,
        }
    }

    /// Unsigned integer view of a bits value.
    pub fn to_u64(&self) -> Option<u64> {
        self.as_bits().and_then(Bits::to_u64)
    }
}

impl From<Bits> for Value {
    fn from(bits: Bits) -> Self {
        Value::Bits(bits)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close, members) = match self {
            Value::Bits(bits) => return write!(f, "{bits}"),
            Value::Tuple(members) => ("(", ")", members),
            Value::Array(members) => ("[", "]", members),
        };
        write!(f, "{open}")?;
        for (i, member) in members.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{member}")?;
        }
        write!(f, "{close}")
    }
}

#[cfg(test)]
mod tests;
