//! Type system representation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer type kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntKind {
    Char,
    Short,
    Int,
    Long,
    LongLong,
    UChar,
    UShort,
    UInt,
    ULong,
    ULongLong,
}

impl IntKind {
    pub fn name(self) -> &'static str {
        match self {
            IntKind::Char => "char",
            IntKind::Short => "short",
            IntKind::Int => "int",
            IntKind::Long => "long",
            IntKind::LongLong => "long long",
            IntKind::UChar => "unsigned char",
            IntKind::UShort => "unsigned short",
            IntKind::UInt => "unsigned int",
            IntKind::ULong => "unsigned long",
            IntKind::ULongLong => "unsigned long long",
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            IntKind::Char | IntKind::UChar => 8,
            IntKind::Short | IntKind::UShort => 16,
            IntKind::Int | IntKind::UInt => 32,
            IntKind::Long | IntKind::ULong | IntKind::LongLong | IntKind::ULongLong => 64,
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            IntKind::Char | IntKind::Short | IntKind::Int | IntKind::Long | IntKind::LongLong
        )
    }

    fn rank(self) -> u8 {
        match self {
            IntKind::Char | IntKind::UChar => 1,
            IntKind::Short | IntKind::UShort => 2,
            IntKind::Int | IntKind::UInt => 3,
            IntKind::Long | IntKind::ULong => 4,
            IntKind::LongLong | IntKind::ULongLong => 5,
        }
    }

    fn to_unsigned(self) -> IntKind {
        match self {
            IntKind::Char => IntKind::UChar,
            IntKind::Short => IntKind::UShort,
            IntKind::Int => IntKind::UInt,
            IntKind::Long => IntKind::ULong,
            IntKind::LongLong => IntKind::ULongLong,
            unsigned => unsigned,
        }
    }

    /// Truncate `value` to this kind's width and signedness
    ///
    /// 64-bit unsigned values keep their bit pattern in the `i64`.
    pub fn wrap(self, value: i64) -> i64 {
        let bits = self.bits();
        if bits == 64 {
            return value;
        }
        let mask = (1i64 << bits) - 1;
        let truncated = value & mask;
        if self.is_signed() && truncated & (1i64 << (bits - 1)) != 0 {
            truncated - (1i64 << bits)
        } else {
            truncated
        }
    }

    /// Integer kind spelled by a combination of specifier keywords
    pub fn from_specifiers(unsigned: bool, short: bool, longs: u32, char: bool) -> IntKind {
        let signed = match (char, short, longs) {
            (true, _, _) => IntKind::Char,
            (_, true, _) => IntKind::Short,
            (_, _, 0) => IntKind::Int,
            (_, _, 1) => IntKind::Long,
            _ => IntKind::LongLong,
        };
        if unsigned {
            signed.to_unsigned()
        } else {
            signed
        }
    }
}

/// Floating point kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatKind {
    Float,
    Double,
}

impl FloatKind {
    pub fn name(self) -> &'static str {
        match self {
            FloatKind::Float => "float",
            FloatKind::Double => "double",
        }
    }
}

/// Resolved type of a value or declaration
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Void,
    Bool,
    Int(IntKind),
    Float(FloatKind),
    /// Struct or class, by name
    Record(String),
    Enum(String),
    Pointer(Box<Type>),
    /// Type of `nullptr`
    Nullptr,
    /// Unknown type (for error recovery)
    Unknown,
}

impl Type {
    pub fn int() -> Type {
        Type::Int(IntKind::Int)
    }

    pub fn double() -> Type {
        Type::Float(FloatKind::Double)
    }

    pub fn pointer_to(pointee: Type) -> Type {
        Type::Pointer(Box::new(pointee))
    }

    /// Parse a C type name as written in a frame snapshot (`int`, `Foo *`)
    ///
    /// Names that are not builtin become records unless `is_enum` says otherwise.
    pub fn from_c_name(name: &str, is_enum: impl Fn(&str) -> bool) -> Type {
        let trimmed = name.trim();
        if let Some(inner) = trimmed.strip_suffix('*') {
            return Type::pointer_to(Type::from_c_name(inner, is_enum));
        }
        let words: Vec<&str> = trimmed.split_whitespace().collect();
        match words.as_slice() {
            ["void"] => Type::Void,
            ["bool"] => Type::Bool,
            ["float"] => Type::Float(FloatKind::Float),
            ["double"] => Type::Float(FloatKind::Double),
            ["std::nullptr_t"] => Type::Nullptr,
            [] => Type::Unknown,
            _ if words.iter().all(|w| {
                matches!(*w, "unsigned" | "signed" | "char" | "short" | "int" | "long")
            }) =>
            {
                let longs = words.iter().filter(|w| **w == "long").count() as u32;
                Type::Int(IntKind::from_specifiers(
                    words.contains(&"unsigned"),
                    words.contains(&"short"),
                    longs,
                    words.contains(&"char"),
                ))
            }
            _ => {
                let bare = trimmed
                    .strip_prefix("struct ")
                    .or_else(|| trimmed.strip_prefix("class "))
                    .or_else(|| trimmed.strip_prefix("enum "))
                    .unwrap_or(trimmed)
                    .trim();
                if is_enum(bare) {
                    Type::Enum(bare.to_string())
                } else {
                    Type::Record(bare.to_string())
                }
            }
        }
    }

    pub fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            Type::Bool | Type::Int(_) | Type::Float(_) | Type::Enum(_)
        )
    }

    pub fn is_scalar(&self) -> bool {
        self.is_arithmetic() || matches!(self, Type::Pointer(_) | Type::Nullptr)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Type::Unknown)
    }

    /// Record name behind this type, looking through one level of pointer when `arrow`
    pub fn record_name(&self, arrow: bool) -> Option<&str> {
        match (self, arrow) {
            (Type::Record(name), false) => Some(name),
            (Type::Pointer(inner), true) => match inner.as_ref() {
                Type::Record(name) => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Result of the usual arithmetic conversions
    pub fn common_arithmetic(&self, other: &Type) -> Type {
        match (self, other) {
            (Type::Unknown, _) | (_, Type::Unknown) => Type::Unknown,
            (Type::Float(FloatKind::Double), _) | (_, Type::Float(FloatKind::Double)) => {
                Type::double()
            }
            (Type::Float(_), _) | (_, Type::Float(_)) => Type::Float(FloatKind::Float),
            _ => {
                let a = self.promoted_int();
                let b = other.promoted_int();
                if a == b {
                    return Type::Int(a);
                }
                let (high, low) = if a.rank() >= b.rank() { (a, b) } else { (b, a) };
                if high.rank() == low.rank() {
                    Type::Int(high.to_unsigned())
                } else {
                    Type::Int(high)
                }
            }
        }
    }

    /// Integer promotion
    fn promoted_int(&self) -> IntKind {
        match self {
            Type::Int(kind) if kind.rank() >= IntKind::Int.rank() => *kind,
            _ => IntKind::Int,
        }
    }

    /// Get a human-readable name for this type
    pub fn display_name(&self) -> String {
        match self {
            Type::Void => "void".to_string(),
            Type::Bool => "bool".to_string(),
            Type::Int(kind) => kind.name().to_string(),
            Type::Float(kind) => kind.name().to_string(),
            Type::Record(name) | Type::Enum(name) => name.clone(),
            Type::Pointer(inner) => match inner.as_ref() {
                Type::Pointer(_) => format!("{}*", inner.display_name()),
                _ => format!("{} *", inner.display_name()),
            },
            Type::Nullptr => "std::nullptr_t".to_string(),
            Type::Unknown => "<unknown>".to_string(),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
