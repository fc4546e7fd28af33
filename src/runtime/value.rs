//! WebAssembly value representation
//!
//! [`Value`] is the untagged cell the interpreter moves around: eight bytes
//! with no record of which type they hold. The static type always comes from
//! the module (function signatures, local declarations, instruction
//! semantics). [`TypedValue`] pairs a value with its type for embedders.

use crate::parser::module::ValueType;
use fhex::ToHex;
use std::fmt;

/// Untagged runtime value.
///
/// i32 and f32 occupy the low 32 bits (i32 zero-extended), i64 and f64 use
/// the full 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Value(u64);

impl Value {
    pub const ZERO: Value = Value(0);

    pub fn from_bits(bits: u64) -> Self {
        Value(bits)
    }

    pub fn bits(self) -> u64 {
        self.0
    }

    pub fn from_i32(v: i32) -> Self {
        Value(v as u32 as u64)
    }

    pub fn from_u32(v: u32) -> Self {
        Value(v as u64)
    }

    pub fn from_i64(v: i64) -> Self {
        Value(v as u64)
    }

    pub fn from_u64(v: u64) -> Self {
        Value(v)
    }

    pub fn from_f32(v: f32) -> Self {
        Value(v.to_bits() as u64)
    }

    pub fn from_f64(v: f64) -> Self {
        Value(v.to_bits())
    }

    pub fn as_i32(self) -> i32 {
        self.0 as u32 as i32
    }

    pub fn as_u32(self) -> u32 {
        self.0 as u32
    }

    pub fn as_i64(self) -> i64 {
        self.0 as i64
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_f32(self) -> f32 {
        f32::from_bits(self.0 as u32)
    }

    pub fn as_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::from_i32(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::from_u32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::from_i64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::from_f32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::from_f64(v)
    }
}

/// A value together with its WebAssembly type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypedValue {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl TypedValue {
    pub fn typ(&self) -> ValueType {
        match self {
            TypedValue::I32(_) => ValueType::I32,
            TypedValue::I64(_) => ValueType::I64,
            TypedValue::F32(_) => ValueType::F32,
            TypedValue::F64(_) => ValueType::F64,
        }
    }

    /// Erase the type tag.
    pub fn to_value(self) -> Value {
        match self {
            TypedValue::I32(v) => Value::from_i32(v),
            TypedValue::I64(v) => Value::from_i64(v),
            TypedValue::F32(v) => Value::from_f32(v),
            TypedValue::F64(v) => Value::from_f64(v),
        }
    }

    /// Interpret an untagged value as `typ`.
    pub fn from_value(value: Value, typ: ValueType) -> Self {
        match typ {
            ValueType::I32 => TypedValue::I32(value.as_i32()),
            ValueType::I64 => TypedValue::I64(value.as_i64()),
            ValueType::F32 => TypedValue::F32(value.as_f32()),
            ValueType::F64 => TypedValue::F64(value.as_f64()),
        }
    }

    /// Parse a textual argument as a value of `typ`.
    ///
    /// Integers accept signed or unsigned decimal (wrapping into the type's
    /// bit width). Floats accept decimal notation, `nan`, `inf`, or a raw bit
    /// pattern written as `0x...`.
    pub fn parse(typ: ValueType, text: &str) -> Result<Self, String> {
        let text = text.trim();
        match typ {
            ValueType::I32 => text
                .parse::<i32>()
                .or_else(|_| text.parse::<u32>().map(|v| v as i32))
                .map(TypedValue::I32)
                .map_err(|e| format!("Failed to parse i32 from {text:?}: {e}")),
            ValueType::I64 => text
                .parse::<i64>()
                .or_else(|_| text.parse::<u64>().map(|v| v as i64))
                .map(TypedValue::I64)
                .map_err(|e| format!("Failed to parse i64 from {text:?}: {e}")),
            ValueType::F32 => match text.strip_prefix("0x") {
                Some(hex) => u32::from_str_radix(hex, 16)
                    .map(|bits| TypedValue::F32(f32::from_bits(bits)))
                    .map_err(|e| format!("Failed to parse f32 bits from {text:?}: {e}")),
                None => text
                    .parse::<f32>()
                    .map(TypedValue::F32)
                    .map_err(|e| format!("Failed to parse f32 from {text:?}: {e}")),
            },
            ValueType::F64 => match text.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16)
                    .map(|bits| TypedValue::F64(f64::from_bits(bits)))
                    .map_err(|e| format!("Failed to parse f64 bits from {text:?}: {e}")),
                None => text
                    .parse::<f64>()
                    .map(TypedValue::F64)
                    .map_err(|e| format!("Failed to parse f64 from {text:?}: {e}")),
            },
        }
    }
}

impl From<TypedValue> for Value {
    fn from(v: TypedValue) -> Self {
        v.to_value()
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::I32(v) => write!(f, "i32:{v}"),
            TypedValue::I64(v) => write!(f, "i64:{v}"),
            TypedValue::F32(v) => write!(f, "f32:{}", v.to_hex()),
            TypedValue::F64(v) => write!(f, "f64:{}", v.to_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i32_is_zero_extended() {
        assert_eq!(Value::from_i32(-1).bits(), 0xffff_ffff);
        assert_eq!(Value::from_i32(-1).as_i32(), -1);
        assert_eq!(Value::from_i32(-1).as_u32(), u32::MAX);
        assert_eq!(Value::from_i64(-1).bits(), u64::MAX);
    }

    #[test]
    fn test_float_bits_preserved() {
        let nan = f32::from_bits(0x7fc0_0001);
        assert_eq!(Value::from_f32(nan).as_f32().to_bits(), 0x7fc0_0001);
        assert_eq!(Value::from_f32(42.0).bits(), 0x4228_0000);
        assert_eq!(Value::from_f64(-0.0).as_f64().to_bits(), 0x8000_0000_0000_0000);
    }

    #[test]
    fn test_typed_round_trip_through_static_type() {
        let value = TypedValue::I32(-7).to_value();
        assert_eq!(TypedValue::from_value(value, ValueType::I32), TypedValue::I32(-7));
        // The same bits read as i64 are the zero-extended pattern
        assert_eq!(TypedValue::from_value(value, ValueType::I64), TypedValue::I64(0xffff_fff9));
    }

    #[test]
    fn test_parse() {
        assert_eq!(TypedValue::parse(ValueType::I32, "42").unwrap(), TypedValue::I32(42));
        assert_eq!(TypedValue::parse(ValueType::I32, "-1").unwrap(), TypedValue::I32(-1));
        assert_eq!(
            TypedValue::parse(ValueType::I32, "4294967295").unwrap(),
            TypedValue::I32(-1)
        );
        assert_eq!(TypedValue::parse(ValueType::F32, "1.5").unwrap(), TypedValue::F32(1.5));
        assert_eq!(
            TypedValue::parse(ValueType::F32, "0x42280000").unwrap(),
            TypedValue::F32(42.0)
        );
        assert!(TypedValue::parse(ValueType::I64, "nope").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TypedValue::I32(42).to_string(), "i32:42");
        assert_eq!(TypedValue::I64(-3).to_string(), "i64:-3");
        assert!(TypedValue::F64(42.0).to_string().starts_with("f64:"));
    }
}
