//! Typed multi-dimensional array values
//!
//! This module defines:
//! - ElementType: the fixed enumeration of storable element types
//! - TypedArray: an element type, a dimension vector, and a contiguous
//!   byte payload in column-major order
//!
//! A `TypedArray` is the unit of storage on the value side of every
//! key-value pair. The payload is opaque to the engine; only the codec
//! in the storage layer interprets it.
//!
//! ## Shape rules
//!
//! - Rank is always >= 1; a scalar has every dimension equal to 1.
//! - A zero-length dimension is legal and yields an empty payload.
//! - `data.len()` must equal `product(dims) * elem.byte_width()`,
//!   checked at construction.
//!
//! ## Layout
//!
//! Payload bytes are column-major (first dimension varies fastest) to
//! match the host's native array layout. The codec never reorders them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Element type of a stored array
///
/// Each variant has a fixed byte width and a stable one-byte wire tag.
/// `Char` holds UTF-16 code units (two bytes each, little-endian).
/// `Opaque` is the untyped fallback: raw bytes with width 1, dimensions
/// describing only the total byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// 64-bit IEEE-754 float
    F64,
    /// 32-bit IEEE-754 float
    F32,
    /// 8-bit signed integer
    I8,
    /// 16-bit signed integer
    I16,
    /// 32-bit signed integer
    I32,
    /// 64-bit signed integer
    I64,
    /// 8-bit unsigned integer
    U8,
    /// 16-bit unsigned integer
    U16,
    /// 32-bit unsigned integer
    U32,
    /// 64-bit unsigned integer
    U64,
    /// Boolean, one byte per element (0 or 1)
    Bool,
    /// UTF-16 code unit
    Char,
    /// Untyped raw bytes
    Opaque,
}

impl ElementType {
    /// All element types, in wire-tag order. Useful for exhaustive tests.
    pub const ALL: [ElementType; 13] = [
        ElementType::F64,
        ElementType::F32,
        ElementType::I8,
        ElementType::I16,
        ElementType::I32,
        ElementType::I64,
        ElementType::U8,
        ElementType::U16,
        ElementType::U32,
        ElementType::U64,
        ElementType::Bool,
        ElementType::Char,
        ElementType::Opaque,
    ];

    /// Byte width of one element
    pub fn byte_width(&self) -> usize {
        match self {
            ElementType::F64 | ElementType::I64 | ElementType::U64 => 8,
            ElementType::F32 | ElementType::I32 | ElementType::U32 => 4,
            ElementType::I16 | ElementType::U16 | ElementType::Char => 2,
            ElementType::I8 | ElementType::U8 | ElementType::Bool | ElementType::Opaque => 1,
        }
    }

    /// Stable one-byte tag used by the value codec
    pub fn tag(&self) -> u8 {
        match self {
            ElementType::F64 => 0x01,
            ElementType::F32 => 0x02,
            ElementType::I8 => 0x03,
            ElementType::I16 => 0x04,
            ElementType::I32 => 0x05,
            ElementType::I64 => 0x06,
            ElementType::U8 => 0x07,
            ElementType::U16 => 0x08,
            ElementType::U32 => 0x09,
            ElementType::U64 => 0x0A,
            ElementType::Bool => 0x0B,
            ElementType::Char => 0x0C,
            ElementType::Opaque => 0x0D,
        }
    }

    /// Reverse of [`tag`](Self::tag); `None` for unknown tags
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(ElementType::F64),
            0x02 => Some(ElementType::F32),
            0x03 => Some(ElementType::I8),
            0x04 => Some(ElementType::I16),
            0x05 => Some(ElementType::I32),
            0x06 => Some(ElementType::I64),
            0x07 => Some(ElementType::U8),
            0x08 => Some(ElementType::U16),
            0x09 => Some(ElementType::U32),
            0x0A => Some(ElementType::U64),
            0x0B => Some(ElementType::Bool),
            0x0C => Some(ElementType::Char),
            0x0D => Some(ElementType::Opaque),
            _ => None,
        }
    }

    /// Type name for diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            ElementType::F64 => "f64",
            ElementType::F32 => "f32",
            ElementType::I8 => "i8",
            ElementType::I16 => "i16",
            ElementType::I32 => "i32",
            ElementType::I64 => "i64",
            ElementType::U8 => "u8",
            ElementType::U16 => "u16",
            ElementType::U32 => "u32",
            ElementType::U64 => "u64",
            ElementType::Bool => "bool",
            ElementType::Char => "char",
            ElementType::Opaque => "opaque",
        }
    }
}

/// A dynamically typed, multi-dimensional array value
///
/// Invariants are enforced at construction and hold for the lifetime of
/// the value: rank >= 1 and the payload length matches the declared
/// shape and element type exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedArray {
    elem: ElementType,
    dims: Vec<u64>,
    data: Vec<u8>,
}

/// Overflow-checked element count for a dimension vector
fn element_count(dims: &[u64]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
}

impl TypedArray {
    /// Create an array, validating shape against payload
    ///
    /// Fails with `InvalidShape` when rank is 0, the element count
    /// overflows, or `data.len()` does not equal
    /// `product(dims) * elem.byte_width()`.
    pub fn new(elem: ElementType, dims: Vec<u64>, data: Vec<u8>) -> Result<Self> {
        if dims.is_empty() {
            return Err(Error::InvalidShape("rank must be at least 1".to_string()));
        }
        let count = element_count(&dims).ok_or_else(|| {
            Error::InvalidShape(format!("element count overflows for dims {:?}", dims))
        })?;
        let expected = count
            .checked_mul(elem.byte_width() as u64)
            .ok_or_else(|| {
                Error::InvalidShape(format!("payload size overflows for dims {:?}", dims))
            })?;
        if data.len() as u64 != expected {
            return Err(Error::InvalidShape(format!(
                "payload is {} bytes but {} {} elements require {}",
                data.len(),
                count,
                elem.name(),
                expected
            )));
        }
        Ok(TypedArray { elem, dims, data })
    }

    /// Element type
    pub fn elem(&self) -> ElementType {
        self.elem
    }

    /// Dimension sizes, in order
    pub fn dims(&self) -> &[u64] {
        &self.dims
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements
    pub fn len(&self) -> u64 {
        // Validated at construction, cannot overflow here
        self.dims.iter().product()
    }

    /// True when the array holds no elements (some dimension is zero)
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when every dimension is 1
    pub fn is_scalar(&self) -> bool {
        self.dims.iter().all(|&d| d == 1)
    }

    /// Raw column-major payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the array and return its payload
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    // ========== Constructors ==========

    /// 1x1 double scalar
    pub fn scalar_f64(v: f64) -> Self {
        TypedArray {
            elem: ElementType::F64,
            dims: vec![1],
            data: v.to_le_bytes().to_vec(),
        }
    }

    /// 1x1 signed 64-bit scalar
    pub fn scalar_i64(v: i64) -> Self {
        TypedArray {
            elem: ElementType::I64,
            dims: vec![1],
            data: v.to_le_bytes().to_vec(),
        }
    }

    /// 1x1 boolean scalar
    pub fn scalar_bool(v: bool) -> Self {
        TypedArray {
            elem: ElementType::Bool,
            dims: vec![1],
            data: vec![v as u8],
        }
    }

    /// Rank-1 double vector
    pub fn from_f64s(values: &[f64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        TypedArray {
            elem: ElementType::F64,
            dims: vec![values.len() as u64],
            data,
        }
    }

    /// Rank-1 signed 64-bit vector
    pub fn from_i64s(values: &[i64]) -> Self {
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            data.extend_from_slice(&v.to_le_bytes());
        }
        TypedArray {
            elem: ElementType::I64,
            dims: vec![values.len() as u64],
            data,
        }
    }

    /// Rank-1 boolean vector
    pub fn from_bools(values: &[bool]) -> Self {
        TypedArray {
            elem: ElementType::Bool,
            dims: vec![values.len() as u64],
            data: values.iter().map(|&b| b as u8).collect(),
        }
    }

    /// Character array from text, stored as UTF-16 code units
    pub fn text(s: &str) -> Self {
        let units: Vec<u16> = s.encode_utf16().collect();
        let mut data = Vec::with_capacity(units.len() * 2);
        for u in &units {
            data.extend_from_slice(&u.to_le_bytes());
        }
        TypedArray {
            elem: ElementType::Char,
            dims: vec![units.len() as u64],
            data,
        }
    }

    /// Untyped raw bytes; dimensions describe only the byte count
    pub fn opaque(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as u64;
        TypedArray {
            elem: ElementType::Opaque,
            dims: vec![len],
            data: bytes,
        }
    }

    // ========== Typed accessors ==========

    /// Decode as doubles; `None` when the element type is not `F64`
    pub fn as_f64s(&self) -> Option<Vec<f64>> {
        if self.elem != ElementType::F64 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(8)
                .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        )
    }

    /// Decode as signed 64-bit integers; `None` when not `I64`
    pub fn as_i64s(&self) -> Option<Vec<i64>> {
        if self.elem != ElementType::I64 {
            return None;
        }
        Some(
            self.data
                .chunks_exact(8)
                .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
                .collect(),
        )
    }

    /// Decode as booleans; `None` when not `Bool`
    pub fn as_bools(&self) -> Option<Vec<bool>> {
        if self.elem != ElementType::Bool {
            return None;
        }
        Some(self.data.iter().map(|&b| b != 0).collect())
    }

    /// Decode a `Char` array back to text
    ///
    /// `None` when the element type is not `Char`; unpaired surrogates
    /// are replaced rather than failing.
    pub fn as_text(&self) -> Option<String> {
        if self.elem != ElementType::Char {
            return None;
        }
        let units: Vec<u16> = self
            .data
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes(c.try_into().unwrap()))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }
}
