//! Plain exchange representation of a state subtree.
//!
//! Produced by snapshot extraction for external consumers (the exchange
//! encoder): scalars copied, buffer handles resolved to raw bytes, no
//! handles or versions carried along.

use indexmap::IndexMap;

/// A state subtree with every shared resource resolved to plain data.
#[derive(Clone, Debug, PartialEq)]
pub enum PlainValue {
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes of a resolved buffer segment.
    Bytes(Vec<u8>),
    /// Nested mapping.
    Map(IndexMap<String, PlainValue>),
}

impl PlainValue {
    /// The children, if this is a map.
    pub fn as_map(&self) -> Option<&IndexMap<String, PlainValue>> {
        match self {
            Self::Map(children) => Some(children),
            _ => None,
        }
    }

    /// The resolved bytes, if this is a buffer.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}
