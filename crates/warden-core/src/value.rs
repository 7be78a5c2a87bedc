//! Values, value types, numeric dtypes, and buffer handle descriptors.

use std::fmt;

use smallvec::SmallVec;

use crate::id::SegmentId;

/// Numeric element type of a bulk buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dtype {
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 32-bit integer.
    I32,
    /// Signed 64-bit integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
}

impl Dtype {
    /// Size of one element in bytes.
    pub fn size(&self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I32 | Self::F32 => 4,
            Self::I64 | Self::F64 => 8,
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        write!(f, "{name}")
    }
}

/// Dimensions of a bulk buffer. Inline up to four axes.
pub type Shape = SmallVec<[usize; 4]>;

/// Descriptor for a zero-copy shared memory segment.
///
/// The handle is plain data: a generation-tagged segment ID plus the
/// byte length, dtype, and shape declared at allocation. The buffer pool
/// is the sole authority for the segment's storage and reference count;
/// a handle dereferences only through the pool, and only while at least
/// one attachment is outstanding.
#[derive(Clone, Debug, PartialEq, Eq)]
#[must_use]
pub struct BufferHandle {
    /// Which pool slot (and generation) this handle points into.
    pub segment: SegmentId,
    /// Total length of the segment in bytes.
    pub byte_len: usize,
    /// Element type.
    pub dtype: Dtype,
    /// Logical dimensions.
    pub shape: Shape,
}

impl BufferHandle {
    /// Number of elements implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the handle's dtype and shape match the given constraint.
    ///
    /// A `None` shape constraint matches any shape of the right dtype.
    pub fn matches(&self, dtype: Dtype, shape: Option<&[usize]>) -> bool {
        self.dtype == dtype && shape.is_none_or(|s| self.shape.as_slice() == s)
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buffer({}, {} x {:?}, {} bytes)",
            self.segment, self.dtype, self.shape, self.byte_len
        )
    }
}

/// Declared type of a value at a contract key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ValueType {
    /// Signed 64-bit integer scalar.
    Int,
    /// 64-bit float scalar.
    Float,
    /// Boolean scalar.
    Bool,
    /// UTF-8 text scalar.
    Text,
    /// A bulk buffer with a dtype and an optional fixed shape.
    Buffer {
        /// Required element type.
        dtype: Dtype,
        /// Required dimensions, or `None` to accept any shape.
        shape: Option<Shape>,
    },
    /// A nested mapping; children are governed by the same contract.
    Map,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Bool => write!(f, "bool"),
            Self::Text => write!(f, "text"),
            Self::Buffer { dtype, shape } => match shape {
                Some(s) => write!(f, "buffer<{dtype}, {s:?}>"),
                None => write!(f, "buffer<{dtype}>"),
            },
            Self::Map => write!(f, "map"),
        }
    }
}

/// A leaf value stored in the state tree.
///
/// Scalars are copied on read; only [`Value::Buffer`] is shared by raw
/// reference across isolation boundaries.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 text.
    Text(String),
    /// Handle to a shared buffer segment.
    Buffer(BufferHandle),
}

impl Value {
    /// The runtime type of this value.
    ///
    /// Buffer values report their concrete dtype and shape.
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Bool(_) => ValueType::Bool,
            Self::Text(_) => ValueType::Text,
            Self::Buffer(h) => ValueType::Buffer {
                dtype: h.dtype,
                shape: Some(h.shape.clone()),
            },
        }
    }

    /// Whether this value satisfies the declared type.
    pub fn matches_type(&self, declared: &ValueType) -> bool {
        match (self, declared) {
            (Self::Int(_), ValueType::Int)
            | (Self::Float(_), ValueType::Float)
            | (Self::Bool(_), ValueType::Bool)
            | (Self::Text(_), ValueType::Text) => true,
            (Self::Buffer(h), ValueType::Buffer { dtype, shape }) => {
                h.matches(*dtype, shape.as_ref().map(|s| s.as_slice()))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
            Self::Buffer(h) => write!(f, "{h}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    fn handle(dtype: Dtype, shape: Shape) -> BufferHandle {
        let byte_len = dtype.size() * shape.iter().product::<usize>();
        BufferHandle {
            segment: SegmentId::new(0, 0),
            byte_len,
            dtype,
            shape,
        }
    }

    #[test]
    fn dtype_sizes() {
        assert_eq!(Dtype::U8.size(), 1);
        assert_eq!(Dtype::F32.size(), 4);
        assert_eq!(Dtype::F64.size(), 8);
    }

    #[test]
    fn handle_element_count() {
        let h = handle(Dtype::F64, smallvec![3, 4]);
        assert_eq!(h.element_count(), 12);
        assert_eq!(h.byte_len, 96);
    }

    #[test]
    fn handle_shape_matching() {
        let h = handle(Dtype::F32, smallvec![2, 2]);
        assert!(h.matches(Dtype::F32, Some(&[2, 2])));
        assert!(h.matches(Dtype::F32, None));
        assert!(!h.matches(Dtype::F64, None));
        assert!(!h.matches(Dtype::F32, Some(&[4])));
    }

    #[test]
    fn scalar_type_matching() {
        assert!(Value::Int(3).matches_type(&ValueType::Int));
        assert!(!Value::Int(3).matches_type(&ValueType::Float));
        assert!(Value::Text("x".into()).matches_type(&ValueType::Text));
    }

    #[test]
    fn buffer_type_matching() {
        let v = Value::Buffer(handle(Dtype::F64, smallvec![8]));
        assert!(v.matches_type(&ValueType::Buffer {
            dtype: Dtype::F64,
            shape: None,
        }));
        assert!(v.matches_type(&ValueType::Buffer {
            dtype: Dtype::F64,
            shape: Some(smallvec![8]),
        }));
        assert!(!v.matches_type(&ValueType::Buffer {
            dtype: Dtype::F64,
            shape: Some(smallvec![9]),
        }));
    }
}
