//! column value storage and per-row byte accounting.

use bytes::Bytes;
use dp_wire::{ScalarType, WireColumn};

/// one typed, ordered column of values. `None` entries are explicit nulls.
#[derive(Debug, Clone)]
pub enum ColumnValues {
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float32(Vec<Option<f32>>),
    Float64(Vec<Option<f64>>),
    Bool(Vec<Option<bool>>),
    Str(Vec<Option<String>>),
    Bytes(Vec<Option<Bytes>>),
}

impl ColumnValues {
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Self::Int32(_) => ScalarType::Int32,
            Self::Int64(_) => ScalarType::Int64,
            Self::Float32(_) => ScalarType::Float32,
            Self::Float64(_) => ScalarType::Float64,
            Self::Bool(_) => ScalarType::Bool,
            Self::Str(_) => ScalarType::Str,
            Self::Bytes(_) => ScalarType::Bytes,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Str(v) => v.len(),
            Self::Bytes(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// serialized size of a single row's value, for per-row stride
    /// computation (spec §4.1). scalars use a fixed-width estimate; variable
    /// size values (str/bytes) measure the actual payload plus a small
    /// length-prefix overhead, matching how the wire codec would frame them.
    pub fn row_byte_size(&self, row: usize) -> usize {
        const LEN_PREFIX: usize = 4;
        match self {
            Self::Int32(_) => 4,
            Self::Int64(_) => 8,
            Self::Float32(_) => 4,
            Self::Float64(_) => 8,
            Self::Bool(_) => 1,
            Self::Str(v) => v[row].as_ref().map_or(0, |s| s.len() + LEN_PREFIX),
            Self::Bytes(v) => v[row].as_ref().map_or(0, |b| b.len() + LEN_PREFIX),
        }
    }

    /// slice out a contiguous row range as a fresh, owned column of values.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        match self {
            Self::Int32(v) => Self::Int32(v[start..end].to_vec()),
            Self::Int64(v) => Self::Int64(v[start..end].to_vec()),
            Self::Float32(v) => Self::Float32(v[start..end].to_vec()),
            Self::Float64(v) => Self::Float64(v[start..end].to_vec()),
            Self::Bool(v) => Self::Bool(v[start..end].to_vec()),
            Self::Str(v) => Self::Str(v[start..end].to_vec()),
            Self::Bytes(v) => Self::Bytes(v[start..end].to_vec()),
        }
    }

    pub fn total_byte_size(&self) -> usize {
        (0..self.len()).map(|i| self.row_byte_size(i)).sum()
    }

    /// an all-null column of `len` rows of `ty`, for sources the assembler
    /// must represent in a block that never reported them.
    pub fn nulls(ty: ScalarType, len: usize) -> Self {
        match ty {
            ScalarType::Int32 => Self::Int32(vec![None; len]),
            ScalarType::Int64 => Self::Int64(vec![None; len]),
            ScalarType::Float32 => Self::Float32(vec![None; len]),
            ScalarType::Float64 => Self::Float64(vec![None; len]),
            ScalarType::Bool => Self::Bool(vec![None; len]),
            ScalarType::Str => Self::Str(vec![None; len]),
            ScalarType::Bytes => Self::Bytes(vec![None; len]),
            ScalarType::Unsupported => unreachable!("Unsupported never reaches a typed column"),
        }
    }

    /// append `other`'s rows after this column's rows. panics if the
    /// variants differ; callers must have already enforced type consistency
    /// (the assembler's `TypeConflict` check runs before this is called).
    pub fn concat(self, other: Self) -> Self {
        match (self, other) {
            (Self::Int32(mut a), Self::Int32(b)) => {
                a.extend(b);
                Self::Int32(a)
            }
            (Self::Int64(mut a), Self::Int64(b)) => {
                a.extend(b);
                Self::Int64(a)
            }
            (Self::Float32(mut a), Self::Float32(b)) => {
                a.extend(b);
                Self::Float32(a)
            }
            (Self::Float64(mut a), Self::Float64(b)) => {
                a.extend(b);
                Self::Float64(a)
            }
            (Self::Bool(mut a), Self::Bool(b)) => {
                a.extend(b);
                Self::Bool(a)
            }
            (Self::Str(mut a), Self::Str(b)) => {
                a.extend(b);
                Self::Str(a)
            }
            (Self::Bytes(mut a), Self::Bytes(b)) => {
                a.extend(b);
                Self::Bytes(a)
            }
            (a, b) => panic!("cannot concatenate columns of different types ({:?} vs {:?})", a.scalar_type(), b.scalar_type()),
        }
    }
}

/// the wire's `Unsupported` sentinel has no counterpart here: encountering it
/// is a hard failure for the caller to turn into `Error::UnsupportedType`,
/// never a value that silently propagates (spec §9 design note).
impl TryFrom<WireColumn> for ColumnValues {
    type Error = ();

    fn try_from(col: WireColumn) -> Result<Self, ()> {
        Ok(match col {
            WireColumn::Int32(v) => Self::Int32(v),
            WireColumn::Int64(v) => Self::Int64(v),
            WireColumn::Float32(v) => Self::Float32(v),
            WireColumn::Float64(v) => Self::Float64(v),
            WireColumn::Bool(v) => Self::Bool(v),
            WireColumn::Str(v) => Self::Str(v),
            WireColumn::Bytes(v) => Self::Bytes(v),
            WireColumn::Unsupported => return Err(()),
        })
    }
}
