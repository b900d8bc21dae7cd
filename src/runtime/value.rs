//! Runtime representation of values and references

use super::store::{ArrayAddr, FuncAddr, StructAddr};
use crate::parser::types::{AbsHeapType, HeapType, RefType, StorageType, ValueType};
use fhex::ToHex;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    V128([u8; 16]),
    Ref(Ref),
}

/// A reference value. Null references remember the heap type they were
/// created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ref {
    Null(HeapType),
    Any(AnyRef),
    Func(FuncAddr),
    Extern(ExternRef),
}

/// A non-null reference in the `any` hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnyRef {
    /// Unboxed 31-bit integer, held sign-extended from bit 30
    I31(i32),
    Struct(StructAddr),
    Array(ArrayAddr),
    /// An internalized host value
    Host(u32),
}

/// A non-null reference in the `extern` hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExternRef {
    Host(u32),
    /// An externalized internal reference
    Any(AnyRef),
}

impl AnyRef {
    /// Build an i31 from the low 31 bits of `value`
    pub fn i31(value: i32) -> AnyRef {
        AnyRef::I31(value.wrapping_shl(1) >> 1)
    }
}

impl Ref {
    pub fn is_null(&self) -> bool {
        matches!(self, Ref::Null(_))
    }

    /// `extern.convert_any`
    pub fn externalize(self) -> Ref {
        match self {
            Ref::Null(_) => Ref::Null(HeapType::NOEXTERN),
            Ref::Any(AnyRef::Host(h)) => Ref::Extern(ExternRef::Host(h)),
            Ref::Any(a) => Ref::Extern(ExternRef::Any(a)),
            other => other,
        }
    }

    /// `any.convert_extern`
    pub fn internalize(self) -> Ref {
        match self {
            Ref::Null(_) => Ref::Null(HeapType::NONE),
            Ref::Extern(ExternRef::Host(h)) => Ref::Any(AnyRef::Host(h)),
            Ref::Extern(ExternRef::Any(a)) => Ref::Any(a),
            other => other,
        }
    }
}

impl Value {
    /// Static shape of the value. References report only their kind; the
    /// defining type of a heap object lives in the store.
    pub fn typ(&self) -> ValueType {
        match self {
            Value::I32(_) => ValueType::I32,
            Value::I64(_) => ValueType::I64,
            Value::F32(_) => ValueType::F32,
            Value::F64(_) => ValueType::F64,
            Value::V128(_) => ValueType::V128,
            Value::Ref(r) => ValueType::Ref(match r {
                Ref::Null(ht) => RefType::nullable(*ht),
                Ref::Any(AnyRef::I31(_)) => RefType::non_null(HeapType::I31),
                Ref::Any(AnyRef::Struct(_)) => RefType::non_null(HeapType::Abstract(AbsHeapType::Struct)),
                Ref::Any(AnyRef::Array(_)) => RefType::non_null(HeapType::Abstract(AbsHeapType::Array)),
                Ref::Any(AnyRef::Host(_)) => RefType::non_null(HeapType::ANY),
                Ref::Func(_) => RefType::non_null(HeapType::FUNC),
                Ref::Extern(_) => RefType::non_null(HeapType::EXTERN),
            }),
        }
    }

    /// The zero or null value stored by `*.new_default`
    pub fn default_for(t: ValueType) -> Value {
        match t {
            ValueType::I32 => Value::I32(0),
            ValueType::I64 => Value::I64(0),
            ValueType::F32 => Value::F32(0.0),
            ValueType::F64 => Value::F64(0.0),
            ValueType::V128 => Value::V128([0; 16]),
            ValueType::Ref(rt) => Value::Ref(Ref::Null(rt.heap)),
        }
    }

    pub fn default_for_storage(storage: StorageType) -> Value {
        Value::default_for(storage.unpacked())
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_v128(&self) -> Option<[u8; 16]> {
        match self {
            Value::V128(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<Ref> {
        match self {
            Value::Ref(r) => Some(*r),
            _ => None,
        }
    }

    /// Little-endian encoding, as laid out in memory or a data segment
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Value::I32(v) => v.to_le_bytes().to_vec(),
            Value::I64(v) => v.to_le_bytes().to_vec(),
            Value::F32(v) => v.to_le_bytes().to_vec(),
            Value::F64(v) => v.to_le_bytes().to_vec(),
            Value::V128(v) => v.to_vec(),
            Value::Ref(_) => vec![],
        }
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::Ref(r)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Null(ht) => write!(f, "ref.null {ht}"),
            Ref::Any(AnyRef::I31(v)) => write!(f, "ref.i31 {v}"),
            Ref::Any(AnyRef::Struct(a)) => write!(f, "ref.struct {}", a.0),
            Ref::Any(AnyRef::Array(a)) => write!(f, "ref.array {}", a.0),
            Ref::Any(AnyRef::Host(h)) => write!(f, "ref.host {h}"),
            Ref::Func(a) => write!(f, "ref.func {}", a.0),
            Ref::Extern(ExternRef::Host(h)) => write!(f, "ref.extern {h}"),
            Ref::Extern(ExternRef::Any(a)) => write!(f, "ref.extern ({})", Ref::Any(*a)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I32(v) => write!(f, "i32:{v}"),
            Value::I64(v) => write!(f, "i64:{v}"),
            Value::F32(v) => write!(f, "f32:{}", v.to_hex()),
            Value::F64(v) => write!(f, "f64:{}", v.to_hex()),
            Value::V128(v) => write!(f, "v128:{}", hex::encode(v)),
            Value::Ref(r) => write!(f, "{r}"),
        }
    }
}
