//! WebAssembly types and the subtyping predicates over them
//!
//! Covers number, vector and reference value types, the GC storage and
//! composite types, and the module-level type index space. Concrete heap
//! types are indices into a [`TypeSpace`]; recursion groups are compared
//! iso-recursively, so two structurally identical groups define equal types.

use super::instruction::DecodeError;
use super::reader::Reader;
use super::validate::ValidationErrorKind;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;

/// Abstract heap types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbsHeapType {
    Func,
    NoFunc,
    Extern,
    NoExtern,
    Any,
    Eq,
    I31,
    Struct,
    Array,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeapType {
    Abstract(AbsHeapType),
    /// A type index into the module's type space
    Concrete(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RefType {
    pub nullable: bool,
    pub heap: HeapType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    // Number types
    I32,
    I64,
    F32,
    F64,
    // Vector types
    V128,
    // Reference types
    Ref(RefType),
}

/// Field and element storage, which may be packed below i32
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageType {
    Val(ValueType),
    I8,
    I16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldType {
    pub storage: StorageType,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionType {
    pub parameters: Vec<ValueType>,
    pub return_types: Vec<ValueType>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructType {
    pub fields: Vec<FieldType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayType {
    pub element: FieldType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CompositeType {
    Func(FunctionType),
    Struct(StructType),
    Array(ArrayType),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubType {
    pub is_final: bool,
    pub supertypes: Vec<u32>,
    pub composite: CompositeType,
}

impl AbsHeapType {
    /// Decode from the single-byte (negative s33) encoding
    pub fn from_code(code: i64) -> Option<Self> {
        use AbsHeapType::*;
        Some(match code {
            -0x10 => Func,
            -0x0d => NoFunc,
            -0x11 => Extern,
            -0x0e => NoExtern,
            -0x12 => Any,
            -0x13 => Eq,
            -0x14 => I31,
            -0x15 => Struct,
            -0x16 => Array,
            -0x0f => None,
            _ => return Option::None,
        })
    }

    pub fn name(&self) -> &'static str {
        use AbsHeapType::*;
        match self {
            Func => "func",
            NoFunc => "nofunc",
            Extern => "extern",
            NoExtern => "noextern",
            Any => "any",
            Eq => "eq",
            I31 => "i31",
            Struct => "struct",
            Array => "array",
            None => "none",
        }
    }
}

impl HeapType {
    pub const ANY: HeapType = HeapType::Abstract(AbsHeapType::Any);
    pub const EQ: HeapType = HeapType::Abstract(AbsHeapType::Eq);
    pub const I31: HeapType = HeapType::Abstract(AbsHeapType::I31);
    pub const NONE: HeapType = HeapType::Abstract(AbsHeapType::None);
    pub const FUNC: HeapType = HeapType::Abstract(AbsHeapType::Func);
    pub const NOFUNC: HeapType = HeapType::Abstract(AbsHeapType::NoFunc);
    pub const EXTERN: HeapType = HeapType::Abstract(AbsHeapType::Extern);
    pub const NOEXTERN: HeapType = HeapType::Abstract(AbsHeapType::NoExtern);

    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let code = reader.read_vs33()?;
        Self::from_code(code)
    }

    fn from_code(code: i64) -> Result<Self, DecodeError> {
        if code >= 0 {
            return u32::try_from(code)
                .map(HeapType::Concrete)
                .map_err(|_| DecodeError::InvalidHeapType(code));
        }
        AbsHeapType::from_code(code)
            .map(HeapType::Abstract)
            .ok_or(DecodeError::InvalidHeapType(code))
    }
}

impl RefType {
    pub fn new(nullable: bool, heap: HeapType) -> Self {
        RefType { nullable, heap }
    }

    pub fn nullable(heap: HeapType) -> Self {
        RefType { nullable: true, heap }
    }

    pub fn non_null(heap: HeapType) -> Self {
        RefType { nullable: false, heap }
    }

    pub fn as_nullable(self) -> Self {
        RefType { nullable: true, ..self }
    }

    pub fn as_non_null(self) -> Self {
        RefType { nullable: false, ..self }
    }
}

impl ValueType {
    pub const FUNCREF: ValueType = ValueType::Ref(RefType { nullable: true, heap: HeapType::FUNC });
    pub const EXTERNREF: ValueType = ValueType::Ref(RefType { nullable: true, heap: HeapType::EXTERN });
    pub const ANYREF: ValueType = ValueType::Ref(RefType { nullable: true, heap: HeapType::ANY });

    pub fn is_num(&self) -> bool {
        matches!(self, ValueType::I32 | ValueType::I64 | ValueType::F32 | ValueType::F64)
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, ValueType::Ref(_))
    }

    /// Whether a zero/null default exists for this type
    pub fn is_defaultable(&self) -> bool {
        match self {
            ValueType::Ref(rt) => rt.nullable,
            _ => true,
        }
    }

    /// Decode a value type, including the GC `ref`/`ref null` forms and the
    /// single-byte reference shorthands.
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let byte = reader.read_byte()?;
        Self::decode_from(byte, reader)
    }

    fn decode_from(byte: u8, reader: &mut Reader) -> Result<Self, DecodeError> {
        match byte {
            0x7f => Ok(ValueType::I32),
            0x7e => Ok(ValueType::I64),
            0x7d => Ok(ValueType::F32),
            0x7c => Ok(ValueType::F64),
            0x7b => Ok(ValueType::V128),
            0x64 => Ok(ValueType::Ref(RefType::non_null(HeapType::decode(reader)?))),
            0x63 => Ok(ValueType::Ref(RefType::nullable(HeapType::decode(reader)?))),
            b => {
                // shorthand: single byte abstract heap type, always nullable
                let code = ((b as i8) << 1 >> 1) as i64;
                AbsHeapType::from_code(code)
                    .map(|h| ValueType::Ref(RefType::nullable(HeapType::Abstract(h))))
                    .ok_or(DecodeError::InvalidValueType(b))
            }
        }
    }
}

impl StorageType {
    pub fn is_packed(&self) -> bool {
        matches!(self, StorageType::I8 | StorageType::I16)
    }

    /// The operand type used on the stack for this storage
    pub fn unpacked(&self) -> ValueType {
        match self {
            StorageType::Val(t) => *t,
            StorageType::I8 | StorageType::I16 => ValueType::I32,
        }
    }

    /// Size in bytes of one element when initialised from a data segment.
    /// References have no byte representation.
    pub fn byte_width(&self) -> Option<u32> {
        match self {
            StorageType::I8 => Some(1),
            StorageType::I16 => Some(2),
            StorageType::Val(ValueType::I32 | ValueType::F32) => Some(4),
            StorageType::Val(ValueType::I64 | ValueType::F64) => Some(8),
            StorageType::Val(ValueType::V128) => Some(16),
            StorageType::Val(ValueType::Ref(_)) => None,
        }
    }

    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        // packed types share the value type byte space
        match reader.read_byte()? {
            0x78 => Ok(StorageType::I8),
            0x77 => Ok(StorageType::I16),
            b => ValueType::decode_from(b, reader).map(StorageType::Val),
        }
    }
}

impl FieldType {
    pub fn new(storage: StorageType, mutable: bool) -> Self {
        FieldType { storage, mutable }
    }
}

impl SubType {
    /// A final type with no declared supertypes
    pub fn plain(composite: CompositeType) -> Self {
        SubType {
            is_final: true,
            supertypes: vec![],
            composite,
        }
    }

    fn map_indices(&self, f: &impl Fn(u32) -> u32) -> SubType {
        let map_ht = |h: HeapType| match h {
            HeapType::Concrete(i) => HeapType::Concrete(f(i)),
            abs => abs,
        };
        let map_vt = |t: ValueType| match t {
            ValueType::Ref(rt) => ValueType::Ref(RefType::new(rt.nullable, map_ht(rt.heap))),
            t => t,
        };
        let map_field = |ft: FieldType| FieldType {
            storage: match ft.storage {
                StorageType::Val(t) => StorageType::Val(map_vt(t)),
                packed => packed,
            },
            mutable: ft.mutable,
        };
        SubType {
            is_final: self.is_final,
            supertypes: self.supertypes.iter().map(|&s| f(s)).collect(),
            composite: match &self.composite {
                CompositeType::Func(ft) => CompositeType::Func(FunctionType {
                    parameters: ft.parameters.iter().map(|&t| map_vt(t)).collect(),
                    return_types: ft.return_types.iter().map(|&t| map_vt(t)).collect(),
                }),
                CompositeType::Struct(st) => CompositeType::Struct(StructType {
                    fields: st.fields.iter().map(|&ft| map_field(ft)).collect(),
                }),
                CompositeType::Array(at) => CompositeType::Array(ArrayType {
                    element: map_field(at.element),
                }),
            },
        }
    }
}

/// Flag marking a group-relative index inside a canonicalisation key
const REC_LOCAL: u32 = 0x8000_0000;

/// The module's type index space, built from recursion groups
#[derive(Debug, Clone, Default)]
pub struct TypeSpace {
    types: Vec<SubType>,
    /// Canonical index per type: the first index defining an equivalent type
    canonical: Vec<u32>,
}

impl TypeSpace {
    /// Build a type space from recursion groups, in definition order.
    ///
    /// Checks that every referenced index exists, that declared supertypes
    /// precede their subtypes, are not final, and are matched structurally.
    pub fn new(groups: Vec<Vec<SubType>>) -> Result<Self, ValidationErrorKind> {
        let mut space = TypeSpace::default();
        let mut seen: HashMap<Vec<SubType>, u32> = HashMap::new();

        for group in groups {
            let start = space.types.len() as u32;
            let end = start + group.len() as u32;
            for (k, sub) in group.iter().enumerate() {
                let idx = start + k as u32;
                for &s in &sub.supertypes {
                    if s >= idx {
                        return Err(ValidationErrorKind::InvalidSupertype(idx, s));
                    }
                }
                let out_of_group = Cell::new(None);
                sub.map_indices(&|i| {
                    if i >= end {
                        out_of_group.set(Some(i));
                    }
                    i
                });
                if let Some(i) = out_of_group.get() {
                    return Err(ValidationErrorKind::UnknownType(i));
                }
            }

            // group-local references become relative, outer ones canonical
            let canonical = &space.canonical;
            let key: Vec<SubType> = group
                .iter()
                .map(|sub| {
                    sub.map_indices(&|i| {
                        if i >= start {
                            REC_LOCAL | (i - start)
                        } else {
                            canonical[i as usize]
                        }
                    })
                })
                .collect();
            let first = *seen.entry(key).or_insert(start);
            for k in 0..group.len() as u32 {
                space.canonical.push(first + k);
            }
            space.types.extend(group);

            for idx in start..end {
                space.check_declared_supertypes(idx)?;
            }
        }
        Ok(space)
    }

    /// Convenience for a space where every type is its own recursion group
    pub fn from_types(types: Vec<SubType>) -> Result<Self, ValidationErrorKind> {
        Self::new(types.into_iter().map(|t| vec![t]).collect())
    }

    fn check_declared_supertypes(&self, idx: u32) -> Result<(), ValidationErrorKind> {
        let sub = &self.types[idx as usize];
        for &s in &sub.supertypes {
            let sup = &self.types[s as usize];
            if sup.is_final || !self.composite_matches(&sub.composite, &sup.composite) {
                return Err(ValidationErrorKind::InvalidSupertype(idx, s));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn contains(&self, idx: u32) -> bool {
        (idx as usize) < self.types.len()
    }

    pub fn get(&self, idx: u32) -> Option<&SubType> {
        self.types.get(idx as usize)
    }

    /// The structural definition of a type index
    pub fn expand(&self, idx: u32) -> Option<&CompositeType> {
        self.get(idx).map(|s| &s.composite)
    }

    pub fn array_type(&self, idx: u32) -> Option<&ArrayType> {
        match self.expand(idx)? {
            CompositeType::Array(at) => Some(at),
            _ => None,
        }
    }

    pub fn struct_type(&self, idx: u32) -> Option<&StructType> {
        match self.expand(idx)? {
            CompositeType::Struct(st) => Some(st),
            _ => None,
        }
    }

    pub fn func_type(&self, idx: u32) -> Option<&FunctionType> {
        match self.expand(idx)? {
            CompositeType::Func(ft) => Some(ft),
            _ => None,
        }
    }

    pub fn canonical(&self, idx: u32) -> Option<u32> {
        self.canonical.get(idx as usize).copied()
    }

    /// The top of the hierarchy a heap type belongs to: any, func or extern
    pub fn top_heap_type(&self, ht: HeapType) -> HeapType {
        use AbsHeapType::*;
        match ht {
            HeapType::Abstract(Func | NoFunc) => HeapType::FUNC,
            HeapType::Abstract(Extern | NoExtern) => HeapType::EXTERN,
            HeapType::Abstract(_) => HeapType::ANY,
            HeapType::Concrete(i) => match self.expand(i) {
                Some(CompositeType::Func(_)) => HeapType::FUNC,
                _ => HeapType::ANY,
            },
        }
    }

    /// The uninhabited bottom of a heap type's hierarchy
    pub fn bottom_heap_type(&self, ht: HeapType) -> HeapType {
        match self.top_heap_type(ht) {
            HeapType::Abstract(AbsHeapType::Func) => HeapType::NOFUNC,
            HeapType::Abstract(AbsHeapType::Extern) => HeapType::NOEXTERN,
            _ => HeapType::NONE,
        }
    }

    pub fn heap_matches(&self, a: HeapType, b: HeapType) -> bool {
        use AbsHeapType::*;
        match (a, b) {
            (HeapType::Abstract(x), HeapType::Abstract(y)) => abs_matches(x, y),
            (HeapType::Abstract(x), HeapType::Concrete(j)) => match self.expand(j) {
                Some(CompositeType::Func(_)) => x == NoFunc,
                Some(_) => x == None,
                Option::None => false,
            },
            (HeapType::Concrete(i), HeapType::Abstract(y)) => match self.expand(i) {
                Some(CompositeType::Struct(_)) => matches!(y, Struct | Eq | Any),
                Some(CompositeType::Array(_)) => matches!(y, Array | Eq | Any),
                Some(CompositeType::Func(_)) => y == Func,
                Option::None => false,
            },
            (HeapType::Concrete(i), HeapType::Concrete(j)) => self.concrete_matches(i, j),
        }
    }

    fn concrete_matches(&self, i: u32, j: u32) -> bool {
        match (self.canonical(i), self.canonical(j)) {
            (Some(ci), Some(cj)) if ci == cj => return true,
            (Some(_), Some(_)) => {}
            _ => return false,
        }
        // supertypes always precede their subtypes, so this terminates
        self.types[i as usize]
            .supertypes
            .iter()
            .any(|&s| self.concrete_matches(s, j))
    }

    pub fn ref_matches(&self, a: RefType, b: RefType) -> bool {
        (!a.nullable || b.nullable) && self.heap_matches(a.heap, b.heap)
    }

    pub fn value_matches(&self, a: ValueType, b: ValueType) -> bool {
        match (a, b) {
            (ValueType::Ref(ra), ValueType::Ref(rb)) => self.ref_matches(ra, rb),
            (a, b) => a == b,
        }
    }

    pub fn storage_matches(&self, a: StorageType, b: StorageType) -> bool {
        match (a, b) {
            (StorageType::Val(ta), StorageType::Val(tb)) => self.value_matches(ta, tb),
            (a, b) => a == b,
        }
    }

    fn field_matches(&self, a: FieldType, b: FieldType) -> bool {
        if a.mutable != b.mutable {
            return false;
        }
        if a.mutable {
            // invariant storage for mutable fields
            self.storage_matches(a.storage, b.storage) && self.storage_matches(b.storage, a.storage)
        } else {
            self.storage_matches(a.storage, b.storage)
        }
    }

    fn composite_matches(&self, a: &CompositeType, b: &CompositeType) -> bool {
        match (a, b) {
            (CompositeType::Struct(sa), CompositeType::Struct(sb)) => {
                sa.fields.len() >= sb.fields.len()
                    && sa
                        .fields
                        .iter()
                        .zip(&sb.fields)
                        .all(|(&fa, &fb)| self.field_matches(fa, fb))
            }
            (CompositeType::Array(aa), CompositeType::Array(ab)) => {
                self.field_matches(aa.element, ab.element)
            }
            (CompositeType::Func(fa), CompositeType::Func(fb)) => {
                fa.parameters.len() == fb.parameters.len()
                    && fa.return_types.len() == fb.return_types.len()
                    && fb
                        .parameters
                        .iter()
                        .zip(&fa.parameters)
                        .all(|(&pb, &pa)| self.value_matches(pb, pa))
                    && fa
                        .return_types
                        .iter()
                        .zip(&fb.return_types)
                        .all(|(&ra, &rb)| self.value_matches(ra, rb))
            }
            _ => false,
        }
    }

    /// `rt1 \ rt2`: the type left on the fallthrough path of a cast branch
    pub fn ref_diff(&self, rt1: RefType, rt2: RefType) -> RefType {
        if rt2.nullable {
            rt1.as_non_null()
        } else {
            rt1
        }
    }
}

fn abs_matches(x: AbsHeapType, y: AbsHeapType) -> bool {
    use AbsHeapType::*;
    x == y
        || matches!(
            (x, y),
            (None, Any | Eq | I31 | Struct | Array)
                | (I31 | Struct | Array, Eq | Any)
                | (Eq, Any)
                | (NoFunc, Func)
                | (NoExtern, Extern)
        )
}

impl fmt::Display for HeapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapType::Abstract(a) => write!(f, "{}", a.name()),
            HeapType::Concrete(i) => write!(f, "${i}"),
        }
    }
}

impl fmt::Display for RefType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nullable {
            write!(f, "(ref null {})", self.heap)
        } else {
            write!(f, "(ref {})", self.heap)
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::I32 => write!(f, "i32"),
            ValueType::I64 => write!(f, "i64"),
            ValueType::F32 => write!(f, "f32"),
            ValueType::F64 => write!(f, "f64"),
            ValueType::V128 => write!(f, "v128"),
            ValueType::Ref(rt) => write!(f, "{rt}"),
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Val(t) => write!(f, "{t}"),
            StorageType::I8 => write!(f, "i8"),
            StorageType::I16 => write!(f, "i16"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array_of(storage: StorageType, mutable: bool) -> CompositeType {
        CompositeType::Array(ArrayType {
            element: FieldType::new(storage, mutable),
        })
    }

    fn struct_of(fields: Vec<FieldType>) -> CompositeType {
        CompositeType::Struct(StructType { fields })
    }

    fn open(supertypes: Vec<u32>, composite: CompositeType) -> SubType {
        SubType {
            is_final: false,
            supertypes,
            composite,
        }
    }

    #[test]
    fn test_abstract_lattice() {
        let space = TypeSpace::default();
        assert!(space.heap_matches(HeapType::I31, HeapType::EQ));
        assert!(space.heap_matches(HeapType::EQ, HeapType::ANY));
        assert!(space.heap_matches(HeapType::NONE, HeapType::I31));
        assert!(space.heap_matches(HeapType::NOFUNC, HeapType::FUNC));
        assert!(!space.heap_matches(HeapType::ANY, HeapType::EQ));
        assert!(!space.heap_matches(HeapType::EXTERN, HeapType::ANY));
        assert!(!space.heap_matches(HeapType::NONE, HeapType::FUNC));
    }

    #[test]
    fn test_concrete_against_abstract() {
        let space = TypeSpace::from_types(vec![
            SubType::plain(array_of(StorageType::I8, true)),
            SubType::plain(struct_of(vec![])),
            SubType::plain(CompositeType::Func(FunctionType {
                parameters: vec![],
                return_types: vec![],
            })),
        ])
        .unwrap();
        let array = HeapType::Abstract(AbsHeapType::Array);
        assert!(space.heap_matches(HeapType::Concrete(0), array));
        assert!(space.heap_matches(HeapType::Concrete(0), HeapType::EQ));
        assert!(!space.heap_matches(HeapType::Concrete(0), HeapType::Abstract(AbsHeapType::Struct)));
        assert!(space.heap_matches(HeapType::Concrete(1), HeapType::ANY));
        assert!(space.heap_matches(HeapType::Concrete(2), HeapType::FUNC));
        assert!(space.heap_matches(HeapType::NONE, HeapType::Concrete(0)));
        assert!(space.heap_matches(HeapType::NOFUNC, HeapType::Concrete(2)));
        assert!(!space.heap_matches(HeapType::NONE, HeapType::Concrete(2)));
        assert_eq!(space.top_heap_type(HeapType::Concrete(2)), HeapType::FUNC);
        assert_eq!(space.bottom_heap_type(HeapType::Concrete(1)), HeapType::NONE);
    }

    #[test]
    fn test_declared_supertype_chain() {
        let i32_field = FieldType::new(StorageType::Val(ValueType::I32), false);
        let space = TypeSpace::from_types(vec![
            open(vec![], struct_of(vec![i32_field])),
            open(vec![0], struct_of(vec![i32_field, i32_field])),
            SubType {
                is_final: true,
                supertypes: vec![1],
                composite: struct_of(vec![i32_field, i32_field, i32_field]),
            },
        ])
        .unwrap();
        assert!(space.heap_matches(HeapType::Concrete(2), HeapType::Concrete(0)));
        assert!(space.heap_matches(HeapType::Concrete(1), HeapType::Concrete(0)));
        assert!(!space.heap_matches(HeapType::Concrete(0), HeapType::Concrete(1)));
    }

    #[test]
    fn test_invalid_supertypes_rejected() {
        let i32_field = FieldType::new(StorageType::Val(ValueType::I32), false);
        // final supertype
        let err = TypeSpace::from_types(vec![
            SubType::plain(struct_of(vec![i32_field])),
            open(vec![0], struct_of(vec![i32_field])),
        ])
        .unwrap_err();
        assert_eq!(err, ValidationErrorKind::InvalidSupertype(1, 0));

        // field types do not match
        let f64_field = FieldType::new(StorageType::Val(ValueType::F64), false);
        assert!(TypeSpace::from_types(vec![
            open(vec![], struct_of(vec![i32_field])),
            open(vec![0], struct_of(vec![f64_field])),
        ])
        .is_err());
    }

    #[test]
    fn test_iso_recursive_equivalence() {
        // two identical self-referential groups are the same type
        let list = |self_idx: u32| {
            SubType::plain(struct_of(vec![FieldType::new(
                StorageType::Val(ValueType::Ref(RefType::nullable(HeapType::Concrete(self_idx)))),
                false,
            )]))
        };
        let space = TypeSpace::new(vec![vec![list(0)], vec![list(1)]]).unwrap();
        assert_eq!(space.canonical(0), space.canonical(1));
        assert!(space.heap_matches(HeapType::Concrete(1), HeapType::Concrete(0)));

        let other = TypeSpace::new(vec![
            vec![SubType::plain(array_of(StorageType::I8, false))],
            vec![SubType::plain(array_of(StorageType::I16, false))],
        ])
        .unwrap();
        assert!(!other.heap_matches(HeapType::Concrete(1), HeapType::Concrete(0)));
    }

    #[test]
    fn test_forward_reference_out_of_group_rejected() {
        let bad = SubType::plain(struct_of(vec![FieldType::new(
            StorageType::Val(ValueType::Ref(RefType::nullable(HeapType::Concrete(1)))),
            false,
        )]));
        assert!(TypeSpace::new(vec![vec![bad], vec![SubType::plain(struct_of(vec![]))]]).is_err());
    }

    #[test]
    fn test_ref_nullability() {
        let space = TypeSpace::default();
        let non_null_any = RefType::non_null(HeapType::ANY);
        let null_any = RefType::nullable(HeapType::ANY);
        assert!(space.ref_matches(non_null_any, null_any));
        assert!(!space.ref_matches(null_any, non_null_any));
        assert_eq!(space.ref_diff(null_any, RefType::nullable(HeapType::I31)), non_null_any);
        assert_eq!(space.ref_diff(null_any, RefType::non_null(HeapType::I31)), null_any);
    }

    #[test]
    fn test_decode_value_types() {
        let decode = |bytes: Vec<u8>| ValueType::decode(&mut Reader::new(bytes)).unwrap();
        assert_eq!(decode(vec![0x7f]), ValueType::I32);
        assert_eq!(decode(vec![0x6e]), ValueType::ANYREF);
        assert_eq!(
            decode(vec![0x64, 0x03]),
            ValueType::Ref(RefType::non_null(HeapType::Concrete(3)))
        );
        assert_eq!(
            decode(vec![0x63, 0x6c]),
            ValueType::Ref(RefType::nullable(HeapType::I31))
        );
        assert!(ValueType::decode(&mut Reader::new(vec![0x40])).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueType::ANYREF.to_string(), "(ref null any)");
        assert_eq!(
            ValueType::Ref(RefType::non_null(HeapType::Concrete(4))).to_string(),
            "(ref $4)"
        );
        assert_eq!(StorageType::I16.to_string(), "i16");
    }
}
