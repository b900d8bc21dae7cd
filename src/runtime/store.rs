//! The store: every runtime object, addressed by index
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Store                           │
//! │  funcs     [FuncAddr]   -> FunctionInstance { type_idx } │
//! │  memories  [MemoryAddr] -> Memory                        │
//! │  datas     [DataAddr]   -> DataInstance { bytes }        │
//! │  elems     [ElemAddr]   -> ElemInstance { items }        │
//! │  structs   [StructAddr] -> StoreStruct { fields }        │
//! │  arrays    [ArrayAddr]  -> StoreArray { elements }       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Addresses are allocated monotonically and never reused. Heap objects are
//! never freed; reachability is not tracked. Each heap object records the
//! type index it was allocated with, relative to the allocating module's
//! type space.

use super::config::Config;
use super::instance::ModuleInstance;
use super::memory::Memory;
use super::value::{AnyRef, Ref, Value};
use super::{RuntimeError, Trap};
use crate::parser::module::Module;
use crate::parser::types::{HeapType, RefType, TypeSpace};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoryAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DataAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElemAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StructAddr(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArrayAddr(pub usize);

/// A function known only by its type; bodies are executed elsewhere
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInstance {
    pub type_idx: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataInstance {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ElemInstance {
    pub ref_type: RefType,
    pub items: Vec<Ref>,
}

/// Bounds-check the range `[offset, offset + count)` against `len`
fn check_range(offset: u32, count: u32, len: usize) -> Result<usize, RuntimeError> {
    let end = offset as u64 + count as u64;
    if end > len as u64 {
        return Err(Trap::ArrayRangeOutOfBounds {
            offset,
            count,
            len: len as u32,
        }
        .into());
    }
    Ok(offset as usize)
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreStruct {
    pub type_idx: u32,
    pub fields: Vec<Value>,
}

impl StoreStruct {
    pub fn get(&self, field: u32) -> Result<Value, RuntimeError> {
        self.fields
            .get(field as usize)
            .copied()
            .ok_or_else(|| RuntimeError::fault(format!("struct field {field} out of range")))
    }

    pub fn set(&mut self, field: u32, value: Value) -> Result<(), RuntimeError> {
        let slot = self
            .fields
            .get_mut(field as usize)
            .ok_or_else(|| RuntimeError::fault(format!("struct field {field} out of range")))?;
        *slot = value;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreArray {
    pub type_idx: u32,
    pub elements: Vec<Value>,
}

impl StoreArray {
    pub fn len(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn get(&self, index: u32) -> Result<Value, RuntimeError> {
        self.elements.get(index as usize).copied().ok_or_else(|| {
            Trap::ArrayOutOfBounds {
                index,
                len: self.len(),
            }
            .into()
        })
    }

    pub fn set(&mut self, index: u32, value: Value) -> Result<(), RuntimeError> {
        let len = self.len();
        let slot = self
            .elements
            .get_mut(index as usize)
            .ok_or(Trap::ArrayOutOfBounds { index, len })?;
        *slot = value;
        Ok(())
    }

    /// Elements `[offset, offset + count)`
    pub fn slice(&self, offset: u32, count: u32) -> Result<&[Value], RuntimeError> {
        let start = check_range(offset, count, self.elements.len())?;
        Ok(&self.elements[start..start + count as usize])
    }

    pub fn fill(&mut self, offset: u32, value: Value, count: u32) -> Result<(), RuntimeError> {
        let start = check_range(offset, count, self.elements.len())?;
        self.elements[start..start + count as usize].fill(value);
        Ok(())
    }

    /// Copy within one array; overlapping ranges behave like memmove
    pub fn copy_within(&mut self, dst: u32, src: u32, count: u32) -> Result<(), RuntimeError> {
        let len = self.elements.len();
        let dst = check_range(dst, count, len)?;
        let src = check_range(src, count, len)?;
        self.elements.copy_within(src..src + count as usize, dst);
        Ok(())
    }

    /// Overwrite elements starting at `dst` with `values`
    pub fn init(&mut self, dst: u32, values: &[Value]) -> Result<(), RuntimeError> {
        let start = check_range(dst, values.len() as u32, self.elements.len())?;
        self.elements[start..start + values.len()].copy_from_slice(values);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Store {
    config: Config,
    funcs: Vec<FunctionInstance>,
    memories: Vec<Memory>,
    datas: Vec<DataInstance>,
    elems: Vec<ElemInstance>,
    structs: Vec<StoreStruct>,
    arrays: Vec<StoreArray>,
}

fn unknown(kind: &str, addr: usize) -> RuntimeError {
    RuntimeError::fault(format!("unknown {kind} address {addr}"))
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    pub fn with_config(config: Config) -> Self {
        Store {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate the module's functions, memories and segments
    pub fn instantiate(&mut self, module: &Module) -> Result<ModuleInstance, RuntimeError> {
        ModuleInstance::instantiate(self, module)
    }

    pub fn allocate_function(&mut self, type_idx: u32) -> FuncAddr {
        self.funcs.push(FunctionInstance { type_idx });
        FuncAddr(self.funcs.len() - 1)
    }

    pub fn allocate_memory(&mut self, memory: Memory) -> MemoryAddr {
        self.memories.push(memory);
        MemoryAddr(self.memories.len() - 1)
    }

    pub fn allocate_data(&mut self, bytes: Vec<u8>) -> DataAddr {
        self.datas.push(DataInstance { bytes });
        DataAddr(self.datas.len() - 1)
    }

    pub fn allocate_elem(&mut self, ref_type: RefType, items: Vec<Ref>) -> ElemAddr {
        self.elems.push(ElemInstance { ref_type, items });
        ElemAddr(self.elems.len() - 1)
    }

    pub fn allocate_struct(&mut self, type_idx: u32, fields: Vec<Value>) -> StructAddr {
        let addr = StructAddr(self.structs.len());
        debug!("allocate struct {} of type {type_idx} with {} fields", addr.0, fields.len());
        self.structs.push(StoreStruct { type_idx, fields });
        addr
    }

    pub fn allocate_array(&mut self, type_idx: u32, elements: Vec<Value>) -> ArrayAddr {
        let addr = ArrayAddr(self.arrays.len());
        debug!("allocate array {} of type {type_idx} with {} elements", addr.0, elements.len());
        self.arrays.push(StoreArray { type_idx, elements });
        addr
    }

    pub fn function(&self, addr: FuncAddr) -> Result<&FunctionInstance, RuntimeError> {
        self.funcs.get(addr.0).ok_or_else(|| unknown("function", addr.0))
    }

    pub fn memory(&self, addr: MemoryAddr) -> Result<&Memory, RuntimeError> {
        self.memories.get(addr.0).ok_or_else(|| unknown("memory", addr.0))
    }

    pub fn memory_mut(&mut self, addr: MemoryAddr) -> Result<&mut Memory, RuntimeError> {
        self.memories.get_mut(addr.0).ok_or_else(|| unknown("memory", addr.0))
    }

    pub fn data(&self, addr: DataAddr) -> Result<&DataInstance, RuntimeError> {
        self.datas.get(addr.0).ok_or_else(|| unknown("data", addr.0))
    }

    pub fn elem(&self, addr: ElemAddr) -> Result<&ElemInstance, RuntimeError> {
        self.elems.get(addr.0).ok_or_else(|| unknown("elem", addr.0))
    }

    pub fn contains_struct(&self, addr: StructAddr) -> bool {
        addr.0 < self.structs.len()
    }

    pub fn contains_array(&self, addr: ArrayAddr) -> bool {
        addr.0 < self.arrays.len()
    }

    pub fn struct_ref(&self, addr: StructAddr) -> Result<&StoreStruct, RuntimeError> {
        self.structs.get(addr.0).ok_or_else(|| unknown("struct", addr.0))
    }

    pub fn struct_mut(&mut self, addr: StructAddr) -> Result<&mut StoreStruct, RuntimeError> {
        self.structs.get_mut(addr.0).ok_or_else(|| unknown("struct", addr.0))
    }

    pub fn array_ref(&self, addr: ArrayAddr) -> Result<&StoreArray, RuntimeError> {
        self.arrays.get(addr.0).ok_or_else(|| unknown("array", addr.0))
    }

    pub fn array_mut(&mut self, addr: ArrayAddr) -> Result<&mut StoreArray, RuntimeError> {
        self.arrays.get_mut(addr.0).ok_or_else(|| unknown("array", addr.0))
    }

    pub fn struct_count(&self) -> usize {
        self.structs.len()
    }

    pub fn array_count(&self) -> usize {
        self.arrays.len()
    }

    /// Copy `count` elements between two arrays, which may be the same one
    pub fn copy_array(
        &mut self,
        dst: ArrayAddr,
        dst_offset: u32,
        src: ArrayAddr,
        src_offset: u32,
        count: u32,
    ) -> Result<(), RuntimeError> {
        if dst == src {
            return self.array_mut(dst)?.copy_within(dst_offset, src_offset, count);
        }
        let dst_len = self.array_ref(dst)?.elements.len();
        check_range(dst_offset, count, dst_len)?;
        let values = self.array_ref(src)?.slice(src_offset, count)?.to_vec();
        self.array_mut(dst)?.init(dst_offset, &values)
    }

    /// Heap type of the object a non-null reference points to
    pub fn heap_type_of(&self, r: &Ref) -> Result<Option<HeapType>, RuntimeError> {
        Ok(Some(match r {
            Ref::Null(_) => return Ok(None),
            Ref::Any(AnyRef::I31(_)) => HeapType::I31,
            Ref::Any(AnyRef::Struct(a)) => HeapType::Concrete(self.struct_ref(*a)?.type_idx),
            Ref::Any(AnyRef::Array(a)) => HeapType::Concrete(self.array_ref(*a)?.type_idx),
            Ref::Any(AnyRef::Host(_)) => HeapType::ANY,
            Ref::Func(a) => HeapType::Concrete(self.function(*a)?.type_idx),
            Ref::Extern(_) => HeapType::EXTERN,
        }))
    }

    /// Whether a runtime reference inhabits `rt`
    pub fn ref_matches(&self, types: &TypeSpace, r: &Ref, rt: RefType) -> Result<bool, RuntimeError> {
        Ok(match self.heap_type_of(r)? {
            None => rt.nullable,
            Some(ht) => types.heap_matches(ht, rt.heap),
        })
    }
}
