//! Module-level definitions consumed by validation and instantiation
//!
//! A `Module` carries the index spaces instructions refer to: types,
//! functions (by type), memories, data segments and element segments. It is
//! normally produced by a binary reader; tests build one directly.

use super::types::{FunctionType, HeapType, RefType, TypeSpace, ValueType};
use std::fmt;

/// Memory limits in 64KiB pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType {
    pub min: u32,
    pub max: Option<u32>,
}

/// A constant element expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElemItem {
    /// ref.null ht
    Null(HeapType),
    /// ref.func idx
    Func(u32),
    /// i32.const n; ref.i31
    I31(i32),
}

impl ElemItem {
    /// Static type of the expression's result
    pub fn ref_type(&self, module: &Module) -> RefType {
        match self {
            ElemItem::Null(ht) => RefType::nullable(*ht),
            ElemItem::Func(idx) => RefType::non_null(
                module
                    .func_type_idx(*idx)
                    .map(HeapType::Concrete)
                    .unwrap_or(HeapType::FUNC),
            ),
            ElemItem::I31(_) => RefType::non_null(HeapType::I31),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSegment {
    pub ref_type: RefType,
    pub items: Vec<ElemItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Default)]
pub struct Module {
    pub types: TypeSpace,
    /// Type index of each function
    pub funcs: Vec<u32>,
    pub memories: Vec<MemoryType>,
    pub datas: Vec<DataSegment>,
    pub elements: Vec<ElementSegment>,
    /// Declared data count; data indices in code require it
    pub data_count: Option<u32>,
}

impl Module {
    pub fn new(types: TypeSpace) -> Self {
        Module {
            types,
            ..Default::default()
        }
    }

    pub fn with_func(mut self, type_idx: u32) -> Self {
        self.funcs.push(type_idx);
        self
    }

    pub fn with_memory(mut self, min: u32, max: Option<u32>) -> Self {
        self.memories.push(MemoryType { min, max });
        self
    }

    pub fn with_data(mut self, bytes: Vec<u8>) -> Self {
        self.datas.push(DataSegment { bytes });
        self.data_count = Some(self.datas.len() as u32);
        self
    }

    pub fn with_elements(mut self, ref_type: RefType, items: Vec<ElemItem>) -> Self {
        self.elements.push(ElementSegment { ref_type, items });
        self
    }

    pub fn func_type_idx(&self, func_idx: u32) -> Option<u32> {
        self.funcs.get(func_idx as usize).copied()
    }

    pub fn func_type(&self, func_idx: u32) -> Option<&FunctionType> {
        self.types.func_type(self.func_type_idx(func_idx)?)
    }

    pub fn has_memory(&self, mem_idx: u32) -> bool {
        (mem_idx as usize) < self.memories.len()
    }

    pub fn has_data(&self, data_idx: u32) -> bool {
        self.data_count.is_some_and(|count| data_idx < count)
    }

    pub fn element(&self, elem_idx: u32) -> Option<&ElementSegment> {
        self.elements.get(elem_idx as usize)
    }

    /// Check that every element item matches its segment's declared type
    pub fn check_elements(&self) -> Result<(), String> {
        for (i, seg) in self.elements.iter().enumerate() {
            for item in &seg.items {
                if let ElemItem::Func(idx) = item {
                    if self.func_type_idx(*idx).is_none() {
                        return Err(format!("element segment {i}: unknown function {idx}"));
                    }
                }
                let rt = item.ref_type(self);
                if !self.types.ref_matches(rt, seg.ref_type) {
                    return Err(format!(
                        "element segment {i}: {} does not match {}",
                        ValueType::Ref(rt),
                        ValueType::Ref(seg.ref_type)
                    ));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Module types = {} funcs = {} memories = {} datas = {} elements = {}",
            self.types.len(),
            self.funcs.len(),
            self.memories.len(),
            self.datas.len(),
            self.elements.len()
        )
    }
}
