//! Module instances
//!
//! A `ModuleInstance` binds a module's index spaces to store addresses. It
//! keeps its own copy of the module's type space so that heap objects, which
//! record module-relative type indices, can be cast and tested.

use super::memory::Memory;
use super::store::{DataAddr, ElemAddr, FuncAddr, MemoryAddr, Store};
use super::value::{AnyRef, Ref};
use super::RuntimeError;
use crate::parser::module::{ElemItem, Module};
use crate::parser::types::TypeSpace;
use log::debug;

#[derive(Debug, Clone, Default)]
pub struct ModuleInstance {
    pub types: TypeSpace,
    pub func_addrs: Vec<FuncAddr>,
    pub mem_addrs: Vec<MemoryAddr>,
    pub data_addrs: Vec<DataAddr>,
    pub elem_addrs: Vec<ElemAddr>,
}

fn missing(kind: &str, idx: u32) -> RuntimeError {
    RuntimeError::fault(format!("{kind} index {idx} not bound in instance"))
}

impl ModuleInstance {
    /// Allocate everything `module` defines into `store`. Functions are
    /// allocated first so element segments can refer to them.
    pub fn instantiate(store: &mut Store, module: &Module) -> Result<ModuleInstance, RuntimeError> {
        module.check_elements().map_err(RuntimeError::fault)?;

        let func_addrs: Vec<FuncAddr> = module
            .funcs
            .iter()
            .map(|type_idx| store.allocate_function(*type_idx))
            .collect();

        let mut mem_addrs = Vec::with_capacity(module.memories.len());
        for mem in &module.memories {
            mem_addrs.push(store.allocate_memory(Memory::new(mem.min, mem.max)?));
        }

        let data_addrs = module
            .datas
            .iter()
            .map(|seg| store.allocate_data(seg.bytes.clone()))
            .collect();

        let mut elem_addrs = Vec::with_capacity(module.elements.len());
        for seg in &module.elements {
            let items = seg
                .items
                .iter()
                .map(|item| match item {
                    ElemItem::Null(ht) => Ok(Ref::Null(*ht)),
                    ElemItem::Func(idx) => func_addrs
                        .get(*idx as usize)
                        .map(|addr| Ref::Func(*addr))
                        .ok_or_else(|| missing("function", *idx)),
                    ElemItem::I31(v) => Ok(Ref::Any(AnyRef::i31(*v))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            elem_addrs.push(store.allocate_elem(seg.ref_type, items));
        }

        debug!("instantiated {module}");

        Ok(ModuleInstance {
            types: module.types.clone(),
            func_addrs,
            mem_addrs,
            data_addrs,
            elem_addrs,
        })
    }

    pub fn func_addr(&self, idx: u32) -> Result<FuncAddr, RuntimeError> {
        self.func_addrs.get(idx as usize).copied().ok_or_else(|| missing("function", idx))
    }

    pub fn mem_addr(&self, idx: u32) -> Result<MemoryAddr, RuntimeError> {
        self.mem_addrs.get(idx as usize).copied().ok_or_else(|| missing("memory", idx))
    }

    pub fn data_addr(&self, idx: u32) -> Result<DataAddr, RuntimeError> {
        self.data_addrs.get(idx as usize).copied().ok_or_else(|| missing("data", idx))
    }

    pub fn elem_addr(&self, idx: u32) -> Result<ElemAddr, RuntimeError> {
        self.elem_addrs.get(idx as usize).copied().ok_or_else(|| missing("elem", idx))
    }
}
