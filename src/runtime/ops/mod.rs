//! Instruction implementations
//!
//! Each submodule implements one family of instructions as plain functions
//! over the operand stack and, where needed, the store and module instance.

pub mod conversion;
pub mod gc;
pub mod numeric;
pub mod parametric;
pub mod reference;
pub mod relaxed;
pub mod simd;
pub mod vec_memory;

// Re-export commonly used types for operation implementations
pub(crate) use crate::parser::instruction::MemArg;
pub(crate) use crate::runtime::instance::ModuleInstance;
pub(crate) use crate::runtime::memory::Memory;
pub(crate) use crate::runtime::stack::{Stack, StackValue};
pub(crate) use crate::runtime::store::Store;
pub(crate) use crate::runtime::value::{AnyRef, Ref};
pub(crate) use crate::runtime::{RuntimeError, Trap, Value};
