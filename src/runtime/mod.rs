//! Execution of validated instructions
//!
//! This module provides the value representation, the runtime operand stack,
//! the store with its GC heap, and the single-instruction interpreter.
//! Control flow is left to the caller: branching instructions report a
//! [`Flow::Branch`] rather than unwinding anything themselves.

pub mod config;
pub mod executor;
pub mod instance;
pub mod memory;
pub mod ops;
pub mod stack;
pub mod store;
pub mod test_utils;
pub mod value;

pub use config::{Config, RelaxedSimd};
pub use executor::Executor;
pub use instance::ModuleInstance;
pub use memory::Memory;
pub use stack::Stack;
pub use store::{ArrayAddr, DataAddr, ElemAddr, FuncAddr, MemoryAddr, Store, StoreArray, StoreStruct, StructAddr};
pub use value::{AnyRef, ExternRef, Ref, Value};

/// Conditions that abort execution of well-typed code
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,
    #[error("null reference")]
    NullReference,
    #[error("out of bounds array access: index {index}, length {len}")]
    ArrayOutOfBounds { index: u32, len: u32 },
    #[error("out of bounds array access: {offset} + {count} exceeds length {len}")]
    ArrayRangeOutOfBounds { offset: u32, count: u32, len: u32 },
    #[error("out of bounds data segment access")]
    DataSegmentOutOfBounds,
    #[error("out of bounds element segment access")]
    ElemSegmentOutOfBounds,
    #[error("cast failure")]
    CastFailure,
    #[error("out of bounds memory access")]
    MemoryOutOfBounds,
    #[error("integer divide by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("invalid conversion to integer")]
    InvalidConversion,
    #[error("allocation too large: {0} elements")]
    AllocationTooLarge(u64),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("trap: {0}")]
    Trap(#[from] Trap),
    /// Validated code should never produce this; it indicates an engine bug
    #[error("internal fault (engine bug): {0}")]
    InternalFault(String),
}

impl RuntimeError {
    pub fn fault(message: impl Into<String>) -> Self {
        RuntimeError::InternalFault(message.into())
    }

    pub fn is_trap(&self) -> bool {
        matches!(self, RuntimeError::Trap(_))
    }

    pub fn trap(&self) -> Option<&Trap> {
        match self {
            RuntimeError::Trap(trap) => Some(trap),
            RuntimeError::InternalFault(_) => None,
        }
    }
}

/// What the caller should do after an instruction completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Branch to the label at this relative depth
    Branch(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let trap: RuntimeError = Trap::CastFailure.into();
        assert!(trap.is_trap());
        assert_eq!(trap.trap(), Some(&Trap::CastFailure));
        assert_eq!(trap.to_string(), "trap: cast failure");

        let fault = RuntimeError::fault("stack underflow");
        assert!(!fault.is_trap());
        assert!(fault.to_string().contains("engine bug"));
    }
}
