//! Validation and execution of the WebAssembly GC and SIMD instruction sets.
//!
//! wasmgc checks straight-line instruction sequences against a module's type
//! context and interprets them one instruction at a time over a store holding
//! linear memory, data and element segments and a garbage-collected heap of
//! structs and arrays. Control flow is left to the embedder: instructions that
//! branch report the label they target instead of unwinding anything.
//!
//! # Modules
//!
//! - [`parser`] -- Instruction decoding, the type space with its subtyping
//!   rules, and the validator.
//! - [`runtime`] -- Values, the operand stack, the store, and the executor.
//!
//! # Example
//!
//! Decode a body, validate it and run it:
//!
//! ```
//! use wasmgc::parser::{self, instruction::decode_all, module::Module, types::ValueType};
//! use wasmgc::runtime::{Executor, Flow, Stack, Store, Value};
//!
//! // i32.const 2; i32.const 3; i32.add
//! let code = decode_all(vec![0x41, 0x02, 0x41, 0x03, 0x6a]).unwrap();
//! let module = Module::default();
//! parser::validate_code(&module, vec![ValueType::I32], &code).unwrap();
//!
//! let mut store = Store::new();
//! let instance = store.instantiate(&module).unwrap();
//! let mut stack = Stack::new();
//! let flow = Executor::new(&mut store, &instance, &mut stack).run(&code).unwrap();
//! assert_eq!(flow, Flow::Continue);
//! assert_eq!(stack.pop().unwrap(), Value::I32(5));
//! ```

pub mod parser;
pub mod runtime;
