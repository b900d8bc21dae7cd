//! Decoding and validation
//!
//! - [`reader`] -- byte cursor with LEB128 and little-endian readers.
//! - [`types`] -- value, storage, heap and composite types, and the module
//!   [`types::TypeSpace`] that answers subtyping questions.
//! - [`instruction`] -- the instruction set and its binary decoder.
//! - [`module`] -- the index spaces code refers to.
//! - [`validate`] -- the abstract operand stack and per-instruction typing.

pub mod instruction;
pub mod module;
pub mod reader;
pub mod types;
pub mod validate;

use instruction::InstructionKind;
use module::Module;
use types::ValueType;
use validate::{CodeValidator, ValidationError};

/// Decode a raw instruction sequence and validate it as the body of a
/// function returning `results`.
pub fn validate_code(
    module: &Module,
    results: Vec<ValueType>,
    code: &[InstructionKind],
) -> Result<(), ValidationError> {
    let mut validator = CodeValidator::new(module, results);
    validator.validate_all(code)?;
    validator.finish()
}
