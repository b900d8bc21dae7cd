//! Single-instruction interpreter
//!
//! The executor applies one validated instruction at a time to an operand
//! stack, reading and writing the store through a module instance. It does
//! not own any control structure: a taken branch is reported as
//! [`Flow::Branch`] and the caller decides what to unwind.

use super::{ops, Flow, ModuleInstance, RuntimeError, Stack, Store, Trap, Value};
use crate::parser::instruction::InstructionKind;
use log::{debug, trace};

pub struct Executor<'a> {
    store: &'a mut Store,
    instance: &'a ModuleInstance,
    stack: &'a mut Stack,
}

impl<'a> Executor<'a> {
    pub fn new(store: &'a mut Store, instance: &'a ModuleInstance, stack: &'a mut Stack) -> Self {
        Executor { store, instance, stack }
    }

    pub fn stack(&self) -> &Stack {
        self.stack
    }

    pub fn store(&self) -> &Store {
        self.store
    }

    /// Execute one instruction
    ///
    /// # Errors
    /// - [`RuntimeError::Trap`] when the instruction traps. The stack is left
    ///   in an unspecified state.
    /// - [`RuntimeError::InternalFault`] if the instruction was not validated
    ///   against the operands actually present.
    pub fn execute(&mut self, inst: &InstructionKind) -> Result<Flow, RuntimeError> {
        trace!("{inst} (stack depth {})", self.stack.depth());
        let result = self.dispatch(inst);
        match &result {
            Err(RuntimeError::Trap(trap)) => debug!("{} trapped: {trap}", inst.mnemonic()),
            Err(RuntimeError::InternalFault(msg)) => debug!("{} faulted: {msg}", inst.mnemonic()),
            Ok(Flow::Branch(depth)) => trace!("{} branches to label {depth}", inst.mnemonic()),
            Ok(Flow::Continue) => {}
        }
        result
    }

    /// Execute a straight-line sequence, stopping at the first taken branch
    pub fn run(&mut self, code: &[InstructionKind]) -> Result<Flow, RuntimeError> {
        for inst in code {
            if let Flow::Branch(depth) = self.execute(inst)? {
                return Ok(Flow::Branch(depth));
            }
        }
        Ok(Flow::Continue)
    }

    fn dispatch(&mut self, inst: &InstructionKind) -> Result<Flow, RuntimeError> {
        use InstructionKind::*;

        let (stack, instance) = (&mut *self.stack, self.instance);

        // Memory is borrowed from the store while the stack is borrowed
        // separately; the two never alias.
        macro_rules! with_memory {
            (load $op:ident($($arg:expr),*)) => {{
                let addr = instance.mem_addr(0)?;
                let memory = self.store.memory(addr)?;
                ops::vec_memory::$op(stack, memory, $($arg),*)?
            }};
            (store $op:ident($($arg:expr),*)) => {{
                let addr = instance.mem_addr(0)?;
                let memory = self.store.memory_mut(addr)?;
                ops::vec_memory::$op(stack, memory, $($arg),*)?
            }};
        }

        match inst {
            Unreachable => return Err(Trap::Unreachable.into()),
            Nop => {}
            Drop => ops::parametric::drop(stack)?,
            Select | SelectTyped { .. } => ops::parametric::select(stack)?,

            I32Const { value } => stack.push(Value::I32(*value)),
            I64Const { value } => stack.push(Value::I64(*value)),
            F32Const { value } => stack.push(Value::F32(*value)),
            F64Const { value } => stack.push(Value::F64(*value)),
            V128Const { value } => stack.push(Value::V128(*value)),

            Num(op) => ops::numeric::execute(stack, *op)?,
            Simd(op) => ops::simd::execute(stack, *op, self.store.config().relaxed_simd)?,

            V128Load { memarg } => with_memory!(load load(memarg)),
            V128Store { memarg } => with_memory!(store store(memarg)),
            V128LoadExtend { kind, memarg } => with_memory!(load load_extend(*kind, memarg)),
            V128LoadSplat { width, memarg } => with_memory!(load load_splat(*width, memarg)),
            V128LoadZero { width, memarg } => with_memory!(load load_zero(*width, memarg)),
            V128LoadLane { width, memarg, lane } => with_memory!(load load_lane(*width, memarg, *lane)),
            V128StoreLane { width, memarg, lane } => with_memory!(store store_lane(*width, memarg, *lane)),

            I8x16Shuffle { lanes } => ops::simd::shuffle(stack, lanes)?,
            ExtractLane { shape, lane, signed } => ops::simd::extract_lane(stack, *shape, *lane, *signed)?,
            ReplaceLane { shape, lane } => ops::simd::replace_lane(stack, *shape, *lane)?,

            RefNull { heap } => ops::reference::ref_null(stack, *heap),
            RefIsNull => ops::reference::ref_is_null(stack)?,
            RefFunc { func_idx } => ops::reference::ref_func(stack, instance, *func_idx)?,
            RefEq => ops::reference::ref_eq(stack)?,
            RefAsNonNull => ops::reference::ref_as_non_null(stack)?,
            BrOnNull { label_idx } => return ops::reference::br_on_null(stack, *label_idx),
            BrOnNonNull { label_idx } => return ops::reference::br_on_non_null(stack, *label_idx),
            RefTest { ref_type } => ops::reference::ref_test(stack, self.store, instance, *ref_type)?,
            RefCast { ref_type } => ops::reference::ref_cast(stack, self.store, instance, *ref_type)?,
            BrOnCast { label_idx, to, .. } => {
                return ops::reference::br_on_cast(stack, self.store, instance, *label_idx, *to, true)
            }
            BrOnCastFail { label_idx, to, .. } => {
                return ops::reference::br_on_cast(stack, self.store, instance, *label_idx, *to, false)
            }
            AnyConvertExtern => ops::reference::any_convert_extern(stack)?,
            ExternConvertAny => ops::reference::extern_convert_any(stack)?,
            RefI31 => ops::reference::ref_i31(stack)?,
            I31GetS => ops::reference::i31_get(stack, true)?,
            I31GetU => ops::reference::i31_get(stack, false)?,

            StructNew { type_idx } => ops::gc::struct_new(stack, self.store, instance, *type_idx)?,
            StructNewDefault { type_idx } => ops::gc::struct_new_default(stack, self.store, instance, *type_idx)?,
            StructGet { type_idx, field_idx } => {
                ops::gc::struct_get(stack, self.store, instance, *type_idx, *field_idx, None)?
            }
            StructGetS { type_idx, field_idx } => {
                ops::gc::struct_get(stack, self.store, instance, *type_idx, *field_idx, Some(true))?
            }
            StructGetU { type_idx, field_idx } => {
                ops::gc::struct_get(stack, self.store, instance, *type_idx, *field_idx, Some(false))?
            }
            StructSet { type_idx, field_idx } => {
                ops::gc::struct_set(stack, self.store, instance, *type_idx, *field_idx)?
            }

            ArrayNew { type_idx } => ops::gc::array_new(stack, self.store, instance, *type_idx)?,
            ArrayNewDefault { type_idx } => ops::gc::array_new_default(stack, self.store, instance, *type_idx)?,
            ArrayNewFixed { type_idx, len } => ops::gc::array_new_fixed(stack, self.store, instance, *type_idx, *len)?,
            ArrayNewData { type_idx, data_idx } => {
                ops::gc::array_new_data(stack, self.store, instance, *type_idx, *data_idx)?
            }
            ArrayNewElem { type_idx, elem_idx } => {
                ops::gc::array_new_elem(stack, self.store, instance, *type_idx, *elem_idx)?
            }
            ArrayGet { type_idx } => ops::gc::array_get(stack, self.store, instance, *type_idx, None)?,
            ArrayGetS { type_idx } => ops::gc::array_get(stack, self.store, instance, *type_idx, Some(true))?,
            ArrayGetU { type_idx } => ops::gc::array_get(stack, self.store, instance, *type_idx, Some(false))?,
            ArraySet { type_idx } => ops::gc::array_set(stack, self.store, instance, *type_idx)?,
            ArrayLen => ops::gc::array_len(stack, self.store)?,
            ArrayFill { type_idx } => ops::gc::array_fill(stack, self.store, instance, *type_idx)?,
            ArrayCopy { .. } => ops::gc::array_copy(stack, self.store)?,
            ArrayInitData { type_idx, data_idx } => {
                ops::gc::array_init_data(stack, self.store, instance, *type_idx, *data_idx)?
            }
            ArrayInitElem { elem_idx, .. } => ops::gc::array_init_elem(stack, self.store, instance, *elem_idx)?,
        }
        Ok(Flow::Continue)
    }
}
