//! Reference instructions
//!
//! Casts and tests compare the dynamic type of the referenced object,
//! recorded in the store, against the target type using the instance's
//! type space. Branching forms report a [`Flow`] and leave the operand
//! stack exactly as the branch target expects it.

use super::{AnyRef, ModuleInstance, Ref, RuntimeError, Stack, Store, Trap};
use crate::parser::types::{HeapType, RefType};
use crate::runtime::Flow;

pub fn ref_null(stack: &mut Stack, heap: HeapType) {
    stack.push_ref(Ref::Null(heap));
}

pub fn ref_is_null(stack: &mut Stack) -> Result<(), RuntimeError> {
    let r = stack.pop_ref()?;
    stack.push_val(r.is_null() as i32);
    Ok(())
}

pub fn ref_func(stack: &mut Stack, instance: &ModuleInstance, func_idx: u32) -> Result<(), RuntimeError> {
    stack.push_ref(Ref::Func(instance.func_addr(func_idx)?));
    Ok(())
}

/// Two nulls are equal whatever their heap types; i31 references compare by
/// value and heap references by identity.
pub fn ref_eq(stack: &mut Stack) -> Result<(), RuntimeError> {
    let b = stack.pop_ref()?;
    let a = stack.pop_ref()?;
    let eq = match (a, b) {
        (Ref::Null(_), Ref::Null(_)) => true,
        (Ref::Null(_), _) | (_, Ref::Null(_)) => false,
        (a, b) => a == b,
    };
    stack.push_val(eq as i32);
    Ok(())
}

pub fn ref_as_non_null(stack: &mut Stack) -> Result<(), RuntimeError> {
    let r = stack.pop_ref()?;
    if r.is_null() {
        return Err(Trap::NullReference.into());
    }
    stack.push_ref(r);
    Ok(())
}

/// br_on_null: a null is consumed by the branch, anything else stays
pub fn br_on_null(stack: &mut Stack, label_idx: u32) -> Result<Flow, RuntimeError> {
    let r = stack.pop_ref()?;
    if r.is_null() {
        return Ok(Flow::Branch(label_idx));
    }
    stack.push_ref(r);
    Ok(Flow::Continue)
}

/// br_on_non_null: the reference is passed to the branch; a null is dropped
pub fn br_on_non_null(stack: &mut Stack, label_idx: u32) -> Result<Flow, RuntimeError> {
    let r = stack.pop_ref()?;
    if r.is_null() {
        return Ok(Flow::Continue);
    }
    stack.push_ref(r);
    Ok(Flow::Branch(label_idx))
}

pub fn ref_test(stack: &mut Stack, store: &Store, instance: &ModuleInstance, rt: RefType) -> Result<(), RuntimeError> {
    let r = stack.pop_ref()?;
    let matches = store.ref_matches(&instance.types, &r, rt)?;
    stack.push_val(matches as i32);
    Ok(())
}

pub fn ref_cast(stack: &mut Stack, store: &Store, instance: &ModuleInstance, rt: RefType) -> Result<(), RuntimeError> {
    let r = stack.pop_ref()?;
    if !store.ref_matches(&instance.types, &r, rt)? {
        return Err(Trap::CastFailure.into());
    }
    stack.push_ref(r);
    Ok(())
}

/// br_on_cast and br_on_cast_fail. The operand stays on the stack either
/// way; `on_success` selects which outcome takes the branch.
pub fn br_on_cast(
    stack: &mut Stack,
    store: &Store,
    instance: &ModuleInstance,
    label_idx: u32,
    to: RefType,
    on_success: bool,
) -> Result<Flow, RuntimeError> {
    let r = stack.pop_ref()?;
    let matches = store.ref_matches(&instance.types, &r, to)?;
    stack.push_ref(r);
    Ok(if matches == on_success {
        Flow::Branch(label_idx)
    } else {
        Flow::Continue
    })
}

pub fn any_convert_extern(stack: &mut Stack) -> Result<(), RuntimeError> {
    let r = stack.pop_ref()?;
    stack.push_ref(r.internalize());
    Ok(())
}

pub fn extern_convert_any(stack: &mut Stack) -> Result<(), RuntimeError> {
    let r = stack.pop_ref()?;
    stack.push_ref(r.externalize());
    Ok(())
}

pub fn ref_i31(stack: &mut Stack) -> Result<(), RuntimeError> {
    let x = stack.pop_i32()?;
    stack.push_ref(Ref::Any(AnyRef::i31(x)));
    Ok(())
}

/// i31.get_s and i31.get_u
pub fn i31_get(stack: &mut Stack, signed: bool) -> Result<(), RuntimeError> {
    match stack.pop_ref()? {
        Ref::Null(_) => Err(Trap::NullReference.into()),
        Ref::Any(AnyRef::I31(v)) => {
            stack.push_val(if signed { v } else { v & 0x7fff_ffff });
            Ok(())
        }
        other => Err(RuntimeError::fault(format!("expected i31 reference, found {other}"))),
    }
}
