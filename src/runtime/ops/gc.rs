//! Struct and array instructions
//!
//! Packed fields and elements (i8, i16) are stored as an i32 holding only
//! the low 8 or 16 bits. `get_s` sign-extends and `get_u` zero-extends them
//! back to i32; `set` and the allocating instructions truncate on the way in.
//!
//! Array allocation traps with [`Trap::AllocationTooLarge`] when the
//! requested length exceeds the store's configured maximum.

use super::{AnyRef, ModuleInstance, Ref, RuntimeError, Stack, Store, Trap, Value};
use crate::parser::types::{ArrayType, FieldType, StorageType, StructType, TypeSpace, ValueType};
use crate::runtime::store::{ArrayAddr, StructAddr};

// ============================================================================
// Helpers
// ============================================================================

fn struct_type(types: &TypeSpace, type_idx: u32) -> Result<&StructType, RuntimeError> {
    types
        .struct_type(type_idx)
        .ok_or_else(|| RuntimeError::fault(format!("type {type_idx} is not a struct type")))
}

fn array_type(types: &TypeSpace, type_idx: u32) -> Result<&ArrayType, RuntimeError> {
    types
        .array_type(type_idx)
        .ok_or_else(|| RuntimeError::fault(format!("type {type_idx} is not an array type")))
}

fn field_type(types: &TypeSpace, type_idx: u32, field_idx: u32) -> Result<FieldType, RuntimeError> {
    struct_type(types, type_idx)?
        .fields
        .get(field_idx as usize)
        .copied()
        .ok_or_else(|| RuntimeError::fault(format!("type {type_idx} has no field {field_idx}")))
}

/// Truncate an operand to its storage representation
fn pack(storage: StorageType, value: Value) -> Result<Value, RuntimeError> {
    let mask = match storage {
        StorageType::I8 => 0xff,
        StorageType::I16 => 0xffff,
        StorageType::Val(_) => return Ok(value),
    };
    match value {
        Value::I32(v) => Ok(Value::I32(v & mask)),
        other => Err(RuntimeError::fault(format!("packed storage expects i32, found {other}"))),
    }
}

/// Widen a stored value back to its operand type. `signed` is `None` for
/// plain `get`.
fn unpack(storage: StorageType, value: Value, signed: Option<bool>) -> Value {
    match (storage, signed, value) {
        (StorageType::I8, Some(true), Value::I32(v)) => Value::I32(v as i8 as i32),
        (StorageType::I8, Some(false), Value::I32(v)) => Value::I32(v & 0xff),
        (StorageType::I16, Some(true), Value::I32(v)) => Value::I32(v as i16 as i32),
        (StorageType::I16, Some(false), Value::I32(v)) => Value::I32(v & 0xffff),
        _ => value,
    }
}

fn pop_struct(stack: &mut Stack) -> Result<StructAddr, RuntimeError> {
    match stack.pop_ref()? {
        Ref::Null(_) => Err(Trap::NullReference.into()),
        Ref::Any(AnyRef::Struct(addr)) => Ok(addr),
        other => Err(RuntimeError::fault(format!("expected struct reference, found {other}"))),
    }
}

fn pop_array(stack: &mut Stack) -> Result<ArrayAddr, RuntimeError> {
    match stack.pop_ref()? {
        Ref::Null(_) => Err(Trap::NullReference.into()),
        Ref::Any(AnyRef::Array(addr)) => Ok(addr),
        other => Err(RuntimeError::fault(format!("expected array reference, found {other}"))),
    }
}

fn check_alloc(store: &Store, len: u32) -> Result<(), RuntimeError> {
    if len > store.config().max_array_len {
        return Err(Trap::AllocationTooLarge(len as u64).into());
    }
    Ok(())
}

fn push_array(stack: &mut Stack, store: &mut Store, type_idx: u32, elements: Vec<Value>) {
    let addr = store.allocate_array(type_idx, elements);
    stack.push_ref(Ref::Any(AnyRef::Array(addr)));
}

/// Decode one little-endian element from a data segment
fn decode_element(storage: StorageType, bytes: &[u8]) -> Result<Value, RuntimeError> {
    let word = |n: usize| -> [u8; 8] {
        let mut buf = [0u8; 8];
        buf[..n].copy_from_slice(&bytes[..n]);
        buf
    };
    Ok(match storage {
        StorageType::I8 => Value::I32(bytes[0] as i32),
        StorageType::I16 => Value::I32(u16::from_le_bytes([bytes[0], bytes[1]]) as i32),
        StorageType::Val(ValueType::I32) => Value::I32(u64::from_le_bytes(word(4)) as u32 as i32),
        StorageType::Val(ValueType::F32) => Value::F32(f32::from_bits(u64::from_le_bytes(word(4)) as u32)),
        StorageType::Val(ValueType::I64) => Value::I64(u64::from_le_bytes(word(8)) as i64),
        StorageType::Val(ValueType::F64) => Value::F64(f64::from_bits(u64::from_le_bytes(word(8)))),
        StorageType::Val(ValueType::V128) => {
            let mut v = [0u8; 16];
            v.copy_from_slice(&bytes[..16]);
            Value::V128(v)
        }
        StorageType::Val(ValueType::Ref(_)) => {
            return Err(RuntimeError::fault("reference arrays cannot be built from data"));
        }
    })
}

/// Decode `count` elements starting at byte `offset` of a data segment
fn read_data(
    store: &Store,
    instance: &ModuleInstance,
    data_idx: u32,
    storage: StorageType,
    offset: u32,
    count: u32,
) -> Result<Vec<Value>, RuntimeError> {
    let width = storage
        .byte_width()
        .ok_or_else(|| RuntimeError::fault("reference arrays cannot be built from data"))? as u64;
    let bytes = &store.data(instance.data_addr(data_idx)?)?.bytes;
    let end = offset as u64 + count as u64 * width;
    if end > bytes.len() as u64 {
        return Err(Trap::DataSegmentOutOfBounds.into());
    }
    bytes[offset as usize..end as usize]
        .chunks_exact(width as usize)
        .map(|chunk| decode_element(storage, chunk))
        .collect()
}

/// Take `count` references starting at `offset` of an element segment
fn read_elems(
    store: &Store,
    instance: &ModuleInstance,
    elem_idx: u32,
    offset: u32,
    count: u32,
) -> Result<Vec<Value>, RuntimeError> {
    let items = &store.elem(instance.elem_addr(elem_idx)?)?.items;
    let end = offset as u64 + count as u64;
    if end > items.len() as u64 {
        return Err(Trap::ElemSegmentOutOfBounds.into());
    }
    Ok(items[offset as usize..end as usize].iter().map(|r| Value::Ref(*r)).collect())
}

// ============================================================================
// Structs
// ============================================================================

/// struct.new: field values are popped in reverse, the last field on top
pub fn struct_new(stack: &mut Stack, store: &mut Store, instance: &ModuleInstance, type_idx: u32) -> Result<(), RuntimeError> {
    let st = struct_type(&instance.types, type_idx)?;
    let values = stack.pop_n(st.fields.len())?;
    let fields = st
        .fields
        .iter()
        .zip(values)
        .map(|(ft, v)| pack(ft.storage, v))
        .collect::<Result<Vec<_>, _>>()?;
    let addr = store.allocate_struct(type_idx, fields);
    stack.push_ref(Ref::Any(AnyRef::Struct(addr)));
    Ok(())
}

pub fn struct_new_default(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
) -> Result<(), RuntimeError> {
    let st = struct_type(&instance.types, type_idx)?;
    let fields = st.fields.iter().map(|ft| Value::default_for_storage(ft.storage)).collect();
    let addr = store.allocate_struct(type_idx, fields);
    stack.push_ref(Ref::Any(AnyRef::Struct(addr)));
    Ok(())
}

/// struct.get, struct.get_s and struct.get_u
pub fn struct_get(
    stack: &mut Stack,
    store: &Store,
    instance: &ModuleInstance,
    type_idx: u32,
    field_idx: u32,
    signed: Option<bool>,
) -> Result<(), RuntimeError> {
    let ft = field_type(&instance.types, type_idx, field_idx)?;
    let addr = pop_struct(stack)?;
    let value = store.struct_ref(addr)?.get(field_idx)?;
    stack.push(unpack(ft.storage, value, signed));
    Ok(())
}

pub fn struct_set(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
    field_idx: u32,
) -> Result<(), RuntimeError> {
    let ft = field_type(&instance.types, type_idx, field_idx)?;
    let value = pack(ft.storage, stack.pop()?)?;
    let addr = pop_struct(stack)?;
    store.struct_mut(addr)?.set(field_idx, value)
}

// ============================================================================
// Array allocation
// ============================================================================

/// array.new: [value len] -> [ref]
pub fn array_new(stack: &mut Stack, store: &mut Store, instance: &ModuleInstance, type_idx: u32) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let len = stack.pop_u32()?;
    let value = pack(at.element.storage, stack.pop()?)?;
    check_alloc(store, len)?;
    push_array(stack, store, type_idx, vec![value; len as usize]);
    Ok(())
}

pub fn array_new_default(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let len = stack.pop_u32()?;
    check_alloc(store, len)?;
    let value = Value::default_for_storage(at.element.storage);
    push_array(stack, store, type_idx, vec![value; len as usize]);
    Ok(())
}

pub fn array_new_fixed(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
    len: u32,
) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    check_alloc(store, len)?;
    let elements = stack
        .pop_n(len as usize)?
        .into_iter()
        .map(|v| pack(at.element.storage, v))
        .collect::<Result<Vec<_>, _>>()?;
    push_array(stack, store, type_idx, elements);
    Ok(())
}

/// array.new_data: [offset len] -> [ref]; `offset` is in bytes
pub fn array_new_data(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
    data_idx: u32,
) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let len = stack.pop_u32()?;
    let offset = stack.pop_u32()?;
    let elements = read_data(store, instance, data_idx, at.element.storage, offset, len)?;
    check_alloc(store, len)?;
    push_array(stack, store, type_idx, elements);
    Ok(())
}

/// array.new_elem: [offset len] -> [ref]
pub fn array_new_elem(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
    elem_idx: u32,
) -> Result<(), RuntimeError> {
    let len = stack.pop_u32()?;
    let offset = stack.pop_u32()?;
    let elements = read_elems(store, instance, elem_idx, offset, len)?;
    check_alloc(store, len)?;
    push_array(stack, store, type_idx, elements);
    Ok(())
}

// ============================================================================
// Array access
// ============================================================================

/// array.get, array.get_s and array.get_u
pub fn array_get(
    stack: &mut Stack,
    store: &Store,
    instance: &ModuleInstance,
    type_idx: u32,
    signed: Option<bool>,
) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let index = stack.pop_u32()?;
    let addr = pop_array(stack)?;
    let value = store.array_ref(addr)?.get(index)?;
    stack.push(unpack(at.element.storage, value, signed));
    Ok(())
}

pub fn array_set(stack: &mut Stack, store: &mut Store, instance: &ModuleInstance, type_idx: u32) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let value = pack(at.element.storage, stack.pop()?)?;
    let index = stack.pop_u32()?;
    let addr = pop_array(stack)?;
    store.array_mut(addr)?.set(index, value)
}

pub fn array_len(stack: &mut Stack, store: &Store) -> Result<(), RuntimeError> {
    let addr = pop_array(stack)?;
    stack.push_val(store.array_ref(addr)?.len() as i32);
    Ok(())
}

/// array.fill: [ref offset value len] -> []
pub fn array_fill(stack: &mut Stack, store: &mut Store, instance: &ModuleInstance, type_idx: u32) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let len = stack.pop_u32()?;
    let value = pack(at.element.storage, stack.pop()?)?;
    let offset = stack.pop_u32()?;
    let addr = pop_array(stack)?;
    store.array_mut(addr)?.fill(offset, value, len)
}

/// array.copy: [dst dst_offset src src_offset len] -> []
pub fn array_copy(stack: &mut Stack, store: &mut Store) -> Result<(), RuntimeError> {
    let len = stack.pop_u32()?;
    let src_offset = stack.pop_u32()?;
    let src = pop_array(stack)?;
    let dst_offset = stack.pop_u32()?;
    let dst = pop_array(stack)?;
    store.copy_array(dst, dst_offset, src, src_offset, len)
}

/// array.init_data: [ref dst_offset src_offset len] -> []
pub fn array_init_data(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    type_idx: u32,
    data_idx: u32,
) -> Result<(), RuntimeError> {
    let at = array_type(&instance.types, type_idx)?;
    let len = stack.pop_u32()?;
    let src_offset = stack.pop_u32()?;
    let dst_offset = stack.pop_u32()?;
    let addr = pop_array(stack)?;
    check_init_range(store, addr, dst_offset, len)?;
    let values = read_data(store, instance, data_idx, at.element.storage, src_offset, len)?;
    store.array_mut(addr)?.init(dst_offset, &values)
}

/// array.init_elem: [ref dst_offset src_offset len] -> []
pub fn array_init_elem(
    stack: &mut Stack,
    store: &mut Store,
    instance: &ModuleInstance,
    elem_idx: u32,
) -> Result<(), RuntimeError> {
    let len = stack.pop_u32()?;
    let src_offset = stack.pop_u32()?;
    let dst_offset = stack.pop_u32()?;
    let addr = pop_array(stack)?;
    check_init_range(store, addr, dst_offset, len)?;
    let values = read_elems(store, instance, elem_idx, src_offset, len)?;
    store.array_mut(addr)?.init(dst_offset, &values)
}

/// The destination range is checked before the segment
fn check_init_range(store: &Store, addr: ArrayAddr, offset: u32, count: u32) -> Result<(), RuntimeError> {
    let len = store.array_ref(addr)?.len();
    if offset as u64 + count as u64 > len as u64 {
        return Err(Trap::ArrayRangeOutOfBounds { offset, count, len }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::module::{ElemItem, Module};
    use crate::parser::types::{CompositeType, HeapType, RefType, SubType};
    use crate::runtime::Config;

    fn field(storage: StorageType, mutable: bool) -> FieldType {
        FieldType::new(storage, mutable)
    }

    /// 0: struct {mut i8, i64}, 1: array (mut i16), 2: array (mut f64),
    /// 3: array (mut anyref)
    fn setup(config: Config) -> (Store, ModuleInstance) {
        let types = vec![
            SubType::plain(CompositeType::Struct(StructType {
                fields: vec![field(StorageType::I8, true), field(StorageType::Val(ValueType::I64), false)],
            })),
            SubType::plain(CompositeType::Array(ArrayType {
                element: field(StorageType::I16, true),
            })),
            SubType::plain(CompositeType::Array(ArrayType {
                element: field(StorageType::Val(ValueType::F64), true),
            })),
            SubType::plain(CompositeType::Array(ArrayType {
                element: field(StorageType::Val(ValueType::ANYREF), true),
            })),
        ];
        let module = Module::new(TypeSpace::from_types(types).unwrap())
            .with_data(vec![0x01, 0x80, 0xff, 0xff, 0x34, 0x12])
            .with_data(1.5f64.to_le_bytes().to_vec())
            .with_elements(
                RefType::nullable(HeapType::I31),
                vec![ElemItem::I31(1), ElemItem::Null(HeapType::I31), ElemItem::I31(3)],
            );
        let mut store = Store::with_config(config);
        let instance = store.instantiate(&module).unwrap();
        (store, instance)
    }

    fn array_values(store: &Store, stack: &mut Stack) -> Vec<Value> {
        let addr = pop_array(stack).unwrap();
        store.array_ref(addr).unwrap().elements.clone()
    }

    #[test]
    fn test_struct_packed_fields() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        stack.push_all([Value::I32(0x1ff), Value::I64(7)]);
        struct_new(&mut stack, &mut store, &inst, 0).unwrap();
        let s = stack.pop().unwrap();

        stack.push(s);
        struct_get(&mut stack, &store, &inst, 0, 0, Some(true)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), -1);
        stack.push(s);
        struct_get(&mut stack, &store, &inst, 0, 0, Some(false)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0xff);
        stack.push(s);
        struct_get(&mut stack, &store, &inst, 0, 1, None).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 7);

        stack.push(s);
        stack.push_val(0x17fi32);
        struct_set(&mut stack, &mut store, &inst, 0, 0).unwrap();
        stack.push(s);
        struct_get(&mut stack, &store, &inst, 0, 0, Some(false)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x7f);
    }

    #[test]
    fn test_struct_null_and_default() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        struct_new_default(&mut stack, &mut store, &inst, 0).unwrap();
        struct_get(&mut stack, &store, &inst, 0, 1, None).unwrap();
        assert_eq!(stack.pop_i64().unwrap(), 0);

        stack.push_ref(Ref::Null(HeapType::NONE));
        let err = struct_get(&mut stack, &store, &inst, 0, 1, None).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::NullReference));
    }

    #[test]
    fn test_array_new_and_access() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        stack.push_all([Value::I32(-2), Value::I32(3)]);
        array_new(&mut stack, &mut store, &inst, 1).unwrap();
        let a = stack.pop().unwrap();

        stack.push(a);
        array_len(&mut stack, &store).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 3);

        stack.push_all([a, Value::I32(2)]);
        array_get(&mut stack, &store, &inst, 1, Some(false)).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0xfffe);

        stack.push_all([a, Value::I32(3)]);
        let err = array_get(&mut stack, &store, &inst, 1, Some(true)).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::ArrayOutOfBounds { index: 3, len: 3 }));

        stack.push_all([a, Value::I32(0), Value::I32(0x12345)]);
        array_set(&mut stack, &mut store, &inst, 1).unwrap();
        stack.push(a);
        assert_eq!(array_values(&store, &mut stack)[0], Value::I32(0x2345));
    }

    #[test]
    fn test_array_new_fixed_order() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        stack.push_all([Value::F64(1.0), Value::F64(2.0), Value::F64(3.0)]);
        array_new_fixed(&mut stack, &mut store, &inst, 2, 3).unwrap();
        assert_eq!(
            array_values(&store, &mut stack),
            vec![Value::F64(1.0), Value::F64(2.0), Value::F64(3.0)]
        );
    }

    #[test]
    fn test_allocation_limit() {
        let (mut store, inst) = setup(Config::default().with_max_array_len(4));
        let mut stack = Stack::new();
        stack.push_val(5i32);
        let err = array_new_default(&mut stack, &mut store, &inst, 2).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::AllocationTooLarge(5)));

        stack.push_all([Value::F64(0.0), Value::I32(-1)]);
        let err = array_new(&mut stack, &mut store, &inst, 2).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::AllocationTooLarge(u32::MAX as u64)));

        stack.push_val(4i32);
        array_new_default(&mut stack, &mut store, &inst, 2).unwrap();
        assert_eq!(array_values(&store, &mut stack), vec![Value::F64(0.0); 4]);
    }

    #[test]
    fn test_array_new_data() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        // i16 elements from byte offset 1: [0xff80, 0x34ff]
        stack.push_all([Value::I32(1), Value::I32(2)]);
        array_new_data(&mut stack, &mut store, &inst, 1, 0).unwrap();
        assert_eq!(array_values(&store, &mut stack), vec![Value::I32(0xff80), Value::I32(0x34ff)]);

        stack.push_all([Value::I32(0), Value::I32(1)]);
        array_new_data(&mut stack, &mut store, &inst, 2, 1).unwrap();
        assert_eq!(array_values(&store, &mut stack), vec![Value::F64(1.5)]);

        // one byte short
        stack.push_all([Value::I32(3), Value::I32(2)]);
        let err = array_new_data(&mut stack, &mut store, &inst, 1, 0).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::DataSegmentOutOfBounds));

        stack.push_all([Value::I32(6), Value::I32(0)]);
        array_new_data(&mut stack, &mut store, &inst, 1, 0).unwrap();
        assert!(array_values(&store, &mut stack).is_empty());
    }

    #[test]
    fn test_array_new_elem() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        stack.push_all([Value::I32(1), Value::I32(2)]);
        array_new_elem(&mut stack, &mut store, &inst, 3, 0).unwrap();
        assert_eq!(
            array_values(&store, &mut stack),
            vec![Value::Ref(Ref::Null(HeapType::I31)), Value::Ref(Ref::Any(AnyRef::I31(3)))]
        );

        stack.push_all([Value::I32(2), Value::I32(2)]);
        let err = array_new_elem(&mut stack, &mut store, &inst, 3, 0).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::ElemSegmentOutOfBounds));
    }

    #[test]
    fn test_fill_and_copy() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        stack.push_all([Value::I32(0), Value::I32(5)]);
        array_new(&mut stack, &mut store, &inst, 1).unwrap();
        let a = stack.pop().unwrap();

        stack.push_all([a, Value::I32(1), Value::I32(9), Value::I32(3)]);
        array_fill(&mut stack, &mut store, &inst, 1).unwrap();
        stack.push(a);
        let ints = |v: &[i32]| v.iter().map(|&x| Value::I32(x)).collect::<Vec<_>>();
        assert_eq!(array_values(&store, &mut stack), ints(&[0, 9, 9, 9, 0]));

        // overlapping copy within one array
        stack.push_all([a, Value::I32(2), a, Value::I32(0), Value::I32(3)]);
        array_copy(&mut stack, &mut store).unwrap();
        stack.push(a);
        assert_eq!(array_values(&store, &mut stack), ints(&[0, 9, 0, 9, 9]));

        stack.push_all([a, Value::I32(3), a, Value::I32(0), Value::I32(3)]);
        assert!(array_copy(&mut stack, &mut store).unwrap_err().is_trap());

        stack.push_all([Value::Ref(Ref::Null(HeapType::NONE)), Value::I32(0), a, Value::I32(0), Value::I32(0)]);
        let err = array_copy(&mut stack, &mut store).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::NullReference));
    }

    #[test]
    fn test_init_data_and_elem() {
        let (mut store, inst) = setup(Config::default());
        let mut stack = Stack::new();
        stack.push_val(4i32);
        array_new_default(&mut stack, &mut store, &inst, 1).unwrap();
        let a = stack.pop().unwrap();

        stack.push_all([a, Value::I32(1), Value::I32(4), Value::I32(1)]);
        array_init_data(&mut stack, &mut store, &inst, 1, 0).unwrap();
        stack.push(a);
        assert_eq!(array_values(&store, &mut stack)[1], Value::I32(0x1234));

        // destination range checked first
        stack.push_all([a, Value::I32(4), Value::I32(100), Value::I32(1)]);
        let err = array_init_data(&mut stack, &mut store, &inst, 1, 0).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::ArrayRangeOutOfBounds { offset: 4, count: 1, len: 4 }));

        stack.push_all([a, Value::I32(0), Value::I32(5), Value::I32(1)]);
        let err = array_init_data(&mut stack, &mut store, &inst, 1, 0).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::DataSegmentOutOfBounds));

        stack.push_val(3i32);
        array_new_default(&mut stack, &mut store, &inst, 3).unwrap();
        let r = stack.pop().unwrap();
        stack.push_all([r, Value::I32(1), Value::I32(0), Value::I32(2)]);
        array_init_elem(&mut stack, &mut store, &inst, 0).unwrap();
        stack.push(r);
        assert_eq!(
            array_values(&store, &mut stack),
            vec![
                Value::Ref(Ref::Null(HeapType::ANY)),
                Value::Ref(Ref::Any(AnyRef::I31(1))),
                Value::Ref(Ref::Null(HeapType::I31)),
            ]
        );

        stack.push_all([r, Value::I32(0), Value::I32(2), Value::I32(2)]);
        let err = array_init_elem(&mut stack, &mut store, &inst, 0).unwrap_err();
        assert_eq!(err, RuntimeError::Trap(Trap::ElemSegmentOutOfBounds));
    }
}
