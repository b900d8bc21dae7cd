//! Common test utilities shared between integration tests

#![allow(dead_code)]

use wasmgc::parser::instruction::InstructionKind;
use wasmgc::parser::module::{ElemItem, Module};
use wasmgc::parser::types::{
    ArrayType, CompositeType, FieldType, HeapType, RefType, StorageType, StructType, SubType, TypeSpace, ValueType,
};
use wasmgc::runtime::{Config, Executor, Flow, ModuleInstance, RuntimeError, Stack, Store, Value};

/// Route `log` output through the test harness
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub const MUT_I8_ARRAY: u32 = 0;
pub const I32_ARRAY: u32 = 1;
pub const POINT: u32 = 2;
pub const MUT_I32_ARRAY: u32 = 3;
pub const MUT_ANY_ARRAY: u32 = 4;

/// A module with a handful of GC types, one page of memory, a data segment
/// and an i31 element segment
pub fn gc_module() -> Module {
    let array = |storage, mutable| {
        SubType::plain(CompositeType::Array(ArrayType {
            element: FieldType::new(storage, mutable),
        }))
    };
    let types = TypeSpace::from_types(vec![
        array(StorageType::I8, true),
        array(StorageType::Val(ValueType::I32), false),
        SubType::plain(CompositeType::Struct(StructType {
            fields: vec![
                FieldType::new(StorageType::Val(ValueType::I32), true),
                FieldType::new(StorageType::Val(ValueType::I32), true),
            ],
        })),
        array(StorageType::Val(ValueType::I32), true),
        array(StorageType::Val(ValueType::ANYREF), true),
    ])
    .expect("test types are valid");

    Module::new(types)
        .with_memory(1, None)
        .with_data((0..16).collect())
        .with_elements(
            RefType::non_null(HeapType::I31),
            (0..8).map(ElemItem::I31).collect(),
        )
}

/// Store and instance for [`gc_module`] under `config`
pub fn instantiate(config: Config) -> (Store, ModuleInstance) {
    let mut store = Store::with_config(config);
    let instance = store.instantiate(&gc_module()).expect("instantiation succeeds");
    (store, instance)
}

/// Push `operands`, run `code` and hand back the result with the final stack
pub fn run_with(
    store: &mut Store,
    instance: &ModuleInstance,
    operands: Vec<Value>,
    code: &[InstructionKind],
) -> (Result<Flow, RuntimeError>, Vec<Value>) {
    let mut stack = Stack::new();
    stack.push_all(operands);
    let result = Executor::new(store, instance, &mut stack).run(code);
    (result, stack.drain())
}

pub fn f64x2(a: f64, b: f64) -> [u8; 16] {
    let mut v = [0u8; 16];
    v[..8].copy_from_slice(&a.to_le_bytes());
    v[8..].copy_from_slice(&b.to_le_bytes());
    v
}

pub fn f32x4(lanes: [f32; 4]) -> [u8; 16] {
    let mut v = [0u8; 16];
    for (i, lane) in lanes.iter().enumerate() {
        v[i * 4..i * 4 + 4].copy_from_slice(&lane.to_le_bytes());
    }
    v
}

pub fn i32x4(v: [u8; 16]) -> [i32; 4] {
    std::array::from_fn(|i| i32::from_le_bytes([v[i * 4], v[i * 4 + 1], v[i * 4 + 2], v[i * 4 + 3]]))
}
