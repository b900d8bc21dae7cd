//! Execution benchmarks for the instruction executor.
//!
//! These benchmarks measure SIMD lane arithmetic, relaxed SIMD in both
//! modes, and GC array allocation and bulk operations.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use std::hint::black_box;
use wasmgc::parser::instruction::{InstructionKind, VecOp};
use wasmgc::parser::module::Module;
use wasmgc::parser::types::{ArrayType, CompositeType, FieldType, StorageType, SubType, TypeSpace, ValueType};
use wasmgc::parser::validate_code;
use wasmgc::runtime::{AnyRef, Config, Executor, ModuleInstance, Ref, RelaxedSimd, Stack, Store, Value};

use InstructionKind::*;

/// `(array (mut i32))` at index 0
fn array_module() -> Module {
    let types = TypeSpace::from_types(vec![SubType::plain(CompositeType::Array(ArrayType {
        element: FieldType::new(StorageType::Val(ValueType::I32), true),
    }))])
    .expect("valid types");
    Module::new(types)
}

fn instantiate(module: &Module, config: Config) -> (Store, ModuleInstance) {
    let mut store = Store::with_config(config);
    let instance = store.instantiate(module).expect("Failed to instantiate");
    (store, instance)
}

/// Run `code` once and return what it left on the stack
fn execute(store: &mut Store, instance: &ModuleInstance, code: &[InstructionKind]) -> Vec<Value> {
    let mut stack = Stack::new();
    Executor::new(store, instance, &mut stack).run(code).expect("execution succeeds");
    stack.drain()
}

/// A chain of `n` binary vector operations folded over constants
fn vector_chain(op: VecOp, n: usize) -> Vec<InstructionKind> {
    let mut code = vec![V128Const { value: [3; 16] }];
    for i in 0..n {
        code.push(V128Const { value: [i as u8; 16] });
        code.push(Simd(op));
    }
    code
}

/// Verify the benchmark programs validate and produce the expected shape
fn verify_programs() {
    let module = array_module();
    let code = vector_chain(VecOp::I32x4Add, 4);
    validate_code(&module, vec![ValueType::V128], &code).expect("vector chain validates");

    let (mut store, instance) = instantiate(&module, Config::default());
    let result = execute(&mut store, &instance, &array_program(16));
    assert_eq!(result, vec![Value::I32(16)], "array program should leave its length");
}

fn bench_simd(c: &mut Criterion) {
    let module = array_module();
    let mut group = c.benchmark_group("simd");
    for op in [VecOp::I32x4Add, VecOp::I16x8Q15mulrSatS, VecOp::F32x4Mul, VecOp::I8x16Swizzle] {
        let code = vector_chain(op, 256);
        group.bench_with_input(BenchmarkId::new(op.mnemonic(), 256), &code, |b, code| {
            let (mut store, instance) = instantiate(&module, Config::default());
            b.iter(|| black_box(execute(&mut store, &instance, code)));
        });
    }
    group.finish();
}

fn bench_relaxed(c: &mut Criterion) {
    let module = array_module();
    let mut group = c.benchmark_group("relaxed_simd");
    for mode in [RelaxedSimd::Deterministic, RelaxedSimd::Alternate] {
        let mut code = vec![V128Const { value: [1; 16] }];
        for _ in 0..256 {
            code.push(V128Const { value: [2; 16] });
            code.push(V128Const { value: [3; 16] });
            code.push(Simd(VecOp::F32x4RelaxedMadd));
        }
        group.bench_with_input(BenchmarkId::new("f32x4.relaxed_madd", format!("{mode:?}")), &code, |b, code| {
            let (mut store, instance) = instantiate(&module, Config::default().with_relaxed_simd(mode));
            b.iter(|| black_box(execute(&mut store, &instance, code)));
        });
    }
    group.finish();
}

/// Allocate an array of `len` and leave its length
fn array_program(len: i32) -> Vec<InstructionKind> {
    vec![
        I32Const { value: 7 },
        I32Const { value: len },
        ArrayNew { type_idx: 0 },
        ArrayLen,
    ]
}

fn bench_arrays(c: &mut Criterion) {
    let module = array_module();
    let mut group = c.benchmark_group("gc_arrays");
    for len in [16, 1024, 65536] {
        group.bench_with_input(BenchmarkId::new("array.new", len), &len, |b, &len| {
            let code = array_program(len);
            // nothing is ever collected, so every batch starts from an empty store
            b.iter_batched(
                || instantiate(&module, Config::default()),
                |(mut store, instance)| black_box(execute(&mut store, &instance, &code)),
                BatchSize::SmallInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("array.fill+copy", len), &len, |b, &len| {
            let (mut store, instance) = instantiate(&module, Config::default());
            let addr = store.allocate_array(0, vec![Value::I32(0); len as usize]);
            let array = Value::Ref(Ref::Any(AnyRef::Array(addr)));
            let fill = [ArrayFill { type_idx: 0 }];
            let copy = [ArrayCopy {
                dst_type: 0,
                src_type: 0,
            }];
            b.iter(|| {
                let mut stack = Stack::new();
                stack.push_all([array, Value::I32(0), Value::I32(9), Value::I32(len)]);
                Executor::new(&mut store, &instance, &mut stack).run(&fill).expect("fill");
                stack.push_all([array, Value::I32(1), array, Value::I32(0), Value::I32(len - 1)]);
                Executor::new(&mut store, &instance, &mut stack).run(&copy).expect("copy");
                black_box(stack.depth())
            });
        });
    }
    group.finish();
}

fn verify_and_bench(c: &mut Criterion) {
    verify_programs();
    bench_simd(c);
    bench_relaxed(c);
    bench_arrays(c);
}

criterion_group!(benches, verify_and_bench);
criterion_main!(benches);
