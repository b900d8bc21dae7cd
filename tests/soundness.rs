mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};
    use wasmgc::parser::instruction::{InstructionKind, MemArg, NumOp, Shape, VecOp};
    use wasmgc::parser::module::Module;
    use wasmgc::parser::types::{HeapType, RefType};
    use wasmgc::parser::validate::CodeValidator;
    use wasmgc::runtime::{Config, Executor, Flow, RelaxedSimd, RuntimeError, Stack, Store};
    use InstructionKind::*;

    const SHAPES: [Shape; 6] = [Shape::I8x16, Shape::I16x8, Shape::I32x4, Shape::I64x2, Shape::F32x4, Shape::F64x2];

    fn lanes(shape: Shape) -> u8 {
        match shape {
            Shape::I8x16 => 16,
            Shape::I16x8 => 8,
            Shape::I32x4 => 4,
            Shape::I64x2 | Shape::F64x2 => 2,
            Shape::F32x4 => 4,
        }
    }

    fn pick(rng: &mut StdRng, options: &[InstructionKind]) -> InstructionKind {
        options.choose(rng).cloned().unwrap_or(Nop)
    }

    fn candidate(rng: &mut StdRng) -> InstructionKind {
        let any = RefType::nullable(HeapType::ANY);
        match rng.gen_range(0..24) {
            0..=2 => I32Const { value: rng.gen_range(-1..8) },
            3 => I64Const { value: rng.gen() },
            4 => F32Const {
                value: *[0.5, -0.0, f32::NAN, f32::INFINITY, 3e9].choose(rng).unwrap_or(&0.0),
            },
            5 => F64Const {
                value: *[1.5, -0.0, f64::NAN, f64::NEG_INFINITY, -5e9].choose(rng).unwrap_or(&0.0),
            },
            6 => V128Const { value: rng.gen() },
            7 => Num(*NumOp::ALL.choose(rng).unwrap_or(&NumOp::I32Add)),
            8..=9 => Simd(*VecOp::ALL.choose(rng).unwrap_or(&VecOp::V128Not)),
            10 => {
                let shape = *SHAPES.choose(rng).unwrap_or(&Shape::I32x4);
                let lane = rng.gen_range(0..lanes(shape));
                if rng.gen() {
                    ExtractLane {
                        shape,
                        lane,
                        signed: rng.gen(),
                    }
                } else {
                    ReplaceLane { shape, lane }
                }
            }
            11 => I8x16Shuffle {
                lanes: std::array::from_fn(|_| rng.gen_range(0..32)),
            },
            12 => {
                let memarg = MemArg::new(0, rng.gen_range(0..0x1_0000));
                if rng.gen() {
                    V128Load { memarg }
                } else {
                    V128Store { memarg }
                }
            }
            13 => pick(rng, &[Drop, Select, Nop]),
            14 => pick(rng, &[RefIsNull, RefAsNonNull, RefEq, RefI31, I31GetS, I31GetU]),
            15 => pick(rng, &[AnyConvertExtern, ExternConvertAny]),
            16 => pick(
                rng,
                &[
                    RefNull { heap: HeapType::ANY },
                    RefNull { heap: HeapType::Concrete(POINT) },
                    RefNull { heap: HeapType::Concrete(MUT_I32_ARRAY) },
                ],
            ),
            17 => {
                let heap = *[HeapType::I31, HeapType::EQ, HeapType::Concrete(POINT), HeapType::Concrete(I32_ARRAY)]
                    .choose(rng)
                    .unwrap_or(&HeapType::EQ);
                let ref_type = RefType::new(rng.gen(), heap);
                if rng.gen() {
                    RefTest { ref_type }
                } else {
                    RefCast { ref_type }
                }
            }
            18 => BrOnCastFail {
                label_idx: 0,
                from: any,
                to: RefType::non_null(HeapType::I31),
            },
            19 => pick(
                rng,
                &[
                    StructNew { type_idx: POINT },
                    StructNewDefault { type_idx: POINT },
                    StructGet {
                        type_idx: POINT,
                        field_idx: 1,
                    },
                    StructSet {
                        type_idx: POINT,
                        field_idx: 0,
                    },
                ],
            ),
            20 => pick(
                rng,
                &[
                    ArrayNew { type_idx: MUT_I8_ARRAY },
                    ArrayNewDefault { type_idx: MUT_I32_ARRAY },
                    ArrayNewFixed {
                        type_idx: I32_ARRAY,
                        len: 2,
                    },
                    ArrayNewData {
                        type_idx: MUT_I8_ARRAY,
                        data_idx: 0,
                    },
                    ArrayNewElem {
                        type_idx: MUT_ANY_ARRAY,
                        elem_idx: 0,
                    },
                ],
            ),
            21 => pick(
                rng,
                &[
                    ArrayGet { type_idx: I32_ARRAY },
                    ArrayGetS { type_idx: MUT_I8_ARRAY },
                    ArraySet { type_idx: MUT_I32_ARRAY },
                    ArrayLen,
                ],
            ),
            22 => pick(
                rng,
                &[
                    ArrayFill { type_idx: MUT_I8_ARRAY },
                    ArrayCopy {
                        dst_type: MUT_I32_ARRAY,
                        src_type: I32_ARRAY,
                    },
                    ArrayInitData {
                        type_idx: MUT_I8_ARRAY,
                        data_idx: 0,
                    },
                    ArrayInitElem {
                        type_idx: MUT_ANY_ARRAY,
                        elem_idx: 0,
                    },
                ],
            ),
            _ => BrOnNull { label_idx: 0 },
        }
    }

    fn accepts(module: &Module, code: &[InstructionKind]) -> bool {
        CodeValidator::new(module, vec![]).validate_all(code).is_ok()
    }

    /// Grow a sequence one validated instruction at a time
    fn generate(rng: &mut StdRng, module: &Module, len: usize) -> Vec<InstructionKind> {
        let mut code = Vec::with_capacity(len);
        let mut attempts = 0;
        while code.len() < len && attempts < len * 20 {
            attempts += 1;
            code.push(candidate(rng));
            if !accepts(module, &code) {
                code.pop();
            }
        }
        code
    }

    #[test]
    fn test_validated_code_never_faults() {
        init_logging();
        let module = gc_module();
        let mut rng = StdRng::seed_from_u64(0x5eed);

        for round in 0..200 {
            let code = generate(&mut rng, &module, 40);
            let relaxed_simd = if round % 2 == 0 {
                RelaxedSimd::Deterministic
            } else {
                RelaxedSimd::Alternate
            };
            let config = Config::default().with_relaxed_simd(relaxed_simd).with_max_array_len(64);
            let mut store = Store::with_config(config);
            let instance = store.instantiate(&module).expect("instantiation succeeds");
            let mut stack = Stack::new();

            let result = Executor::new(&mut store, &instance, &mut stack).run(&code);
            if let Err(RuntimeError::InternalFault(msg)) = &result {
                panic!("round {round}: internal fault {msg} running {code:?}");
            }

            if result == Ok(Flow::Continue) {
                let mut validator = CodeValidator::new(&module, vec![]);
                validator.validate_all(&code).expect("generated code validates");
                assert_eq!(stack.depth(), validator.stack().height(), "round {round}: {code:?}");
            }
        }
    }
}
