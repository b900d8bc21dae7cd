//! Scalar numeric opcodes
//!
//! Opcodes are the single-byte encoding, or `0xfc00 | n` for the
//! saturating truncations under the 0xfc prefix.

use crate::parser::types::ValueType::{self, F32, F64, I32, I64};
use NumSig::*;

/// Stack effect of a scalar numeric operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumSig {
    /// [t] -> [t]
    Unary(ValueType),
    /// [t t] -> [t]
    Binary(ValueType),
    /// [t] -> [i32]
    Test(ValueType),
    /// [t t] -> [i32]
    Compare(ValueType),
    /// [t1] -> [t2]
    Convert(ValueType, ValueType),
}

impl NumSig {
    pub fn params(&self) -> Vec<ValueType> {
        match *self {
            Unary(t) | Test(t) => vec![t],
            Binary(t) | Compare(t) => vec![t, t],
            Convert(from, _) => vec![from],
        }
    }

    pub fn result(&self) -> ValueType {
        match *self {
            Unary(t) | Binary(t) => t,
            Test(_) | Compare(_) => I32,
            Convert(_, to) => to,
        }
    }
}

opcode_table! {
    pub enum NumOp: NumSig {
        0x45 => I32Eqz, "i32.eqz", Test(I32);
        0x46 => I32Eq, "i32.eq", Compare(I32);
        0x47 => I32Ne, "i32.ne", Compare(I32);
        0x48 => I32LtS, "i32.lt_s", Compare(I32);
        0x49 => I32LtU, "i32.lt_u", Compare(I32);
        0x4a => I32GtS, "i32.gt_s", Compare(I32);
        0x4b => I32GtU, "i32.gt_u", Compare(I32);
        0x4c => I32LeS, "i32.le_s", Compare(I32);
        0x4d => I32LeU, "i32.le_u", Compare(I32);
        0x4e => I32GeS, "i32.ge_s", Compare(I32);
        0x4f => I32GeU, "i32.ge_u", Compare(I32);

        0x50 => I64Eqz, "i64.eqz", Test(I64);
        0x51 => I64Eq, "i64.eq", Compare(I64);
        0x52 => I64Ne, "i64.ne", Compare(I64);
        0x53 => I64LtS, "i64.lt_s", Compare(I64);
        0x54 => I64LtU, "i64.lt_u", Compare(I64);
        0x55 => I64GtS, "i64.gt_s", Compare(I64);
        0x56 => I64GtU, "i64.gt_u", Compare(I64);
        0x57 => I64LeS, "i64.le_s", Compare(I64);
        0x58 => I64LeU, "i64.le_u", Compare(I64);
        0x59 => I64GeS, "i64.ge_s", Compare(I64);
        0x5a => I64GeU, "i64.ge_u", Compare(I64);

        0x5b => F32Eq, "f32.eq", Compare(F32);
        0x5c => F32Ne, "f32.ne", Compare(F32);
        0x5d => F32Lt, "f32.lt", Compare(F32);
        0x5e => F32Gt, "f32.gt", Compare(F32);
        0x5f => F32Le, "f32.le", Compare(F32);
        0x60 => F32Ge, "f32.ge", Compare(F32);

        0x61 => F64Eq, "f64.eq", Compare(F64);
        0x62 => F64Ne, "f64.ne", Compare(F64);
        0x63 => F64Lt, "f64.lt", Compare(F64);
        0x64 => F64Gt, "f64.gt", Compare(F64);
        0x65 => F64Le, "f64.le", Compare(F64);
        0x66 => F64Ge, "f64.ge", Compare(F64);

        0x67 => I32Clz, "i32.clz", Unary(I32);
        0x68 => I32Ctz, "i32.ctz", Unary(I32);
        0x69 => I32Popcnt, "i32.popcnt", Unary(I32);
        0x6a => I32Add, "i32.add", Binary(I32);
        0x6b => I32Sub, "i32.sub", Binary(I32);
        0x6c => I32Mul, "i32.mul", Binary(I32);
        0x6d => I32DivS, "i32.div_s", Binary(I32);
        0x6e => I32DivU, "i32.div_u", Binary(I32);
        0x6f => I32RemS, "i32.rem_s", Binary(I32);
        0x70 => I32RemU, "i32.rem_u", Binary(I32);
        0x71 => I32And, "i32.and", Binary(I32);
        0x72 => I32Or, "i32.or", Binary(I32);
        0x73 => I32Xor, "i32.xor", Binary(I32);
        0x74 => I32Shl, "i32.shl", Binary(I32);
        0x75 => I32ShrS, "i32.shr_s", Binary(I32);
        0x76 => I32ShrU, "i32.shr_u", Binary(I32);
        0x77 => I32Rotl, "i32.rotl", Binary(I32);
        0x78 => I32Rotr, "i32.rotr", Binary(I32);

        0x79 => I64Clz, "i64.clz", Unary(I64);
        0x7a => I64Ctz, "i64.ctz", Unary(I64);
        0x7b => I64Popcnt, "i64.popcnt", Unary(I64);
        0x7c => I64Add, "i64.add", Binary(I64);
        0x7d => I64Sub, "i64.sub", Binary(I64);
        0x7e => I64Mul, "i64.mul", Binary(I64);
        0x7f => I64DivS, "i64.div_s", Binary(I64);
        0x80 => I64DivU, "i64.div_u", Binary(I64);
        0x81 => I64RemS, "i64.rem_s", Binary(I64);
        0x82 => I64RemU, "i64.rem_u", Binary(I64);
        0x83 => I64And, "i64.and", Binary(I64);
        0x84 => I64Or, "i64.or", Binary(I64);
        0x85 => I64Xor, "i64.xor", Binary(I64);
        0x86 => I64Shl, "i64.shl", Binary(I64);
        0x87 => I64ShrS, "i64.shr_s", Binary(I64);
        0x88 => I64ShrU, "i64.shr_u", Binary(I64);
        0x89 => I64Rotl, "i64.rotl", Binary(I64);
        0x8a => I64Rotr, "i64.rotr", Binary(I64);

        0x8b => F32Abs, "f32.abs", Unary(F32);
        0x8c => F32Neg, "f32.neg", Unary(F32);
        0x8d => F32Ceil, "f32.ceil", Unary(F32);
        0x8e => F32Floor, "f32.floor", Unary(F32);
        0x8f => F32Trunc, "f32.trunc", Unary(F32);
        0x90 => F32Nearest, "f32.nearest", Unary(F32);
        0x91 => F32Sqrt, "f32.sqrt", Unary(F32);
        0x92 => F32Add, "f32.add", Binary(F32);
        0x93 => F32Sub, "f32.sub", Binary(F32);
        0x94 => F32Mul, "f32.mul", Binary(F32);
        0x95 => F32Div, "f32.div", Binary(F32);
        0x96 => F32Min, "f32.min", Binary(F32);
        0x97 => F32Max, "f32.max", Binary(F32);
        0x98 => F32Copysign, "f32.copysign", Binary(F32);

        0x99 => F64Abs, "f64.abs", Unary(F64);
        0x9a => F64Neg, "f64.neg", Unary(F64);
        0x9b => F64Ceil, "f64.ceil", Unary(F64);
        0x9c => F64Floor, "f64.floor", Unary(F64);
        0x9d => F64Trunc, "f64.trunc", Unary(F64);
        0x9e => F64Nearest, "f64.nearest", Unary(F64);
        0x9f => F64Sqrt, "f64.sqrt", Unary(F64);
        0xa0 => F64Add, "f64.add", Binary(F64);
        0xa1 => F64Sub, "f64.sub", Binary(F64);
        0xa2 => F64Mul, "f64.mul", Binary(F64);
        0xa3 => F64Div, "f64.div", Binary(F64);
        0xa4 => F64Min, "f64.min", Binary(F64);
        0xa5 => F64Max, "f64.max", Binary(F64);
        0xa6 => F64Copysign, "f64.copysign", Binary(F64);

        0xa7 => I32WrapI64, "i32.wrap_i64", Convert(I64, I32);
        0xa8 => I32TruncF32S, "i32.trunc_f32_s", Convert(F32, I32);
        0xa9 => I32TruncF32U, "i32.trunc_f32_u", Convert(F32, I32);
        0xaa => I32TruncF64S, "i32.trunc_f64_s", Convert(F64, I32);
        0xab => I32TruncF64U, "i32.trunc_f64_u", Convert(F64, I32);
        0xac => I64ExtendI32S, "i64.extend_i32_s", Convert(I32, I64);
        0xad => I64ExtendI32U, "i64.extend_i32_u", Convert(I32, I64);
        0xae => I64TruncF32S, "i64.trunc_f32_s", Convert(F32, I64);
        0xaf => I64TruncF32U, "i64.trunc_f32_u", Convert(F32, I64);
        0xb0 => I64TruncF64S, "i64.trunc_f64_s", Convert(F64, I64);
        0xb1 => I64TruncF64U, "i64.trunc_f64_u", Convert(F64, I64);
        0xb2 => F32ConvertI32S, "f32.convert_i32_s", Convert(I32, F32);
        0xb3 => F32ConvertI32U, "f32.convert_i32_u", Convert(I32, F32);
        0xb4 => F32ConvertI64S, "f32.convert_i64_s", Convert(I64, F32);
        0xb5 => F32ConvertI64U, "f32.convert_i64_u", Convert(I64, F32);
        0xb6 => F32DemoteF64, "f32.demote_f64", Convert(F64, F32);
        0xb7 => F64ConvertI32S, "f64.convert_i32_s", Convert(I32, F64);
        0xb8 => F64ConvertI32U, "f64.convert_i32_u", Convert(I32, F64);
        0xb9 => F64ConvertI64S, "f64.convert_i64_s", Convert(I64, F64);
        0xba => F64ConvertI64U, "f64.convert_i64_u", Convert(I64, F64);
        0xbb => F64PromoteF32, "f64.promote_f32", Convert(F32, F64);
        0xbc => I32ReinterpretF32, "i32.reinterpret_f32", Convert(F32, I32);
        0xbd => I64ReinterpretF64, "i64.reinterpret_f64", Convert(F64, I64);
        0xbe => F32ReinterpretI32, "f32.reinterpret_i32", Convert(I32, F32);
        0xbf => F64ReinterpretI64, "f64.reinterpret_i64", Convert(I64, F64);

        0xc0 => I32Extend8S, "i32.extend8_s", Unary(I32);
        0xc1 => I32Extend16S, "i32.extend16_s", Unary(I32);
        0xc2 => I64Extend8S, "i64.extend8_s", Unary(I64);
        0xc3 => I64Extend16S, "i64.extend16_s", Unary(I64);
        0xc4 => I64Extend32S, "i64.extend32_s", Unary(I64);

        0xfc00 => I32TruncSatF32S, "i32.trunc_sat_f32_s", Convert(F32, I32);
        0xfc01 => I32TruncSatF32U, "i32.trunc_sat_f32_u", Convert(F32, I32);
        0xfc02 => I32TruncSatF64S, "i32.trunc_sat_f64_s", Convert(F64, I32);
        0xfc03 => I32TruncSatF64U, "i32.trunc_sat_f64_u", Convert(F64, I32);
        0xfc04 => I64TruncSatF32S, "i64.trunc_sat_f32_s", Convert(F32, I64);
        0xfc05 => I64TruncSatF32U, "i64.trunc_sat_f32_u", Convert(F32, I64);
        0xfc06 => I64TruncSatF64S, "i64.trunc_sat_f64_s", Convert(F64, I64);
        0xfc07 => I64TruncSatF64U, "i64.trunc_sat_f64_u", Convert(F64, I64);
    }
}
