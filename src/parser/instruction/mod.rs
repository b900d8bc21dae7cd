//! WebAssembly instruction representation and decoding
//!
//! This module defines the instruction kinds executed by the runtime and
//! checked by the validator. Plain numeric and vector operations are
//! generated from declarative opcode tables in [`num`] and [`simd`];
//! instructions carrying immediates are spelled out in [`InstructionKind`].

/// Generate an opcode enum from a `(opcode => variant, mnemonic, signature)`
/// table, with lookup in both directions and a static mnemonic.
macro_rules! opcode_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident: $sig:ident {
            $($code:literal => $variant:ident, $mnemonic:literal, $signature:expr;)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Every operation in the table, in opcode order
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn from_opcode(code: u32) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)*
                    _ => None,
                }
            }

            pub fn opcode(&self) -> u32 {
                match self {
                    $($name::$variant => $code,)*
                }
            }

            pub fn mnemonic(&self) -> &'static str {
                match self {
                    $($name::$variant => $mnemonic,)*
                }
            }

            pub fn signature(&self) -> $sig {
                match self {
                    $($name::$variant => $signature,)*
                }
            }
        }
    };
}

pub mod decode;
pub mod num;
pub mod simd;

pub use decode::{decode_all, DecodeError};
pub use num::{NumOp, NumSig};
pub use simd::{LaneWidth, LoadExtend, Shape, VecOp, VecSig};

use super::types::{HeapType, RefType, ValueType};
use fhex::ToHex;
use std::fmt;

/// Memory argument for memory access instructions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemArg {
    /// Memory alignment (as power of 2)
    pub align: u32,
    /// Memory offset
    pub offset: u32,
}

impl MemArg {
    pub fn new(align: u32, offset: u32) -> Self {
        MemArg { align, offset }
    }
}

/// Algebraic data type representing every instruction this engine handles
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    // Parametric instructions
    Unreachable,
    Nop,
    Drop,
    Select,
    SelectTyped { val_types: Vec<ValueType> },

    // Constants
    I32Const { value: i32 },
    I64Const { value: i64 },
    F32Const { value: f32 },
    F64Const { value: f64 },
    V128Const { value: [u8; 16] },

    // Scalar numeric operations (0x45-0xc4, 0xfc 0-7)
    Num(NumOp),

    // Vector operations without immediates (0xfd)
    Simd(VecOp),

    // Vector memory instructions
    V128Load { memarg: MemArg },
    V128Store { memarg: MemArg },
    V128LoadExtend { kind: LoadExtend, memarg: MemArg },
    V128LoadSplat { width: LaneWidth, memarg: MemArg },
    V128LoadZero { width: LaneWidth, memarg: MemArg },
    V128LoadLane { width: LaneWidth, memarg: MemArg, lane: u8 },
    V128StoreLane { width: LaneWidth, memarg: MemArg, lane: u8 },

    // Vector lane instructions
    I8x16Shuffle { lanes: [u8; 16] },
    /// `signed` selects `_s` over `_u` for the packed i8x16/i16x8 shapes
    ExtractLane { shape: Shape, lane: u8, signed: bool },
    ReplaceLane { shape: Shape, lane: u8 },

    // Reference instructions
    RefNull { heap: HeapType },
    RefIsNull,
    RefFunc { func_idx: u32 },
    RefEq,
    RefAsNonNull,
    BrOnNull { label_idx: u32 },
    BrOnNonNull { label_idx: u32 },
    RefTest { ref_type: RefType },
    RefCast { ref_type: RefType },
    BrOnCast { label_idx: u32, from: RefType, to: RefType },
    BrOnCastFail { label_idx: u32, from: RefType, to: RefType },
    AnyConvertExtern,
    ExternConvertAny,
    RefI31,
    I31GetS,
    I31GetU,

    // Struct instructions
    StructNew { type_idx: u32 },
    StructNewDefault { type_idx: u32 },
    StructGet { type_idx: u32, field_idx: u32 },
    StructGetS { type_idx: u32, field_idx: u32 },
    StructGetU { type_idx: u32, field_idx: u32 },
    StructSet { type_idx: u32, field_idx: u32 },

    // Array instructions
    ArrayNew { type_idx: u32 },
    ArrayNewDefault { type_idx: u32 },
    ArrayNewFixed { type_idx: u32, len: u32 },
    ArrayNewData { type_idx: u32, data_idx: u32 },
    ArrayNewElem { type_idx: u32, elem_idx: u32 },
    ArrayGet { type_idx: u32 },
    ArrayGetS { type_idx: u32 },
    ArrayGetU { type_idx: u32 },
    ArraySet { type_idx: u32 },
    ArrayLen,
    ArrayFill { type_idx: u32 },
    ArrayCopy { dst_type: u32, src_type: u32 },
    ArrayInitData { type_idx: u32, data_idx: u32 },
    ArrayInitElem { type_idx: u32, elem_idx: u32 },
}

impl InstructionKind {
    /// Get the mnemonic for this instruction
    pub fn mnemonic(&self) -> &'static str {
        use InstructionKind::*;
        match self {
            Unreachable => "unreachable",
            Nop => "nop",
            Drop => "drop",
            Select | SelectTyped { .. } => "select",

            I32Const { .. } => "i32.const",
            I64Const { .. } => "i64.const",
            F32Const { .. } => "f32.const",
            F64Const { .. } => "f64.const",
            V128Const { .. } => "v128.const",

            Num(op) => op.mnemonic(),
            Simd(op) => op.mnemonic(),

            V128Load { .. } => "v128.load",
            V128Store { .. } => "v128.store",
            V128LoadExtend { kind, .. } => kind.mnemonic(),
            V128LoadSplat { width, .. } => match width {
                LaneWidth::W8 => "v128.load8_splat",
                LaneWidth::W16 => "v128.load16_splat",
                LaneWidth::W32 => "v128.load32_splat",
                LaneWidth::W64 => "v128.load64_splat",
            },
            V128LoadZero { width, .. } => match width {
                LaneWidth::W32 => "v128.load32_zero",
                _ => "v128.load64_zero",
            },
            V128LoadLane { width, .. } => match width {
                LaneWidth::W8 => "v128.load8_lane",
                LaneWidth::W16 => "v128.load16_lane",
                LaneWidth::W32 => "v128.load32_lane",
                LaneWidth::W64 => "v128.load64_lane",
            },
            V128StoreLane { width, .. } => match width {
                LaneWidth::W8 => "v128.store8_lane",
                LaneWidth::W16 => "v128.store16_lane",
                LaneWidth::W32 => "v128.store32_lane",
                LaneWidth::W64 => "v128.store64_lane",
            },

            I8x16Shuffle { .. } => "i8x16.shuffle",
            ExtractLane { shape, signed, .. } => match (shape, signed) {
                (Shape::I8x16, true) => "i8x16.extract_lane_s",
                (Shape::I8x16, false) => "i8x16.extract_lane_u",
                (Shape::I16x8, true) => "i16x8.extract_lane_s",
                (Shape::I16x8, false) => "i16x8.extract_lane_u",
                (Shape::I32x4, _) => "i32x4.extract_lane",
                (Shape::I64x2, _) => "i64x2.extract_lane",
                (Shape::F32x4, _) => "f32x4.extract_lane",
                (Shape::F64x2, _) => "f64x2.extract_lane",
            },
            ReplaceLane { shape, .. } => match shape {
                Shape::I8x16 => "i8x16.replace_lane",
                Shape::I16x8 => "i16x8.replace_lane",
                Shape::I32x4 => "i32x4.replace_lane",
                Shape::I64x2 => "i64x2.replace_lane",
                Shape::F32x4 => "f32x4.replace_lane",
                Shape::F64x2 => "f64x2.replace_lane",
            },

            RefNull { .. } => "ref.null",
            RefIsNull => "ref.is_null",
            RefFunc { .. } => "ref.func",
            RefEq => "ref.eq",
            RefAsNonNull => "ref.as_non_null",
            BrOnNull { .. } => "br_on_null",
            BrOnNonNull { .. } => "br_on_non_null",
            RefTest { .. } => "ref.test",
            RefCast { .. } => "ref.cast",
            BrOnCast { .. } => "br_on_cast",
            BrOnCastFail { .. } => "br_on_cast_fail",
            AnyConvertExtern => "any.convert_extern",
            ExternConvertAny => "extern.convert_any",
            RefI31 => "ref.i31",
            I31GetS => "i31.get_s",
            I31GetU => "i31.get_u",

            StructNew { .. } => "struct.new",
            StructNewDefault { .. } => "struct.new_default",
            StructGet { .. } => "struct.get",
            StructGetS { .. } => "struct.get_s",
            StructGetU { .. } => "struct.get_u",
            StructSet { .. } => "struct.set",

            ArrayNew { .. } => "array.new",
            ArrayNewDefault { .. } => "array.new_default",
            ArrayNewFixed { .. } => "array.new_fixed",
            ArrayNewData { .. } => "array.new_data",
            ArrayNewElem { .. } => "array.new_elem",
            ArrayGet { .. } => "array.get",
            ArrayGetS { .. } => "array.get_s",
            ArrayGetU { .. } => "array.get_u",
            ArraySet { .. } => "array.set",
            ArrayLen => "array.len",
            ArrayFill { .. } => "array.fill",
            ArrayCopy { .. } => "array.copy",
            ArrayInitData { .. } => "array.init_data",
            ArrayInitElem { .. } => "array.init_elem",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use InstructionKind::*;

        write!(f, "{}", self.mnemonic())?;

        match self {
            SelectTyped { val_types } => {
                for vt in val_types {
                    write!(f, " {vt}")?;
                }
                Ok(())
            }
            I32Const { value } => write!(f, " {value}"),
            I64Const { value } => write!(f, " {value}"),
            F32Const { value } => write!(f, " {}", value.to_hex()),
            F64Const { value } => write!(f, " {}", value.to_hex()),
            V128Const { value } => write!(f, " 0x{}", hex::encode(value)),
            V128Load { memarg }
            | V128Store { memarg }
            | V128LoadExtend { memarg, .. }
            | V128LoadSplat { memarg, .. }
            | V128LoadZero { memarg, .. } => write!(f, " {} {}", memarg.align, memarg.offset),
            V128LoadLane { memarg, lane, .. } | V128StoreLane { memarg, lane, .. } => {
                write!(f, " {} {} {lane}", memarg.align, memarg.offset)
            }
            I8x16Shuffle { lanes } => {
                for lane in lanes {
                    write!(f, " {lane}")?;
                }
                Ok(())
            }
            ExtractLane { lane, .. } | ReplaceLane { lane, .. } => write!(f, " {lane}"),
            RefNull { heap } => write!(f, " {heap}"),
            RefFunc { func_idx } => write!(f, " {func_idx}"),
            BrOnNull { label_idx } | BrOnNonNull { label_idx } => write!(f, " {label_idx}"),
            RefTest { ref_type } | RefCast { ref_type } => write!(f, " {ref_type}"),
            BrOnCast { label_idx, from, to } | BrOnCastFail { label_idx, from, to } => {
                write!(f, " {label_idx} {from} {to}")
            }
            StructNew { type_idx }
            | StructNewDefault { type_idx }
            | ArrayNew { type_idx }
            | ArrayNewDefault { type_idx }
            | ArrayGet { type_idx }
            | ArrayGetS { type_idx }
            | ArrayGetU { type_idx }
            | ArraySet { type_idx }
            | ArrayFill { type_idx } => write!(f, " {type_idx}"),
            StructGet { type_idx, field_idx }
            | StructGetS { type_idx, field_idx }
            | StructGetU { type_idx, field_idx }
            | StructSet { type_idx, field_idx } => write!(f, " {type_idx} {field_idx}"),
            ArrayNewFixed { type_idx, len } => write!(f, " {type_idx} {len}"),
            ArrayNewData { type_idx, data_idx } | ArrayInitData { type_idx, data_idx } => {
                write!(f, " {type_idx} {data_idx}")
            }
            ArrayNewElem { type_idx, elem_idx } | ArrayInitElem { type_idx, elem_idx } => {
                write!(f, " {type_idx} {elem_idx}")
            }
            ArrayCopy { dst_type, src_type } => write!(f, " {dst_type} {src_type}"),
            // Instructions with no operands
            _ => Ok(()),
        }
    }
}
