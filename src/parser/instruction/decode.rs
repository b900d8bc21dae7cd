//! Instruction decoding from binary format
//!
//! Each instruction consumes exactly the immediates its encoding defines.
//! Control instructions other than `unreachable`/`nop` are not decoded here.

use super::{InstructionKind, LaneWidth, LoadExtend, MemArg, NumOp, Shape, VecOp};
use crate::parser::reader::Reader;
use crate::parser::types::{HeapType, RefType, ValueType};
use std::io;
use thiserror::Error;

/// Error type for instruction decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("illegal opcode {0:#04x}")]
    UnknownOpcode(u8),
    /// Multi-byte opcodes: 0xfb for GC, 0xfc for saturating truncation, 0xfd for SIMD
    #[error("unknown instruction: {0:#04x} {1:#04x}")]
    UnknownInstruction(u8, u32),
    #[error("invalid value type: {0:#04x}")]
    InvalidValueType(u8),
    #[error("invalid heap type: {0}")]
    InvalidHeapType(i64),
    #[error("invalid cast flags: {0:#04x}")]
    InvalidCastFlags(u8),
}

impl MemArg {
    /// Decode a memory argument from the reader
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let align = reader.read_vu32()?;
        let offset = reader.read_vu32()?;
        Ok(MemArg { align, offset })
    }
}

impl InstructionKind {
    /// Decode an instruction from the reader
    pub fn decode(reader: &mut Reader) -> Result<Self, DecodeError> {
        let opcode = reader.read_byte()?;

        use InstructionKind::*;
        match opcode {
            0x00 => Ok(Unreachable),
            0x01 => Ok(Nop),
            0x1a => Ok(Drop),
            0x1b => Ok(Select),
            0x1c => {
                let count = reader.read_vu32()?;
                let mut val_types = Vec::with_capacity(count.min(16) as usize);
                for _ in 0..count {
                    val_types.push(ValueType::decode(reader)?);
                }
                Ok(SelectTyped { val_types })
            }

            0x41 => Ok(I32Const {
                value: reader.read_vs32()?,
            }),
            0x42 => Ok(I64Const {
                value: reader.read_vs64()?,
            }),
            0x43 => Ok(F32Const {
                value: reader.read_f32()?,
            }),
            0x44 => Ok(F64Const {
                value: reader.read_f64()?,
            }),
            0x45..=0xc4 => NumOp::from_opcode(opcode as u32)
                .map(Num)
                .ok_or(DecodeError::UnknownOpcode(opcode)),

            0xd0 => Ok(RefNull {
                heap: HeapType::decode(reader)?,
            }),
            0xd1 => Ok(RefIsNull),
            0xd2 => Ok(RefFunc {
                func_idx: reader.read_vu32()?,
            }),
            0xd3 => Ok(RefEq),
            0xd4 => Ok(RefAsNonNull),
            0xd5 => Ok(BrOnNull {
                label_idx: reader.read_vu32()?,
            }),
            0xd6 => Ok(BrOnNonNull {
                label_idx: reader.read_vu32()?,
            }),

            0xfb => {
                let subopcode = reader.read_vu32()?;
                decode_0xfb(subopcode, reader)
            }
            0xfc => {
                let subopcode = reader.read_vu32()?;
                NumOp::from_opcode(0xfc00 | subopcode)
                    .filter(|_| subopcode <= 0x07)
                    .map(Num)
                    .ok_or(DecodeError::UnknownInstruction(0xfc, subopcode))
            }
            0xfd => {
                let subopcode = reader.read_vu32()?;
                decode_0xfd(subopcode, reader)
            }
            _ => Err(DecodeError::UnknownOpcode(opcode)),
        }
    }
}

/// Decode a flat sequence of instructions until the bytes run out
pub fn decode_all(bytes: Vec<u8>) -> Result<Vec<InstructionKind>, DecodeError> {
    let mut reader = Reader::new(bytes);
    let mut instructions = Vec::new();
    while !reader.is_empty() {
        instructions.push(InstructionKind::decode(&mut reader)?);
    }
    Ok(instructions)
}

fn decode_ref_type(reader: &mut Reader, nullable: bool) -> Result<RefType, DecodeError> {
    Ok(RefType::new(nullable, HeapType::decode(reader)?))
}

/// Decode 0xFB prefix instructions (GC)
fn decode_0xfb(subopcode: u32, reader: &mut Reader) -> Result<InstructionKind, DecodeError> {
    use InstructionKind::*;
    let kind = match subopcode {
        0 => StructNew {
            type_idx: reader.read_vu32()?,
        },
        1 => StructNewDefault {
            type_idx: reader.read_vu32()?,
        },
        2..=5 => {
            let type_idx = reader.read_vu32()?;
            let field_idx = reader.read_vu32()?;
            match subopcode {
                2 => StructGet { type_idx, field_idx },
                3 => StructGetS { type_idx, field_idx },
                4 => StructGetU { type_idx, field_idx },
                _ => StructSet { type_idx, field_idx },
            }
        }
        6 => ArrayNew {
            type_idx: reader.read_vu32()?,
        },
        7 => ArrayNewDefault {
            type_idx: reader.read_vu32()?,
        },
        8 => ArrayNewFixed {
            type_idx: reader.read_vu32()?,
            len: reader.read_vu32()?,
        },
        9 => ArrayNewData {
            type_idx: reader.read_vu32()?,
            data_idx: reader.read_vu32()?,
        },
        10 => ArrayNewElem {
            type_idx: reader.read_vu32()?,
            elem_idx: reader.read_vu32()?,
        },
        11 => ArrayGet {
            type_idx: reader.read_vu32()?,
        },
        12 => ArrayGetS {
            type_idx: reader.read_vu32()?,
        },
        13 => ArrayGetU {
            type_idx: reader.read_vu32()?,
        },
        14 => ArraySet {
            type_idx: reader.read_vu32()?,
        },
        15 => ArrayLen,
        16 => ArrayFill {
            type_idx: reader.read_vu32()?,
        },
        17 => ArrayCopy {
            dst_type: reader.read_vu32()?,
            src_type: reader.read_vu32()?,
        },
        18 => ArrayInitData {
            type_idx: reader.read_vu32()?,
            data_idx: reader.read_vu32()?,
        },
        19 => ArrayInitElem {
            type_idx: reader.read_vu32()?,
            elem_idx: reader.read_vu32()?,
        },
        20 => RefTest {
            ref_type: decode_ref_type(reader, false)?,
        },
        21 => RefTest {
            ref_type: decode_ref_type(reader, true)?,
        },
        22 => RefCast {
            ref_type: decode_ref_type(reader, false)?,
        },
        23 => RefCast {
            ref_type: decode_ref_type(reader, true)?,
        },
        24 | 25 => {
            // bit 0: source nullable, bit 1: target nullable
            let flags = reader.read_byte()?;
            if flags & !0x03 != 0 {
                return Err(DecodeError::InvalidCastFlags(flags));
            }
            let label_idx = reader.read_vu32()?;
            let from = decode_ref_type(reader, flags & 0x01 != 0)?;
            let to = decode_ref_type(reader, flags & 0x02 != 0)?;
            if subopcode == 24 {
                BrOnCast { label_idx, from, to }
            } else {
                BrOnCastFail { label_idx, from, to }
            }
        }
        26 => AnyConvertExtern,
        27 => ExternConvertAny,
        28 => RefI31,
        29 => I31GetS,
        30 => I31GetU,
        _ => return Err(DecodeError::UnknownInstruction(0xfb, subopcode)),
    };
    Ok(kind)
}

/// Decode 0xFD prefix instructions (SIMD)
fn decode_0xfd(subopcode: u32, reader: &mut Reader) -> Result<InstructionKind, DecodeError> {
    use InstructionKind::*;
    let kind = match subopcode {
        0x00 => V128Load {
            memarg: MemArg::decode(reader)?,
        },
        0x01..=0x06 => {
            let kind = match subopcode {
                0x01 => LoadExtend::I8x8S,
                0x02 => LoadExtend::I8x8U,
                0x03 => LoadExtend::I16x4S,
                0x04 => LoadExtend::I16x4U,
                0x05 => LoadExtend::I32x2S,
                _ => LoadExtend::I32x2U,
            };
            V128LoadExtend {
                kind,
                memarg: MemArg::decode(reader)?,
            }
        }
        0x07 => V128LoadSplat {
            width: LaneWidth::W8,
            memarg: MemArg::decode(reader)?,
        },
        0x08 => V128LoadSplat {
            width: LaneWidth::W16,
            memarg: MemArg::decode(reader)?,
        },
        0x09 => V128LoadSplat {
            width: LaneWidth::W32,
            memarg: MemArg::decode(reader)?,
        },
        0x0a => V128LoadSplat {
            width: LaneWidth::W64,
            memarg: MemArg::decode(reader)?,
        },
        0x0b => V128Store {
            memarg: MemArg::decode(reader)?,
        },

        // V128Const: 16 raw bytes
        0x0c => V128Const {
            value: reader.read_v128()?,
        },

        // I8x16Shuffle: 16 lane bytes
        0x0d => I8x16Shuffle {
            lanes: reader.read_v128()?,
        },

        // Lane extract/replace (1 lane byte)
        0x15..=0x22 => {
            let lane = reader.read_byte()?;
            match subopcode {
                0x15 => ExtractLane { shape: Shape::I8x16, lane, signed: true },
                0x16 => ExtractLane { shape: Shape::I8x16, lane, signed: false },
                0x17 => ReplaceLane { shape: Shape::I8x16, lane },
                0x18 => ExtractLane { shape: Shape::I16x8, lane, signed: true },
                0x19 => ExtractLane { shape: Shape::I16x8, lane, signed: false },
                0x1a => ReplaceLane { shape: Shape::I16x8, lane },
                0x1b => ExtractLane { shape: Shape::I32x4, lane, signed: false },
                0x1c => ReplaceLane { shape: Shape::I32x4, lane },
                0x1d => ExtractLane { shape: Shape::I64x2, lane, signed: false },
                0x1e => ReplaceLane { shape: Shape::I64x2, lane },
                0x1f => ExtractLane { shape: Shape::F32x4, lane, signed: false },
                0x20 => ReplaceLane { shape: Shape::F32x4, lane },
                0x21 => ExtractLane { shape: Shape::F64x2, lane, signed: false },
                _ => ReplaceLane { shape: Shape::F64x2, lane },
            }
        }

        // Lane loads and stores: memarg then lane byte
        0x54..=0x5b => {
            let width = match subopcode & 0x03 {
                0 => LaneWidth::W8,
                1 => LaneWidth::W16,
                2 => LaneWidth::W32,
                _ => LaneWidth::W64,
            };
            let memarg = MemArg::decode(reader)?;
            let lane = reader.read_byte()?;
            if subopcode < 0x58 {
                V128LoadLane { width, memarg, lane }
            } else {
                V128StoreLane { width, memarg, lane }
            }
        }
        0x5c => V128LoadZero {
            width: LaneWidth::W32,
            memarg: MemArg::decode(reader)?,
        },
        0x5d => V128LoadZero {
            width: LaneWidth::W64,
            memarg: MemArg::decode(reader)?,
        },

        _ => VecOp::from_opcode(subopcode)
            .map(Simd)
            .ok_or(DecodeError::UnknownInstruction(0xfd, subopcode))?,
    };
    Ok(kind)
}
