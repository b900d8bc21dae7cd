//! Vector memory instructions
//!
//! Every access pops an i32 base address, adds the static offset from the
//! memarg in 64-bit arithmetic and bounds-checks the whole access before
//! touching memory.

use super::simd::widen_lanes;
use super::{MemArg, Memory, RuntimeError, Stack};
use crate::parser::instruction::{LaneWidth, LoadExtend};
use crate::runtime::memory::effective_address;

fn pop_address(stack: &mut Stack, memarg: &MemArg) -> Result<u64, RuntimeError> {
    let base = stack.pop_u32()?;
    Ok(effective_address(base, memarg.offset))
}

/// Byte range of `lane` for a lane of `width`
fn lane_range(width: LaneWidth, lane: u8) -> Result<std::ops::Range<usize>, RuntimeError> {
    let n = width.bytes() as usize;
    if lane >= width.lanes() {
        return Err(RuntimeError::fault(format!(
            "lane index {lane} out of range for {} lanes",
            width.lanes()
        )));
    }
    let start = lane as usize * n;
    Ok(start..start + n)
}

/// v128.load
pub fn load(stack: &mut Stack, memory: &Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = pop_address(stack, memarg)?;
    stack.push_val(memory.load::<16>(ea)?);
    Ok(())
}

/// v128.store
pub fn store(stack: &mut Stack, memory: &mut Memory, memarg: &MemArg) -> Result<(), RuntimeError> {
    let v = stack.pop_v128()?;
    let ea = pop_address(stack, memarg)?;
    memory.store(ea, &v)
}

/// v128.loadMxN_s/u: read 64 bits and widen each lane to twice its width
pub fn load_extend(stack: &mut Stack, memory: &Memory, kind: LoadExtend, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = pop_address(stack, memarg)?;
    let mut v = [0u8; 16];
    v[..8].copy_from_slice(&memory.load::<8>(ea)?);
    let r = match kind {
        LoadExtend::I8x8S => widen_lanes::<i8, i16, 16, 8>(v, false, |x| x as i16),
        LoadExtend::I8x8U => widen_lanes::<u8, u16, 16, 8>(v, false, |x| x as u16),
        LoadExtend::I16x4S => widen_lanes::<i16, i32, 8, 4>(v, false, |x| x as i32),
        LoadExtend::I16x4U => widen_lanes::<u16, u32, 8, 4>(v, false, |x| x as u32),
        LoadExtend::I32x2S => widen_lanes::<i32, i64, 4, 2>(v, false, |x| x as i64),
        LoadExtend::I32x2U => widen_lanes::<u32, u64, 4, 2>(v, false, |x| x as u64),
    };
    stack.push_val(r);
    Ok(())
}

/// v128.loadN_splat
pub fn load_splat(stack: &mut Stack, memory: &Memory, width: LaneWidth, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = pop_address(stack, memarg)?;
    let bytes = memory.slice(ea, width.bytes() as usize)?;
    let v: [u8; 16] = std::array::from_fn(|i| bytes[i % bytes.len()]);
    stack.push_val(v);
    Ok(())
}

/// v128.load32_zero and v128.load64_zero
pub fn load_zero(stack: &mut Stack, memory: &Memory, width: LaneWidth, memarg: &MemArg) -> Result<(), RuntimeError> {
    let ea = pop_address(stack, memarg)?;
    let bytes = memory.slice(ea, width.bytes() as usize)?;
    let mut v = [0u8; 16];
    v[..bytes.len()].copy_from_slice(bytes);
    stack.push_val(v);
    Ok(())
}

/// v128.loadN_lane: replace one lane of the operand vector with memory
pub fn load_lane(
    stack: &mut Stack,
    memory: &Memory,
    width: LaneWidth,
    memarg: &MemArg,
    lane: u8,
) -> Result<(), RuntimeError> {
    let mut v = stack.pop_v128()?;
    let ea = pop_address(stack, memarg)?;
    let range = lane_range(width, lane)?;
    v[range.clone()].copy_from_slice(memory.slice(ea, range.len())?);
    stack.push_val(v);
    Ok(())
}

/// v128.storeN_lane
pub fn store_lane(
    stack: &mut Stack,
    memory: &mut Memory,
    width: LaneWidth,
    memarg: &MemArg,
    lane: u8,
) -> Result<(), RuntimeError> {
    let v = stack.pop_v128()?;
    let ea = pop_address(stack, memarg)?;
    memory.store(ea, &v[lane_range(width, lane)?])
}
