//! Vector (v128) instructions
//!
//! A v128 is sixteen little-endian bytes; each shape reinterprets them as
//! lanes of one scalar type. Operations read the lanes out with [`lanes`],
//! apply the scalar operation lane-wise and write them back with
//! [`from_lanes`]. Comparisons produce all-ones or all-zeros lanes.
//!
//! Relaxed operations are dispatched to [`relaxed`](super::relaxed).

use super::numeric::{f32_max, f32_min, f64_max, f64_min};
use super::{relaxed, RuntimeError, Stack, StackValue};
use crate::parser::instruction::{Shape, VecOp};
use crate::runtime::config::RelaxedSimd;

// ============================================================================
// Lane access
// ============================================================================

/// A scalar that can occupy a v128 lane
pub(crate) trait Lane: Copy + Default + PartialEq {
    const BYTES: usize;
    fn read(bytes: &[u8]) -> Self;
    fn write(self, bytes: &mut [u8]);
}

macro_rules! lane {
    ($($t:ty),*) => {
        $(
            impl Lane for $t {
                const BYTES: usize = std::mem::size_of::<$t>();

                fn read(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(&bytes[..Self::BYTES]);
                    <$t>::from_le_bytes(buf)
                }

                fn write(self, bytes: &mut [u8]) {
                    bytes[..Self::BYTES].copy_from_slice(&self.to_le_bytes());
                }
            }
        )*
    };
}

lane!(i8, u8, i16, u16, i32, u32, i64, u64, f32, f64);

/// Split a v128 into `N` lanes of `T`; `N * T::BYTES` must be 16
pub(crate) fn lanes<T: Lane, const N: usize>(v: [u8; 16]) -> [T; N] {
    debug_assert_eq!(N * T::BYTES, 16);
    std::array::from_fn(|i| T::read(&v[i * T::BYTES..]))
}

pub(crate) fn from_lanes<T: Lane, const N: usize>(lanes: [T; N]) -> [u8; 16] {
    debug_assert_eq!(N * T::BYTES, 16);
    let mut v = [0u8; 16];
    for (i, lane) in lanes.into_iter().enumerate() {
        lane.write(&mut v[i * T::BYTES..]);
    }
    v
}

/// Convert the low (or high) half of the lanes of `v` to a wider type
pub(crate) fn widen_lanes<T: Lane, U: Lane, const NI: usize, const NO: usize>(
    v: [u8; 16],
    high: bool,
    conv: impl Fn(T) -> U,
) -> [u8; 16] {
    let a = lanes::<T, NI>(v);
    let base = if high { NO } else { 0 };
    from_lanes::<U, NO>(std::array::from_fn(|i| conv(a[base + i])))
}

fn lane_index(lane: u8, lanes: usize) -> Result<usize, RuntimeError> {
    let lane = lane as usize;
    if lane >= lanes {
        return Err(RuntimeError::fault(format!("lane index {lane} out of range for {lanes} lanes")));
    }
    Ok(lane)
}

fn get_lane<T: Lane>(v: &[u8; 16], lane: u8) -> Result<T, RuntimeError> {
    let i = lane_index(lane, 16 / T::BYTES)?;
    Ok(T::read(&v[i * T::BYTES..]))
}

fn set_lane<T: Lane>(v: &mut [u8; 16], lane: u8, x: T) -> Result<(), RuntimeError> {
    let i = lane_index(lane, 16 / T::BYTES)?;
    x.write(&mut v[i * T::BYTES..]);
    Ok(())
}

// ============================================================================
// Operand helpers
// ============================================================================

pub(crate) fn v_unop<T: Lane, const N: usize>(stack: &mut Stack, f: impl Fn(T) -> T) -> Result<(), RuntimeError> {
    let a = lanes::<T, N>(stack.pop_v128()?);
    stack.push_val(from_lanes(a.map(f)));
    Ok(())
}

pub(crate) fn v_binop<T: Lane, const N: usize>(
    stack: &mut Stack,
    f: impl Fn(T, T) -> T,
) -> Result<(), RuntimeError> {
    let b = lanes::<T, N>(stack.pop_v128()?);
    let a = lanes::<T, N>(stack.pop_v128()?);
    stack.push_val(from_lanes::<T, N>(std::array::from_fn(|i| f(a[i], b[i]))));
    Ok(())
}

/// Lane-wise conversion with the same lane count
fn v_convert<T: Lane, U: Lane, const N: usize>(stack: &mut Stack, f: impl Fn(T) -> U) -> Result<(), RuntimeError> {
    let a = lanes::<T, N>(stack.pop_v128()?);
    stack.push_val(from_lanes(a.map(f)));
    Ok(())
}

fn v_cmp<T: Lane, const N: usize>(stack: &mut Stack, f: impl Fn(T, T) -> bool) -> Result<(), RuntimeError> {
    let b = lanes::<T, N>(stack.pop_v128()?);
    let a = lanes::<T, N>(stack.pop_v128()?);
    let mut r = [0u8; 16];
    for i in 0..N {
        if f(a[i], b[i]) {
            r[i * T::BYTES..(i + 1) * T::BYTES].fill(0xff);
        }
    }
    stack.push_val(r);
    Ok(())
}

/// The shift amount is taken modulo the lane width
fn v_shift<T: Lane, const N: usize>(stack: &mut Stack, f: impl Fn(T, u32) -> T) -> Result<(), RuntimeError> {
    let s = stack.pop_i32()? as u32 % (T::BYTES as u32 * 8);
    let a = lanes::<T, N>(stack.pop_v128()?);
    stack.push_val(from_lanes(a.map(|x| f(x, s))));
    Ok(())
}

fn splat<T: StackValue, L: Lane, const N: usize>(stack: &mut Stack, conv: impl Fn(T) -> L) -> Result<(), RuntimeError> {
    let x = stack.pop_val::<T>()?;
    stack.push_val(from_lanes([conv(x); N]));
    Ok(())
}

fn all_true<T: Lane, const N: usize>(stack: &mut Stack) -> Result<(), RuntimeError> {
    let a = lanes::<T, N>(stack.pop_v128()?);
    stack.push_val(a.iter().all(|&x| x != T::default()) as i32);
    Ok(())
}

fn bitmask<T: Lane, const N: usize>(stack: &mut Stack, negative: impl Fn(T) -> bool) -> Result<(), RuntimeError> {
    let a = lanes::<T, N>(stack.pop_v128()?);
    let mask = a
        .iter()
        .enumerate()
        .fold(0i32, |m, (i, &x)| if negative(x) { m | (1 << i) } else { m });
    stack.push_val(mask);
    Ok(())
}

fn widen<T: Lane, U: Lane, const NI: usize, const NO: usize>(
    stack: &mut Stack,
    high: bool,
    conv: impl Fn(T) -> U,
) -> Result<(), RuntimeError> {
    let v = stack.pop_v128()?;
    stack.push_val(widen_lanes::<T, U, NI, NO>(v, high, conv));
    Ok(())
}

/// Narrow the lanes of two vectors into one; `a` fills the low half
fn narrow<T: Lane, U: Lane, const NI: usize, const NO: usize>(
    stack: &mut Stack,
    conv: impl Fn(T) -> U,
) -> Result<(), RuntimeError> {
    let b = lanes::<T, NI>(stack.pop_v128()?);
    let a = lanes::<T, NI>(stack.pop_v128()?);
    let r = std::array::from_fn(|i| conv(if i < NI { a[i] } else { b[i - NI] }));
    stack.push_val(from_lanes::<U, NO>(r));
    Ok(())
}

/// Convert `NI` lanes into the low lanes of the result, zeroing the rest
pub(crate) fn convert_zero<T: Lane, U: Lane, const NI: usize, const NO: usize>(
    stack: &mut Stack,
    conv: impl Fn(T) -> U,
) -> Result<(), RuntimeError> {
    let a = lanes::<T, NI>(stack.pop_v128()?);
    let r = std::array::from_fn(|i| if i < NI { conv(a[i]) } else { U::default() });
    stack.push_val(from_lanes::<U, NO>(r));
    Ok(())
}

/// Widen one half of each operand and multiply
fn extmul<T: Lane, U: Lane, const NI: usize, const NO: usize>(
    stack: &mut Stack,
    high: bool,
    conv: impl Fn(T) -> U,
    mul: impl Fn(U, U) -> U,
) -> Result<(), RuntimeError> {
    let b = lanes::<U, NO>(widen_lanes::<T, U, NI, NO>(stack.pop_v128()?, high, &conv));
    let a = lanes::<U, NO>(widen_lanes::<T, U, NI, NO>(stack.pop_v128()?, high, &conv));
    stack.push_val(from_lanes::<U, NO>(std::array::from_fn(|i| mul(a[i], b[i]))));
    Ok(())
}

/// Sum adjacent lane pairs into lanes of twice the width
fn extadd_pairwise<T: Lane, U: Lane, const NI: usize, const NO: usize>(
    stack: &mut Stack,
    conv: impl Fn(T) -> U,
    add: impl Fn(U, U) -> U,
) -> Result<(), RuntimeError> {
    let a = lanes::<T, NI>(stack.pop_v128()?);
    let r = std::array::from_fn(|i| add(conv(a[2 * i]), conv(a[2 * i + 1])));
    stack.push_val(from_lanes::<U, NO>(r));
    Ok(())
}

pub(crate) fn swizzle(a: [u8; 16], idx: [u8; 16]) -> [u8; 16] {
    idx.map(|i| if i < 16 { a[i as usize] } else { 0 })
}

pub(crate) fn q15mulr_sat(a: i16, b: i16) -> i16 {
    let r = (a as i32 * b as i32 + 0x4000) >> 15;
    r.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

pub(crate) fn bitselect(a: [u8; 16], b: [u8; 16], c: [u8; 16]) -> [u8; 16] {
    std::array::from_fn(|i| (a[i] & c[i]) | (b[i] & !c[i]))
}

// ============================================================================
// Immediate-carrying instructions
// ============================================================================

/// i8x16.shuffle: lanes 0-15 select from the first operand, 16-31 from the second
pub fn shuffle(stack: &mut Stack, selector: &[u8; 16]) -> Result<(), RuntimeError> {
    let b = stack.pop_v128()?;
    let a = stack.pop_v128()?;
    let mut r = [0u8; 16];
    for (out, &l) in r.iter_mut().zip(selector) {
        *out = match l {
            0..=15 => a[l as usize],
            16..=31 => b[l as usize - 16],
            _ => return Err(RuntimeError::fault(format!("shuffle lane {l} out of range"))),
        };
    }
    stack.push_val(r);
    Ok(())
}

pub fn extract_lane(stack: &mut Stack, shape: Shape, lane: u8, signed: bool) -> Result<(), RuntimeError> {
    let v = stack.pop_v128()?;
    match shape {
        Shape::I8x16 => {
            let x = get_lane::<i8>(&v, lane)?;
            stack.push_val(if signed { x as i32 } else { x as u8 as i32 });
        }
        Shape::I16x8 => {
            let x = get_lane::<i16>(&v, lane)?;
            stack.push_val(if signed { x as i32 } else { x as u16 as i32 });
        }
        Shape::I32x4 => stack.push_val(get_lane::<i32>(&v, lane)?),
        Shape::I64x2 => stack.push_val(get_lane::<i64>(&v, lane)?),
        Shape::F32x4 => stack.push_val(get_lane::<f32>(&v, lane)?),
        Shape::F64x2 => stack.push_val(get_lane::<f64>(&v, lane)?),
    }
    Ok(())
}

pub fn replace_lane(stack: &mut Stack, shape: Shape, lane: u8) -> Result<(), RuntimeError> {
    let mut v;
    match shape {
        Shape::I8x16 => {
            let x = stack.pop_i32()?;
            v = stack.pop_v128()?;
            set_lane(&mut v, lane, x as i8)?;
        }
        Shape::I16x8 => {
            let x = stack.pop_i32()?;
            v = stack.pop_v128()?;
            set_lane(&mut v, lane, x as i16)?;
        }
        Shape::I32x4 => {
            let x = stack.pop_i32()?;
            v = stack.pop_v128()?;
            set_lane(&mut v, lane, x)?;
        }
        Shape::I64x2 => {
            let x = stack.pop_i64()?;
            v = stack.pop_v128()?;
            set_lane(&mut v, lane, x)?;
        }
        Shape::F32x4 => {
            let x = stack.pop_f32()?;
            v = stack.pop_v128()?;
            set_lane(&mut v, lane, x)?;
        }
        Shape::F64x2 => {
            let x = stack.pop_f64()?;
            v = stack.pop_v128()?;
            set_lane(&mut v, lane, x)?;
        }
    }
    stack.push_val(v);
    Ok(())
}

// ============================================================================
// Dispatch
// ============================================================================

/// Execute a vector instruction without immediates
pub fn execute(stack: &mut Stack, op: VecOp, mode: RelaxedSimd) -> Result<(), RuntimeError> {
    use VecOp::*;
    match op {
        I8x16Swizzle => {
            let idx = stack.pop_v128()?;
            let a = stack.pop_v128()?;
            stack.push_val(swizzle(a, idx));
            Ok(())
        }
        I8x16Splat => splat::<i32, u8, 16>(stack, |x| x as u8),
        I16x8Splat => splat::<i32, u16, 8>(stack, |x| x as u16),
        I32x4Splat => splat::<i32, i32, 4>(stack, |x| x),
        I64x2Splat => splat::<i64, i64, 2>(stack, |x| x),
        F32x4Splat => splat::<f32, f32, 4>(stack, |x| x),
        F64x2Splat => splat::<f64, f64, 2>(stack, |x| x),

        // i8x16 comparisons
        I8x16Eq => v_cmp::<i8, 16>(stack, |a, b| a == b),
        I8x16Ne => v_cmp::<i8, 16>(stack, |a, b| a != b),
        I8x16LtS => v_cmp::<i8, 16>(stack, |a, b| a < b),
        I8x16LtU => v_cmp::<u8, 16>(stack, |a, b| a < b),
        I8x16GtS => v_cmp::<i8, 16>(stack, |a, b| a > b),
        I8x16GtU => v_cmp::<u8, 16>(stack, |a, b| a > b),
        I8x16LeS => v_cmp::<i8, 16>(stack, |a, b| a <= b),
        I8x16LeU => v_cmp::<u8, 16>(stack, |a, b| a <= b),
        I8x16GeS => v_cmp::<i8, 16>(stack, |a, b| a >= b),
        I8x16GeU => v_cmp::<u8, 16>(stack, |a, b| a >= b),

        // i16x8 comparisons
        I16x8Eq => v_cmp::<i16, 8>(stack, |a, b| a == b),
        I16x8Ne => v_cmp::<i16, 8>(stack, |a, b| a != b),
        I16x8LtS => v_cmp::<i16, 8>(stack, |a, b| a < b),
        I16x8LtU => v_cmp::<u16, 8>(stack, |a, b| a < b),
        I16x8GtS => v_cmp::<i16, 8>(stack, |a, b| a > b),
        I16x8GtU => v_cmp::<u16, 8>(stack, |a, b| a > b),
        I16x8LeS => v_cmp::<i16, 8>(stack, |a, b| a <= b),
        I16x8LeU => v_cmp::<u16, 8>(stack, |a, b| a <= b),
        I16x8GeS => v_cmp::<i16, 8>(stack, |a, b| a >= b),
        I16x8GeU => v_cmp::<u16, 8>(stack, |a, b| a >= b),

        // i32x4 comparisons
        I32x4Eq => v_cmp::<i32, 4>(stack, |a, b| a == b),
        I32x4Ne => v_cmp::<i32, 4>(stack, |a, b| a != b),
        I32x4LtS => v_cmp::<i32, 4>(stack, |a, b| a < b),
        I32x4LtU => v_cmp::<u32, 4>(stack, |a, b| a < b),
        I32x4GtS => v_cmp::<i32, 4>(stack, |a, b| a > b),
        I32x4GtU => v_cmp::<u32, 4>(stack, |a, b| a > b),
        I32x4LeS => v_cmp::<i32, 4>(stack, |a, b| a <= b),
        I32x4LeU => v_cmp::<u32, 4>(stack, |a, b| a <= b),
        I32x4GeS => v_cmp::<i32, 4>(stack, |a, b| a >= b),
        I32x4GeU => v_cmp::<u32, 4>(stack, |a, b| a >= b),

        // i64x2 comparisons are signed only
        I64x2Eq => v_cmp::<i64, 2>(stack, |a, b| a == b),
        I64x2Ne => v_cmp::<i64, 2>(stack, |a, b| a != b),
        I64x2LtS => v_cmp::<i64, 2>(stack, |a, b| a < b),
        I64x2GtS => v_cmp::<i64, 2>(stack, |a, b| a > b),
        I64x2LeS => v_cmp::<i64, 2>(stack, |a, b| a <= b),
        I64x2GeS => v_cmp::<i64, 2>(stack, |a, b| a >= b),

        // float comparisons
        F32x4Eq => v_cmp::<f32, 4>(stack, |a, b| a == b),
        F32x4Ne => v_cmp::<f32, 4>(stack, |a, b| a != b),
        F32x4Lt => v_cmp::<f32, 4>(stack, |a, b| a < b),
        F32x4Gt => v_cmp::<f32, 4>(stack, |a, b| a > b),
        F32x4Le => v_cmp::<f32, 4>(stack, |a, b| a <= b),
        F32x4Ge => v_cmp::<f32, 4>(stack, |a, b| a >= b),
        F64x2Eq => v_cmp::<f64, 2>(stack, |a, b| a == b),
        F64x2Ne => v_cmp::<f64, 2>(stack, |a, b| a != b),
        F64x2Lt => v_cmp::<f64, 2>(stack, |a, b| a < b),
        F64x2Gt => v_cmp::<f64, 2>(stack, |a, b| a > b),
        F64x2Le => v_cmp::<f64, 2>(stack, |a, b| a <= b),
        F64x2Ge => v_cmp::<f64, 2>(stack, |a, b| a >= b),

        // bitwise
        V128Not => v_unop::<u64, 2>(stack, |a| !a),
        V128And => v_binop::<u64, 2>(stack, |a, b| a & b),
        V128AndNot => v_binop::<u64, 2>(stack, |a, b| a & !b),
        V128Or => v_binop::<u64, 2>(stack, |a, b| a | b),
        V128Xor => v_binop::<u64, 2>(stack, |a, b| a ^ b),
        V128Bitselect => {
            let c = stack.pop_v128()?;
            let b = stack.pop_v128()?;
            let a = stack.pop_v128()?;
            stack.push_val(bitselect(a, b, c));
            Ok(())
        }
        V128AnyTrue => {
            let a = stack.pop_v128()?;
            stack.push_val(a.iter().any(|&b| b != 0) as i32);
            Ok(())
        }

        // i8x16 arithmetic
        I8x16Abs => v_unop::<i8, 16>(stack, |a| a.wrapping_abs()),
        I8x16Neg => v_unop::<i8, 16>(stack, |a| a.wrapping_neg()),
        I8x16Popcnt => v_unop::<u8, 16>(stack, |a| a.count_ones() as u8),
        I8x16AllTrue => all_true::<u8, 16>(stack),
        I8x16Bitmask => bitmask::<i8, 16>(stack, |a| a < 0),
        I8x16NarrowI16x8S => narrow::<i16, i8, 8, 16>(stack, |a| a.clamp(i8::MIN as i16, i8::MAX as i16) as i8),
        I8x16NarrowI16x8U => narrow::<i16, u8, 8, 16>(stack, |a| a.clamp(0, u8::MAX as i16) as u8),
        I8x16Shl => v_shift::<i8, 16>(stack, |a, s| a.wrapping_shl(s)),
        I8x16ShrS => v_shift::<i8, 16>(stack, |a, s| a.wrapping_shr(s)),
        I8x16ShrU => v_shift::<u8, 16>(stack, |a, s| a.wrapping_shr(s)),
        I8x16Add => v_binop::<i8, 16>(stack, |a, b| a.wrapping_add(b)),
        I8x16AddSatS => v_binop::<i8, 16>(stack, |a, b| a.saturating_add(b)),
        I8x16AddSatU => v_binop::<u8, 16>(stack, |a, b| a.saturating_add(b)),
        I8x16Sub => v_binop::<i8, 16>(stack, |a, b| a.wrapping_sub(b)),
        I8x16SubSatS => v_binop::<i8, 16>(stack, |a, b| a.saturating_sub(b)),
        I8x16SubSatU => v_binop::<u8, 16>(stack, |a, b| a.saturating_sub(b)),
        I8x16MinS => v_binop::<i8, 16>(stack, |a, b| a.min(b)),
        I8x16MinU => v_binop::<u8, 16>(stack, |a, b| a.min(b)),
        I8x16MaxS => v_binop::<i8, 16>(stack, |a, b| a.max(b)),
        I8x16MaxU => v_binop::<u8, 16>(stack, |a, b| a.max(b)),
        I8x16AvgrU => v_binop::<u8, 16>(stack, |a, b| ((a as u16 + b as u16 + 1) / 2) as u8),

        // i16x8 arithmetic
        I16x8ExtaddPairwiseI8x16S => {
            extadd_pairwise::<i8, i16, 16, 8>(stack, |a| a as i16, |a, b| a.wrapping_add(b))
        }
        I16x8ExtaddPairwiseI8x16U => {
            extadd_pairwise::<u8, u16, 16, 8>(stack, |a| a as u16, |a, b| a.wrapping_add(b))
        }
        I16x8Abs => v_unop::<i16, 8>(stack, |a| a.wrapping_abs()),
        I16x8Neg => v_unop::<i16, 8>(stack, |a| a.wrapping_neg()),
        I16x8Q15mulrSatS => v_binop::<i16, 8>(stack, q15mulr_sat),
        I16x8AllTrue => all_true::<u16, 8>(stack),
        I16x8Bitmask => bitmask::<i16, 8>(stack, |a| a < 0),
        I16x8NarrowI32x4S => {
            narrow::<i32, i16, 4, 8>(stack, |a| a.clamp(i16::MIN as i32, i16::MAX as i32) as i16)
        }
        I16x8NarrowI32x4U => narrow::<i32, u16, 4, 8>(stack, |a| a.clamp(0, u16::MAX as i32) as u16),
        I16x8ExtendLowI8x16S => widen::<i8, i16, 16, 8>(stack, false, |a| a as i16),
        I16x8ExtendHighI8x16S => widen::<i8, i16, 16, 8>(stack, true, |a| a as i16),
        I16x8ExtendLowI8x16U => widen::<u8, u16, 16, 8>(stack, false, |a| a as u16),
        I16x8ExtendHighI8x16U => widen::<u8, u16, 16, 8>(stack, true, |a| a as u16),
        I16x8Shl => v_shift::<i16, 8>(stack, |a, s| a.wrapping_shl(s)),
        I16x8ShrS => v_shift::<i16, 8>(stack, |a, s| a.wrapping_shr(s)),
        I16x8ShrU => v_shift::<u16, 8>(stack, |a, s| a.wrapping_shr(s)),
        I16x8Add => v_binop::<i16, 8>(stack, |a, b| a.wrapping_add(b)),
        I16x8AddSatS => v_binop::<i16, 8>(stack, |a, b| a.saturating_add(b)),
        I16x8AddSatU => v_binop::<u16, 8>(stack, |a, b| a.saturating_add(b)),
        I16x8Sub => v_binop::<i16, 8>(stack, |a, b| a.wrapping_sub(b)),
        I16x8SubSatS => v_binop::<i16, 8>(stack, |a, b| a.saturating_sub(b)),
        I16x8SubSatU => v_binop::<u16, 8>(stack, |a, b| a.saturating_sub(b)),
        I16x8Mul => v_binop::<i16, 8>(stack, |a, b| a.wrapping_mul(b)),
        I16x8MinS => v_binop::<i16, 8>(stack, |a, b| a.min(b)),
        I16x8MinU => v_binop::<u16, 8>(stack, |a, b| a.min(b)),
        I16x8MaxS => v_binop::<i16, 8>(stack, |a, b| a.max(b)),
        I16x8MaxU => v_binop::<u16, 8>(stack, |a, b| a.max(b)),
        I16x8AvgrU => v_binop::<u16, 8>(stack, |a, b| ((a as u32 + b as u32 + 1) / 2) as u16),
        I16x8ExtmulLowI8x16S => extmul::<i8, i16, 16, 8>(stack, false, |a| a as i16, i16::wrapping_mul),
        I16x8ExtmulHighI8x16S => extmul::<i8, i16, 16, 8>(stack, true, |a| a as i16, i16::wrapping_mul),
        I16x8ExtmulLowI8x16U => extmul::<u8, u16, 16, 8>(stack, false, |a| a as u16, u16::wrapping_mul),
        I16x8ExtmulHighI8x16U => extmul::<u8, u16, 16, 8>(stack, true, |a| a as u16, u16::wrapping_mul),

        // i32x4 arithmetic
        I32x4ExtaddPairwiseI16x8S => {
            extadd_pairwise::<i16, i32, 8, 4>(stack, |a| a as i32, |a, b| a.wrapping_add(b))
        }
        I32x4ExtaddPairwiseI16x8U => {
            extadd_pairwise::<u16, u32, 8, 4>(stack, |a| a as u32, |a, b| a.wrapping_add(b))
        }
        I32x4Abs => v_unop::<i32, 4>(stack, |a| a.wrapping_abs()),
        I32x4Neg => v_unop::<i32, 4>(stack, |a| a.wrapping_neg()),
        I32x4AllTrue => all_true::<u32, 4>(stack),
        I32x4Bitmask => bitmask::<i32, 4>(stack, |a| a < 0),
        I32x4ExtendLowI16x8S => widen::<i16, i32, 8, 4>(stack, false, |a| a as i32),
        I32x4ExtendHighI16x8S => widen::<i16, i32, 8, 4>(stack, true, |a| a as i32),
        I32x4ExtendLowI16x8U => widen::<u16, u32, 8, 4>(stack, false, |a| a as u32),
        I32x4ExtendHighI16x8U => widen::<u16, u32, 8, 4>(stack, true, |a| a as u32),
        I32x4Shl => v_shift::<i32, 4>(stack, |a, s| a.wrapping_shl(s)),
        I32x4ShrS => v_shift::<i32, 4>(stack, |a, s| a.wrapping_shr(s)),
        I32x4ShrU => v_shift::<u32, 4>(stack, |a, s| a.wrapping_shr(s)),
        I32x4Add => v_binop::<i32, 4>(stack, |a, b| a.wrapping_add(b)),
        I32x4Sub => v_binop::<i32, 4>(stack, |a, b| a.wrapping_sub(b)),
        I32x4Mul => v_binop::<i32, 4>(stack, |a, b| a.wrapping_mul(b)),
        I32x4MinS => v_binop::<i32, 4>(stack, |a, b| a.min(b)),
        I32x4MinU => v_binop::<u32, 4>(stack, |a, b| a.min(b)),
        I32x4MaxS => v_binop::<i32, 4>(stack, |a, b| a.max(b)),
        I32x4MaxU => v_binop::<u32, 4>(stack, |a, b| a.max(b)),
        I32x4DotI16x8S => {
            let b = lanes::<i16, 8>(stack.pop_v128()?);
            let a = lanes::<i16, 8>(stack.pop_v128()?);
            let r: [i32; 4] = std::array::from_fn(|i| {
                let lo = a[2 * i] as i32 * b[2 * i] as i32;
                let hi = a[2 * i + 1] as i32 * b[2 * i + 1] as i32;
                lo.wrapping_add(hi)
            });
            stack.push_val(from_lanes(r));
            Ok(())
        }
        I32x4ExtmulLowI16x8S => extmul::<i16, i32, 8, 4>(stack, false, |a| a as i32, i32::wrapping_mul),
        I32x4ExtmulHighI16x8S => extmul::<i16, i32, 8, 4>(stack, true, |a| a as i32, i32::wrapping_mul),
        I32x4ExtmulLowI16x8U => extmul::<u16, u32, 8, 4>(stack, false, |a| a as u32, u32::wrapping_mul),
        I32x4ExtmulHighI16x8U => extmul::<u16, u32, 8, 4>(stack, true, |a| a as u32, u32::wrapping_mul),

        // i64x2 arithmetic
        I64x2Abs => v_unop::<i64, 2>(stack, |a| a.wrapping_abs()),
        I64x2Neg => v_unop::<i64, 2>(stack, |a| a.wrapping_neg()),
        I64x2AllTrue => all_true::<u64, 2>(stack),
        I64x2Bitmask => bitmask::<i64, 2>(stack, |a| a < 0),
        I64x2ExtendLowI32x4S => widen::<i32, i64, 4, 2>(stack, false, |a| a as i64),
        I64x2ExtendHighI32x4S => widen::<i32, i64, 4, 2>(stack, true, |a| a as i64),
        I64x2ExtendLowI32x4U => widen::<u32, u64, 4, 2>(stack, false, |a| a as u64),
        I64x2ExtendHighI32x4U => widen::<u32, u64, 4, 2>(stack, true, |a| a as u64),
        I64x2Shl => v_shift::<i64, 2>(stack, |a, s| a.wrapping_shl(s)),
        I64x2ShrS => v_shift::<i64, 2>(stack, |a, s| a.wrapping_shr(s)),
        I64x2ShrU => v_shift::<u64, 2>(stack, |a, s| a.wrapping_shr(s)),
        I64x2Add => v_binop::<i64, 2>(stack, |a, b| a.wrapping_add(b)),
        I64x2Sub => v_binop::<i64, 2>(stack, |a, b| a.wrapping_sub(b)),
        I64x2Mul => v_binop::<i64, 2>(stack, |a, b| a.wrapping_mul(b)),
        I64x2ExtmulLowI32x4S => extmul::<i32, i64, 4, 2>(stack, false, |a| a as i64, i64::wrapping_mul),
        I64x2ExtmulHighI32x4S => extmul::<i32, i64, 4, 2>(stack, true, |a| a as i64, i64::wrapping_mul),
        I64x2ExtmulLowI32x4U => extmul::<u32, u64, 4, 2>(stack, false, |a| a as u64, u64::wrapping_mul),
        I64x2ExtmulHighI32x4U => extmul::<u32, u64, 4, 2>(stack, true, |a| a as u64, u64::wrapping_mul),

        // f32x4 arithmetic
        F32x4Ceil => v_unop::<f32, 4>(stack, f32::ceil),
        F32x4Floor => v_unop::<f32, 4>(stack, f32::floor),
        F32x4Trunc => v_unop::<f32, 4>(stack, f32::trunc),
        F32x4Nearest => v_unop::<f32, 4>(stack, f32::round_ties_even),
        F32x4Abs => v_unop::<f32, 4>(stack, f32::abs),
        F32x4Neg => v_unop::<f32, 4>(stack, |a| -a),
        F32x4Sqrt => v_unop::<f32, 4>(stack, f32::sqrt),
        F32x4Add => v_binop::<f32, 4>(stack, |a, b| a + b),
        F32x4Sub => v_binop::<f32, 4>(stack, |a, b| a - b),
        F32x4Mul => v_binop::<f32, 4>(stack, |a, b| a * b),
        F32x4Div => v_binop::<f32, 4>(stack, |a, b| a / b),
        F32x4Min => v_binop::<f32, 4>(stack, f32_min),
        F32x4Max => v_binop::<f32, 4>(stack, f32_max),
        F32x4Pmin => v_binop::<f32, 4>(stack, |a, b| if b < a { b } else { a }),
        F32x4Pmax => v_binop::<f32, 4>(stack, |a, b| if a < b { b } else { a }),

        // f64x2 arithmetic
        F64x2Ceil => v_unop::<f64, 2>(stack, f64::ceil),
        F64x2Floor => v_unop::<f64, 2>(stack, f64::floor),
        F64x2Trunc => v_unop::<f64, 2>(stack, f64::trunc),
        F64x2Nearest => v_unop::<f64, 2>(stack, f64::round_ties_even),
        F64x2Abs => v_unop::<f64, 2>(stack, f64::abs),
        F64x2Neg => v_unop::<f64, 2>(stack, |a| -a),
        F64x2Sqrt => v_unop::<f64, 2>(stack, f64::sqrt),
        F64x2Add => v_binop::<f64, 2>(stack, |a, b| a + b),
        F64x2Sub => v_binop::<f64, 2>(stack, |a, b| a - b),
        F64x2Mul => v_binop::<f64, 2>(stack, |a, b| a * b),
        F64x2Div => v_binop::<f64, 2>(stack, |a, b| a / b),
        F64x2Min => v_binop::<f64, 2>(stack, f64_min),
        F64x2Max => v_binop::<f64, 2>(stack, f64_max),
        F64x2Pmin => v_binop::<f64, 2>(stack, |a, b| if b < a { b } else { a }),
        F64x2Pmax => v_binop::<f64, 2>(stack, |a, b| if a < b { b } else { a }),

        // conversions
        F32x4DemoteF64x2Zero => convert_zero::<f64, f32, 2, 4>(stack, |a| a as f32),
        F64x2PromoteLowF32x4 => widen::<f32, f64, 4, 2>(stack, false, |a| a as f64),
        I32x4TruncSatF32x4S => v_convert::<f32, i32, 4>(stack, |a| a as i32),
        I32x4TruncSatF32x4U => v_convert::<f32, u32, 4>(stack, |a| a as u32),
        F32x4ConvertI32x4S => v_convert::<i32, f32, 4>(stack, |a| a as f32),
        F32x4ConvertI32x4U => v_convert::<u32, f32, 4>(stack, |a| a as f32),
        I32x4TruncSatF64x2SZero => convert_zero::<f64, i32, 2, 4>(stack, |a| a as i32),
        I32x4TruncSatF64x2UZero => convert_zero::<f64, u32, 2, 4>(stack, |a| a as u32),
        F64x2ConvertLowI32x4S => widen::<i32, f64, 4, 2>(stack, false, |a| a as f64),
        F64x2ConvertLowI32x4U => widen::<u32, f64, 4, 2>(stack, false, |a| a as f64),

        relaxed_op => relaxed::execute(stack, relaxed_op, mode),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v<T: Lane, const N: usize>(lanes: [T; N]) -> [u8; 16] {
        from_lanes(lanes)
    }

    fn run(op: VecOp, args: &[[u8; 16]]) -> [u8; 16] {
        let mut stack = Stack::new();
        for &a in args {
            stack.push_val(a);
        }
        execute(&mut stack, op, RelaxedSimd::default()).unwrap();
        let r = stack.pop_v128().unwrap();
        assert!(stack.is_empty());
        r
    }

    fn run_test(op: VecOp, arg: [u8; 16]) -> i32 {
        let mut stack = Stack::new();
        stack.push_val(arg);
        execute(&mut stack, op, RelaxedSimd::default()).unwrap();
        stack.pop_i32().unwrap()
    }

    #[test]
    fn test_lane_layout_is_little_endian() {
        let x = v([0x0102_0304i32, 0, 0, -1]);
        assert_eq!(&x[..4], &[4, 3, 2, 1]);
        assert_eq!(&x[12..], &[0xff; 4]);
        assert_eq!(lanes::<i16, 8>(x)[0], 0x0304);
    }

    #[test]
    fn test_integer_arithmetic() {
        let a = v([i8::MAX; 16]);
        let one = v([1i8; 16]);
        assert_eq!(run(VecOp::I8x16Add, &[a, one]), v([i8::MIN; 16]));
        assert_eq!(run(VecOp::I8x16AddSatS, &[a, one]), a);
        assert_eq!(run(VecOp::I8x16AddSatU, &[v([250u8; 16]), v([10u8; 16])]), v([255u8; 16]));
        assert_eq!(run(VecOp::I8x16SubSatU, &[one, v([2u8; 16])]), [0; 16]);
        assert_eq!(run(VecOp::I8x16Abs, &[v([i8::MIN; 16])]), v([i8::MIN; 16]));
        assert_eq!(run(VecOp::I8x16Popcnt, &[v([0xffu8; 16])]), v([8u8; 16]));
        assert_eq!(run(VecOp::I8x16AvgrU, &[v([1u8; 16]), v([2u8; 16])]), v([2u8; 16]));
        assert_eq!(
            run(VecOp::I32x4MinU, &[v([-1i32, 1, 2, 3]), v([0i32, 0, 5, 3])]),
            v([0i32, 0, 2, 3])
        );
        assert_eq!(
            run(VecOp::I64x2Mul, &[v([i64::MAX, 3]), v([2i64, -3])]),
            v([-2i64, -9])
        );
    }

    #[test]
    fn test_comparisons_produce_masks() {
        let r = run(VecOp::I32x4LtS, &[v([-1i32, 5, 0, 0]), v([0i32, 5, 1, -1])]);
        assert_eq!(r, v([-1i32, 0, -1, 0]));
        let r = run(VecOp::I32x4LtU, &[v([-1i32, 5, 0, 0]), v([0i32, 5, 1, -1])]);
        assert_eq!(r, v([0i32, 0, -1, -1]));
        let r = run(VecOp::F64x2Ne, &[v([f64::NAN, 1.0]), v([f64::NAN, 1.0])]);
        assert_eq!(r, v([-1i64, 0]));
    }

    #[test]
    fn test_shift_amount_wraps() {
        let mut stack = Stack::new();
        stack.push_val(v([1i16; 8]));
        stack.push_val(17i32);
        execute(&mut stack, VecOp::I16x8Shl, RelaxedSimd::default()).unwrap();
        assert_eq!(stack.pop_v128().unwrap(), v([2i16; 8]));

        stack.push_val(v([-128i8; 16]));
        stack.push_val(9i32);
        execute(&mut stack, VecOp::I8x16ShrU, RelaxedSimd::default()).unwrap();
        assert_eq!(stack.pop_v128().unwrap(), v([64u8; 16]));
    }

    #[test]
    fn test_float_min_max_and_pseudo() {
        let a = v([f32::NAN, 0.0, -0.0, 1.0]);
        let b = v([1.0f32, -0.0, 0.0, 2.0]);
        let min = lanes::<f32, 4>(run(VecOp::F32x4Min, &[a, b]));
        assert!(min[0].is_nan());
        assert!(min[1].is_sign_negative());
        assert!(min[2].is_sign_negative());
        assert_eq!(min[3], 1.0);

        // pmin returns the first operand unless the second is strictly less
        let pmin = lanes::<f32, 4>(run(VecOp::F32x4Pmin, &[a, b]));
        assert!(pmin[0].is_nan());
        assert!(pmin[1].is_sign_positive());
        assert!(pmin[2].is_sign_negative());
        let pmax = lanes::<f64, 2>(run(VecOp::F64x2Pmax, &[v([1.0f64, f64::NAN]), v([f64::NAN, 2.0])]));
        assert_eq!(pmax[0], 1.0);
        assert!(pmax[1].is_nan());
    }

    #[test]
    fn test_nearest_rounds_ties_to_even() {
        let r = run(VecOp::F32x4Nearest, &[v([0.5f32, 1.5, 2.5, -0.5])]);
        assert_eq!(lanes::<f32, 4>(r), [0.0, 2.0, 2.0, -0.0]);
    }

    #[test]
    fn test_bitselect_and_tests() {
        let r = run(VecOp::V128Bitselect, &[[0xaa; 16], [0x55; 16], [0xf0; 16]]);
        assert_eq!(r, [0xa5; 16]);

        let mut x = [0u8; 16];
        assert_eq!(run_test(VecOp::V128AnyTrue, x), 0);
        x[15] = 1;
        assert_eq!(run_test(VecOp::V128AnyTrue, x), 1);
        assert_eq!(run_test(VecOp::I8x16AllTrue, x), 0);
        assert_eq!(run_test(VecOp::I64x2AllTrue, v([1i64 << 40, 1])), 1);
        assert_eq!(run_test(VecOp::I32x4Bitmask, v([-1i32, 0, i32::MIN, 7])), 0b0101);
        assert_eq!(run_test(VecOp::I8x16Bitmask, [0x80; 16]), 0xffff);
    }

    #[test]
    fn test_narrow_saturates() {
        let a = v([300i16, -300, 127, -128, 0, 1, 2, 3]);
        let b = v([-1i16; 8]);
        let r = run(VecOp::I8x16NarrowI16x8S, &[a, b]);
        assert_eq!(&lanes::<i8, 16>(r)[..5], &[127, -128, 127, -128, 0]);
        assert_eq!(lanes::<i8, 16>(r)[8], -1);

        let r = run(VecOp::I8x16NarrowI16x8U, &[a, b]);
        assert_eq!(&lanes::<u8, 16>(r)[..4], &[255, 0, 127, 0]);
        assert_eq!(lanes::<u8, 16>(r)[15], 0);
    }

    #[test]
    fn test_extend_and_extmul() {
        let a = v([-1i8, 2, -3, 4, 5, 6, 7, 8, -9, 10, 11, 12, 13, 14, 15, 16]);
        assert_eq!(
            run(VecOp::I16x8ExtendHighI8x16S, &[a]),
            v([-9i16, 10, 11, 12, 13, 14, 15, 16])
        );
        assert_eq!(lanes::<u16, 8>(run(VecOp::I16x8ExtendLowI8x16U, &[a]))[0], 255);
        assert_eq!(
            lanes::<i16, 8>(run(VecOp::I16x8ExtmulLowI8x16S, &[a, a]))[..3],
            [1, 4, 9]
        );
        let big = v([u32::MAX, 2, 0, 0]);
        assert_eq!(
            run(VecOp::I64x2ExtmulLowI32x4U, &[big, big]),
            v([(u32::MAX as u64) * (u32::MAX as u64), 4])
        );
        assert_eq!(
            run(VecOp::I32x4ExtaddPairwiseI16x8S, &[v([i16::MAX; 8])]),
            v([i16::MAX as i32 * 2; 4])
        );
    }

    #[test]
    fn test_dot_and_q15() {
        let a = v([i16::MIN; 8]);
        assert_eq!(run(VecOp::I32x4DotI16x8S, &[a, a]), v([i32::MIN; 4]));
        assert_eq!(run(VecOp::I16x8Q15mulrSatS, &[a, a]), v([i16::MAX; 8]));
        assert_eq!(q15mulr_sat(0x4000, 0x4000), 0x2000);
    }

    #[test]
    fn test_conversions() {
        let r = run(VecOp::I32x4TruncSatF32x4S, &[v([f32::NAN, 3e10, -3e10, -1.7])]);
        assert_eq!(r, v([0, i32::MAX, i32::MIN, -1]));
        let r = run(VecOp::I32x4TruncSatF64x2UZero, &[v([-5.0f64, 5e10])]);
        assert_eq!(r, v([0u32, u32::MAX, 0, 0]));
        let r = run(VecOp::F64x2ConvertLowI32x4U, &[v([u32::MAX, 1, 9, 9])]);
        assert_eq!(r, v([u32::MAX as f64, 1.0]));
        let r = run(VecOp::F32x4DemoteF64x2Zero, &[v([1.5f64, -2.0])]);
        assert_eq!(r, v([1.5f32, -2.0, 0.0, 0.0]));
    }

    #[test]
    fn test_swizzle_and_splat() {
        let data: [u8; 16] = std::array::from_fn(|i| i as u8 * 10);
        let mut idx = [0u8; 16];
        idx[0] = 15;
        idx[1] = 16;
        idx[2] = 200;
        let r = run(VecOp::I8x16Swizzle, &[data, idx]);
        assert_eq!(&r[..4], &[150, 0, 0, 0]);

        let mut stack = Stack::new();
        stack.push_val(0x1ff_i32);
        execute(&mut stack, VecOp::I8x16Splat, RelaxedSimd::default()).unwrap();
        assert_eq!(stack.pop_v128().unwrap(), [0xff; 16]);
    }

    #[test]
    fn test_shuffle() {
        let a: [u8; 16] = std::array::from_fn(|i| i as u8);
        let b: [u8; 16] = std::array::from_fn(|i| 100 + i as u8);
        let mut selector = [0u8; 16];
        selector[0] = 31;
        selector[1] = 1;
        let mut stack = Stack::new();
        stack.push_val(a);
        stack.push_val(b);
        shuffle(&mut stack, &selector).unwrap();
        let r = stack.pop_v128().unwrap();
        assert_eq!(&r[..3], &[115, 1, 0]);

        selector[0] = 32;
        stack.push_val(a);
        stack.push_val(b);
        assert!(!shuffle(&mut stack, &selector).unwrap_err().is_trap());
    }

    #[test]
    fn test_lane_access() {
        let mut stack = Stack::new();
        stack.push_val([0x80u8; 16]);
        extract_lane(&mut stack, Shape::I8x16, 3, true).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), -128);
        stack.push_val([0x80u8; 16]);
        extract_lane(&mut stack, Shape::I16x8, 7, false).unwrap();
        assert_eq!(stack.pop_i32().unwrap(), 0x8080);

        stack.push_val([0u8; 16]);
        stack.push_val(2.5f64);
        replace_lane(&mut stack, Shape::F64x2, 1).unwrap();
        assert_eq!(lanes::<f64, 2>(stack.pop_v128().unwrap()), [0.0, 2.5]);

        stack.push_val([0u8; 16]);
        stack.push_val(0x1234i32);
        replace_lane(&mut stack, Shape::I8x16, 15).unwrap();
        assert_eq!(stack.pop_v128().unwrap()[15], 0x34);

        stack.push_val([0u8; 16]);
        assert!(extract_lane(&mut stack, Shape::I32x4, 4, false).is_err());
    }
}
