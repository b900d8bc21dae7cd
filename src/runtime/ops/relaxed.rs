//! Relaxed SIMD instructions
//!
//! Each relaxed operation permits a small set of results. The engine picks
//! one of two fixed behaviors per [`RelaxedSimd`] mode, so a given
//! configuration always produces the same bits:
//!
//! - `Deterministic` matches the corresponding non-relaxed instruction.
//! - `Alternate` follows common hardware lowering (x86 SSE/AVX semantics).

use super::numeric::{f32_max, f32_min, f64_max, f64_min};
use super::simd::{bitselect, convert_zero, from_lanes, lanes, q15mulr_sat, swizzle, v_binop, Lane};
use super::{RuntimeError, Stack};
use crate::parser::instruction::VecOp;
use crate::runtime::config::RelaxedSimd;

fn ternary<T: Lane, const N: usize>(stack: &mut Stack, f: impl Fn(T, T, T) -> T) -> Result<(), RuntimeError> {
    let c = lanes::<T, N>(stack.pop_v128()?);
    let b = lanes::<T, N>(stack.pop_v128()?);
    let a = lanes::<T, N>(stack.pop_v128()?);
    stack.push_val(from_lanes::<T, N>(std::array::from_fn(|i| f(a[i], b[i], c[i]))));
    Ok(())
}

/// Out-of-range and NaN inputs produce `i32::MIN`
fn trunc_s_alt(x: f64) -> i32 {
    if x.is_nan() || x <= -2147483649.0 || x >= 2147483648.0 {
        i32::MIN
    } else {
        x as i32
    }
}

/// Out-of-range and NaN inputs produce `u32::MAX`
fn trunc_u_alt(x: f64) -> u32 {
    if x.is_nan() || x <= -1.0 || x >= 4294967296.0 {
        u32::MAX
    } else {
        x as u32
    }
}

/// Select whole lanes by the top bit of each mask lane
fn laneselect_by_sign(a: [u8; 16], b: [u8; 16], mask: [u8; 16], width: usize) -> [u8; 16] {
    let mut r = b;
    for lane in (0..16).step_by(width) {
        if mask[lane + width - 1] & 0x80 != 0 {
            r[lane..lane + width].copy_from_slice(&a[lane..lane + width]);
        }
    }
    r
}

fn laneselect(stack: &mut Stack, width: usize, mode: RelaxedSimd) -> Result<(), RuntimeError> {
    let c = stack.pop_v128()?;
    let b = stack.pop_v128()?;
    let a = stack.pop_v128()?;
    stack.push_val(match mode {
        RelaxedSimd::Deterministic => bitselect(a, b, c),
        RelaxedSimd::Alternate => laneselect_by_sign(a, b, c, width),
    });
    Ok(())
}

/// Pairwise i8 products summed into i16 lanes. The deterministic form
/// treats the second operand as signed and wraps; the alternate form
/// treats it as unsigned and saturates.
fn dot_i16(a: [u8; 16], b: [u8; 16], mode: RelaxedSimd) -> [i16; 8] {
    let a = lanes::<i8, 16>(a);
    std::array::from_fn(|i| {
        let (lo, hi) = (2 * i, 2 * i + 1);
        match mode {
            RelaxedSimd::Deterministic => {
                let b = lanes::<i8, 16>(b);
                let p = a[lo] as i16 * b[lo] as i16;
                p.wrapping_add(a[hi] as i16 * b[hi] as i16)
            }
            RelaxedSimd::Alternate => {
                let b = lanes::<u8, 16>(b);
                let p = a[lo] as i32 * b[lo] as i32 + a[hi] as i32 * b[hi] as i32;
                p.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            }
        }
    })
}

/// Execute a relaxed vector instruction
pub fn execute(stack: &mut Stack, op: VecOp, mode: RelaxedSimd) -> Result<(), RuntimeError> {
    use RelaxedSimd::*;
    use VecOp::*;
    match op {
        I8x16RelaxedSwizzle => {
            let idx = stack.pop_v128()?;
            let a = stack.pop_v128()?;
            stack.push_val(match mode {
                Deterministic => swizzle(a, idx),
                Alternate => idx.map(|i| if i < 128 { a[(i & 15) as usize] } else { 0 }),
            });
            Ok(())
        }

        I32x4RelaxedTruncF32x4S => match mode {
            Deterministic => convert_zero::<f32, i32, 4, 4>(stack, |x| x as i32),
            Alternate => convert_zero::<f32, i32, 4, 4>(stack, |x| trunc_s_alt(x as f64)),
        },
        I32x4RelaxedTruncF32x4U => match mode {
            Deterministic => convert_zero::<f32, u32, 4, 4>(stack, |x| x as u32),
            Alternate => convert_zero::<f32, u32, 4, 4>(stack, |x| trunc_u_alt(x as f64)),
        },
        I32x4RelaxedTruncF64x2SZero => match mode {
            Deterministic => convert_zero::<f64, i32, 2, 4>(stack, |x| x as i32),
            Alternate => convert_zero::<f64, i32, 2, 4>(stack, trunc_s_alt),
        },
        I32x4RelaxedTruncF64x2UZero => match mode {
            Deterministic => convert_zero::<f64, u32, 2, 4>(stack, |x| x as u32),
            Alternate => convert_zero::<f64, u32, 2, 4>(stack, trunc_u_alt),
        },

        F32x4RelaxedMadd => match mode {
            Deterministic => ternary::<f32, 4>(stack, |a, b, c| a * b + c),
            Alternate => ternary::<f32, 4>(stack, f32::mul_add),
        },
        F32x4RelaxedNmadd => match mode {
            Deterministic => ternary::<f32, 4>(stack, |a, b, c| -(a * b) + c),
            Alternate => ternary::<f32, 4>(stack, |a, b, c| (-a).mul_add(b, c)),
        },
        F64x2RelaxedMadd => match mode {
            Deterministic => ternary::<f64, 2>(stack, |a, b, c| a * b + c),
            Alternate => ternary::<f64, 2>(stack, f64::mul_add),
        },
        F64x2RelaxedNmadd => match mode {
            Deterministic => ternary::<f64, 2>(stack, |a, b, c| -(a * b) + c),
            Alternate => ternary::<f64, 2>(stack, |a, b, c| (-a).mul_add(b, c)),
        },

        I8x16RelaxedLaneselect => laneselect(stack, 1, mode),
        I16x8RelaxedLaneselect => laneselect(stack, 2, mode),
        I32x4RelaxedLaneselect => laneselect(stack, 4, mode),
        I64x2RelaxedLaneselect => laneselect(stack, 8, mode),

        // minps/maxps: `a op b ? a : b`, so a NaN in either lane or two equal
        // inputs (such as -0.0 and 0.0) yield the second operand
        F32x4RelaxedMin => match mode {
            Deterministic => v_binop::<f32, 4>(stack, f32_min),
            Alternate => v_binop::<f32, 4>(stack, |a, b| if a < b { a } else { b }),
        },
        F32x4RelaxedMax => match mode {
            Deterministic => v_binop::<f32, 4>(stack, f32_max),
            Alternate => v_binop::<f32, 4>(stack, |a, b| if a > b { a } else { b }),
        },
        F64x2RelaxedMin => match mode {
            Deterministic => v_binop::<f64, 2>(stack, f64_min),
            Alternate => v_binop::<f64, 2>(stack, |a, b| if a < b { a } else { b }),
        },
        F64x2RelaxedMax => match mode {
            Deterministic => v_binop::<f64, 2>(stack, f64_max),
            Alternate => v_binop::<f64, 2>(stack, |a, b| if a > b { a } else { b }),
        },

        I16x8RelaxedQ15mulrS => match mode {
            Deterministic => v_binop::<i16, 8>(stack, q15mulr_sat),
            // i16::MIN * i16::MIN wraps to i16::MIN
            Alternate => v_binop::<i16, 8>(stack, |a, b| ((a as i32 * b as i32 + 0x4000) >> 15) as i16),
        },

        I16x8RelaxedDotI8x16I7x16S => {
            let b = stack.pop_v128()?;
            let a = stack.pop_v128()?;
            stack.push_val(from_lanes(dot_i16(a, b, mode)));
            Ok(())
        }
        I32x4RelaxedDotI8x16I7x16AddS => {
            let c = lanes::<i32, 4>(stack.pop_v128()?);
            let b = stack.pop_v128()?;
            let a = stack.pop_v128()?;
            let pairs = dot_i16(a, b, mode);
            let r: [i32; 4] = std::array::from_fn(|i| {
                (pairs[2 * i] as i32)
                    .wrapping_add(pairs[2 * i + 1] as i32)
                    .wrapping_add(c[i])
            });
            stack.push_val(from_lanes(r));
            Ok(())
        }

        other => Err(RuntimeError::fault(format!(
            "{} is not a relaxed vector instruction",
            other.mnemonic()
        ))),
    }
}
