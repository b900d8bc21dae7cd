//! Conversions between scalar numeric types
//!
//! Trapping float-to-int truncation fails with
//! [`Trap::InvalidConversion`] on NaN and [`Trap::IntegerOverflow`] when the
//! truncated value is out of range. The saturating forms clamp instead and
//! map NaN to zero, which is exactly what Rust's `as` casts do.

use super::{RuntimeError, Stack, StackValue, Trap};
use crate::parser::instruction::NumOp;

pub(crate) fn cvtop<T: StackValue, U: StackValue>(
    stack: &mut Stack,
    f: impl FnOnce(T) -> U,
) -> Result<(), RuntimeError> {
    let c = stack.pop_val::<T>()?;
    stack.push_val(f(c));
    Ok(())
}

fn try_cvtop<T: StackValue, U: StackValue>(
    stack: &mut Stack,
    f: impl FnOnce(T) -> Result<U, Trap>,
) -> Result<(), RuntimeError> {
    let c = stack.pop_val::<T>()?;
    stack.push_val(f(c)?);
    Ok(())
}

/// Truncate toward zero, requiring the result to lie in `[min, limit)`.
/// f32 operands are widened to f64 first, which is exact.
fn checked_trunc(x: f64, min: f64, limit: f64) -> Result<f64, Trap> {
    if x.is_nan() {
        return Err(Trap::InvalidConversion);
    }
    let t = x.trunc();
    if t < min || t >= limit {
        return Err(Trap::IntegerOverflow);
    }
    Ok(t)
}

const I32_RANGE: (f64, f64) = (-2147483648.0, 2147483648.0);
const U32_RANGE: (f64, f64) = (0.0, 4294967296.0);
const I64_RANGE: (f64, f64) = (-9223372036854775808.0, 9223372036854775808.0);
const U64_RANGE: (f64, f64) = (0.0, 18446744073709551616.0);

fn trunc_i32(x: f64) -> Result<i32, Trap> {
    checked_trunc(x, I32_RANGE.0, I32_RANGE.1).map(|t| t as i32)
}

fn trunc_u32(x: f64) -> Result<i32, Trap> {
    checked_trunc(x, U32_RANGE.0, U32_RANGE.1).map(|t| t as u32 as i32)
}

fn trunc_i64(x: f64) -> Result<i64, Trap> {
    checked_trunc(x, I64_RANGE.0, I64_RANGE.1).map(|t| t as i64)
}

fn trunc_u64(x: f64) -> Result<i64, Trap> {
    checked_trunc(x, U64_RANGE.0, U64_RANGE.1).map(|t| t as u64 as i64)
}

/// Execute a conversion instruction
pub fn execute(stack: &mut Stack, op: NumOp) -> Result<(), RuntimeError> {
    use NumOp::*;
    match op {
        I32WrapI64 => cvtop(stack, |a: i64| a as i32),
        I64ExtendI32S => cvtop(stack, |a: i32| a as i64),
        I64ExtendI32U => cvtop(stack, |a: i32| a as u32 as i64),

        I32TruncF32S => try_cvtop(stack, |a: f32| trunc_i32(a as f64)),
        I32TruncF32U => try_cvtop(stack, |a: f32| trunc_u32(a as f64)),
        I32TruncF64S => try_cvtop(stack, trunc_i32),
        I32TruncF64U => try_cvtop(stack, trunc_u32),
        I64TruncF32S => try_cvtop(stack, |a: f32| trunc_i64(a as f64)),
        I64TruncF32U => try_cvtop(stack, |a: f32| trunc_u64(a as f64)),
        I64TruncF64S => try_cvtop(stack, trunc_i64),
        I64TruncF64U => try_cvtop(stack, trunc_u64),

        I32TruncSatF32S => cvtop(stack, |a: f32| a as i32),
        I32TruncSatF32U => cvtop(stack, |a: f32| a as u32 as i32),
        I32TruncSatF64S => cvtop(stack, |a: f64| a as i32),
        I32TruncSatF64U => cvtop(stack, |a: f64| a as u32 as i32),
        I64TruncSatF32S => cvtop(stack, |a: f32| a as i64),
        I64TruncSatF32U => cvtop(stack, |a: f32| a as u64 as i64),
        I64TruncSatF64S => cvtop(stack, |a: f64| a as i64),
        I64TruncSatF64U => cvtop(stack, |a: f64| a as u64 as i64),

        F32ConvertI32S => cvtop(stack, |a: i32| a as f32),
        F32ConvertI32U => cvtop(stack, |a: i32| a as u32 as f32),
        F32ConvertI64S => cvtop(stack, |a: i64| a as f32),
        F32ConvertI64U => cvtop(stack, |a: i64| a as u64 as f32),
        F64ConvertI32S => cvtop(stack, |a: i32| a as f64),
        F64ConvertI32U => cvtop(stack, |a: i32| a as u32 as f64),
        F64ConvertI64S => cvtop(stack, |a: i64| a as f64),
        F64ConvertI64U => cvtop(stack, |a: i64| a as u64 as f64),
        F32DemoteF64 => cvtop(stack, |a: f64| a as f32),
        F64PromoteF32 => cvtop(stack, |a: f32| a as f64),

        I32ReinterpretF32 => cvtop(stack, |a: f32| a.to_bits() as i32),
        I64ReinterpretF64 => cvtop(stack, |a: f64| a.to_bits() as i64),
        F32ReinterpretI32 => cvtop(stack, |a: i32| f32::from_bits(a as u32)),
        F64ReinterpretI64 => cvtop(stack, |a: i64| f64::from_bits(a as u64)),

        other => Err(RuntimeError::fault(format!(
            "{} is not a conversion",
            other.mnemonic()
        ))),
    }
}
