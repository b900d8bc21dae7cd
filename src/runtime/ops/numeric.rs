//! Scalar numeric instructions
//!
//! Tests, comparisons, arithmetic and bitwise operations on i32, i64, f32
//! and f64. Conversions between types are in
//! [`conversion`](super::conversion).
//!
//! Operands are popped in reverse: for `t.binop`, c2 is popped first and
//! then c1, and the result is `c1 op c2`.

use super::{conversion, RuntimeError, Stack, StackValue, Trap};
use crate::parser::instruction::NumOp;

// ============================================================================
// Operand helpers
// ============================================================================

pub(crate) fn unop<T: StackValue>(stack: &mut Stack, f: impl FnOnce(T) -> T) -> Result<(), RuntimeError> {
    let c = stack.pop_val::<T>()?;
    stack.push_val(f(c));
    Ok(())
}

pub(crate) fn binop<T: StackValue>(stack: &mut Stack, f: impl FnOnce(T, T) -> T) -> Result<(), RuntimeError> {
    let c2 = stack.pop_val::<T>()?;
    let c1 = stack.pop_val::<T>()?;
    stack.push_val(f(c1, c2));
    Ok(())
}

/// A binary operation that may trap, such as division
pub(crate) fn try_binop<T: StackValue>(
    stack: &mut Stack,
    f: impl FnOnce(T, T) -> Result<T, Trap>,
) -> Result<(), RuntimeError> {
    let c2 = stack.pop_val::<T>()?;
    let c1 = stack.pop_val::<T>()?;
    stack.push_val(f(c1, c2)?);
    Ok(())
}

pub(crate) fn testop<T: StackValue>(stack: &mut Stack, f: impl FnOnce(T) -> bool) -> Result<(), RuntimeError> {
    let c = stack.pop_val::<T>()?;
    stack.push_val(f(c) as i32);
    Ok(())
}

pub(crate) fn relop<T: StackValue>(stack: &mut Stack, f: impl FnOnce(T, T) -> bool) -> Result<(), RuntimeError> {
    let c2 = stack.pop_val::<T>()?;
    let c1 = stack.pop_val::<T>()?;
    stack.push_val(f(c1, c2) as i32);
    Ok(())
}

// ============================================================================
// Float helpers
// ============================================================================

macro_rules! float_min_max {
    ($min:ident, $max:ident, $t:ty) => {
        /// Canonical NaN if either operand is NaN; -0 is less than +0
        pub(crate) fn $min(a: $t, b: $t) -> $t {
            if a.is_nan() || b.is_nan() {
                return <$t>::NAN;
            }
            if a == b {
                return if a.is_sign_negative() { a } else { b };
            }
            if a < b {
                a
            } else {
                b
            }
        }

        /// Canonical NaN if either operand is NaN; +0 is greater than -0
        pub(crate) fn $max(a: $t, b: $t) -> $t {
            if a.is_nan() || b.is_nan() {
                return <$t>::NAN;
            }
            if a == b {
                return if a.is_sign_positive() { a } else { b };
            }
            if a > b {
                a
            } else {
                b
            }
        }
    };
}

float_min_max!(f32_min, f32_max, f32);
float_min_max!(f64_min, f64_max, f64);

// ============================================================================
// Integer division
// ============================================================================

macro_rules! int_division {
    ($div_s:ident, $div_u:ident, $rem_s:ident, $rem_u:ident, $s:ty, $u:ty) => {
        fn $div_s(a: $s, b: $s) -> Result<$s, Trap> {
            if b == 0 {
                return Err(Trap::DivisionByZero);
            }
            // MIN / -1 is the only overflowing case
            a.checked_div(b).ok_or(Trap::IntegerOverflow)
        }

        fn $div_u(a: $s, b: $s) -> Result<$s, Trap> {
            (a as $u)
                .checked_div(b as $u)
                .map(|r| r as $s)
                .ok_or(Trap::DivisionByZero)
        }

        fn $rem_s(a: $s, b: $s) -> Result<$s, Trap> {
            if b == 0 {
                return Err(Trap::DivisionByZero);
            }
            Ok(a.wrapping_rem(b))
        }

        fn $rem_u(a: $s, b: $s) -> Result<$s, Trap> {
            (a as $u)
                .checked_rem(b as $u)
                .map(|r| r as $s)
                .ok_or(Trap::DivisionByZero)
        }
    };
}

int_division!(i32_div_s, i32_div_u, i32_rem_s, i32_rem_u, i32, u32);
int_division!(i64_div_s, i64_div_u, i64_rem_s, i64_rem_u, i64, u64);

// ============================================================================
// Dispatch
// ============================================================================

/// Execute a scalar numeric instruction
pub fn execute(stack: &mut Stack, op: NumOp) -> Result<(), RuntimeError> {
    use NumOp::*;
    match op {
        // i32 tests and comparisons
        I32Eqz => testop(stack, |a: i32| a == 0),
        I32Eq => relop(stack, |a: i32, b| a == b),
        I32Ne => relop(stack, |a: i32, b| a != b),
        I32LtS => relop(stack, |a: i32, b| a < b),
        I32LtU => relop(stack, |a: i32, b: i32| (a as u32) < (b as u32)),
        I32GtS => relop(stack, |a: i32, b| a > b),
        I32GtU => relop(stack, |a: i32, b: i32| (a as u32) > (b as u32)),
        I32LeS => relop(stack, |a: i32, b| a <= b),
        I32LeU => relop(stack, |a: i32, b: i32| (a as u32) <= (b as u32)),
        I32GeS => relop(stack, |a: i32, b| a >= b),
        I32GeU => relop(stack, |a: i32, b: i32| (a as u32) >= (b as u32)),

        // i64 tests and comparisons
        I64Eqz => testop(stack, |a: i64| a == 0),
        I64Eq => relop(stack, |a: i64, b| a == b),
        I64Ne => relop(stack, |a: i64, b| a != b),
        I64LtS => relop(stack, |a: i64, b| a < b),
        I64LtU => relop(stack, |a: i64, b: i64| (a as u64) < (b as u64)),
        I64GtS => relop(stack, |a: i64, b| a > b),
        I64GtU => relop(stack, |a: i64, b: i64| (a as u64) > (b as u64)),
        I64LeS => relop(stack, |a: i64, b| a <= b),
        I64LeU => relop(stack, |a: i64, b: i64| (a as u64) <= (b as u64)),
        I64GeS => relop(stack, |a: i64, b| a >= b),
        I64GeU => relop(stack, |a: i64, b: i64| (a as u64) >= (b as u64)),

        // float comparisons; any NaN operand compares false except for ne
        F32Eq => relop(stack, |a: f32, b| a == b),
        F32Ne => relop(stack, |a: f32, b| a != b),
        F32Lt => relop(stack, |a: f32, b| a < b),
        F32Gt => relop(stack, |a: f32, b| a > b),
        F32Le => relop(stack, |a: f32, b| a <= b),
        F32Ge => relop(stack, |a: f32, b| a >= b),
        F64Eq => relop(stack, |a: f64, b| a == b),
        F64Ne => relop(stack, |a: f64, b| a != b),
        F64Lt => relop(stack, |a: f64, b| a < b),
        F64Gt => relop(stack, |a: f64, b| a > b),
        F64Le => relop(stack, |a: f64, b| a <= b),
        F64Ge => relop(stack, |a: f64, b| a >= b),

        // i32 arithmetic and bitwise
        I32Clz => unop(stack, |a: i32| a.leading_zeros() as i32),
        I32Ctz => unop(stack, |a: i32| a.trailing_zeros() as i32),
        I32Popcnt => unop(stack, |a: i32| a.count_ones() as i32),
        I32Add => binop(stack, |a: i32, b| a.wrapping_add(b)),
        I32Sub => binop(stack, |a: i32, b| a.wrapping_sub(b)),
        I32Mul => binop(stack, |a: i32, b| a.wrapping_mul(b)),
        I32DivS => try_binop(stack, i32_div_s),
        I32DivU => try_binop(stack, i32_div_u),
        I32RemS => try_binop(stack, i32_rem_s),
        I32RemU => try_binop(stack, i32_rem_u),
        I32And => binop(stack, |a: i32, b| a & b),
        I32Or => binop(stack, |a: i32, b| a | b),
        I32Xor => binop(stack, |a: i32, b| a ^ b),
        // shift counts are taken modulo the bit width
        I32Shl => binop(stack, |a: i32, b: i32| a.wrapping_shl(b as u32)),
        I32ShrS => binop(stack, |a: i32, b: i32| a.wrapping_shr(b as u32)),
        I32ShrU => binop(stack, |a: i32, b: i32| (a as u32).wrapping_shr(b as u32) as i32),
        I32Rotl => binop(stack, |a: i32, b: i32| a.rotate_left(b as u32 % 32)),
        I32Rotr => binop(stack, |a: i32, b: i32| a.rotate_right(b as u32 % 32)),

        // i64 arithmetic and bitwise
        I64Clz => unop(stack, |a: i64| a.leading_zeros() as i64),
        I64Ctz => unop(stack, |a: i64| a.trailing_zeros() as i64),
        I64Popcnt => unop(stack, |a: i64| a.count_ones() as i64),
        I64Add => binop(stack, |a: i64, b| a.wrapping_add(b)),
        I64Sub => binop(stack, |a: i64, b| a.wrapping_sub(b)),
        I64Mul => binop(stack, |a: i64, b| a.wrapping_mul(b)),
        I64DivS => try_binop(stack, i64_div_s),
        I64DivU => try_binop(stack, i64_div_u),
        I64RemS => try_binop(stack, i64_rem_s),
        I64RemU => try_binop(stack, i64_rem_u),
        I64And => binop(stack, |a: i64, b| a & b),
        I64Or => binop(stack, |a: i64, b| a | b),
        I64Xor => binop(stack, |a: i64, b| a ^ b),
        I64Shl => binop(stack, |a: i64, b: i64| a.wrapping_shl(b as u32)),
        I64ShrS => binop(stack, |a: i64, b: i64| a.wrapping_shr(b as u32)),
        I64ShrU => binop(stack, |a: i64, b: i64| (a as u64).wrapping_shr(b as u32) as i64),
        I64Rotl => binop(stack, |a: i64, b: i64| a.rotate_left((b as u64 % 64) as u32)),
        I64Rotr => binop(stack, |a: i64, b: i64| a.rotate_right((b as u64 % 64) as u32)),

        // f32 arithmetic
        F32Abs => unop(stack, |a: f32| a.abs()),
        F32Neg => unop(stack, |a: f32| -a),
        F32Ceil => unop(stack, |a: f32| a.ceil()),
        F32Floor => unop(stack, |a: f32| a.floor()),
        F32Trunc => unop(stack, |a: f32| a.trunc()),
        F32Nearest => unop(stack, |a: f32| a.round_ties_even()),
        F32Sqrt => unop(stack, |a: f32| a.sqrt()),
        F32Add => binop(stack, |a: f32, b| a + b),
        F32Sub => binop(stack, |a: f32, b| a - b),
        F32Mul => binop(stack, |a: f32, b| a * b),
        F32Div => binop(stack, |a: f32, b| a / b),
        F32Min => binop(stack, f32_min),
        F32Max => binop(stack, f32_max),
        F32Copysign => binop(stack, |a: f32, b| a.copysign(b)),

        // f64 arithmetic
        F64Abs => unop(stack, |a: f64| a.abs()),
        F64Neg => unop(stack, |a: f64| -a),
        F64Ceil => unop(stack, |a: f64| a.ceil()),
        F64Floor => unop(stack, |a: f64| a.floor()),
        F64Trunc => unop(stack, |a: f64| a.trunc()),
        F64Nearest => unop(stack, |a: f64| a.round_ties_even()),
        F64Sqrt => unop(stack, |a: f64| a.sqrt()),
        F64Add => binop(stack, |a: f64, b| a + b),
        F64Sub => binop(stack, |a: f64, b| a - b),
        F64Mul => binop(stack, |a: f64, b| a * b),
        F64Div => binop(stack, |a: f64, b| a / b),
        F64Min => binop(stack, f64_min),
        F64Max => binop(stack, f64_max),
        F64Copysign => binop(stack, |a: f64, b| a.copysign(b)),

        // sign extension within a type
        I32Extend8S => unop(stack, |a: i32| a as i8 as i32),
        I32Extend16S => unop(stack, |a: i32| a as i16 as i32),
        I64Extend8S => unop(stack, |a: i64| a as i8 as i64),
        I64Extend16S => unop(stack, |a: i64| a as i16 as i64),
        I64Extend32S => unop(stack, |a: i64| a as i32 as i64),

        _ => conversion::execute(stack, op),
    }
}
