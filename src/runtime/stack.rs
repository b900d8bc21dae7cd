//! The runtime operand stack
//!
//! Validation guarantees operand types, so a mismatch or underflow here is
//! an engine bug and surfaces as [`RuntimeError::InternalFault`], never a trap.

use super::value::{Ref, Value};
use super::RuntimeError;
use crate::parser::types::ValueType;

#[derive(Debug, Default)]
pub struct Stack {
    values: Vec<Value>,
}

/// A scalar or vector that can be popped from and pushed to the stack
pub trait StackValue: Sized + Copy {
    const TYPE: ValueType;
    fn from_value(value: Value) -> Option<Self>;
    fn into_value(self) -> Value;
}

macro_rules! stack_value {
    ($($t:ty => $variant:ident, $vt:ident;)*) => {
        $(
            impl StackValue for $t {
                const TYPE: ValueType = ValueType::$vt;

                fn from_value(value: Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v),
                        _ => None,
                    }
                }

                fn into_value(self) -> Value {
                    Value::$variant(self)
                }
            }
        )*
    };
}

stack_value! {
    i32 => I32, I32;
    i64 => I64, I64;
    f32 => F32, F32;
    f64 => F64, F64;
    [u8; 16] => V128, V128;
}

impl Stack {
    pub fn new() -> Self {
        Stack { values: Vec::new() }
    }

    pub fn push(&mut self, value: Value) {
        self.values.push(value);
    }

    pub fn push_all(&mut self, values: impl IntoIterator<Item = Value>) {
        self.values.extend(values);
    }

    pub fn push_val<T: StackValue>(&mut self, v: T) {
        self.values.push(v.into_value());
    }

    pub fn push_ref(&mut self, r: Ref) {
        self.values.push(Value::Ref(r));
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.values
            .pop()
            .ok_or_else(|| RuntimeError::fault("operand stack underflow"))
    }

    /// Pop a value of any type
    pub fn pop_any(&mut self) -> Result<Value, RuntimeError> {
        self.pop()
    }

    /// Pop a numeric or vector value and check its type
    pub fn pop_typed(&mut self, expected: ValueType) -> Result<Value, RuntimeError> {
        let value = self.pop()?;
        let matches = match (expected, value) {
            (ValueType::Ref(_), Value::Ref(_)) => true,
            (expected, value) => value.typ() == expected,
        };
        if !matches {
            return Err(RuntimeError::fault(format!(
                "operand type mismatch: expected {expected}, found {value}"
            )));
        }
        Ok(value)
    }

    pub fn pop_val<T: StackValue>(&mut self) -> Result<T, RuntimeError> {
        let value = self.pop()?;
        T::from_value(value).ok_or_else(|| {
            RuntimeError::fault(format!("operand type mismatch: expected {}, found {value}", T::TYPE))
        })
    }

    pub fn pop_i32(&mut self) -> Result<i32, RuntimeError> {
        self.pop_val()
    }

    pub fn pop_i64(&mut self) -> Result<i64, RuntimeError> {
        self.pop_val()
    }

    pub fn pop_f32(&mut self) -> Result<f32, RuntimeError> {
        self.pop_val()
    }

    pub fn pop_f64(&mut self) -> Result<f64, RuntimeError> {
        self.pop_val()
    }

    pub fn pop_v128(&mut self) -> Result<[u8; 16], RuntimeError> {
        self.pop_val()
    }

    /// Pop an i32 used as an unsigned index, offset or length
    pub fn pop_u32(&mut self) -> Result<u32, RuntimeError> {
        Ok(self.pop_i32()? as u32)
    }

    pub fn pop_ref(&mut self) -> Result<Ref, RuntimeError> {
        match self.pop()? {
            Value::Ref(r) => Ok(r),
            other => Err(RuntimeError::fault(format!(
                "operand type mismatch: expected reference, found {other}"
            ))),
        }
    }

    /// Pop `n` values, returned in stack order (deepest first)
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, RuntimeError> {
        let start = self
            .values
            .len()
            .checked_sub(n)
            .ok_or_else(|| RuntimeError::fault(format!("operand stack underflow popping {n} values")))?;
        Ok(self.values.split_off(start))
    }

    pub fn peek(&self) -> Option<&Value> {
        self.values.last()
    }

    pub fn depth(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn truncate(&mut self, depth: usize) {
        self.values.truncate(depth);
    }

    /// Remove and return every value, deepest first
    pub fn drain(&mut self) -> Vec<Value> {
        self.values.drain(..).collect()
    }
}
