//! Parametric instructions

use super::{RuntimeError, Stack};

/// drop
pub fn drop(stack: &mut Stack) -> Result<(), RuntimeError> {
    stack.pop_any()?;
    Ok(())
}

/// select and select t
/// 1. Pop the i32 condition c
/// 2. Pop val2, then val1
/// 3. Push val1 if c is non-zero, otherwise val2
pub fn select(stack: &mut Stack) -> Result<(), RuntimeError> {
    let c = stack.pop_i32()?;
    let val2 = stack.pop_any()?;
    let val1 = stack.pop_any()?;
    stack.push(if c != 0 { val1 } else { val2 });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::HeapType;
    use crate::runtime::{Ref, Value};

    #[test]
    fn test_drop() {
        let mut stack = Stack::new();
        stack.push(Value::I32(1));
        stack.push(Value::F64(2.0));
        drop(&mut stack).unwrap();
        assert_eq!(stack.drain(), vec![Value::I32(1)]);
        assert!(drop(&mut stack).is_err());
    }

    #[test]
    fn test_select() {
        let mut stack = Stack::new();
        stack.push_all([Value::I64(1), Value::I64(2), Value::I32(7)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.drain(), vec![Value::I64(1)]);

        let null = Value::Ref(Ref::Null(HeapType::ANY));
        stack.push_all([Value::V128([1; 16]), null, Value::I32(0)]);
        select(&mut stack).unwrap();
        assert_eq!(stack.drain(), vec![null]);
    }
}
