//! Parametric operations for WebAssembly
//!
//! This module provides implementations of parametric operations
//! as specified in the WebAssembly specification section 4.4.4 (Parametric Instructions).

use super::*;

/// drop - Drop value from stack
/// [t] → []
pub fn drop(stack: &mut Stack) -> Result<(), Trap> {
    stack.pop()?;
    Ok(())
}

/// select - Select one of two values based on condition
/// [t t i32] → [t]
///
/// 1. Pop the i32 condition c.
/// 2. Pop val2, then val1.
/// 3. Push val1 if c is non-zero, val2 otherwise.
pub fn select(stack: &mut Stack) -> Result<(), Trap> {
    let condition = stack.pop_i32()?;
    let val2 = stack.pop()?;
    let val1 = stack.pop()?;
    stack.push(if condition != 0 { val1 } else { val2 });
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::parser::instruction::Instruction::*;
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::Value;

    #[test]
    fn drop_single_value() {
        ExecutorTest::new()
            .inst(I32Const(42))
            .inst(Drop)
            .inst(I32Const(100))
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(100)]);
    }

    #[test]
    fn drop_empty_stack() {
        ExecutorTest::new().inst(Drop).expect_error("stack underflow");
    }

    #[test]
    fn drop_different_types() {
        ExecutorTest::new()
            .inst(I32Const(42))
            .inst(Drop)
            .inst(F64Const(2.5))
            .inst(Drop)
            .inst(I64Const(100))
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_i64(100)]);
    }

    #[test]
    fn select_by_condition() {
        ExecutorTest::new()
            .inst(I64Const(1))
            .inst(I64Const(2))
            .inst(I32Const(1))
            .inst(Select)
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_i64(1)]);

        ExecutorTest::new()
            .inst(F32Const(1.0))
            .inst(F32Const(2.0))
            .inst(I32Const(0))
            .inst(Select)
            .returns(vec![ValueType::F32])
            .expect_stack(vec![Value::from_f32(2.0)]);
    }
}
