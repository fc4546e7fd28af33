//! Comparison operations for WebAssembly
//!
//! Test and relational operators (sections 4.4.1.4 and 4.4.1.5). Every
//! comparison pushes an i32 that is 1 when it holds and 0 otherwise. Float
//! comparisons involving NaN are false, except `ne`.

use super::*;

unop!(
    /// i32.eqz: 1 if c is zero
    i32_eqz, pop_i32 => push_bool, |c| c == 0
);
binop!(i32_eq, pop_i32 => push_bool, |c1, c2| c1 == c2);
binop!(i32_ne, pop_i32 => push_bool, |c1, c2| c1 != c2);
binop!(i32_lt_s, pop_i32 => push_bool, |c1, c2| c1 < c2);
binop!(i32_lt_u, pop_u32 => push_bool, |c1, c2| c1 < c2);
binop!(i32_gt_s, pop_i32 => push_bool, |c1, c2| c1 > c2);
binop!(i32_gt_u, pop_u32 => push_bool, |c1, c2| c1 > c2);
binop!(i32_le_s, pop_i32 => push_bool, |c1, c2| c1 <= c2);
binop!(i32_le_u, pop_u32 => push_bool, |c1, c2| c1 <= c2);
binop!(i32_ge_s, pop_i32 => push_bool, |c1, c2| c1 >= c2);
binop!(i32_ge_u, pop_u32 => push_bool, |c1, c2| c1 >= c2);

unop!(i64_eqz, pop_i64 => push_bool, |c| c == 0);
binop!(i64_eq, pop_i64 => push_bool, |c1, c2| c1 == c2);
binop!(i64_ne, pop_i64 => push_bool, |c1, c2| c1 != c2);
binop!(i64_lt_s, pop_i64 => push_bool, |c1, c2| c1 < c2);
binop!(i64_lt_u, pop_u64 => push_bool, |c1, c2| c1 < c2);
binop!(i64_gt_s, pop_i64 => push_bool, |c1, c2| c1 > c2);
binop!(i64_gt_u, pop_u64 => push_bool, |c1, c2| c1 > c2);
binop!(i64_le_s, pop_i64 => push_bool, |c1, c2| c1 <= c2);
binop!(i64_le_u, pop_u64 => push_bool, |c1, c2| c1 <= c2);
binop!(i64_ge_s, pop_i64 => push_bool, |c1, c2| c1 >= c2);
binop!(i64_ge_u, pop_u64 => push_bool, |c1, c2| c1 >= c2);

binop!(f32_eq, pop_f32 => push_bool, |z1, z2| z1 == z2);
binop!(f32_ne, pop_f32 => push_bool, |z1, z2| z1 != z2);
binop!(f32_lt, pop_f32 => push_bool, |z1, z2| z1 < z2);
binop!(f32_gt, pop_f32 => push_bool, |z1, z2| z1 > z2);
binop!(f32_le, pop_f32 => push_bool, |z1, z2| z1 <= z2);
binop!(f32_ge, pop_f32 => push_bool, |z1, z2| z1 >= z2);

binop!(f64_eq, pop_f64 => push_bool, |z1, z2| z1 == z2);
binop!(f64_ne, pop_f64 => push_bool, |z1, z2| z1 != z2);
binop!(f64_lt, pop_f64 => push_bool, |z1, z2| z1 < z2);
binop!(f64_gt, pop_f64 => push_bool, |z1, z2| z1 > z2);
binop!(f64_le, pop_f64 => push_bool, |z1, z2| z1 <= z2);
binop!(f64_ge, pop_f64 => push_bool, |z1, z2| z1 >= z2);

#[cfg(test)]
mod tests {
    use crate::parser::instruction::Instruction::*;
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::Value;

    #[test]
    fn i32_eqz() {
        ExecutorTest::new()
            .inst(I32Const(0))
            .inst(I32Eqz)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);

        ExecutorTest::new()
            .inst(I32Const(7))
            .inst(I32Eqz)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0)]);
    }

    #[test]
    fn signedness_matters() {
        ExecutorTest::new()
            .inst(I32Const(-1))
            .inst(I32Const(1))
            .inst(I32LtS)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);

        ExecutorTest::new()
            .inst(I32Const(-1))
            .inst(I32Const(1))
            .inst(I32LtU)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0)]);

        ExecutorTest::new()
            .inst(I64Const(-1))
            .inst(I64Const(0))
            .inst(I64GeU)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);
    }

    #[test]
    fn nan_compares_unordered() {
        ExecutorTest::new()
            .inst(F64Const(f64::NAN))
            .inst(F64Const(f64::NAN))
            .inst(F64Eq)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0)]);

        ExecutorTest::new()
            .inst(F32Const(f32::NAN))
            .inst(F32Const(1.0))
            .inst(F32Ne)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);
    }

    #[test]
    fn signed_zeros_are_equal() {
        ExecutorTest::new()
            .inst(F32Const(0.0))
            .inst(F32Const(-0.0))
            .inst(F32Eq)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(1)]);
    }
}
