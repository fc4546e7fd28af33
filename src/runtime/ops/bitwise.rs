//! Bitwise operations for WebAssembly
//!
//! and, or, xor, shifts and rotates (section 4.4.1.3). Shift and rotate
//! counts are taken modulo the operand width.

use super::*;

binop!(i32_and, pop_i32 => push_i32, |c1, c2| c1 & c2);
binop!(i32_or, pop_i32 => push_i32, |c1, c2| c1 | c2);
binop!(i32_xor, pop_i32 => push_i32, |c1, c2| c1 ^ c2);
binop!(
    /// i32.shl: c1 << (c2 mod 32)
    i32_shl, pop_i32 => push_i32, |c1, c2| c1.wrapping_shl(c2 as u32)
);
binop!(
    /// i32.shr_s: arithmetic shift, replicating the sign bit
    i32_shr_s, pop_i32 => push_i32, |c1, c2| c1.wrapping_shr(c2 as u32)
);
binop!(
    /// i32.shr_u: logical shift, filling with zeros
    i32_shr_u, pop_u32 => push_i32, |c1, c2| c1.wrapping_shr(c2) as i32
);
binop!(i32_rotl, pop_u32 => push_i32, |c1, c2| c1.rotate_left(c2 % 32) as i32);
binop!(i32_rotr, pop_u32 => push_i32, |c1, c2| c1.rotate_right(c2 % 32) as i32);

binop!(i64_and, pop_i64 => push_i64, |c1, c2| c1 & c2);
binop!(i64_or, pop_i64 => push_i64, |c1, c2| c1 | c2);
binop!(i64_xor, pop_i64 => push_i64, |c1, c2| c1 ^ c2);
binop!(
    /// i64.shl: c1 << (c2 mod 64)
    i64_shl, pop_i64 => push_i64, |c1, c2| c1.wrapping_shl(c2 as u32)
);
binop!(i64_shr_s, pop_i64 => push_i64, |c1, c2| c1.wrapping_shr(c2 as u32));
binop!(i64_shr_u, pop_u64 => push_i64, |c1, c2| c1.wrapping_shr(c2 as u32) as i64);
binop!(i64_rotl, pop_u64 => push_i64, |c1, c2| c1.rotate_left((c2 % 64) as u32) as i64);
binop!(i64_rotr, pop_u64 => push_i64, |c1, c2| c1.rotate_right((c2 % 64) as u32) as i64);

#[cfg(test)]
mod tests {
    use crate::parser::instruction::Instruction::*;
    use crate::parser::module::ValueType;
    use crate::runtime::test_utils::test::ExecutorTest;
    use crate::runtime::Value;

    #[test]
    fn i32_logic() {
        ExecutorTest::new()
            .inst(I32Const(0b1100))
            .inst(I32Const(0b1010))
            .inst(I32And)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0b1000)]);

        ExecutorTest::new()
            .inst(I32Const(0b1100))
            .inst(I32Const(0b1010))
            .inst(I32Xor)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0b0110)]);
    }

    #[test]
    fn shift_count_is_masked() {
        ExecutorTest::new()
            .inst(I32Const(1))
            .inst(I32Const(33))
            .inst(I32Shl)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(2)]);

        ExecutorTest::new()
            .inst(I64Const(1))
            .inst(I64Const(65))
            .inst(I64Shl)
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_i64(2)]);
    }

    #[test]
    fn signed_and_unsigned_shift_right() {
        ExecutorTest::new()
            .inst(I32Const(-8))
            .inst(I32Const(1))
            .inst(I32ShrS)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(-4)]);

        ExecutorTest::new()
            .inst(I32Const(-8))
            .inst(I32Const(1))
            .inst(I32ShrU)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(0x7fff_fffc)]);

        ExecutorTest::new()
            .inst(I64Const(-1))
            .inst(I64Const(60))
            .inst(I64ShrU)
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_i64(0xf)]);
    }

    #[test]
    fn rotates() {
        ExecutorTest::new()
            .inst(I32Const(0x8000_0001u32 as i32))
            .inst(I32Const(1))
            .inst(I32Rotl)
            .returns(vec![ValueType::I32])
            .expect_stack(vec![Value::from_i32(3)]);

        ExecutorTest::new()
            .inst(I64Const(1))
            .inst(I64Const(1))
            .inst(I64Rotr)
            .returns(vec![ValueType::I64])
            .expect_stack(vec![Value::from_u64(0x8000_0000_0000_0000)]);
    }
}
